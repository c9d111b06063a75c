pub mod asserts;
pub mod fixtures;
pub mod nodes;
pub mod sources;

pub use asserts::*;
pub use fixtures::*;
pub use nodes::*;
pub use sources::*;
