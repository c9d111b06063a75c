use async_trait::async_trait;
use serde_json::{Value, json};

use super::{config_str, value_text};
use crate::condition::Condition;
use crate::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
use crate::registry::RegistryError;
use crate::spec::ConfigMap;
use crate::state::StateSnapshot;

pub const ROUTE_KEY: &str = "route";
const DEFAULT_ROUTE: &str = "unknown";

/// Writes a routing decision for downstream conditional edges to consume.
///
/// The decision lands under `route` (configurable through `output_key`);
/// edges out of the router typically test it with conditions like
/// `route == "billing"`.
///
/// Strategies, picked by the `strategy` config key:
/// - `keyword` (default): `routes` is a map of keyword → route. The input
///   key's text is matched case-insensitively against each keyword; keywords
///   are checked in lexicographic order, first hit wins.
/// - `rules`: `rules` is an ordered list of `{ "when": <condition>,
///   "route": <name> }` pairs. Conditions use the same expression language
///   as edge conditions and are evaluated against the full state; first true
///   condition wins.
/// - `fixed`: `route` names the constant decision.
///
/// No match falls back to `default_route` (default `"unknown"`).
#[derive(Debug)]
pub struct RouterNode {
    input_key: String,
    output_key: String,
    default_route: String,
    strategy: Strategy,
}

#[derive(Debug)]
enum Strategy {
    /// (lowercased keyword, route), in deterministic match order.
    Keyword(Vec<(String, String)>),
    Rules(Vec<(Condition, String)>),
    Fixed(String),
}

impl RouterNode {
    pub fn from_config(node_id: &str, config: &ConfigMap) -> Result<Self, RegistryError> {
        let input_key = config_str(config, "input_key")
            .unwrap_or("user_input")
            .to_string();
        let output_key = config_str(config, "output_key")
            .unwrap_or(ROUTE_KEY)
            .to_string();
        let default_route = config_str(config, "default_route")
            .unwrap_or(DEFAULT_ROUTE)
            .to_string();

        let strategy = match config_str(config, "strategy").unwrap_or("keyword") {
            "keyword" => Strategy::Keyword(parse_keyword_routes(node_id, config)?),
            "rules" => Strategy::Rules(parse_rules(node_id, config)?),
            "fixed" => {
                let route = config_str(config, "route").ok_or_else(|| {
                    RegistryError::construction(node_id, "fixed strategy needs a 'route' key")
                })?;
                Strategy::Fixed(route.to_string())
            }
            other => {
                return Err(RegistryError::construction(
                    node_id,
                    format!("unknown routing strategy '{other}'"),
                ));
            }
        };

        Ok(Self {
            input_key,
            output_key,
            default_route,
            strategy,
        })
    }

    fn decide(&self, snapshot: &StateSnapshot) -> String {
        match &self.strategy {
            Strategy::Keyword(routes) => {
                let text = value_text(snapshot.get(&self.input_key)).to_lowercase();
                routes
                    .iter()
                    .find(|(keyword, _)| text.contains(keyword.as_str()))
                    .map(|(_, route)| route.clone())
                    .unwrap_or_else(|| self.default_route.clone())
            }
            Strategy::Rules(rules) => rules
                .iter()
                .find(|(condition, _)| condition.evaluate(snapshot))
                .map(|(_, route)| route.clone())
                .unwrap_or_else(|| self.default_route.clone()),
            Strategy::Fixed(route) => route.clone(),
        }
    }
}

fn parse_keyword_routes(
    node_id: &str,
    config: &ConfigMap,
) -> Result<Vec<(String, String)>, RegistryError> {
    let Some(value) = config.get("routes") else {
        return Ok(Vec::new());
    };
    let map = value.as_object().ok_or_else(|| {
        RegistryError::construction(node_id, "'routes' must be a map of keyword to route")
    })?;

    let mut routes = Vec::with_capacity(map.len());
    for (keyword, route) in map {
        let route = route.as_str().ok_or_else(|| {
            RegistryError::construction(
                node_id,
                format!("route for keyword '{keyword}' must be a string"),
            )
        })?;
        routes.push((keyword.to_lowercase(), route.to_string()));
    }
    // Map iteration order is already sorted by key; sort again after
    // lowercasing so matching order stays stable regardless.
    routes.sort();
    Ok(routes)
}

fn parse_rules(
    node_id: &str,
    config: &ConfigMap,
) -> Result<Vec<(Condition, String)>, RegistryError> {
    let Some(value) = config.get("rules") else {
        return Ok(Vec::new());
    };
    let entries = value.as_array().ok_or_else(|| {
        RegistryError::construction(node_id, "'rules' must be a list of {when, route} objects")
    })?;

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let obj = entry.as_object().ok_or_else(|| {
            RegistryError::construction(node_id, format!("rule #{index} must be an object"))
        })?;
        let when = obj.get("when").and_then(Value::as_str).ok_or_else(|| {
            RegistryError::construction(node_id, format!("rule #{index} is missing 'when'"))
        })?;
        let route = obj.get("route").and_then(Value::as_str).ok_or_else(|| {
            RegistryError::construction(node_id, format!("rule #{index} is missing 'route'"))
        })?;
        let condition = Condition::parse(when).map_err(|e| {
            RegistryError::construction(node_id, format!("rule #{index} condition: {e}"))
        })?;
        rules.push((condition, route.to_string()));
    }
    Ok(rules)
}

#[async_trait]
impl NodeHandler for RouterNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        let route = self.decide(&snapshot);
        ctx.emit("routing", format!("decided route '{route}'"))?;
        Ok(StateUpdate::new().with_value(self.output_key.clone(), json!(route)))
    }
}
