use std::sync::Arc;

use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task;

use super::event::Event;
use super::sink::{ChannelSink, EventSink, StdOutSink};

/// Receives events over a channel and fans them out to every attached sink.
///
/// The bus is shared by all runs of an
/// [`ExecutionContext`](crate::context::ExecutionContext): producers hold
/// cheap [`flume::Sender`] clones while a single background task drains the
/// channel. Delivery is ordered per producer but the listener never blocks a
/// running node.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    channel: (flume::Sender<Event>, flume::Receiver<Event>),
    listener: Mutex<Option<ListenerState>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create a bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create a bus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Mutex::new(None),
        }
    }

    /// Attach another sink. Events sent after this call reach it.
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().push(Box::new(sink));
    }

    /// Clone of the sender side for producers.
    pub fn sender(&self) -> flume::Sender<Event> {
        self.channel.0.clone()
    }

    /// Attach a channel sink and return its receiving side as an async
    /// stream. Only events sent after this call are observed.
    ///
    /// ```no_run
    /// use futures_util::StreamExt;
    /// use loomflow::event_bus::EventBus;
    ///
    /// # async fn example() {
    /// let bus = EventBus::default();
    /// let mut events = std::pin::pin!(bus.subscribe());
    /// bus.listen();
    /// while let Some(event) = events.next().await {
    ///     println!("{event}");
    /// }
    /// # }
    /// ```
    pub fn subscribe(&self) -> impl Stream<Item = Event> + use<> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_sink(ChannelSink::new(tx));
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// Spawn the background task that drains the channel into the sinks.
    /// Idempotent: repeat calls while a listener is live do nothing.
    pub fn listen(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            let deliver = |event: &Event| {
                let mut sinks = sinks.lock();
                for sink in sinks.iter_mut() {
                    if let Err(error) = sink.handle(event) {
                        tracing::warn!(%error, "event sink failed");
                    }
                }
            };
            loop {
                tokio::select! {
                    // Queued events outrank the stop signal.
                    biased;

                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => deliver(&event),
                    },
                    _ = &mut shutdown_rx => {
                        while let Ok(event) = receiver.try_recv() {
                            deliver(&event);
                        }
                        break;
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the listener and wait for it to drain in-flight events.
    pub async fn shutdown(&self) {
        let state = self.listener.lock().take();
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
