//! Real-time relay of a run's output.
//!
//! The response list is the source of truth. Pub/sub messages only wake the
//! reader, which then reads the delta past the last emitted index, so
//! duplicate or lost wake-ups never produce duplicate items.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::run_control::{keys, ControlSignal};
use crate::domain::errors::DomainResult;
use crate::domain::models::RunStatus;
use crate::domain::ports::{ControlStore, ControlSubscription, RunRepository};

const FAN_IN_CAPACITY: usize = 64;

/// Terminal status event.
pub fn status_event(status: RunStatus) -> Value {
    json!({"type": "status", "status": status.as_str()})
}

/// Error event; ends the stream.
pub fn error_event(message: impl Into<String>) -> Value {
    json!({"type": "status", "status": "error", "message": message.into()})
}

/// Whether a stored item is a terminal status marker written by the runner.
pub fn is_terminal_item(item: &Value) -> bool {
    item.get("type").and_then(Value::as_str) == Some("status")
        && matches!(
            item.get("status").and_then(Value::as_str),
            Some("completed" | "failed" | "stopped" | "error")
        )
}

/// Read position in a run's response list.
#[derive(Debug, Default, Clone)]
pub struct ResponseCursor {
    next_index: i64,
}

impl ResponseCursor {
    /// Index of the next unread item.
    pub fn next_index(&self) -> i64 {
        self.next_index
    }

    /// Items appended since the last read. Unparseable entries are skipped
    /// but still advance the cursor.
    pub async fn read_new(&mut self, store: &dyn ControlStore, key: &str) -> DomainResult<Vec<Value>> {
        let raw = store.range(key, self.next_index, -1).await?;
        self.next_index += raw.len() as i64;
        Ok(raw
            .into_iter()
            .filter_map(|entry| match serde_json::from_str(&entry) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "skipping undecodable response item");
                    None
                }
            })
            .collect())
    }
}

/// Wake-up delivered by the fan-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// New items were pushed.
    NewData,
    /// Message from a control channel.
    Control(String),
}

/// Two subscriptions merged into one ordered queue, one producer task each.
pub struct FanIn {
    rx: mpsc::Receiver<Wake>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl FanIn {
    /// Subscribe to both channels of a run.
    pub async fn start(store: &dyn ControlStore, run_id: Uuid) -> DomainResult<Self> {
        let data = store.subscribe(&keys::new_response_channel(run_id)).await?;
        let control = match store.subscribe(&keys::control_channel(run_id)).await {
            Ok(control) => control,
            Err(e) => {
                data.close().await;
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(FAN_IN_CAPACITY);
        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(listen(data, tx.clone(), cancel.clone(), |_| Wake::NewData)),
            tokio::spawn(listen(control, tx, cancel.clone(), Wake::Control)),
        ];
        Ok(Self { rx, cancel, tasks })
    }

    /// Next wake-up; `None` once both listeners are gone.
    pub async fn recv(&mut self) -> Option<Wake> {
        self.rx.recv().await
    }

    /// Cancel both listeners (each unsubscribes and closes its handle) and
    /// wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!(error = %e, "stream listener task failed"),
            }
        }
    }
}

impl Drop for FanIn {
    fn drop(&mut self) {
        // Listeners tear down on their own once cancelled.
        self.cancel.cancel();
    }
}

async fn listen<F>(mut sub: Box<dyn ControlSubscription>, tx: mpsc::Sender<Wake>, cancel: CancellationToken, map: F)
where
    F: Fn(String) -> Wake + Send + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = sub.next_message() => match message {
                Some(message) => {
                    if tx.send(map(message)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Err(e) = sub.unsubscribe().await {
        tracing::debug!(channel = sub.channel(), error = %e, "unsubscribe failed");
    }
    sub.close().await;
}

enum Step {
    Items(Vec<Value>),
    Finish(Value),
    Poll,
    Ignore,
}

/// Produces the event stream of one run.
#[derive(Clone)]
pub struct RunStreamer {
    store: Arc<dyn ControlStore>,
    runs: Arc<dyn RunRepository>,
    status_poll_interval: Duration,
    unwind_delay: Duration,
}

impl RunStreamer {
    /// Build a streamer.
    pub fn new(
        store: Arc<dyn ControlStore>,
        runs: Arc<dyn RunRepository>,
        status_poll_interval: Duration,
        unwind_delay: Duration,
    ) -> Self {
        Self {
            store,
            runs,
            status_poll_interval,
            unwind_delay,
        }
    }

    /// Stream every output item of `run_id`, ending with one terminal status
    /// event. Control-plane failures end the stream with a `status: error`
    /// event instead of an error.
    pub fn stream(&self, run_id: Uuid) -> impl Stream<Item = Value> + Send + 'static {
        let store = Arc::clone(&self.store);
        let runs = Arc::clone(&self.runs);
        let poll_interval = self.status_poll_interval;
        let unwind_delay = self.unwind_delay;

        async_stream::stream! {
            let key = keys::responses(run_id);
            let mut cursor = ResponseCursor::default();

            // Snapshot.
            match cursor.read_new(store.as_ref(), &key).await {
                Ok(items) => {
                    for item in items {
                        let terminal = is_terminal_item(&item);
                        yield item;
                        if terminal {
                            return;
                        }
                    }
                }
                Err(e) => {
                    yield error_event(format!("failed to read run output: {e}"));
                    return;
                }
            }

            // Do not subscribe to a run that is already over.
            match runs.get(run_id).await {
                Ok(Some(run)) if run.status.is_terminal() => {
                    yield status_event(run.status);
                    return;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    yield error_event(format!("run {run_id} not found"));
                    return;
                }
                Err(e) => {
                    yield error_event(format!("failed to load run: {e}"));
                    return;
                }
            }

            let mut fan_in = match FanIn::start(store.as_ref(), run_id).await {
                Ok(fan_in) => fan_in,
                Err(e) => {
                    yield error_event(format!("failed to subscribe to run: {e}"));
                    return;
                }
            };

            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            poll.tick().await;

            // Items appended between the snapshot and the subscription.
            let mut pending = Some(Step::Poll);

            loop {
                let step = match pending.take() {
                    Some(step) => step,
                    None => tokio::select! {
                        wake = fan_in.recv() => match wake {
                            Some(Wake::NewData) => Step::Poll,
                            Some(Wake::Control(message)) => match ControlSignal::from_str(&message) {
                                Some(ControlSignal::EndStream) => {
                                    // Flush what the runner wrote before ending.
                                    match cursor.read_new(store.as_ref(), &key).await {
                                        Ok(items) => {
                                            pending = Some(Step::Finish(status_event(RunStatus::Completed)));
                                            Step::Items(items)
                                        }
                                        Err(_) => Step::Finish(status_event(RunStatus::Completed)),
                                    }
                                }
                                Some(signal) => Step::Finish(status_event(signal.terminal_status())),
                                None => {
                                    tracing::debug!(%run_id, message = %message, "ignoring unknown control message");
                                    Step::Ignore
                                }
                            },
                            None => Step::Finish(error_event("run control channel closed")),
                        },
                        _ = poll.tick() => match runs.get(run_id).await {
                            Ok(Some(run)) if run.status.is_terminal() => {
                                match cursor.read_new(store.as_ref(), &key).await {
                                    Ok(items) => {
                                        pending = Some(Step::Finish(status_event(run.status)));
                                        Step::Items(items)
                                    }
                                    Err(_) => Step::Finish(status_event(run.status)),
                                }
                            }
                            Ok(Some(_)) => Step::Poll,
                            Ok(None) => Step::Finish(error_event(format!("run {run_id} no longer exists"))),
                            Err(e) => Step::Finish(error_event(format!("failed to load run: {e}"))),
                        },
                    },
                };

                match step {
                    Step::Poll => match cursor.read_new(store.as_ref(), &key).await {
                        Ok(items) => pending = Some(Step::Items(items)),
                        Err(e) => pending = Some(Step::Finish(error_event(format!("failed to read run output: {e}")))),
                    },
                    Step::Items(items) => {
                        let mut ended = false;
                        for item in items {
                            let terminal = is_terminal_item(&item);
                            yield item;
                            if terminal {
                                ended = true;
                                break;
                            }
                        }
                        if ended {
                            break;
                        }
                    }
                    Step::Finish(event) => {
                        yield event;
                        break;
                    }
                    Step::Ignore => {}
                }
            }

            fan_in.shutdown().await;
            tokio::time::sleep(unwind_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::control::MemoryControlStore;

    #[tokio::test]
    async fn test_cursor_never_re_emits() {
        let store = MemoryControlStore::new();
        let key = "agent_run:x:responses";
        let mut cursor = ResponseCursor::default();

        store.push(key, r#"{"n":1}"#).await.unwrap();
        store.push(key, r#"{"n":2}"#).await.unwrap();
        assert_eq!(cursor.read_new(&store, key).await.unwrap().len(), 2);

        // Duplicate wake-ups with nothing new.
        assert!(cursor.read_new(&store, key).await.unwrap().is_empty());
        assert!(cursor.read_new(&store, key).await.unwrap().is_empty());

        store.push(key, r#"{"n":3}"#).await.unwrap();
        assert_eq!(cursor.read_new(&store, key).await.unwrap(), vec![json!({"n": 3})]);
        assert_eq!(cursor.next_index(), 3);
    }

    #[tokio::test]
    async fn test_cursor_skips_garbage_but_advances() {
        let store = MemoryControlStore::new();
        let key = "k";
        store.push(key, "not json").await.unwrap();
        store.push(key, r#"{"ok":true}"#).await.unwrap();

        let mut cursor = ResponseCursor::default();
        assert_eq!(cursor.read_new(&store, key).await.unwrap(), vec![json!({"ok": true})]);
        assert_eq!(cursor.next_index(), 2);
    }

    #[test]
    fn test_terminal_items() {
        assert!(is_terminal_item(&json!({"type": "status", "status": "completed"})));
        assert!(!is_terminal_item(&json!({"type": "status", "status": "running"})));
        assert!(!is_terminal_item(&json!({"type": "assistant", "status": "completed"})));
    }

    #[tokio::test]
    async fn test_fan_in_merges_both_channels_and_unsubscribes() {
        let store = MemoryControlStore::new();
        let run_id = Uuid::new_v4();
        let mut fan_in = FanIn::start(&store, run_id).await.unwrap();

        store.publish(&keys::new_response_channel(run_id), "new").await.unwrap();
        assert_eq!(fan_in.recv().await, Some(Wake::NewData));
        store.publish(&keys::control_channel(run_id), "STOP").await.unwrap();
        assert_eq!(fan_in.recv().await, Some(Wake::Control("STOP".to_string())));

        fan_in.shutdown().await;
        assert_eq!(store.subscriber_count(&keys::new_response_channel(run_id)).await, 0);
        assert_eq!(store.subscriber_count(&keys::control_channel(run_id)).await, 0);
        assert_eq!(store.channel_count().await, 0);
    }
}
