use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::{debug, warn};

use super::decoder::{StreamEvent, decode_stream};
use crate::api::{GatewayApi, TurnRequest};

/// Cloneable trigger that aborts every channel subscribed to it.
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`StopHandle`], owned by one channel.
#[derive(Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested. Never resolves if every handle is
    /// dropped without stopping.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    Pending,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl ChannelStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChannelStatus::Completed | ChannelStatus::Errored | ChannelStatus::Cancelled
        )
    }
}

/// Terminal result of one channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelResult {
    Completed(String),
    Errored(String),
    Cancelled(String),
}

impl ChannelResult {
    /// Text that becomes an assistant message, if any.
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            ChannelResult::Completed(text) => Some(text),
            ChannelResult::Cancelled(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Live notifications for views rendering in-flight replies.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelUpdate {
    Started {
        channel_id: String,
        model_id: String,
    },
    Snapshot {
        channel_id: String,
        model_id: String,
        text: String,
    },
    Finished {
        channel_id: String,
        model_id: String,
        status: ChannelStatus,
    },
}

impl ChannelUpdate {
    pub fn channel_id(&self) -> &str {
        match self {
            ChannelUpdate::Started { channel_id, .. }
            | ChannelUpdate::Snapshot { channel_id, .. }
            | ChannelUpdate::Finished { channel_id, .. } => channel_id,
        }
    }
}

/// What a finished channel hands back to the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelOutcome {
    pub channel_id: String,
    pub model_id: String,
    pub result: ChannelResult,
    pub conversation_id: Option<String>,
    pub generation_id: Option<String>,
}

/// One outstanding request to one model for one user turn.
///
/// Text only grows while `Streaming`; once a terminal status is reached every
/// further transition is refused.
#[derive(Debug)]
pub struct ModelChannel {
    id: String,
    model_id: String,
    status: ChannelStatus,
    text: String,
    error: Option<String>,
    conversation_id: Option<String>,
    generation_id: Option<String>,
}

impl ModelChannel {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            model_id: model_id.into(),
            status: ChannelStatus::Pending,
            text: String::new(),
            error: None,
            conversation_id: None,
            generation_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn begin_streaming(&mut self) -> bool {
        if self.status != ChannelStatus::Pending {
            return false;
        }
        self.status = ChannelStatus::Streaming;
        true
    }

    pub fn append(&mut self, delta: &str) -> bool {
        if self.status != ChannelStatus::Streaming {
            return false;
        }
        self.text.push_str(delta);
        true
    }

    pub fn complete(&mut self) -> bool {
        self.finish(ChannelStatus::Completed)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if !self.finish(ChannelStatus::Errored) {
            return false;
        }
        self.error = Some(reason.into());
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(ChannelStatus::Cancelled)
    }

    fn finish(&mut self, status: ChannelStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    /// Consume a terminal channel into its outcome.
    pub fn into_outcome(self) -> ChannelOutcome {
        let result = match self.status {
            ChannelStatus::Completed => ChannelResult::Completed(self.text),
            ChannelStatus::Cancelled => ChannelResult::Cancelled(self.text),
            ChannelStatus::Errored => ChannelResult::Errored(self.error.unwrap_or_default()),
            ChannelStatus::Pending | ChannelStatus::Streaming => {
                ChannelResult::Errored("channel ended before reaching a terminal state".into())
            }
        };
        ChannelOutcome {
            channel_id: self.id,
            model_id: self.model_id,
            result,
            conversation_id: self.conversation_id,
            generation_id: self.generation_id,
        }
    }

    /// Drive the request to a terminal state.
    ///
    /// A stop request wins over any chunk that is still in flight: once the
    /// signal fires no further delta is applied.
    pub async fn run(
        mut self,
        api: &dyn GatewayApi,
        request: &TurnRequest,
        mut stop: StopSignal,
        updates: Option<UnboundedSender<ChannelUpdate>>,
    ) -> ChannelOutcome {
        let notify = |update: ChannelUpdate| {
            if let Some(tx) = &updates {
                let _ = tx.send(update);
            }
        };

        if stop.is_stopped() {
            self.cancel();
            return self.finish_run(notify);
        }

        let opened = tokio::select! {
            biased;
            _ = stop.stopped() => None,
            opened = api.send_turn(request) => Some(opened),
        };

        let turn = match opened {
            None => {
                self.cancel();
                return self.finish_run(notify);
            }
            Some(Err(err)) => {
                warn!(model = %self.model_id, error = %err, "Channel failed to open");
                self.fail(err.to_string());
                return self.finish_run(notify);
            }
            Some(Ok(turn)) => turn,
        };

        self.conversation_id = turn.conversation_id;
        self.generation_id = turn.generation_id;
        self.begin_streaming();
        notify(ChannelUpdate::Started {
            channel_id: self.id.clone(),
            model_id: self.model_id.clone(),
        });

        let events = decode_stream(turn.body);
        futures::pin_mut!(events);

        loop {
            let next = tokio::select! {
                biased;
                _ = stop.stopped() => {
                    self.cancel();
                    break;
                }
                next = events.next() => next,
            };

            match next {
                None => {
                    self.complete();
                    break;
                }
                Some(Err(err)) => {
                    warn!(model = %self.model_id, error = %err, "Channel transport failed");
                    self.fail(err.to_string());
                    break;
                }
                Some(Ok(StreamEvent::Delta(piece))) => {
                    if stop.is_stopped() {
                        self.cancel();
                        break;
                    }
                    if piece.is_empty() {
                        continue;
                    }
                    self.append(&piece);
                    notify(ChannelUpdate::Snapshot {
                        channel_id: self.id.clone(),
                        model_id: self.model_id.clone(),
                        text: self.text.clone(),
                    });
                }
                Some(Ok(StreamEvent::Done)) => {
                    self.complete();
                    break;
                }
                Some(Ok(StreamEvent::Error(message))) => {
                    warn!(model = %self.model_id, error = %message, "Upstream error event");
                    self.fail(message);
                    break;
                }
            }
        }

        self.finish_run(notify)
    }

    fn finish_run(self, notify: impl Fn(ChannelUpdate)) -> ChannelOutcome {
        debug!(
            model = %self.model_id,
            status = ?self.status,
            chars = self.text.len(),
            "Channel finished"
        );
        notify(ChannelUpdate::Finished {
            channel_id: self.id.clone(),
            model_id: self.model_id.clone(),
            status: self.status,
        });
        self.into_outcome()
    }
}
