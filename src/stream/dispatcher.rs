use futures::future::join_all;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::channel::{ChannelOutcome, ChannelResult, ChannelUpdate, ModelChannel, StopHandle};
use crate::api::{GatewayApi, TurnRequest};
use crate::error::{ModelFailure, SendError};
use crate::store::{MessageStore, StagedMessage};
use crate::types::{ChatMessage, GenerationConfig};

/// A validated turn: the optimistic user message plus one planned channel
/// per selected model.
#[derive(Debug)]
pub struct PreparedTurn {
    user_message: ChatMessage,
    original_input: String,
    group_id: Option<String>,
    channels: Vec<(ModelChannel, TurnRequest)>,
    stop: StopHandle,
}

impl PreparedTurn {
    pub fn user_message(&self) -> &ChatMessage {
        &self.user_message
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    /// Handle that aborts every channel of this turn.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// `(channel id, model id)` for every planned channel, in selection order.
    pub fn channels(&self) -> Vec<(String, String)> {
        self.channels
            .iter()
            .map(|(channel, _)| (channel.id().to_string(), channel.model_id().to_string()))
            .collect()
    }

    /// Run all channels concurrently and wait until every one of them is
    /// terminal. One channel failing never aborts its siblings.
    pub async fn run(
        self,
        api: &dyn GatewayApi,
        updates: Option<UnboundedSender<ChannelUpdate>>,
    ) -> TurnOutcome {
        let stop = self.stop;
        let runs = self.channels.into_iter().map(|(channel, request)| {
            let signal = stop.subscribe();
            let updates = updates.clone();
            async move { channel.run(api, &request, signal, updates).await }
        });
        let outcomes = join_all(runs).await;

        TurnOutcome {
            user_message_id: self.user_message.id,
            original_input: self.original_input,
            group_id: self.group_id,
            outcomes,
        }
    }
}

/// Terminal results of every channel of one turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub user_message_id: String,
    pub original_input: String,
    pub group_id: Option<String>,
    pub outcomes: Vec<ChannelOutcome>,
}

impl TurnOutcome {
    pub fn failures(&self) -> Vec<ModelFailure> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                ChannelResult::Errored(reason) => Some(ModelFailure {
                    model_id: outcome.model_id.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn all_errored(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| matches!(outcome.result, ChannelResult::Errored(_)))
    }

    /// Conversation id reported by the backend, if a channel saw one.
    pub fn conversation_id(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .find_map(|outcome| outcome.conversation_id.as_deref())
    }

    /// One finalized assistant message per channel that produced text.
    pub fn replies(&self) -> Vec<ChatMessage> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                let text = outcome.result.reply_text()?;
                let mut message = ChatMessage::assistant(outcome.model_id.clone(), text);
                message.generation_id = outcome.generation_id.clone();
                message.group_id = self.group_id.clone();
                Some(message)
            })
            .collect()
    }
}

/// How a finished turn changed the store.
#[derive(Clone, Debug, PartialEq)]
pub enum Settlement {
    Committed {
        replies: Vec<ChatMessage>,
        failures: Vec<ModelFailure>,
        conversation_id: Option<String>,
    },
    /// No reply was produced; the user message is gone and the input text is
    /// handed back. `error` is set when every channel failed.
    RolledBack {
        restored_input: String,
        error: Option<SendError>,
    },
}

/// Fans one user turn out to the selected models. At most one turn may be
/// in flight at a time.
#[derive(Debug, Default)]
pub struct Dispatcher {
    in_flight: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight
    }

    /// Validate a turn and plan its channels. Nothing touches the network or
    /// the store here; rejected turns leave every piece of state untouched.
    pub fn begin(
        &mut self,
        input: &str,
        model_ids: &[String],
        conversation_id: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<PreparedTurn, SendError> {
        if self.in_flight {
            return Err(SendError::Busy);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(SendError::EmptyInput);
        }
        let mut models: Vec<&String> = Vec::with_capacity(model_ids.len());
        for id in model_ids {
            if !id.trim().is_empty() && !models.contains(&id) {
                models.push(id);
            }
        }
        if models.is_empty() {
            return Err(SendError::NoModels);
        }

        let group_id = (models.len() > 1).then(|| uuid::Uuid::new_v4().to_string());
        let mut user_message = ChatMessage::user(text);
        user_message.group_id = group_id.clone();

        let channels = models
            .into_iter()
            .map(|model| {
                let request = TurnRequest {
                    message: text.to_string(),
                    conversation_id: conversation_id.map(str::to_string),
                    group_id: group_id.clone(),
                    model: model.clone(),
                    config: config.clone(),
                };
                (ModelChannel::new(model.clone()), request)
            })
            .collect::<Vec<_>>();

        info!(
            models = channels.len(),
            conversation_id = ?conversation_id,
            group_id = ?group_id,
            "Dispatching turn"
        );
        self.in_flight = true;

        Ok(PreparedTurn {
            user_message,
            original_input: input.to_string(),
            group_id,
            channels,
            stop: StopHandle::new(),
        })
    }

    /// Commit replies or roll the optimistic user message back.
    pub fn settle(
        &mut self,
        outcome: TurnOutcome,
        staged: StagedMessage,
        store: &mut MessageStore,
    ) -> Settlement {
        self.in_flight = false;
        let replies = outcome.replies();
        let failures = outcome.failures();

        if replies.is_empty() {
            store.revert(staged);
            let error = if outcome.all_errored() {
                warn!(failed = failures.len(), "Every model failed; turn rolled back");
                Some(SendError::AllFailed(failures))
            } else {
                debug!("Turn stopped before any reply; rolled back");
                None
            };
            return Settlement::RolledBack {
                restored_input: outcome.original_input,
                error,
            };
        }

        store.commit(staged);
        for reply in &replies {
            store.append(reply.clone());
        }
        if !failures.is_empty() {
            warn!(failed = failures.len(), replies = replies.len(), "Turn partially failed");
        }
        Settlement::Committed {
            replies,
            failures,
            conversation_id: outcome.conversation_id().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn outcome(model: &str, result: ChannelResult) -> ChannelOutcome {
        ChannelOutcome {
            channel_id: format!("ch-{model}"),
            model_id: model.to_string(),
            result,
            conversation_id: None,
            generation_id: None,
        }
    }

    #[test]
    fn rejects_invalid_turns_without_side_effects() {
        let mut dispatcher = Dispatcher::new();
        let config = GenerationConfig::default();
        assert_eq!(
            dispatcher.begin("   ", &models(&["m1"]), None, &config).unwrap_err(),
            SendError::EmptyInput
        );
        assert_eq!(
            dispatcher.begin("Hello", &[], None, &config).unwrap_err(),
            SendError::NoModels
        );
        assert!(!dispatcher.is_sending());
    }

    #[test]
    fn only_one_turn_in_flight() {
        let mut dispatcher = Dispatcher::new();
        let config = GenerationConfig::default();
        let _turn = dispatcher.begin("Hello", &models(&["m1"]), None, &config).unwrap();
        assert_eq!(
            dispatcher.begin("Again", &models(&["m1"]), None, &config).unwrap_err(),
            SendError::Busy
        );
    }

    #[test]
    fn group_id_only_for_comparisons() {
        let config = GenerationConfig::default();
        let mut single = Dispatcher::new();
        let turn = single.begin("Hi", &models(&["m1", "m1"]), None, &config).unwrap();
        assert!(turn.group_id().is_none());
        assert_eq!(turn.channels().len(), 1);

        let mut multi = Dispatcher::new();
        let turn = multi
            .begin("Hi", &models(&["m1", "m2"]), Some("c1"), &config)
            .unwrap();
        let group = turn.group_id().unwrap().to_string();
        assert_eq!(turn.user_message().group_id.as_deref(), Some(group.as_str()));
        assert!(
            turn.channels
                .iter()
                .all(|(_, request)| request.group_id.as_deref() == Some(group.as_str())
                    && request.conversation_id.as_deref() == Some("c1"))
        );
    }

    #[test]
    fn partial_success_commits_replies() {
        let mut dispatcher = Dispatcher::new();
        let mut store = MessageStore::new();
        let turn = dispatcher
            .begin("Hello", &models(&["m1", "m2"]), None, &GenerationConfig::default())
            .unwrap();
        let staged = store.stage(turn.user_message().clone());
        let outcome = TurnOutcome {
            user_message_id: turn.user_message().id.clone(),
            original_input: "Hello".into(),
            group_id: turn.group_id().map(str::to_string),
            outcomes: vec![
                outcome("m1", ChannelResult::Completed("Hi".into())),
                outcome("m2", ChannelResult::Errored("refused".into())),
            ],
        };

        let settlement = dispatcher.settle(outcome, staged, &mut store);
        let Settlement::Committed {
            replies, failures, ..
        } = settlement
        else {
            panic!("expected commit");
        };
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].model_id.as_deref(), Some("m1"));
        assert_eq!(failures[0].model_id, "m2");
        assert_eq!(store.len(), 2);
        assert!(!dispatcher.is_sending());
    }

    #[test]
    fn total_failure_rolls_back() {
        let mut dispatcher = Dispatcher::new();
        let mut store = MessageStore::new();
        let turn = dispatcher
            .begin(" Hello ", &models(&["m1"]), None, &GenerationConfig::default())
            .unwrap();
        let staged = store.stage(turn.user_message().clone());
        let outcome = TurnOutcome {
            user_message_id: turn.user_message().id.clone(),
            original_input: " Hello ".into(),
            group_id: None,
            outcomes: vec![outcome("m1", ChannelResult::Errored("502".into()))],
        };

        match dispatcher.settle(outcome, staged, &mut store) {
            Settlement::RolledBack {
                restored_input,
                error,
            } => {
                assert_eq!(restored_input, " Hello ");
                assert!(matches!(error, Some(SendError::AllFailed(ref f)) if f.len() == 1));
            }
            other => panic!("expected rollback, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn empty_stop_rolls_back_quietly() {
        let mut dispatcher = Dispatcher::new();
        let mut store = MessageStore::new();
        let turn = dispatcher
            .begin("Hello", &models(&["m1"]), None, &GenerationConfig::default())
            .unwrap();
        let staged = store.stage(turn.user_message().clone());
        let outcome = TurnOutcome {
            user_message_id: turn.user_message().id.clone(),
            original_input: "Hello".into(),
            group_id: None,
            outcomes: vec![outcome("m1", ChannelResult::Cancelled(String::new()))],
        };
        assert_eq!(
            dispatcher.settle(outcome, staged, &mut store),
            Settlement::RolledBack {
                restored_input: "Hello".into(),
                error: None
            }
        );
    }
}
