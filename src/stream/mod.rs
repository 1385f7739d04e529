/// Streaming engine for playground turns
///
/// One user turn fans out to every selected model. Each model gets its own
/// [`ModelChannel`], which opens a streamed response, decodes it with the
/// [`EventStreamDecoder`] and accumulates text until it reaches a terminal
/// state. The [`Dispatcher`] owns the turn as a whole: validation, the
/// optimistic user message and the final commit or rollback.
///
/// # Architecture
///
/// - `decoder` - incremental `data:` line decoder for chat event streams
/// - `channel` - per-model state machine and the stop signal
/// - `dispatcher` - turn validation, fan-out and settlement
///
/// # Usage
///
/// ```rust,no_run
/// use gateway_console::api::HttpGateway;
/// use gateway_console::config::Config;
/// use gateway_console::store::MessageStore;
/// use gateway_console::stream::Dispatcher;
/// use gateway_console::types::GenerationConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let gateway = HttpGateway::new(&Config::from_env());
/// let mut store = MessageStore::new();
/// let mut dispatcher = Dispatcher::new();
///
/// let models = vec!["gpt-4o".to_string(), "llama3".to_string()];
/// let turn = dispatcher.begin("Hello", &models, None, &GenerationConfig::default())?;
/// let staged = store.stage(turn.user_message().clone());
/// let outcome = turn.run(&gateway, None).await;
/// let settlement = dispatcher.settle(outcome, staged, &mut store);
/// # Ok(())
/// # }
/// ```
pub mod channel;
pub mod decoder;
pub mod dispatcher;

pub use channel::{
    ChannelOutcome, ChannelResult, ChannelStatus, ChannelUpdate, ModelChannel, StopHandle,
    StopSignal,
};
pub use decoder::{EventStreamDecoder, StreamEvent, decode_stream, parse_data_payload};
pub use dispatcher::{Dispatcher, PreparedTurn, Settlement, TurnOutcome};
