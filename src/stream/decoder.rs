use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One discrete protocol event decoded from a chat response body.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    Error(String),
    Done,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error(_) | StreamEvent::Done)
    }
}

/// Incremental decoder for the `data:`-line event protocol.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multi-byte character. After a terminal
/// event (`Done` or `Error`) the decoder ignores further input.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one transport chunk and return the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.decode_line(&line[..line.len() - 1], &mut events) {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Flush a trailing line that arrived without a newline before the
    /// transport closed.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.decode_line(&rest, &mut events);
        }
        self.finished = true;
        events
    }

    /// Returns true when the line ended the sequence.
    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) -> bool {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);

        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            return false;
        };

        match parse_data_payload(rest) {
            Some(event) => {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.finished = true;
                }
                terminal
            }
            None => false,
        }
    }
}

/// Interpret the payload of one `data:` line.
///
/// Returns `None` for blank or unparseable payloads; those frames are
/// dropped without disturbing the rest of the stream.
pub fn parse_data_payload(data: &str) -> Option<StreamEvent> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Skipping malformed stream frame");
            return None;
        }
    };

    if let Some(message) = error_message(&value) {
        return Some(StreamEvent::Error(message));
    }

    delta_text(&value).map(StreamEvent::Delta)
}

fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn delta_text(value: &Value) -> Option<String> {
    if let Value::String(text) = value {
        return Some(text.clone());
    }

    if let Some(content) = value.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }

    if let Some(content) = value
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }

    if let Some(response) = value.get("response").and_then(Value::as_str) {
        return Some(response.to_string());
    }

    if let Some(choices) = value.get("choices").and_then(Value::as_array) {
        // Role-only and finish chunks carry no text.
        return choices
            .first()
            .and_then(|choice| {
                choice
                    .get("delta")
                    .or_else(|| choice.get("message"))
                    .and_then(|delta| delta.get("content"))
            })
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    Some(value.to_string())
}

/// Lazily decode a body stream into protocol events.
///
/// Transport errors are passed through; the sequence ends after the first
/// terminal event or transport error, even if the body keeps producing bytes.
pub fn decode_stream<S, E>(body: S) -> impl Stream<Item = Result<StreamEvent, E>>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
{
    struct State<S> {
        body: S,
        decoder: EventStreamDecoder,
        pending: std::collections::VecDeque<StreamEvent>,
        closed: bool,
    }

    let state = State {
        body,
        decoder: EventStreamDecoder::new(),
        pending: Default::default(),
        closed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.closed || state.decoder.is_finished() {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.closed = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.closed = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = EventStreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    fn concat_deltas(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Delta(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parses_recognized_payload_shapes() {
        assert_eq!(parse_data_payload(""), None);
        assert_eq!(parse_data_payload(" [DONE] "), Some(StreamEvent::Done));
        assert_eq!(
            parse_data_payload(r#""plain""#),
            Some(StreamEvent::Delta("plain".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"content":"hi"}"#),
            Some(StreamEvent::Delta("hi".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"delta":{"content":"there"}}"#),
            Some(StreamEvent::Delta("there".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"response":"ollama"}"#),
            Some(StreamEvent::Delta("ollama".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"choices":[{"delta":{"content":"oai"}}]}"#),
            Some(StreamEvent::Delta("oai".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
    }

    #[test]
    fn unknown_shapes_are_kept_verbatim() {
        assert_eq!(
            parse_data_payload(r#"{"foo":1}"#),
            Some(StreamEvent::Delta(r#"{"foo":1}"#.into()))
        );
        assert_eq!(
            parse_data_payload("42"),
            Some(StreamEvent::Delta("42".into()))
        );
    }

    #[test]
    fn error_payloads_become_error_events() {
        assert_eq!(
            parse_data_payload(r#"{"error":{"message":"quota exceeded","code":429}}"#),
            Some(StreamEvent::Error("quota exceeded".into()))
        );
        assert_eq!(
            parse_data_payload(r#"{"error":"boom"}"#),
            Some(StreamEvent::Error("boom".into()))
        );
    }

    #[test]
    fn malformed_frames_are_skipped() {
        assert_eq!(parse_data_payload(r#"{"content":"#), None);

        let events = decode_all(&[
            b"data: {\"content\":\"A\"}\n",
            b"data: {\"conte\n",
            b"data: {\"content\":\"B\"}\n",
            b"data: [DONE]\n",
        ]);
        assert_eq!(concat_deltas(&events), "AB");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let body = "data: {\"content\":\"Hel\"}\r\n\r\nevent: message\ndata:{\"content\":\"lo \u{1F600}\"}\n\n: keepalive\ndata: \"!\"\n\ndata: [DONE]\n\n";
        let whole = decode_all(&[body.as_bytes()]);

        let bytes = body.as_bytes();
        let single: Vec<&[u8]> = bytes.chunks(1).collect();
        let split = decode_all(&single);

        assert_eq!(concat_deltas(&whole), "Hello \u{1F600}!");
        assert_eq!(whole, split);
    }

    #[test]
    fn sentinel_stops_decoding() {
        let mut decoder = EventStreamDecoder::new();
        let events = decoder.push(b"data: \"a\"\ndata: [DONE]\ndata: \"late\"\n");
        assert_eq!(
            events,
            vec![StreamEvent::Delta("a".into()), StreamEvent::Done]
        );
        assert!(decoder.is_finished());
        assert!(decoder.push(b"data: \"later\"\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn error_event_terminates_sequence() {
        let events = decode_all(&[
            b"data: \"partial\"\n",
            b"data: {\"error\":{\"message\":\"upstream overloaded\"}}\n",
            b"data: \"ignored\"\n",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("partial".into()),
                StreamEvent::Error("upstream overloaded".into()),
            ]
        );
    }

    #[test]
    fn trailing_line_is_flushed_on_finish() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.push(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Delta("tail".into())]);
    }

    #[tokio::test]
    async fn decode_stream_is_lazy_and_ordered() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: \"one\"\nda".to_vec()),
            Ok(b"ta: \"two\"\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
            Err("never reached".to_string()),
        ];
        let events: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(
            events,
            vec![
                Ok(StreamEvent::Delta("one".into())),
                Ok(StreamEvent::Delta("two".into())),
                Ok(StreamEvent::Done),
            ]
        );
    }

    #[tokio::test]
    async fn decode_stream_surfaces_transport_errors() {
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"data: \"one\"\n".to_vec()), Err("reset".to_string())];
        let events: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(
            events,
            vec![Ok(StreamEvent::Delta("one".into())), Err("reset".to_string())]
        );
    }
}
