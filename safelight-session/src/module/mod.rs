//! Module side of the request/response protocol
//!
//! A compute module reads request envelopes, one JSON object per line, and
//! answers every request with exactly one `$response` carrying the same id.
//! Anything a verb writes to its [`ModuleLog`] while handling a request is
//! returned in the response's `log` field.

pub mod brighten;

use safelight_common::{ResponseEnvelope, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Maximum thread count a module accepts
pub const MAX_THREADS: u32 = 32;

/// Log captured while handling one request
#[derive(Debug, Default)]
pub struct ModuleLog {
    text: String,
}

impl ModuleLog {
    pub fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Routes verbs to filter code
pub trait VerbHandler {
    /// Handle one request; `Err` carries the failure message
    fn handle(
        &mut self,
        verb: &str,
        data: &serde_json::Value,
        log: &mut ModuleLog,
    ) -> std::result::Result<serde_json::Value, String>;
}

/// Failure message for a verb the handler does not route
pub fn unknown_verb(verb: &str) -> String {
    format!("Unknown verb: {}", verb)
}

/// Answer one request line
///
/// Returns `None` when no id can be recovered, since there is nobody to
/// answer.
pub fn handle_line(handler: &mut dyn VerbHandler, line: &str) -> Option<ResponseEnvelope> {
    let message: serde_json::Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping unparseable request: {}", e);
            return None;
        }
    };
    let id = match message.get("id") {
        Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
        _ => {
            warn!("Dropping request without an id");
            return None;
        }
    };
    let Some(verb) = message.get("verb").and_then(|v| v.as_str()) else {
        return Some(ResponseEnvelope::failure(id, "badly formed message", ""));
    };

    let empty = serde_json::Value::Object(serde_json::Map::new());
    let data = message.get("data").unwrap_or(&empty);
    let mut log = ModuleLog::default();
    debug!(%id, verb, "Handling request");
    let response = match handler.handle(verb, data, &mut log) {
        Ok(success) => ResponseEnvelope::success(id, success, log.as_str()),
        Err(failure) => ResponseEnvelope::failure(id, failure, log.as_str()),
    };
    Some(response)
}

/// Serve requests from `reader` until it closes, writing responses to `writer`
pub async fn serve<R, W>(handler: &mut dyn VerbHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(handler, &line) {
            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/// Serve requests over this process's stdin and stdout
pub async fn serve_stdio(handler: &mut dyn VerbHandler) -> Result<()> {
    serve(
        handler,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl VerbHandler for Echo {
        fn handle(
            &mut self,
            verb: &str,
            data: &serde_json::Value,
            log: &mut ModuleLog,
        ) -> std::result::Result<serde_json::Value, String> {
            match verb {
                "echo" => {
                    log.line("echoing");
                    Ok(data.clone())
                }
                other => Err(unknown_verb(other)),
            }
        }
    }

    #[test]
    fn test_success_carries_log() {
        let response = handle_line(&mut Echo, r#"{"verb":"echo","id":"1_1","data":{"a":1}}"#).unwrap();
        assert_eq!(response.id, "1_1");
        assert_eq!(response.success, Some(json!({"a": 1})));
        assert_eq!(response.log.as_deref(), Some("echoing\n"));
    }

    #[test]
    fn test_unknown_verb() {
        let response = handle_line(&mut Echo, r#"{"verb":"frobnicate","id":"1_2"}"#).unwrap();
        assert_eq!(response.failure.as_deref(), Some("Unknown verb: frobnicate"));
        assert!(response.log.is_none());
    }

    #[test]
    fn test_badly_formed_messages() {
        let response = handle_line(&mut Echo, r#"{"id":"1_3","verb":7}"#).unwrap();
        assert_eq!(response.failure.as_deref(), Some("badly formed message"));
        assert!(handle_line(&mut Echo, "not json").is_none());
        assert!(handle_line(&mut Echo, r#"{"verb":"echo"}"#).is_none());
    }

    #[tokio::test]
    async fn test_serve_answers_each_request_once() {
        let input = concat!(
            r#"{"verb":"echo","id":"a","data":{"n":1}}"#,
            "\n\n",
            r#"{"verb":"nope","id":"b"}"#,
            "\n"
        );
        let mut output = Vec::new();
        serve(&mut Echo, input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[0]["verb"], "$response");
        assert_eq!(responses[1]["failure"], "Unknown verb: nope");
    }
}
