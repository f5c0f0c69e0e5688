//! Slack `chat.postMessage` notifier.
//!
//! Slack reports most failures with HTTP 200 and `{"ok": false, "error": ...}`,
//! so both the status code and the body decide whether an attempt succeeded.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use pulse_core::NotifyConfig;

use crate::error::NotifyError;
use crate::{Delivery, Notifier};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

/// Posts alerts to one Slack channel.
pub struct SlackNotifier {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    channel: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("endpoint", &self.endpoint)
            .field("channel", &self.channel)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl SlackNotifier {
    /// Create a notifier for `channel`, authenticating with a bot `token`.
    pub fn new(token: &str, channel: &str, config: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat.postMessage", config.api_base.trim_end_matches('/')),
            token: token.to_string(),
            channel: channel.to_string(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// One delivery attempt.
    pub async fn post_message(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "channel": self.channel, "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Api(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Delivery {
        info!(%message, channel = %self.channel, "posting notification");

        for attempt in 1..=self.max_attempts {
            match self.post_message(message).await {
                Ok(()) => return Delivery::Delivered { attempts: attempt },
                Err(e) => {
                    error!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "failed to post message"
                    );
                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!(%message, attempts = self.max_attempts, "notification dropped");
        Delivery::Dropped {
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockito::Matcher;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    fn config(api_base: &str) -> NotifyConfig {
        NotifyConfig {
            max_attempts: 3,
            retry_delay_ms: 0,
            api_base: api_base.to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_on_first_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::Json(json!({
                "channel": "C123",
                "text": "- https://example.com/ is running normally."
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let notifier = SlackNotifier::new("xoxb-test", "C123", &config(&server.url())).unwrap();
        let delivery = notifier
            .notify("- https://example.com/ is running normally.")
            .await;

        assert_eq!(delivery, Delivery::Delivered { attempts: 1 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_is_retried_then_dropped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .expect(3)
            .create_async()
            .await;

        let notifier = SlackNotifier::new("xoxb-test", "C404", &config(&server.url())).unwrap();
        let delivery = notifier.notify("hello").await;

        assert_eq!(delivery, Delivery::Dropped { attempts: 3 });
        assert!(!delivery.is_delivered());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_message_reports_api_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat.postMessage")
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"invalid_auth"}"#)
            .create_async()
            .await;

        let notifier = SlackNotifier::new("bad", "C1", &config(&server.url())).unwrap();
        let err = notifier.post_message("x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Api(code) if code == "invalid_auth"));
    }

    #[tokio::test]
    async fn http_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat.postMessage")
            .with_status(429)
            .create_async()
            .await;

        let notifier = SlackNotifier::new("t", "C1", &config(&server.url())).unwrap();
        assert!(matches!(
            notifier.post_message("x").await,
            Err(NotifyError::Status(429))
        ));
    }

    #[tokio::test]
    async fn unreachable_api_is_dropped_without_panicking() {
        let notifier = SlackNotifier::new("t", "C1", &config("http://127.0.0.1:1")).unwrap();
        assert_eq!(notifier.notify("x").await, Delivery::Dropped { attempts: 3 });
    }

    #[test]
    fn debug_output_hides_token() {
        let notifier =
            SlackNotifier::new("xoxb-secret", "C1", &config("https://slack.com/api/")).unwrap();
        let debug = format!("{notifier:?}");
        assert!(!debug.contains("xoxb-secret"));
        assert!(debug.contains("https://slack.com/api/chat.postMessage"));
    }

    /// Serve one canned response per connection, in order.
    async fn scripted_api(responses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for body in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let (base, hits) = scripted_api(vec![
            r#"{"ok":false,"error":"ratelimited"}"#,
            r#"{"ok":true}"#,
        ])
        .await;

        let notifier = SlackNotifier::new("t", "C1", &config(&base)).unwrap();
        let delivery = notifier.notify("x").await;

        assert_eq!(delivery, Delivery::Delivered { attempts: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
