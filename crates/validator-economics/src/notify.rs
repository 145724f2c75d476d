//! Report delivery to a chat webhook

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use tracing::{info, warn};

use crate::constants;
use crate::http::HttpClient;

#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    content: String,
}

/// Discord-compatible incoming webhook
pub struct DiscordWebhook {
    http: HttpClient,
    url: String,
}

impl DiscordWebhook {
    pub fn new(http: HttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn send(&self, text: &str) -> Result<()> {
        let message = WebhookMessage {
            content: webhook_content(text),
        };
        self.http.post_json(&self.url, &message).await
    }
}

const FENCE: &str = "```";
const ELLIPSIS: &str = "\n...";

/// Wrap `text` in a code block so columns line up, cut to the message limit
fn webhook_content(text: &str) -> String {
    let budget = constants::DISCORD_MESSAGE_LIMIT - 2 * FENCE.len() - 2;
    let body: String = if text.chars().count() > budget {
        let keep = budget - ELLIPSIS.len();
        text.chars().take(keep).chain(ELLIPSIS.chars()).collect()
    } else {
        text.to_string()
    };
    format!("{FENCE}\n{body}\n{FENCE}")
}

/// Deliver `text`; failures are logged and otherwise ignored
pub async fn notify<N: Notifier + ?Sized>(notifier: &N, text: &str) {
    match notifier.send(text).await {
        Ok(()) => info!("report delivered to webhook"),
        Err(e) => warn!("failed to deliver report: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_fenced() {
        assert_eq!(webhook_content("hello"), "```\nhello\n```");
    }

    #[test]
    fn test_long_message_is_truncated_to_limit() {
        let text = "═".repeat(5000);
        let content = webhook_content(&text);

        assert_eq!(content.chars().count(), constants::DISCORD_MESSAGE_LIMIT);
        assert!(content.ends_with("\n...\n```"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_fatal() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("404 Not Found")));

        notify(&notifier, "report").await;
    }

    #[tokio::test]
    async fn test_sends_text_unchanged() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|text| text == "report")
            .times(1)
            .returning(|_| Ok(()));

        notify(&notifier, "report").await;
    }
}
