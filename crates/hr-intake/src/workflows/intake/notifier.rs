use std::sync::Arc;

use tracing::{debug, warn};

use super::domain::{ChatId, SubmissionRecord, EXPERIENCE_YEARS_KEY};
use super::gateway::{ChatGateway, OutgoingMessage};
use super::messages::escape_html;

const NOTES_PREVIEW_CHARS: usize = 300;

/// Sends submission summaries to the reviewer chat. Delivery is best effort.
pub struct ReviewNotifier<G> {
    gateway: Arc<G>,
    destination: Option<ChatId>,
}

impl<G> ReviewNotifier<G>
where
    G: ChatGateway + 'static,
{
    pub fn new(gateway: Arc<G>, destination: Option<ChatId>) -> Self {
        Self {
            gateway,
            destination,
        }
    }

    /// Never fails: a delivery error is logged and dropped.
    pub async fn notify(&self, record: &SubmissionRecord, failure: Option<&str>) {
        let Some(destination) = self.destination else {
            debug!(opening = %record.opening_id, "reviewer chat not configured; skipping notification");
            return;
        };

        let message = OutgoingMessage::text(format_summary(record, failure));
        if let Err(err) = self.gateway.send_message(destination, &message).await {
            warn!(
                error = %err,
                user_id = record.user_id,
                "reviewer notification was not delivered"
            );
        }
    }
}

pub fn format_summary(record: &SubmissionRecord, failure: Option<&str>) -> String {
    let mut parts = vec![
        format!(
            "📝 <b>New application</b>\nOpening: <b>{}</b>",
            escape_html(&record.opening_title)
        ),
        format!(
            "👤 Candidate: {}",
            record
                .answer("full_name")
                .map(|name| escape_html(&name))
                .unwrap_or_else(|| "(not provided)".to_string())
        ),
        format!("🆔 TG ID: <code>{}</code>", record.user_id),
    ];

    if let Some(username) = record.username.as_deref().filter(|name| !name.is_empty()) {
        parts.push(format!("🔗 @{}", escape_html(username)));
    }

    let labelled = [
        ("city", "📍 City"),
        (EXPERIENCE_YEARS_KEY, "⏳ Experience"),
        ("expected_salary", "💰 Expectations"),
        ("email", "✉️ Email"),
        ("phone", "📞 Phone"),
    ];
    for (key, label) in labelled {
        if let Some(value) = record.answer(key) {
            parts.push(format!("{label}: {}", escape_html(&value)));
        }
    }

    if let Some(notes) = record.answer("additional_notes") {
        let preview: String = notes.chars().take(NOTES_PREVIEW_CHARS).collect();
        parts.push(format!("🧩 Notes: {}", escape_html(&preview)));
    }

    if !record.resume_link.is_empty() {
        parts.push(format!("🔗 Resume: {}", escape_html(&record.resume_link)));
    }

    if let Some(detail) = failure {
        parts.push(format!(
            "\n⚠️ Failed to write to the spreadsheet: <code>{}</code>",
            escape_html(detail)
        ));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::intake::domain::{AnswerValue, OpeningId};
    use crate::workflows::intake::gateway::ChatError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn record() -> SubmissionRecord {
        let mut answers = BTreeMap::new();
        answers.insert(
            "full_name".to_string(),
            AnswerValue::Text("Ann <Lee>".to_string()),
        );
        answers.insert(EXPERIENCE_YEARS_KEY.to_string(), AnswerValue::Number(5.0));
        answers.insert("additional_notes".to_string(), AnswerValue::Text("x".repeat(400)));
        answers.insert("email".to_string(), AnswerValue::Text(String::new()));
        SubmissionRecord {
            submitted_at: Utc::now(),
            opening_id: OpeningId::new("eng"),
            opening_title: "Engineer".to_string(),
            user_id: 42,
            username: None,
            answers,
            resume_link: "https://docs.google.com/document/d/ABC/edit".to_string(),
        }
    }

    #[test]
    fn summary_skips_blank_fields_and_truncates_notes() {
        let text = format_summary(&record(), None);
        assert!(text.contains("Opening: <b>Engineer</b>"));
        assert!(text.contains("Candidate: Ann &lt;Lee&gt;"));
        assert!(text.contains("Experience: 5"));
        assert!(!text.contains("Email"));
        assert!(!text.contains('@'));
        assert!(text.contains(&format!("Notes: {}", "x".repeat(300))));
        assert!(!text.contains(&"x".repeat(301)));
        assert!(!text.contains("Failed to write"));
    }

    #[test]
    fn summary_carries_failure_detail() {
        let text = format_summary(&record(), Some("quota <exceeded>"));
        assert!(text.contains("<code>quota &lt;exceeded&gt;</code>"));
    }

    struct FailingGateway {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl ChatGateway for FailingGateway {
        async fn send_message(
            &self,
            _chat: ChatId,
            _message: &OutgoingMessage,
        ) -> Result<(), ChatError> {
            *self.attempts.lock().unwrap() += 1;
            Err(ChatError::Transport("connection reset".to_string()))
        }

        async fn answer_callback(
            &self,
            _callback_id: &str,
            _text: Option<&str>,
            _show_alert: bool,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn edit_message_text(
            &self,
            _chat: ChatId,
            _message_id: i64,
            _text: &str,
        ) -> Result<(), ChatError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed_without_retry() {
        let gateway = Arc::new(FailingGateway {
            attempts: Mutex::new(0),
        });
        let notifier = ReviewNotifier::new(gateway.clone(), Some(ChatId(-100)));
        notifier.notify(&record(), None).await;
        assert_eq!(*gateway.attempts.lock().unwrap(), 1);

        let disabled = ReviewNotifier::new(gateway.clone(), None);
        disabled.notify(&record(), None).await;
        assert_eq!(*gateway.attempts.lock().unwrap(), 1);
    }
}
