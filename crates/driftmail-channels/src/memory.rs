//! In-memory mailer — records every send instead of delivering it. Used by
//! tests and by `--dry-run`.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftmail_core::error::Result;
use driftmail_core::traits::Mailer;

/// One recorded send.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub email: String,
    pub subject: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Mailer that keeps sends in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in send order.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &str, subject: &str, message: &str) -> Result<()> {
        tracing::info!("📭 (recorded, not delivered) to={email} subject={subject}");
        self.sent.lock().unwrap().push(SentEmail {
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_in_order() {
        let mailer = MemoryMailer::new();
        mailer.send("a@x.com", "first", "<p>1</p>").await.unwrap();
        mailer.send("b@x.com", "second", "<p>2</p>").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "first");
        assert_eq!(sent[1].email, "b@x.com");
    }
}
