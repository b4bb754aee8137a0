//! Append-only activity log for usage statistics

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use studymate_core::{Error, ErrorKind, Result};

/// What a user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    AskQuestion,
    AnswerReceived,
    AnswerFailed,
}

/// One line of the activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: String,
    pub action: Action,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ActivityEvent {
    fn now(user_id: &str, action: Action, details: serde_json::Value) -> Self {
        Self {
            user_id: user_id.to_string(),
            action,
            timestamp: Utc::now(),
            details,
        }
    }

    pub fn ask_question(user_id: &str, pdf_name: &str, question_len: usize, model: Option<&str>) -> Self {
        Self::now(
            user_id,
            Action::AskQuestion,
            json!({ "pdf": pdf_name, "question_len": question_len, "model": model }),
        )
    }

    pub fn answer_received(user_id: &str, answer_len: usize, evidence_count: usize) -> Self {
        Self::now(
            user_id,
            Action::AnswerReceived,
            json!({ "answer_len": answer_len, "evidence_count": evidence_count }),
        )
    }

    pub fn answer_failed(user_id: &str, kind: ErrorKind) -> Self {
        Self::now(user_id, Action::AnswerFailed, json!({ "error": kind }))
    }
}

/// Usage summary folded from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_users: usize,
    pub total_questions: usize,
    pub users_today: usize,
    pub last_updated: DateTime<Utc>,
}

impl ActivityStats {
    /// Fold `events` as of `now`; a user counts for today when their first
    /// event falls on the same UTC date.
    pub fn summarize(events: &[ActivityEvent], now: DateTime<Utc>) -> Self {
        let mut first_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for event in events {
            first_seen
                .entry(event.user_id.as_str())
                .and_modify(|seen| *seen = (*seen).min(event.timestamp))
                .or_insert(event.timestamp);
        }

        let today: NaiveDate = now.date_naive();
        Self {
            total_users: first_seen.len(),
            total_questions: events.iter().filter(|e| e.action == Action::AskQuestion).count(),
            users_today: first_seen.values().filter(|seen| seen.date_naive() == today).count(),
            last_updated: now,
        }
    }
}

/// JSON Lines activity log with a single appending writer
///
/// Events are only ever appended, so concurrent requests cannot lose each
/// other's updates.
pub struct ActivityLog {
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event
    pub async fn record(&self, event: &ActivityEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        if writer.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
            *writer = Some(file);
        }
        let file = writer
            .as_mut()
            .ok_or_else(|| Error::Other("activity log writer unavailable".to_string()))?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(action = ?event.action, user_id = %event.user_id, "recorded activity");
        Ok(())
    }

    /// All well-formed events in the log, oldest first
    pub async fn events(&self) -> Result<Vec<ActivityEvent>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = number + 1, error = %e, "skipping malformed activity line"),
            }
        }

        Ok(events)
    }

    pub async fn stats(&self) -> Result<ActivityStats> {
        let events = self.events().await?;
        Ok(ActivityStats::summarize(&events, Utc::now()))
    }
}
