//! Output rendering and activity tracking for the StudyMate CLI

mod activity_log;
mod ui;


pub use activity_log::{Action, ActivityEvent, ActivityLog, ActivityStats};
pub use ui::{AnswerOutput, ErrorOutput, display_answer, display_failure, display_stats, wrap_text};

// Re-export core types
pub use studymate_core::{Error, Result};
