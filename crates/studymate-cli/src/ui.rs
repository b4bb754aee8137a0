//! Terminal and JSON output for the CLI

use colored::*;
use crossterm::terminal::size;
use serde::Serialize;

use studymate_core::{AnswerResult, ErrorKind, Stage};
use studymate_rag::PipelineFailure;

use crate::activity_log::ActivityStats;

/// Machine-readable answer printed on stdout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutput {
    pub answer: String,
    pub evidence_count: usize,
}

impl From<&AnswerResult> for AnswerOutput {
    fn from(result: &AnswerResult) -> Self {
        Self {
            answer: result.answer.clone(),
            evidence_count: result.evidence_count(),
        }
    }
}

/// Machine-readable failure printed on stderr
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorOutput {
    pub kind: ErrorKind,
    pub message: String,
    /// `None` when the failure happened before the pipeline started
    pub stage: Option<Stage>,
}

impl ErrorOutput {
    pub fn new(kind: ErrorKind, message: impl Into<String>, stage: Option<Stage>) -> Self {
        Self {
            kind,
            message: message.into(),
            stage,
        }
    }
}

impl From<&PipelineFailure> for ErrorOutput {
    fn from(failure: &PipelineFailure) -> Self {
        Self::new(failure.kind, failure.message.clone(), Some(failure.stage))
    }
}

fn box_width() -> usize {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    terminal_width.saturating_sub(4).clamp(30, 96)
}

/// Greedy word wrap on character counts
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let line_len = line.chars().count();
            let word_len = word.chars().count();
            if line_len > 0 && line_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    lines
}

fn print_box(title: ColoredString, body: &[String], width: usize) {
    let inner = width - 2;
    println!("{}", format!("┌{}┐", "─".repeat(inner)).blue());
    let title_len = title.chars().count();
    println!(
        "{} {}{}{}",
        "│".blue(),
        title,
        " ".repeat(inner.saturating_sub(title_len + 1)),
        "│".blue()
    );
    println!("{}", format!("├{}┤", "─".repeat(inner)).blue());
    for line in body {
        for wrapped in wrap_text(line, inner - 2) {
            let pad = inner.saturating_sub(wrapped.chars().count() + 1);
            println!("{} {}{}{}", "│".blue(), wrapped, " ".repeat(pad), "│".blue());
        }
    }
    println!("{}", format!("└{}┘", "─".repeat(inner)).blue());
}

/// Render an answer with the passages it was grounded on
pub fn display_answer(result: &AnswerResult) {
    let width = box_width();
    println!();
    print_box("Answer".green().bold(), &[result.answer.clone()], width);

    if result.has_evidence() {
        println!(
            "{}",
            format!("Grounded on {} passage(s):", result.evidence_count()).dimmed()
        );
        for chunk in &result.used_chunks {
            let preview: String = chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
            let preview: String = preview.chars().take(width.saturating_sub(16)).collect();
            println!(
                "  {} {}",
                format!("[chars {}-{}]", chunk.char_start, chunk.char_end).cyan(),
                preview.dimmed()
            );
        }
    } else {
        println!("{}", "No passages from the document supported this answer.".yellow());
    }
    println!();
}

pub fn display_failure(error: &ErrorOutput) {
    match error.stage {
        Some(stage) => eprintln!(
            "{} {} while {}: {}",
            "✗".red().bold(),
            error.kind.as_str().red(),
            stage,
            error.message
        ),
        None => eprintln!("{} {}: {}", "✗".red().bold(), error.kind.as_str().red(), error.message),
    }
}

pub fn display_stats(stats: &ActivityStats) {
    let width = box_width().min(48);
    let body = vec![
        format!("Total users:      {}", stats.total_users),
        format!("Total questions:  {}", stats.total_questions),
        format!("New users today:  {}", stats.users_today),
        format!("Updated:          {}", stats.last_updated.format("%Y-%m-%d %H:%M:%S UTC")),
    ];
    print_box("StudyMate usage".blue().bold(), &body, width);
}
