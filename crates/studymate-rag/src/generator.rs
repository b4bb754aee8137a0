//! Offline extractive answer generator

use async_trait::async_trait;
use std::collections::HashSet;

use studymate_core::{Generator, Result};

/// Answers by quoting the context sentences that share the most words with the question
///
/// Used when no generation backend is configured. With an empty context it
/// reports that the document had nothing relevant.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_sentences: usize,
}

impl ExtractiveGenerator {
    pub const MODEL: &'static str = "extractive";

    pub fn new() -> Self {
        Self { max_sentences: 2 }
    }

    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences.max(1);
        self
    }

    fn best_sentences(&self, context: &str, question: &str) -> Vec<String> {
        let question_words = keywords(question);
        let sentences = split_sentences(context);

        let mut scored: Vec<(usize, usize, &String)> = sentences
            .iter()
            .enumerate()
            .map(|(position, sentence)| {
                let words = keywords(sentence);
                let overlap = question_words.intersection(&words).count();
                (overlap, position, sentence)
            })
            .collect();

        // Highest overlap first, earlier sentences win ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(_, position, _)| *position);

        scored.into_iter().map(|(_, _, sentence)| sentence.clone()).collect()
    }
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(|word| word.to_lowercase())
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_string());
            }
            current.clear();
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_string());
            }
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }

    sentences
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, context: &str, question: &str, _model_hint: Option<&str>) -> Result<String> {
        if context.trim().is_empty() {
            return Ok(format!(
                "No relevant content was found in the document to answer: {}",
                question.trim()
            ));
        }

        let sentences = self.best_sentences(context, question);
        Ok(format!("Based on the document: {}", sentences.join(" ")))
    }

    fn model_id(&self) -> &str {
        Self::MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_context_reports_no_content() {
        let generator = ExtractiveGenerator::new();
        let answer = generator.generate("", "What is osmosis?", None).await.unwrap();
        assert_eq!(answer, "No relevant content was found in the document to answer: What is osmosis?");
    }

    #[tokio::test]
    async fn test_picks_overlapping_sentences() {
        let generator = ExtractiveGenerator::new().with_max_sentences(1);
        let context = "The cell wall is rigid. Osmosis moves water across a membrane.\n\nEnzymes speed up reactions.";
        let answer = generator.generate(context, "How does osmosis move water?", None).await.unwrap();
        assert_eq!(answer, "Based on the document: Osmosis moves water across a membrane.");
    }

    #[tokio::test]
    async fn test_keeps_document_order() {
        let generator = ExtractiveGenerator::new();
        let context = "Paris is in France. Berlin is in Germany. France borders Germany.";
        let answer = generator.generate(context, "Does France border Germany?", None).await.unwrap();
        assert_eq!(answer, "Based on the document: Paris is in France. France borders Germany.");
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two!\nThree without stop\n\nFour?");
        assert_eq!(sentences, vec!["One.", "Two!", "Three without stop", "Four?"]);
    }
}
