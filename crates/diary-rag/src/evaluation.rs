//! Offline evaluation: run question/answer pairs and grade the answers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{LlmBackend, LlmConfig};
use crate::error::Result;
use crate::generation::chat::ChatMessage;
use crate::generation::PromptBuilder;
use crate::pipeline::RagPipeline;
use crate::providers::{ChatCompletionsGenerator, OllamaGenerator};

/// Scores a predicted answer against the expected one on a 0-1 scale
#[async_trait]
pub trait Grader: Send + Sync {
    /// Raw grade text as returned by the model
    async fn grade(&self, question: &str, expected: &str, predicted: &str) -> Result<String>;
}

#[async_trait]
impl Grader for ChatCompletionsGenerator {
    async fn grade(&self, question: &str, expected: &str, predicted: &str) -> Result<String> {
        let prompt = PromptBuilder::build_grading_prompt(question, expected, predicted);
        self.client().complete(&[ChatMessage::system(prompt)]).await
    }
}

#[async_trait]
impl Grader for OllamaGenerator {
    async fn grade(&self, question: &str, expected: &str, predicted: &str) -> Result<String> {
        let prompt = PromptBuilder::build_grading_prompt(question, expected, predicted);
        self.complete(&prompt).await
    }
}

/// Build a grader on the configured LLM backend
pub fn build_grader(config: &LlmConfig) -> Result<Arc<dyn Grader>> {
    match config.provider {
        LlmBackend::Groq => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        LlmBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(config)?)),
    }
}

/// One graded question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub expected_answer: String,
    pub predicted_answer: String,
    pub grade: String,
}

impl EvaluationRecord {
    /// Grade as a number, when the model answered with one
    pub fn score(&self) -> Option<f64> {
        self.grade
            .split_whitespace()
            .next()
            .and_then(|token| token.trim_end_matches(['.', ',']).parse::<f64>().ok())
            .filter(|score| (0.0..=1.0).contains(score))
    }
}

/// Full result of an evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<EvaluationRecord>,
    /// Mean over the records with a numeric grade
    pub mean_grade: Option<f64>,
}

impl EvaluationReport {
    pub fn new(records: Vec<EvaluationRecord>) -> Self {
        let scores: Vec<f64> = records.iter().filter_map(EvaluationRecord::score).collect();
        let mean_grade = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        Self {
            generated_at: Utc::now(),
            records,
            mean_grade,
        }
    }
}

/// Pair line `i` of `questions` with line `i` of `answers`
///
/// Lines are trimmed. The longer input is truncated to the shorter one.
pub fn parse_qa_pairs(questions: &str, answers: &str) -> Vec<(String, String)> {
    questions
        .lines()
        .zip(answers.lines())
        .map(|(q, a)| (q.trim().to_string(), a.trim().to_string()))
        .collect()
}

/// Run every question through the pipeline and grade the answer
///
/// Failed pipeline runs are graded on their outcome message. A grader
/// fault is recorded in the grade rather than aborting the run.
pub async fn evaluate(
    pipeline: &RagPipeline,
    grader: &dyn Grader,
    pairs: &[(String, String)],
) -> Vec<EvaluationRecord> {
    let mut records = Vec::with_capacity(pairs.len());

    for (i, (question, expected)) in pairs.iter().enumerate() {
        let predicted = pipeline.query(question).await.answer;

        let grade = match grader.grade(question, expected, &predicted).await {
            Ok(grade) => grade,
            Err(e) => {
                tracing::warn!(question = %question, "Grading failed: {}", e);
                format!("Error: {}", e)
            }
        };

        tracing::info!(
            progress = i + 1,
            total = pairs.len(),
            grade = %grade,
            "Evaluated question"
        );

        records.push(EvaluationRecord {
            question: question.clone(),
            expected_answer: expected.clone(),
            predicted_answer: predicted,
            grade,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::InMemoryIndex;
    use crate::testing::{EchoGenerator, HashEmbedder};

    struct FixedGrader(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl Grader for FixedGrader {
        async fn grade(&self, _q: &str, _e: &str, _p: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(Error::generation_unavailable)
        }
    }

    fn empty_pipeline() -> RagPipeline {
        RagPipeline::new(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(InMemoryIndex::new()),
            Arc::new(EchoGenerator::answering("unused")),
            "diary",
            5,
        )
    }

    #[test]
    fn test_parse_qa_pairs_truncates_to_shorter() {
        let pairs = parse_qa_pairs("  Who?\nWhen?\nWhere?\n", "Me. \nToday.");
        assert_eq!(
            pairs,
            vec![
                ("Who?".to_string(), "Me.".to_string()),
                ("When?".to_string(), "Today.".to_string()),
            ]
        );
        assert!(parse_qa_pairs("", "a").is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_grades_failed_runs() {
        let pipeline = empty_pipeline();
        let pairs = vec![("Who?".to_string(), "Me.".to_string())];

        let records = evaluate(&pipeline, &FixedGrader(Ok("0")), &pairs).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].predicted_answer, "No relevant information found.");
        assert_eq!(records[0].grade, "0");
        assert_eq!(records[0].expected_answer, "Me.");
    }

    #[tokio::test]
    async fn test_evaluate_records_grader_fault() {
        let pipeline = empty_pipeline();
        let pairs = vec![("Who?".to_string(), "Me.".to_string())];

        let records = evaluate(&pipeline, &FixedGrader(Err("quota")), &pairs).await;
        assert!(records[0].grade.starts_with("Error: "));
        assert!(records[0].grade.contains("quota"));
        assert_eq!(records[0].score(), None);
    }

    #[test]
    fn test_report_mean_skips_non_numeric() {
        let record = |grade: &str| EvaluationRecord {
            question: "q".to_string(),
            expected_answer: "e".to_string(),
            predicted_answer: "p".to_string(),
            grade: grade.to_string(),
        };

        let report = EvaluationReport::new(vec![
            record("1"),
            record("0.5 The answer is partially aligned."),
            record("Error: timeout"),
        ]);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.mean_grade, Some(0.75));

        assert_eq!(EvaluationReport::new(vec![record("n/a")]).mean_grade, None);
    }
}
