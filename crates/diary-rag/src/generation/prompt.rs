//! Prompt templates for grounded diary answers

/// Fixed reply when the retrieved passages do not support an answer.
/// Callers and tests match on this exact text.
pub const REFUSAL_SENTENCE: &str = "Could not find relevant data within the document.";

/// Whether a generated answer is the refusal sentinel, tolerating quotes,
/// case and a missing trailing period
pub fn is_refusal(answer: &str) -> bool {
    let normalize = |s: &str| {
        s.trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim_end_matches('.')
            .to_lowercase()
    };
    normalize(answer) == normalize(REFUSAL_SENTENCE)
}

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Number passages in retrieval rank order
    pub fn build_context(context: &[String]) -> String {
        context
            .iter()
            .enumerate()
            .map(|(i, passage)| format!("[{}] {}", i + 1, passage))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// System message carrying the evidence
    pub fn system_prompt(context: &[String]) -> String {
        format!(
            "You are a research assistant. Use the following context to answer the question:\n\n{}",
            Self::build_context(context)
        )
    }

    /// System message instructing the refusal sentinel
    pub fn refusal_instruction() -> String {
        format!(
            "If the query is not related to context, answer '{}'",
            REFUSAL_SENTENCE
        )
    }

    /// User message
    pub fn user_prompt(question: &str) -> String {
        format!("User query: {}", question)
    }

    /// Single-string prompt for completion-style backends
    pub fn build_rag_prompt(question: &str, context: &[String]) -> String {
        format!(
            r#"You are a research assistant answering questions about a diary.

GROUNDING RULES:
1. ONLY use information that is explicitly stated in the CONTEXT below
2. NEVER use external knowledge or make guesses beyond the context
3. If the context does not answer the question, reply with exactly: {refusal}

CONTEXT:
{context}

QUESTION: {question}

Answer:"#,
            refusal = REFUSAL_SENTENCE,
            context = Self::build_context(context),
            question = question
        )
    }

    /// Grading prompt used by the evaluation harness
    pub fn build_grading_prompt(question: &str, expected: &str, predicted: &str) -> String {
        format!(
            r#"You are a question and answer system response evaluator.
Given the question: "{question}", the expected answer: "{expected}" and the system's answer: "{predicted}",
assign a grade from 0 to 1, where 1 indicates that the system's answer is perfectly aligned with the expected answer and 0 indicates that there is no alignment at all.

Grade (0-1):"#,
            question = question,
            expected = expected,
            predicted = predicted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_numbers_in_order() {
        let context = vec!["We arrived today.".to_string(), "It rained.".to_string()];
        assert_eq!(
            PromptBuilder::build_context(&context),
            "[1] We arrived today.\n\n[2] It rained."
        );
    }

    #[test]
    fn test_prompts_embed_refusal_sentence() {
        assert!(PromptBuilder::refusal_instruction().contains(REFUSAL_SENTENCE));

        let prompt = PromptBuilder::build_rag_prompt("Who arrived?", &["We arrived.".to_string()]);
        assert!(prompt.contains(REFUSAL_SENTENCE));
        assert!(prompt.contains("[1] We arrived."));
        assert!(prompt.contains("QUESTION: Who arrived?"));
    }

    #[test]
    fn test_is_refusal() {
        assert!(is_refusal(REFUSAL_SENTENCE));
        assert!(is_refusal("  'Could not find relevant data within the document'  "));
        assert!(is_refusal("could not find relevant data within the document."));
        assert!(!is_refusal("They arrived on the first day."));
    }
}
