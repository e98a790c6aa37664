//! Terminal result of a single query

use serde::{Deserialize, Serialize};

/// Answer returned when search finds no candidates
pub const NO_MATCH_MESSAGE: &str = "No relevant information found.";

/// Answer returned when fetch yields no entries for the candidates
pub const NO_CONTENT_MESSAGE: &str = "Could not retrieve document contents.";

/// Why a query ended without evidence. Business outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Search returned nothing
    NoMatch,
    /// Fetch returned nothing
    NoContent,
}

impl EmptyReason {
    /// Stable user-facing message
    pub fn message(self) -> &'static str {
        match self {
            EmptyReason::NoMatch => NO_MATCH_MESSAGE,
            EmptyReason::NoContent => NO_CONTENT_MESSAGE,
        }
    }
}

/// Three-way result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Generation completed over retrieved evidence
    Answered {
        answer: String,
        context: Vec<String>,
        source_ids: Vec<String>,
    },
    /// Nothing to answer from
    Empty { reason: EmptyReason },
    /// A backend fault or a panic inside a collaborator
    Failed { cause: String },
}

impl Outcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, Outcome::Answered { .. })
    }

    /// Flatten into the wire shape
    pub fn into_query_outcome(self) -> QueryOutcome {
        self.into()
    }
}

/// Flat `{answer, context, source_ids, succeeded}` shape handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub context: Vec<String>,
    pub source_ids: Vec<String>,
    pub succeeded: bool,
}

impl From<Outcome> for QueryOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Answered {
                answer,
                context,
                source_ids,
            } => Self {
                answer,
                context,
                source_ids,
                succeeded: true,
            },
            Outcome::Empty { reason } => Self {
                answer: reason.message().to_string(),
                context: Vec::new(),
                source_ids: Vec::new(),
                succeeded: false,
            },
            Outcome::Failed { cause } => Self {
                answer: format!("Error: {}", cause),
                context: Vec::new(),
                source_ids: Vec::new(),
                succeeded: false,
            },
        }
    }
}
