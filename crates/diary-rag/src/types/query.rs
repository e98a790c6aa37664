//! Request and response bodies for the HTTP surface

use serde::{Deserialize, Serialize};

use super::outcome::QueryOutcome;

/// Query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,
}

/// Successful query response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub context: Vec<String>,
    pub source_ids: Vec<String>,
    pub success: bool,
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            response: outcome.answer,
            context: outcome.context,
            source_ids: outcome.source_ids,
            success: outcome.succeeded,
        }
    }
}

/// Raw text ingest request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub text: String,
}

/// Ingest response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub entries_written: usize,
}
