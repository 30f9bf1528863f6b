//! Request and response shapes of the four service entry points.
//!
//! These are the JSON contracts shared by the CLI and the HTTP server.
//! Failures are rendered as an [`ErrorEnvelope`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adversarial::{FinalAssessment, Iteration};
use crate::entity::{EntityId, GateId, GateResult, Thesis, ThesisStatus};
use crate::error::PiveError;
use crate::query::{QueryOutput, QueryParameters, QueryType};

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub thesis: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub related_rpe_id: Option<EntityId>,
    #[serde(default)]
    pub axiom_references: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub gates_passed: usize,
    pub gates_total: usize,
    pub overall_status: ThesisStatus,
    /// Segments mapped by a formalization template.
    pub formalizations: usize,
    pub counterexamples: usize,
    pub repairs_suggested: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub thesis_id: EntityId,
    pub validation_status: ThesisStatus,
    pub gates: BTreeMap<GateId, GateResult>,
    pub summary: ValidationSummary,
}

// ---------------------------------------------------------------------------
// Adversarial loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopRequest {
    pub thesis_id: EntityId,
    /// Falls back to `adversarial.default_max_iterations`.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResponse {
    pub run_id: EntityId,
    pub iterations: Vec<Iteration>,
    pub final_assessment: FinalAssessment,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_type: String,
    pub entity_type: String,
    pub entity_id: EntityId,
    #[serde(default)]
    pub parameters: QueryParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query_type: QueryType,
    pub result: QueryOutput,
}

// ---------------------------------------------------------------------------
// List theses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub status_filter: Option<ThesisStatus>,
    #[serde(default)]
    pub domain_filter: Option<String>,
    /// Falls back to `list.default_limit`.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A thesis enriched for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisSummary {
    #[serde(flatten)]
    pub thesis: Thesis,
    pub objection_count: usize,
    /// Percentage of the six gates passed.
    pub gate_success_rate: f64,
    #[serde(default)]
    pub rpe_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListStatistics {
    pub total: usize,
    pub validated: usize,
    pub rejected: usize,
    pub unverified: usize,
    /// Mean `gate_success_rate`, 0 for an empty list.
    pub average_gate_success: f64,
}

impl ListStatistics {
    pub fn from_summaries(theses: &[ThesisSummary]) -> Self {
        let count = |status| theses.iter().filter(|t| t.thesis.status == status).count();
        let average_gate_success = if theses.is_empty() {
            0.0
        } else {
            theses.iter().map(|t| t.gate_success_rate).sum::<f64>() / theses.len() as f64
        };
        Self {
            total: theses.len(),
            validated: count(ThesisStatus::Validated),
            rejected: count(ThesisStatus::Rejected),
            unverified: count(ThesisStatus::Unverified),
            average_gate_success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub theses: Vec<ThesisSummary>,
    pub statistics: ListStatistics,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// One of `not_found`, `invalid_argument`, `internal`.
    pub code: String,
    pub message: String,
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl From<&PiveError> for ErrorEnvelope {
    fn from(err: &PiveError) -> Self {
        Self {
            error: ErrorBody {
                code: err.kind().code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoopError, QueryError};
    use chrono::Utc;

    fn summary(status: ThesisStatus, rate: f64) -> ThesisSummary {
        ThesisSummary {
            thesis: Thesis {
                id: EntityId::generate(),
                statement: "s".into(),
                domain: "nihiltheism".into(),
                status,
                gate_results: BTreeMap::new(),
                related_rpe_id: None,
                related_axiom_id: None,
                created_at: Utc::now(),
            },
            objection_count: 0,
            gate_success_rate: rate,
            rpe_name: None,
        }
    }

    #[test]
    fn empty_list_statistics_are_zero() {
        let stats = ListStatistics::from_summaries(&[]);
        assert_eq!(stats, ListStatistics::default());
    }

    #[test]
    fn statistics_count_statuses_and_average() {
        let stats = ListStatistics::from_summaries(&[
            summary(ThesisStatus::Validated, 100.0),
            summary(ThesisStatus::Rejected, 50.0),
            summary(ThesisStatus::Rejected, 0.0),
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.validated, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.unverified, 0);
        assert!((stats.average_gate_success - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn envelope_carries_code_and_message() {
        let err: PiveError = LoopError::ThesisNotFound {
            thesis_id: "t-404".into(),
        }
        .into();
        let json = serde_json::to_value(ErrorEnvelope::from(&err)).unwrap();
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "thesis not found: t-404");

        let err: PiveError = QueryError::UnknownQueryType {
            query_type: "HOW".into(),
        }
        .into();
        assert_eq!(ErrorEnvelope::from(&err).error.code, "invalid_argument");
    }

    #[test]
    fn validate_request_optional_fields_default() {
        let req: ValidateRequest =
            serde_json::from_value(serde_json::json!({ "thesis": "Being is void." })).unwrap();
        assert!(req.domain.is_none());
        assert!(req.axiom_references.is_empty());

        let req: QueryRequest = serde_json::from_value(serde_json::json!({
            "query_type": "why",
            "entity_type": "claim",
            "entity_id": "c-1"
        }))
        .unwrap();
        assert_eq!(req.parameters, QueryParameters::default());
    }
}
