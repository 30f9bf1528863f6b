//! Persisted records of the validation engine.
//!
//! Every entity is keyed by an opaque [`EntityId`]. Theses carry their gate
//! results, objections and provenance records are append-only, and runs record
//! each adversarial-loop invocation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adversarial::{FinalAssessment, Iteration};
use crate::analyzer::{CounterexampleCue, Formalization};

/// Opaque identifier for any stored entity.
///
/// Generated ids are UUID v4 strings; externally produced entities (generated
/// RPEs, seeded axioms) may use any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Allocate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// The six quality gates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GateId {
    G1,
    G2,
    G3,
    G4,
    G5,
    G6,
}

impl GateId {
    pub const ALL: [GateId; 6] = [
        GateId::G1,
        GateId::G2,
        GateId::G3,
        GateId::G4,
        GateId::G5,
        GateId::G6,
    ];

    /// Human-readable gate name.
    pub fn title(self) -> &'static str {
        match self {
            GateId::G1 => "Vocabulary Consistency",
            GateId::G2 => "Formalization Success",
            GateId::G3 => "Proof Soundness",
            GateId::G4 => "Countermodel Adequacy",
            GateId::G5 => "Repair Convergence",
            GateId::G6 => "Integration Coherence",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Gate-specific payload attached to a [`GateResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateArtifact {
    Vocabulary {
        domain_terms: Vec<String>,
        unapproved_terms: Vec<String>,
        /// False when the controlled vocabulary could not be read.
        vocabulary_available: bool,
    },
    Formalization {
        formalizations: Vec<Formalization>,
        attempted: usize,
    },
    Proof {
        has_contradiction: bool,
        valid_inference: bool,
    },
    Countermodel {
        counterexamples: Vec<CounterexampleCue>,
        strong_count: usize,
    },
    Repair {
        issues: Vec<String>,
        repairs: Vec<String>,
    },
    Coherence {
        axiom_scores: Vec<AxiomCoherence>,
        standalone: bool,
    },
}

/// Overlap between a thesis and one referenced axiom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxiomCoherence {
    pub axiom_id: EntityId,
    pub score: f64,
}

/// Verdict of a single gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: GateId,
    pub passed: bool,
    /// Always in `[0, 1]`.
    pub score: f64,
    pub details: String,
    pub artifact: GateArtifact,
}

// ---------------------------------------------------------------------------
// Thesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThesisStatus {
    Unverified,
    Validating,
    Validated,
    Rejected,
}

impl ThesisStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unverified" => Some(Self::Unverified),
            "validating" => Some(Self::Validating),
            "validated" => Some(Self::Validated),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ThesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThesisStatus::Unverified => "unverified",
            ThesisStatus::Validating => "validating",
            ThesisStatus::Validated => "validated",
            ThesisStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A submitted assertion and its most recent validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thesis {
    pub id: EntityId,
    pub statement: String,
    pub domain: String,
    pub status: ThesisStatus,
    #[serde(default)]
    pub gate_results: BTreeMap<GateId, GateResult>,
    #[serde(default)]
    pub related_rpe_id: Option<EntityId>,
    #[serde(default)]
    pub related_axiom_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

impl Thesis {
    /// Number of gates recorded as passed.
    pub fn gates_passed(&self) -> usize {
        self.gate_results.values().filter(|g| g.passed).count()
    }

    /// Percentage of the six gates that passed.
    pub fn gate_success_rate(&self) -> f64 {
        self.gates_passed() as f64 / GateId::ALL.len() as f64 * 100.0
    }

    /// Gates with an explicit failing result, in gate order.
    pub fn failing_gates(&self) -> Vec<GateId> {
        self.gate_results
            .values()
            .filter(|g| !g.passed)
            .map(|g| g.gate_id)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewThesis {
    pub statement: String,
    pub domain: String,
    pub status: ThesisStatus,
    pub related_rpe_id: Option<EntityId>,
    pub related_axiom_id: Option<EntityId>,
}

/// Filter for [`crate::store::EntityStore::list_theses`].
#[derive(Debug, Clone, Default)]
pub struct ThesisFilter {
    pub status: Option<ThesisStatus>,
    pub domain: Option<String>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Objections, scenarios
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    Counterexample,
    ScopeChallenge,
    EvidenceChallenge,
    AssumptionChallenge,
    ConsistencyChallenge,
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackType::Counterexample => "counterexample",
            AttackType::ScopeChallenge => "scope_challenge",
            AttackType::EvidenceChallenge => "evidence_challenge",
            AttackType::AssumptionChallenge => "assumption_challenge",
            AttackType::ConsistencyChallenge => "consistency_challenge",
        };
        f.write_str(s)
    }
}

/// An attack on a thesis, argument or claim. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objection {
    pub id: EntityId,
    pub target_type: EntityKind,
    pub target_id: EntityId,
    pub statement: String,
    pub attack_type: AttackType,
    pub strength: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewObjection {
    pub target_type: EntityKind,
    pub target_id: EntityId,
    pub statement: String,
    pub attack_type: AttackType,
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

/// Parameters attached to a persisted repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objection_id: Option<EntityId>,
    pub priority: Priority,
}

/// A repair proposal that was materialized for later inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: EntityId,
    pub description: String,
    pub parameters: RepairParameters,
    pub domain: String,
    #[serde(default)]
    pub related_thesis: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScenario {
    pub description: String,
    pub parameters: RepairParameters,
    pub domain: String,
    pub related_thesis: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Structured metadata carried by a [`ProvenanceRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvenanceMetadata {
    Validation {
        status: ThesisStatus,
        gates_passed: usize,
        gates_total: usize,
    },
    AdversarialLoop {
        iterations_count: usize,
        converged: bool,
    },
    QueryArtifact {
        query_type: String,
        source_entity: EntityId,
    },
}

/// One derivation step in the append-only provenance graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: EntityId,
    pub entity_type: String,
    pub entity_id: EntityId,
    #[serde(default)]
    pub was_generated_by: Option<EntityId>,
    #[serde(default)]
    pub was_derived_from: Vec<EntityId>,
    pub was_attributed_to: String,
    pub metadata: ProvenanceMetadata,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProvenance {
    pub entity_type: String,
    pub entity_id: EntityId,
    pub was_generated_by: Option<EntityId>,
    pub was_derived_from: Vec<EntityId>,
    pub was_attributed_to: String,
    pub metadata: ProvenanceMetadata,
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub thesis_id: EntityId,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub iterations: Vec<Iteration>,
    pub final_assessment: FinalAssessment,
}

/// One adversarial-loop invocation. Terminal once `completed` or `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: EntityId,
    pub experiment_type: String,
    pub input_parameters: RunParameters,
    pub status: RunStatus,
    #[serde(default)]
    pub results: Option<RunResults>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Claims, arguments, reference data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: EntityId,
    pub statement: String,
    pub formal_representation: String,
    pub domain: String,
    #[serde(default)]
    pub source_concepts: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewClaim {
    pub statement: String,
    pub formal_representation: String,
    pub domain: String,
    pub source_concepts: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: EntityId,
    pub structure_type: String,
    pub validity_status: Validity,
    pub formal_proof: String,
    #[serde(default)]
    pub premises: Vec<EntityId>,
    #[serde(default)]
    pub conclusion_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArgument {
    pub structure_type: String,
    pub validity_status: Validity,
    pub formal_proof: String,
    pub premises: Vec<EntityId>,
    pub conclusion_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axiom {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// One approved entry of the controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    pub term: String,
    #[serde(default)]
    pub definition: Option<String>,
}

/// A generated philosophical entity ("RPE") that a thesis may derive from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEntity {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Entity kinds addressed by Phi-QL and objections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Thesis,
    Argument,
    Claim,
}

impl EntityKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "thesis" => Some(Self::Thesis),
            "argument" => Some(Self::Argument),
            "claim" => Some(Self::Claim),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Thesis => "thesis",
            EntityKind::Argument => "argument",
            EntityKind::Claim => "claim",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queryable entity loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum Entity {
    Thesis(Thesis),
    Argument(Argument),
    Claim(Claim),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Thesis(_) => EntityKind::Thesis,
            Entity::Argument(_) => EntityKind::Argument,
            Entity::Claim(_) => EntityKind::Claim,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Thesis(t) => &t.id,
            Entity::Argument(a) => &a.id,
            Entity::Claim(c) => &c.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entity::Thesis(t) => t.created_at,
            Entity::Argument(a) => a.created_at,
            Entity::Claim(c) => c.created_at,
        }
    }

    /// The natural-language text attacked by counterexample generation.
    pub fn statement(&self) -> &str {
        match self {
            Entity::Thesis(t) => &t.statement,
            Entity::Argument(a) => &a.formal_proof,
            Entity::Claim(c) => &c.statement,
        }
    }
}
