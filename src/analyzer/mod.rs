//! Text analyzers: every natural-language heuristic the engine relies on.
//!
//! The gate evaluator, the adversarial loop and the query engine never inspect
//! text themselves. They call an [`Analyzer`], a set of pure
//! `(text) → analysis` functions, so a better analyzer can be substituted
//! without touching any control flow.
//!
//! [`HeuristicAnalyzer`] is the default: regex templates and keyword cues.

pub mod heuristic;
pub mod templates;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use heuristic::HeuristicAnalyzer;

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// A segment mapped to a symbolic logical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formalization {
    pub segment: String,
    pub logic: String,
    /// Name of the template that produced `logic`.
    pub template: String,
    /// True when no template matched and an opaque proposition was emitted.
    pub fallback: bool,
}

/// Contradiction and inference-marker scan of a whole text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceCheck {
    pub has_contradiction: bool,
    pub valid_inference: bool,
}

/// The syntactic cue a counterexample was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Existential,
    Universal,
    Necessity,
    Causal,
    Temporal,
}

/// A candidate counterexample with its strength in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterexampleCue {
    pub objection: String,
    pub strength: f64,
    pub cue: CueKind,
}

/// A weakness of the text and the suggested fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weakness {
    pub issue: String,
    pub repair: String,
}

/// Strongest rewrite of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Steelman {
    pub original: String,
    pub strengthened: String,
    pub improvements: Vec<String>,
    pub strength_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    ScopeChallenge,
    EvidenceChallenge,
    AssumptionChallenge,
    AlternativeExplanation,
    ConsistencyChallenge,
}

/// One red-team attack on a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub kind: ChallengeKind,
    pub challenge: String,
    pub severity: Severity,
    /// The hidden assumption, for assumption challenges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedTeam {
    pub challenges: Vec<Challenge>,
    pub total_challenges: usize,
    pub high_severity_count: usize,
}

impl RedTeam {
    pub fn new(challenges: Vec<Challenge>) -> Self {
        let high_severity_count = challenges
            .iter()
            .filter(|c| c.severity == Severity::High)
            .count();
        Self {
            total_challenges: challenges.len(),
            high_severity_count,
            challenges,
        }
    }

    /// Challenges of one kind, in the order they were raised.
    pub fn of_kind(&self, kind: ChallengeKind) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter().filter(move |c| c.kind == kind)
    }
}

/// A model in which a formalized segment fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Countermodel {
    pub target: String,
    pub countermodel: String,
    pub logic_form: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairType {
    ScopeRestriction,
    EvidenceAddition,
    AssumptionExplicit,
    ConstraintAddition,
}

impl fmt::Display for RepairType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepairType::ScopeRestriction => "scope_restriction",
            RepairType::EvidenceAddition => "evidence_addition",
            RepairType::AssumptionExplicit => "assumption_explicit",
            RepairType::ConstraintAddition => "constraint_addition",
        };
        f.write_str(s)
    }
}

/// A proposed rewrite addressing one issue. Transient unless materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    pub issue: String,
    pub repair_type: RepairType,
    pub repaired_statement: String,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Pluggable natural-language analysis capability.
///
/// Implementations must be deterministic: identical input yields identical
/// output. The only randomness in the pipeline (the constraint phrase) is
/// chosen by the caller and passed in.
pub trait Analyzer: Send + Sync {
    /// Short identifier recorded in logs.
    fn name(&self) -> &str;

    /// Candidate domain terms, deduplicated, in order of first appearance.
    fn domain_terms(&self, text: &str) -> Vec<String>;

    /// Clause-like segments worth formalizing.
    fn segments(&self, text: &str) -> Vec<String>;

    /// Map one segment to a logical form, falling back to an opaque proposition.
    fn formalize(&self, segment: &str) -> Formalization;

    /// Self-contradiction and inference-marker scan.
    fn inference(&self, text: &str) -> InferenceCheck;

    /// Counterexample cues used by the countermodel-adequacy gate.
    fn countermodel_cues(&self, text: &str) -> Vec<CounterexampleCue>;

    /// Counterexamples generated on demand by a COUNTEREX query.
    fn counterexamples(&self, text: &str) -> Vec<CounterexampleCue>;

    /// Structural weaknesses, one per category.
    fn weaknesses(&self, text: &str) -> Vec<Weakness>;

    /// Term-overlap coefficient in `[0, 1]` between a text and an axiom.
    fn coherence(&self, text: &str, axiom: &str) -> f64;

    /// Strengthen hedged language and add qualifying context.
    fn steelman(&self, text: &str) -> Steelman;

    /// Argument strength in `[0, 1]`.
    fn argument_strength(&self, text: &str) -> f64;

    /// Attack a (steelmanned) statement.
    fn red_team(&self, text: &str) -> RedTeam;

    /// Derive countermodels from the connectives of each formalization.
    fn countermodels(&self, formalizations: &[Formalization]) -> Vec<Countermodel>;

    /// Propose one repair per challenge category present.
    fn propose_repairs(
        &self,
        statement: &str,
        red_team: &RedTeam,
        countermodels: &[Countermodel],
        constraint_phrase: &str,
    ) -> Vec<Repair>;

    /// Qualifying phrases the caller may choose from for constraint repairs.
    fn constraint_phrases(&self) -> &[&str];
}
