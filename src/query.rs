//! Phi-QL: the four fixed query kinds over stored entities.
//!
//! - `WHY`: support set, provenance tree and a one-line explanation
//! - `COUNTEREX`: existing objections plus freshly generated counterexamples
//! - `REPAIR`: repair proposals for failing gates and strong objections
//! - `TRACE`: provenance chain, related entities, timeline and runs
//!
//! Reads of the queried entity are authoritative; every other lookup and
//! every write is best-effort and only logged on failure.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::{Analyzer, CounterexampleCue};
use crate::entity::{
    AttackType, Axiom, Claim, Concept, Entity, EntityId, EntityKind, GateId, GeneratedEntity,
    NewObjection, NewProvenance, NewScenario, Objection, Priority, ProvenanceMetadata,
    ProvenanceRecord, RepairParameters, Run, Scenario, Thesis,
};
use crate::error::QueryError;
use crate::provenance::{self, ProvenanceGraph, ProvenanceTree, TimelineEvent};
use crate::store::EntityStore;

/// Result type for query operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Objections above this strength get an explicit response in REPAIR.
pub const STRONG_OBJECTION: f64 = 0.6;
/// Upper bound on records gathered for a transitive provenance view.
pub const MAX_LINEAGE_RECORDS: usize = 256;
/// Objection text quoted in a repair description.
const QUOTED_OBJECTION_CHARS: usize = 100;
/// Domain given to persisted repair scenarios.
pub const REPAIR_DOMAIN: &str = "repair";

// ---------------------------------------------------------------------------
// Query kinds and parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Why,
    Counterex,
    Repair,
    Trace,
}

impl QueryType {
    /// Case-insensitive parse of a query kind.
    pub fn parse(raw: &str) -> QueryResult<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WHY" => Ok(Self::Why),
            "COUNTEREX" => Ok(Self::Counterex),
            "REPAIR" => Ok(Self::Repair),
            "TRACE" => Ok(Self::Trace),
            _ => Err(QueryError::UnknownQueryType {
                query_type: raw.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Why => "WHY",
            QueryType::Counterex => "COUNTEREX",
            QueryType::Repair => "REPAIR",
            QueryType::Trace => "TRACE",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional knobs accepted by every query kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameters {
    /// COUNTEREX: cap on newly generated counterexamples.
    pub max_new: Option<usize>,
    /// REPAIR: how many repairs to persist as scenarios.
    pub max_scenarios: Option<usize>,
    /// WHY/TRACE: follow provenance transitively instead of one hop.
    pub transitive: bool,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportSet {
    pub premises: Vec<Claim>,
    pub axioms: Vec<Axiom>,
    pub concepts: Vec<Concept>,
    /// Normative commitments. Nothing records norms yet, so always empty.
    pub norms: Vec<String>,
}

impl SupportSet {
    fn is_empty(&self) -> bool {
        self.premises.is_empty() && self.axioms.is_empty() && self.concepts.is_empty()
    }
}

/// Transitive provenance of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    /// Every ancestor, nearest first.
    pub ancestry: Vec<EntityId>,
    pub depth: usize,
    pub records: Vec<ProvenanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhyResult {
    pub entity: Entity,
    pub support_set: SupportSet,
    pub provenance_tree: ProvenanceTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Lineage>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterexResult {
    pub entity: Entity,
    pub existing_objections: Vec<Objection>,
    pub new_counterexamples: Vec<CounterexampleCue>,
    pub total_count: usize,
}

/// A gate recorded as failed on a thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateFailure {
    pub gate: GateId,
    pub issue: String,
}

/// A repair proposal produced by REPAIR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairProposal {
    #[serde(rename = "type")]
    pub repair_type: String,
    pub description: String,
    pub parameters: RepairParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairResult {
    pub entity: Entity,
    pub objections_addressed: usize,
    pub gate_failures: Vec<GateFailure>,
    pub repairs: Vec<RepairProposal>,
    pub repair_scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntities {
    pub objections: Vec<Objection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<GeneratedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub total_events: usize,
    pub provenance_depth: usize,
    pub creation_date: DateTime<Utc>,
    pub latest_activity: DateTime<Utc>,
    /// `was_attributed_to` of each provenance record, joined with `→`.
    pub validation_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub entity: Entity,
    pub provenance_chain: Vec<ProvenanceRecord>,
    pub related_entities: RelatedEntities,
    pub validation_timeline: Vec<TimelineEvent>,
    pub experiment_runs: Vec<Run>,
    pub trace_summary: TraceSummary,
}

/// Result of any query kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Why(WhyResult),
    Counterex(CounterexResult),
    Repair(RepairResult),
    Trace(TraceResult),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Resolves Phi-QL queries against a store.
pub struct QueryEngine<'a> {
    store: &'a dyn EntityStore,
    analyzer: &'a dyn Analyzer,
    max_repair_scenarios: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        analyzer: &'a dyn Analyzer,
        max_repair_scenarios: usize,
    ) -> Self {
        Self {
            store,
            analyzer,
            max_repair_scenarios,
        }
    }

    /// Parse the raw query and entity kinds, then dispatch.
    pub fn run(
        &self,
        query_type: &str,
        entity_type: &str,
        entity_id: &EntityId,
        parameters: &QueryParameters,
    ) -> QueryResult<(QueryType, QueryOutput)> {
        for (field, value) in [
            ("query_type", query_type),
            ("entity_type", entity_type),
            ("entity_id", entity_id.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(QueryError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        let query_type = QueryType::parse(query_type)?;
        let kind = EntityKind::parse(entity_type).ok_or_else(|| QueryError::UnknownEntityType {
            entity_type: entity_type.to_string(),
        })?;
        let entity = self.load(kind, entity_id)?;
        tracing::info!(query = %query_type, entity_type = %kind, entity_id = %entity_id, "phi-ql query");

        let output = match query_type {
            QueryType::Why => QueryOutput::Why(self.why(entity, parameters)),
            QueryType::Counterex => QueryOutput::Counterex(self.counterex(entity, parameters)?),
            QueryType::Repair => QueryOutput::Repair(self.repair(entity, parameters)?),
            QueryType::Trace => QueryOutput::Trace(self.trace(entity, parameters)?),
        };
        Ok((query_type, output))
    }

    /// Load an entity or fail with `EntityNotFound`.
    pub fn load(&self, kind: EntityKind, id: &EntityId) -> QueryResult<Entity> {
        let found = match kind {
            EntityKind::Thesis => self.store.get_thesis(id)?.map(Entity::Thesis),
            EntityKind::Argument => self.store.get_argument(id)?.map(Entity::Argument),
            EntityKind::Claim => self.store.get_claim(id)?.map(Entity::Claim),
        };
        found.ok_or_else(|| QueryError::EntityNotFound {
            entity_type: kind.to_string(),
            entity_id: id.to_string(),
        })
    }

    // -- WHY ----------------------------------------------------------------

    pub fn why(&self, entity: Entity, parameters: &QueryParameters) -> WhyResult {
        let support_set = self.support_set(&entity);
        let records = self.provenance_or_empty(entity.id());
        let parents: Vec<ProvenanceRecord> = records
            .iter()
            .flat_map(|r| r.was_derived_from.iter())
            .flat_map(|source| self.provenance_or_empty(source))
            .collect();
        let provenance_tree = provenance::build_tree(&records, &parents);
        let lineage = parameters.transitive.then(|| self.lineage(entity.id()));
        let explanation = explain(&support_set);

        WhyResult {
            entity,
            support_set,
            provenance_tree,
            lineage,
            explanation,
        }
    }

    fn support_set(&self, entity: &Entity) -> SupportSet {
        let mut set = SupportSet::default();
        match entity {
            Entity::Argument(argument) => {
                set.premises = argument
                    .premises
                    .iter()
                    .filter_map(|id| self.lookup("premise", id, |id| self.store.get_claim(id)))
                    .collect();
            }
            Entity::Thesis(thesis) => {
                if let Some(axiom_id) = &thesis.related_axiom_id {
                    set.axioms = self
                        .lookup("axiom", axiom_id, |id| self.store.get_axiom(id))
                        .into_iter()
                        .collect();
                }
            }
            Entity::Claim(claim) => {
                set.concepts = claim
                    .source_concepts
                    .iter()
                    .filter_map(|id| self.lookup("concept", id, |id| self.store.get_concept(id)))
                    .collect();
            }
        }
        set
    }

    fn lineage(&self, entity_id: &EntityId) -> Lineage {
        let records = match provenance::collect_lineage(self.store, entity_id, MAX_LINEAGE_RECORDS) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(entity_id = %entity_id, error = %e, "lineage lookup failed");
                Vec::new()
            }
        };
        let graph = ProvenanceGraph::from_records(records.iter());
        Lineage {
            ancestry: graph.ancestry(entity_id),
            depth: graph.depth(entity_id),
            records,
        }
    }

    // -- COUNTEREX ----------------------------------------------------------

    pub fn counterex(
        &self,
        entity: Entity,
        parameters: &QueryParameters,
    ) -> QueryResult<CounterexResult> {
        let existing_objections = self.store.objections_for(entity.id())?;
        let mut new_counterexamples = self.analyzer.counterexamples(entity.statement());
        if let Some(max_new) = parameters.max_new {
            new_counterexamples.truncate(max_new);
        }

        for cue in &new_counterexamples {
            let created = self.store.create_objection(NewObjection {
                target_type: entity.kind(),
                target_id: entity.id().clone(),
                statement: cue.objection.clone(),
                attack_type: AttackType::Counterexample,
                strength: cue.strength,
            });
            match created {
                Ok(objection) => self.record_artifact(
                    "objection",
                    &objection.id,
                    QueryType::Counterex,
                    entity.id(),
                    "phi-ql-counterex",
                ),
                Err(e) => {
                    tracing::warn!(entity_id = %entity.id(), error = %e, "failed to persist counterexample")
                }
            }
        }

        Ok(CounterexResult {
            total_count: existing_objections.len() + new_counterexamples.len(),
            entity,
            existing_objections,
            new_counterexamples,
        })
    }

    // -- REPAIR -------------------------------------------------------------

    pub fn repair(&self, entity: Entity, parameters: &QueryParameters) -> QueryResult<RepairResult> {
        let objections = self.store.objections_for(entity.id())?;
        let gate_failures = match &entity {
            Entity::Thesis(thesis) => gate_failures(thesis),
            _ => Vec::new(),
        };

        let mut repairs: Vec<RepairProposal> =
            gate_failures.iter().map(|f| gate_repair(f.gate)).collect();
        repairs.extend(
            objections
                .iter()
                .filter(|o| o.strength > STRONG_OBJECTION)
                .map(objection_response),
        );

        let related_thesis = match &entity {
            Entity::Thesis(thesis) => Some(thesis.id.clone()),
            _ => None,
        };
        let max_scenarios = parameters.max_scenarios.unwrap_or(self.max_repair_scenarios);
        let mut repair_scenarios = Vec::new();
        for repair in repairs.iter().take(max_scenarios) {
            let created = self.store.create_scenario(NewScenario {
                description: repair.description.clone(),
                parameters: repair.parameters.clone(),
                domain: REPAIR_DOMAIN.to_string(),
                related_thesis: related_thesis.clone(),
            });
            match created {
                Ok(scenario) => {
                    self.record_artifact(
                        "scenario",
                        &scenario.id,
                        QueryType::Repair,
                        entity.id(),
                        "phi-ql-repair",
                    );
                    repair_scenarios.push(scenario);
                }
                Err(e) => {
                    tracing::warn!(entity_id = %entity.id(), error = %e, "failed to persist repair scenario")
                }
            }
        }

        Ok(RepairResult {
            entity,
            objections_addressed: objections.len(),
            gate_failures,
            repairs,
            repair_scenarios,
        })
    }

    // -- TRACE --------------------------------------------------------------

    pub fn trace(&self, entity: Entity, parameters: &QueryParameters) -> QueryResult<TraceResult> {
        let (provenance_chain, provenance_depth) = if parameters.transitive {
            let lineage = self.lineage(entity.id());
            (lineage.records, lineage.depth)
        } else {
            let records = self.store.provenance_for(entity.id())?;
            let depth = records.len();
            (records, depth)
        };

        let objections = match self.store.objections_for(entity.id()) {
            Ok(objections) => objections,
            Err(e) => {
                tracing::warn!(entity_id = %entity.id(), error = %e, "objection lookup failed");
                Vec::new()
            }
        };
        let rpe = match &entity {
            Entity::Thesis(thesis) => thesis.related_rpe_id.as_ref().and_then(|id| {
                self.lookup("generated entity", id, |id| self.store.get_generated_entity(id))
            }),
            _ => None,
        };
        let experiment_runs = match self.store.runs_for_thesis(entity.id()) {
            Ok(runs) => runs,
            Err(e) => {
                tracing::warn!(entity_id = %entity.id(), error = %e, "run lookup failed");
                Vec::new()
            }
        };

        let direct: Vec<ProvenanceRecord> = provenance_chain
            .iter()
            .filter(|r| &r.entity_id == entity.id())
            .cloned()
            .collect();
        let validation_timeline = provenance::validation_timeline(&entity, &direct, &objections);
        let trace_summary = TraceSummary {
            total_events: validation_timeline.len(),
            provenance_depth,
            creation_date: entity.created_at(),
            latest_activity: validation_timeline
                .last()
                .map_or(entity.created_at(), |e| e.timestamp),
            validation_path: provenance_chain
                .iter()
                .map(|r| r.was_attributed_to.as_str())
                .collect::<Vec<_>>()
                .join(" → "),
        };

        Ok(TraceResult {
            entity,
            provenance_chain,
            related_entities: RelatedEntities { objections, rpe },
            validation_timeline,
            experiment_runs,
            trace_summary,
        })
    }

    // -- helpers ------------------------------------------------------------

    fn provenance_or_empty(&self, id: &EntityId) -> Vec<ProvenanceRecord> {
        match self.store.provenance_for(id) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(entity_id = %id, error = %e, "provenance lookup failed");
                Vec::new()
            }
        }
    }

    fn lookup<T>(
        &self,
        what: &str,
        id: &EntityId,
        fetch: impl FnOnce(&EntityId) -> crate::store::StoreResult<Option<T>>,
    ) -> Option<T> {
        match fetch(id) {
            Ok(found) => {
                if found.is_none() {
                    tracing::debug!(id = %id, "{what} not found");
                }
                found
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "{what} lookup failed");
                None
            }
        }
    }

    fn record_artifact(
        &self,
        entity_type: &str,
        artifact_id: &EntityId,
        query_type: QueryType,
        source: &EntityId,
        attributed_to: &str,
    ) {
        let result = self.store.create_provenance(NewProvenance {
            entity_type: entity_type.to_string(),
            entity_id: artifact_id.clone(),
            was_generated_by: None,
            was_derived_from: vec![source.clone()],
            was_attributed_to: attributed_to.to_string(),
            metadata: ProvenanceMetadata::QueryArtifact {
                query_type: query_type.to_string(),
                source_entity: source.clone(),
            },
        });
        if let Err(e) = result {
            tracing::warn!(artifact_id = %artifact_id, error = %e, "failed to record query provenance");
        }
    }
}

impl fmt::Debug for QueryEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("analyzer", &self.analyzer.name())
            .field("max_repair_scenarios", &self.max_repair_scenarios)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// One-line summary of what supports an entity.
pub fn explain(support: &SupportSet) -> String {
    if support.is_empty() {
        return "This entity is a root assertion without explicit support".to_string();
    }
    let mut parts = Vec::new();
    if !support.premises.is_empty() {
        parts.push(format!("Based on {} premises", support.premises.len()));
    }
    if !support.axioms.is_empty() {
        parts.push(format!(
            "grounded in {} foundational axiom(s)",
            support.axioms.len()
        ));
    }
    if !support.concepts.is_empty() {
        parts.push(format!("using {} key concept(s)", support.concepts.len()));
    }
    parts.join(", ")
}

/// Gates with an explicit failing result. Unevaluated gates are not failures.
pub fn gate_failures(thesis: &Thesis) -> Vec<GateFailure> {
    thesis
        .failing_gates()
        .into_iter()
        .map(|gate| GateFailure {
            gate,
            issue: gate_issue(gate).to_string(),
        })
        .collect()
}

fn gate_issue(gate: GateId) -> &'static str {
    match gate {
        GateId::G1 => "Vocabulary consistency failure",
        GateId::G2 => "Formalization incomplete",
        GateId::G3 => "Proof soundness issue",
        GateId::G4 => "Strong counterexamples exist",
        GateId::G5 => "Too many unresolved issues",
        GateId::G6 => "Axiom coherence low",
    }
}

/// Fixed repair for a failing gate.
pub fn gate_repair(gate: GateId) -> RepairProposal {
    let (repair_type, description, action, priority) = match gate {
        GateId::G1 => (
            "vocabulary",
            "Standardize philosophical terms using approved glossary",
            "term_replacement",
            Priority::High,
        ),
        GateId::G2 => (
            "formalization",
            "Restructure claims for formal logic representation",
            "claim_restructure",
            Priority::High,
        ),
        GateId::G3 => (
            "proof",
            "Strengthen inference patterns and eliminate contradictions",
            "logic_repair",
            Priority::Critical,
        ),
        GateId::G4 => (
            "counterexample",
            "Add constraints to eliminate counterexamples",
            "scope_restriction",
            Priority::Medium,
        ),
        GateId::G5 => (
            "elaboration",
            "Expand argumentation with additional premises",
            "premise_addition",
            Priority::Medium,
        ),
        GateId::G6 => (
            "coherence",
            "Align language and concepts with foundational axioms",
            "axiom_alignment",
            Priority::High,
        ),
    };
    RepairProposal {
        repair_type: repair_type.to_string(),
        description: description.to_string(),
        parameters: RepairParameters {
            action: Some(action.to_string()),
            objection_id: None,
            priority,
        },
    }
}

fn objection_response(objection: &Objection) -> RepairProposal {
    let quoted: String = objection
        .statement
        .chars()
        .take(QUOTED_OBJECTION_CHARS)
        .collect();
    RepairProposal {
        repair_type: "objection_response".to_string(),
        description: format!("Address {}: {quoted}", objection.attack_type),
        parameters: RepairParameters {
            action: None,
            objection_id: Some(objection.id.clone()),
            priority: Priority::High,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::HeuristicAnalyzer;
    use crate::entity::{NewClaim, NewThesis, ThesisStatus};
    use crate::store::Store;

    fn thesis(store: &Store, statement: &str) -> Thesis {
        store
            .create_thesis(NewThesis {
                statement: statement.into(),
                domain: "nihiltheism".into(),
                status: ThesisStatus::Unverified,
                related_rpe_id: None,
                related_axiom_id: None,
            })
            .unwrap()
    }

    #[test]
    fn query_type_parse_is_case_insensitive() {
        assert_eq!(QueryType::parse("why").unwrap(), QueryType::Why);
        assert_eq!(QueryType::parse("Trace").unwrap(), QueryType::Trace);
        let err = QueryType::parse("EXPLAIN").unwrap_err();
        assert_eq!(err.to_string(), "Unknown query type: EXPLAIN");
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let err = engine
            .run("WHY", "axiom", &"a1".into(), &QueryParameters::default())
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownEntityType { .. }));
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let params = QueryParameters::default();

        let err = engine.run("WHY", "thesis", &"".into(), &params).unwrap_err();
        assert!(matches!(&err, QueryError::MissingField { field } if field == "entity_id"));
        assert_eq!(err.to_string(), "missing required field: entity_id");

        let err = engine.run(" ", "thesis", &"t1".into(), &params).unwrap_err();
        assert!(matches!(&err, QueryError::MissingField { field } if field == "query_type"));

        let err = engine.run("WHY", "", &"t1".into(), &params).unwrap_err();
        assert!(matches!(&err, QueryError::MissingField { field } if field == "entity_type"));
        assert_eq!(
            crate::error::PiveError::from(err).kind(),
            crate::error::ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn missing_entity_is_not_found() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let err = engine
            .run("TRACE", "thesis", &"nope".into(), &QueryParameters::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Entity not found: thesis/nope");
    }

    #[test]
    fn why_on_unsupported_claim_is_root_assertion() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let claim = store
            .create_claim(NewClaim {
                statement: "Being precedes essence".into(),
                formal_representation: "P_BPE(being, precedes, essence)".into(),
                domain: "nihiltheism".into(),
                source_concepts: vec![],
            })
            .unwrap();
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let (_, output) = engine
            .run("WHY", "claim", &claim.id, &QueryParameters::default())
            .unwrap();
        let QueryOutput::Why(why) = output else {
            panic!("expected WHY output");
        };
        assert_eq!(
            why.explanation,
            "This entity is a root assertion without explicit support"
        );
        assert!(why.support_set.concepts.is_empty());
        assert!(why.lineage.is_none());
    }

    #[test]
    fn counterex_caps_and_accumulates() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let t = thesis(&store, "When tested, all beings must decay because entropy is essential");
        let engine = QueryEngine::new(&store, &analyzer, 3);

        let capped = QueryParameters {
            max_new: Some(2),
            ..Default::default()
        };
        let first = engine.counterex(Entity::Thesis(t.clone()), &capped).unwrap();
        assert_eq!(first.new_counterexamples.len(), 2);
        assert_eq!(first.total_count, 2);

        let second = engine
            .counterex(Entity::Thesis(t.clone()), &QueryParameters::default())
            .unwrap();
        assert_eq!(second.existing_objections.len(), 2);
        assert_eq!(second.total_count, 6);
    }

    #[test]
    fn repair_on_unevaluated_thesis_has_no_gate_failures() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let t = thesis(&store, "Nothing is certain");
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let result = engine
            .repair(Entity::Thesis(t), &QueryParameters::default())
            .unwrap();
        assert!(result.gate_failures.is_empty());
        assert!(result.repairs.is_empty());
        assert!(result.repair_scenarios.is_empty());
    }

    #[test]
    fn strong_objections_get_responses() {
        let store = Store::memory_only();
        let analyzer = HeuristicAnalyzer::default();
        let t = thesis(&store, "All is void");
        let long = "x".repeat(150);
        for (strength, text) in [(0.9, long.as_str()), (0.3, "weak")] {
            store
                .create_objection(NewObjection {
                    target_type: EntityKind::Thesis,
                    target_id: t.id.clone(),
                    statement: text.into(),
                    attack_type: AttackType::ScopeChallenge,
                    strength,
                })
                .unwrap();
        }
        let engine = QueryEngine::new(&store, &analyzer, 3);
        let result = engine
            .repair(Entity::Thesis(t.clone()), &QueryParameters::default())
            .unwrap();
        assert_eq!(result.objections_addressed, 2);
        assert_eq!(result.repairs.len(), 1);
        assert_eq!(
            result.repairs[0].description,
            format!("Address scope_challenge: {}", "x".repeat(100))
        );
        assert_eq!(result.repair_scenarios.len(), 1);
        assert_eq!(result.repair_scenarios[0].domain, REPAIR_DOMAIN);
        assert_eq!(store.scenarios_for_thesis(&t.id).unwrap().len(), 1);
    }

    #[test]
    fn explanation_lists_contributors() {
        let mut support = SupportSet::default();
        assert!(explain(&support).starts_with("This entity is a root assertion"));
        support.norms.push("ignored".into());
        assert!(explain(&support).starts_with("This entity is a root assertion"));
    }

    #[test]
    fn gate_repair_table() {
        let r = gate_repair(GateId::G3);
        assert_eq!(r.repair_type, "proof");
        assert_eq!(r.parameters.action.as_deref(), Some("logic_repair"));
        assert_eq!(r.parameters.priority, Priority::Critical);
    }
}
