//! Entity store: the single persistence seam of the engine.
//!
//! Every component depends only on the [`EntityStore`] trait. The provided
//! implementation, [`Store`], composes two tiers:
//!
//! - [`MemStore`](mem::MemStore): hot records in a concurrent hashmap (DashMap)
//! - [`DurableStore`](durable::DurableStore): ACID persistence (redb), optional
//!
//! Records are JSON-encoded under `collection/id` keys.

pub mod durable;
pub mod mem;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entity::{
    Argument, Axiom, Claim, Concept, EntityId, GateId, GateResult, GeneratedEntity, NewArgument,
    NewClaim, NewObjection, NewProvenance, NewScenario, NewThesis, Objection, ProvenanceRecord,
    Run, RunParameters, RunResults, RunStatus, Scenario, Thesis, ThesisFilter, ThesisStatus,
    VocabularyTerm,
};
use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Typed access to every persisted entity.
///
/// Reads must reflect prior writes from the same process. Absent records are
/// `Ok(None)`; write failures are `Err`, so the two are always distinguishable.
pub trait EntityStore: Send + Sync {
    fn create_thesis(&self, new: NewThesis) -> StoreResult<Thesis>;
    fn get_thesis(&self, id: &EntityId) -> StoreResult<Option<Thesis>>;
    /// Replace the status and gate results of a thesis, the only mutable fields.
    fn record_validation(
        &self,
        id: &EntityId,
        status: ThesisStatus,
        gate_results: BTreeMap<GateId, GateResult>,
    ) -> StoreResult<Thesis>;
    /// Theses matching the filter, newest first.
    fn list_theses(&self, filter: &ThesisFilter) -> StoreResult<Vec<Thesis>>;

    fn create_objection(&self, new: NewObjection) -> StoreResult<Objection>;
    /// Objections against a target, oldest first.
    fn objections_for(&self, target_id: &EntityId) -> StoreResult<Vec<Objection>>;

    fn create_scenario(&self, new: NewScenario) -> StoreResult<Scenario>;
    fn scenarios_for_thesis(&self, thesis_id: &EntityId) -> StoreResult<Vec<Scenario>>;

    fn create_provenance(&self, new: NewProvenance) -> StoreResult<ProvenanceRecord>;
    /// Provenance records describing `entity_id`, oldest first.
    fn provenance_for(&self, entity_id: &EntityId) -> StoreResult<Vec<ProvenanceRecord>>;

    fn create_run(&self, experiment_type: &str, params: RunParameters) -> StoreResult<Run>;
    fn finish_run(
        &self,
        id: &EntityId,
        status: RunStatus,
        results: Option<RunResults>,
    ) -> StoreResult<Run>;
    fn get_run(&self, id: &EntityId) -> StoreResult<Option<Run>>;
    fn runs_for_thesis(&self, thesis_id: &EntityId) -> StoreResult<Vec<Run>>;

    fn create_claim(&self, new: NewClaim) -> StoreResult<Claim>;
    fn get_claim(&self, id: &EntityId) -> StoreResult<Option<Claim>>;
    fn create_argument(&self, new: NewArgument) -> StoreResult<Argument>;
    fn get_argument(&self, id: &EntityId) -> StoreResult<Option<Argument>>;

    fn put_concept(&self, concept: Concept) -> StoreResult<()>;
    fn get_concept(&self, id: &EntityId) -> StoreResult<Option<Concept>>;
    fn put_axiom(&self, axiom: Axiom) -> StoreResult<()>;
    fn get_axiom(&self, id: &EntityId) -> StoreResult<Option<Axiom>>;
    fn add_vocabulary_term(&self, term: VocabularyTerm) -> StoreResult<()>;
    fn vocabulary(&self) -> StoreResult<Vec<VocabularyTerm>>;
    fn put_generated_entity(&self, entity: GeneratedEntity) -> StoreResult<()>;
    fn get_generated_entity(&self, id: &EntityId) -> StoreResult<Option<GeneratedEntity>>;
}

/// Explicit store configuration, passed in at construction.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StoreConfig {
    /// Data directory for the redb tier. `None` keeps everything in memory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Logical record collections; each maps to a key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Thesis,
    Objection,
    Scenario,
    Provenance,
    Run,
    Claim,
    Argument,
    Concept,
    Axiom,
    Vocabulary,
    GeneratedEntity,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Collection::Thesis => "thesis",
            Collection::Objection => "objection",
            Collection::Scenario => "scenario",
            Collection::Provenance => "provenance",
            Collection::Run => "run",
            Collection::Claim => "claim",
            Collection::Argument => "argument",
            Collection::Concept => "concept",
            Collection::Axiom => "axiom",
            Collection::Vocabulary => "vocabulary",
            Collection::GeneratedEntity => "rpe",
        }
    }

    fn prefix(self) -> String {
        format!("{}/", self.name())
    }

    fn key(self, id: &str) -> Vec<u8> {
        format!("{}/{id}", self.name()).into_bytes()
    }
}

/// Two-tier entity store: hot (mem) in front of optional durable (redb).
///
/// Writes go to the durable tier first, then the hot tier, so a failed
/// durable write never leaves a phantom record in memory.
pub struct Store {
    hot: mem::MemStore,
    durable: Option<durable::DurableStore>,
}

impl Store {
    /// Create a memory-only store (no persistence).
    pub fn memory_only() -> Self {
        Self {
            hot: mem::MemStore::new(),
            durable: None,
        }
    }

    /// Open a store according to `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        match &config.data_dir {
            Some(dir) => {
                let durable = durable::DurableStore::open(dir)?;
                tracing::info!(data_dir = %dir.display(), "opened durable entity store");
                Ok(Self {
                    hot: mem::MemStore::new(),
                    durable: Some(durable),
                })
            }
            None => Ok(Self::memory_only()),
        }
    }

    /// Whether records survive process exit.
    pub fn is_persistent(&self) -> bool {
        self.durable.is_some()
    }

    fn insert<T: Serialize>(&self, collection: Collection, id: &str, value: &T) -> StoreResult<()> {
        let encoded = serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
            message: format!("failed to encode {} {id}: {e}", collection.name()),
        })?;
        let key = collection.key(id);
        if let Some(durable) = &self.durable {
            durable.put(&key, &encoded)?;
        }
        self.hot.put(&key, encoded);
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StoreResult<Option<T>> {
        let key = collection.key(id);
        let bytes = match self.hot.get(&key) {
            Some(bytes) => Some(bytes),
            None => match &self.durable {
                Some(durable) => {
                    let found = durable.get(&key)?;
                    if let Some(bytes) = &found {
                        // Promote to hot on read
                        self.hot.put(&key, bytes.clone());
                    }
                    found
                }
                None => None,
            },
        };
        bytes.map(|b| decode(collection, &b)).transpose()
    }

    fn scan<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<Vec<T>> {
        let prefix = collection.prefix();
        let entries = match &self.durable {
            Some(durable) => durable.scan_prefix(prefix.as_bytes())?,
            None => self.hot.scan_prefix(prefix.as_bytes()),
        };
        entries
            .iter()
            .map(|(_, value)| decode(collection, value))
            .collect()
    }

    fn require<T: DeserializeOwned>(&self, collection: Collection, id: &EntityId) -> StoreResult<T> {
        self.fetch(collection, id.as_str())?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.name().to_string(),
                id: id.to_string(),
            })
    }
}

fn decode<T: DeserializeOwned>(collection: Collection, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to decode {} record: {e}", collection.name()),
    })
}

impl EntityStore for Store {
    fn create_thesis(&self, new: NewThesis) -> StoreResult<Thesis> {
        let thesis = Thesis {
            id: EntityId::generate(),
            statement: new.statement,
            domain: new.domain,
            status: new.status,
            gate_results: BTreeMap::new(),
            related_rpe_id: new.related_rpe_id,
            related_axiom_id: new.related_axiom_id,
            created_at: Utc::now(),
        };
        self.insert(Collection::Thesis, thesis.id.as_str(), &thesis)?;
        Ok(thesis)
    }

    fn get_thesis(&self, id: &EntityId) -> StoreResult<Option<Thesis>> {
        self.fetch(Collection::Thesis, id.as_str())
    }

    fn record_validation(
        &self,
        id: &EntityId,
        status: ThesisStatus,
        gate_results: BTreeMap<GateId, GateResult>,
    ) -> StoreResult<Thesis> {
        let mut thesis: Thesis = self.require(Collection::Thesis, id)?;
        thesis.status = status;
        thesis.gate_results = gate_results;
        self.insert(Collection::Thesis, id.as_str(), &thesis)?;
        Ok(thesis)
    }

    fn list_theses(&self, filter: &ThesisFilter) -> StoreResult<Vec<Thesis>> {
        let mut theses: Vec<Thesis> = self
            .scan::<Thesis>(Collection::Thesis)?
            .into_iter()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.domain.as_deref().is_none_or(|d| t.domain == d))
            .collect();
        theses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            theses.truncate(limit);
        }
        Ok(theses)
    }

    fn create_objection(&self, new: NewObjection) -> StoreResult<Objection> {
        let objection = Objection {
            id: EntityId::generate(),
            target_type: new.target_type,
            target_id: new.target_id,
            statement: new.statement,
            attack_type: new.attack_type,
            strength: new.strength.clamp(0.0, 1.0),
            created_at: Utc::now(),
        };
        self.insert(Collection::Objection, objection.id.as_str(), &objection)?;
        Ok(objection)
    }

    fn objections_for(&self, target_id: &EntityId) -> StoreResult<Vec<Objection>> {
        let mut objections: Vec<Objection> = self
            .scan::<Objection>(Collection::Objection)?
            .into_iter()
            .filter(|o| &o.target_id == target_id)
            .collect();
        objections.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(objections)
    }

    fn create_scenario(&self, new: NewScenario) -> StoreResult<Scenario> {
        let scenario = Scenario {
            id: EntityId::generate(),
            description: new.description,
            parameters: new.parameters,
            domain: new.domain,
            related_thesis: new.related_thesis,
            created_at: Utc::now(),
        };
        self.insert(Collection::Scenario, scenario.id.as_str(), &scenario)?;
        Ok(scenario)
    }

    fn scenarios_for_thesis(&self, thesis_id: &EntityId) -> StoreResult<Vec<Scenario>> {
        let mut scenarios: Vec<Scenario> = self
            .scan::<Scenario>(Collection::Scenario)?
            .into_iter()
            .filter(|s| s.related_thesis.as_ref() == Some(thesis_id))
            .collect();
        scenarios.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(scenarios)
    }

    fn create_provenance(&self, new: NewProvenance) -> StoreResult<ProvenanceRecord> {
        let self_referencing = new.was_derived_from.contains(&new.entity_id)
            || new.was_generated_by.as_ref() == Some(&new.entity_id);
        if self_referencing {
            return Err(StoreError::SelfReference {
                entity_id: new.entity_id.to_string(),
            });
        }
        let record = ProvenanceRecord {
            id: EntityId::generate(),
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            was_generated_by: new.was_generated_by,
            was_derived_from: new.was_derived_from,
            was_attributed_to: new.was_attributed_to,
            metadata: new.metadata,
            generated_at: Utc::now(),
        };
        self.insert(Collection::Provenance, record.id.as_str(), &record)?;
        Ok(record)
    }

    fn provenance_for(&self, entity_id: &EntityId) -> StoreResult<Vec<ProvenanceRecord>> {
        let mut records: Vec<ProvenanceRecord> = self
            .scan::<ProvenanceRecord>(Collection::Provenance)?
            .into_iter()
            .filter(|p| &p.entity_id == entity_id)
            .collect();
        records.sort_by(|a, b| a.generated_at.cmp(&b.generated_at));
        Ok(records)
    }

    fn create_run(&self, experiment_type: &str, params: RunParameters) -> StoreResult<Run> {
        let run = Run {
            id: EntityId::generate(),
            experiment_type: experiment_type.to_string(),
            input_parameters: params,
            status: RunStatus::Running,
            results: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.insert(Collection::Run, run.id.as_str(), &run)?;
        Ok(run)
    }

    fn finish_run(
        &self,
        id: &EntityId,
        status: RunStatus,
        results: Option<RunResults>,
    ) -> StoreResult<Run> {
        let mut run: Run = self.require(Collection::Run, id)?;
        if run.status != RunStatus::Running || status == RunStatus::Running {
            return Err(StoreError::RunFinished {
                id: id.to_string(),
                status: format!("{:?}", run.status).to_lowercase(),
            });
        }
        run.status = status;
        run.results = results;
        run.completed_at = Some(Utc::now());
        self.insert(Collection::Run, id.as_str(), &run)?;
        Ok(run)
    }

    fn get_run(&self, id: &EntityId) -> StoreResult<Option<Run>> {
        self.fetch(Collection::Run, id.as_str())
    }

    fn runs_for_thesis(&self, thesis_id: &EntityId) -> StoreResult<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .scan::<Run>(Collection::Run)?
            .into_iter()
            .filter(|r| &r.input_parameters.thesis_id == thesis_id)
            .collect();
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(runs)
    }

    fn create_claim(&self, new: NewClaim) -> StoreResult<Claim> {
        let claim = Claim {
            id: EntityId::generate(),
            statement: new.statement,
            formal_representation: new.formal_representation,
            domain: new.domain,
            source_concepts: new.source_concepts,
            created_at: Utc::now(),
        };
        self.insert(Collection::Claim, claim.id.as_str(), &claim)?;
        Ok(claim)
    }

    fn get_claim(&self, id: &EntityId) -> StoreResult<Option<Claim>> {
        self.fetch(Collection::Claim, id.as_str())
    }

    fn create_argument(&self, new: NewArgument) -> StoreResult<Argument> {
        let argument = Argument {
            id: EntityId::generate(),
            structure_type: new.structure_type,
            validity_status: new.validity_status,
            formal_proof: new.formal_proof,
            premises: new.premises,
            conclusion_id: new.conclusion_id,
            created_at: Utc::now(),
        };
        self.insert(Collection::Argument, argument.id.as_str(), &argument)?;
        Ok(argument)
    }

    fn get_argument(&self, id: &EntityId) -> StoreResult<Option<Argument>> {
        self.fetch(Collection::Argument, id.as_str())
    }

    fn put_concept(&self, concept: Concept) -> StoreResult<()> {
        self.insert(Collection::Concept, concept.id.as_str(), &concept)
    }

    fn get_concept(&self, id: &EntityId) -> StoreResult<Option<Concept>> {
        self.fetch(Collection::Concept, id.as_str())
    }

    fn put_axiom(&self, axiom: Axiom) -> StoreResult<()> {
        self.insert(Collection::Axiom, axiom.id.as_str(), &axiom)
    }

    fn get_axiom(&self, id: &EntityId) -> StoreResult<Option<Axiom>> {
        self.fetch(Collection::Axiom, id.as_str())
    }

    fn add_vocabulary_term(&self, term: VocabularyTerm) -> StoreResult<()> {
        let key = term.term.to_lowercase();
        self.insert(Collection::Vocabulary, &key, &term)
    }

    fn vocabulary(&self) -> StoreResult<Vec<VocabularyTerm>> {
        self.scan(Collection::Vocabulary)
    }

    fn put_generated_entity(&self, entity: GeneratedEntity) -> StoreResult<()> {
        self.insert(Collection::GeneratedEntity, entity.id.as_str(), &entity)
    }

    fn get_generated_entity(&self, id: &EntityId) -> StoreResult<Option<GeneratedEntity>> {
        self.fetch(Collection::GeneratedEntity, id.as_str())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("hot_entries", &self.hot.len())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttackType, EntityKind, ProvenanceMetadata};

    fn new_thesis(statement: &str, domain: &str) -> NewThesis {
        NewThesis {
            statement: statement.into(),
            domain: domain.into(),
            status: ThesisStatus::Unverified,
            related_rpe_id: None,
            related_axiom_id: None,
        }
    }

    #[test]
    fn thesis_round_trip_memory_only() {
        let store = Store::memory_only();
        let thesis = store.create_thesis(new_thesis("Being precedes essence.", "ontology")).unwrap();
        let loaded = store.get_thesis(&thesis.id).unwrap().unwrap();
        assert_eq!(loaded, thesis);
        assert!(store.get_thesis(&EntityId::from("missing")).unwrap().is_none());
    }

    #[test]
    fn record_validation_on_missing_thesis_is_not_found() {
        let store = Store::memory_only();
        let err = store
            .record_validation(&EntityId::from("nope"), ThesisStatus::Rejected, BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn list_theses_filters_and_limits() {
        let store = Store::memory_only();
        store.create_thesis(new_thesis("a", "ethics")).unwrap();
        store.create_thesis(new_thesis("b", "ontology")).unwrap();
        store.create_thesis(new_thesis("c", "ethics")).unwrap();

        let ethics = store
            .list_theses(&ThesisFilter {
                domain: Some("ethics".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ethics.len(), 2);

        let limited = store
            .list_theses(&ThesisFilter {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn objections_are_scoped_to_target() {
        let store = Store::memory_only();
        let target = EntityId::from("t-1");
        for strength in [0.2, 1.4] {
            store
                .create_objection(NewObjection {
                    target_type: EntityKind::Thesis,
                    target_id: target.clone(),
                    statement: "edge case".into(),
                    attack_type: AttackType::Counterexample,
                    strength,
                })
                .unwrap();
        }
        let objections = store.objections_for(&target).unwrap();
        assert_eq!(objections.len(), 2);
        assert!(objections.iter().all(|o| (0.0..=1.0).contains(&o.strength)));
        assert!(store.objections_for(&EntityId::from("t-2")).unwrap().is_empty());
    }

    #[test]
    fn self_referencing_provenance_is_rejected() {
        let store = Store::memory_only();
        let id = EntityId::from("thesis-1");
        let err = store
            .create_provenance(NewProvenance {
                entity_type: "thesis".into(),
                entity_id: id.clone(),
                was_generated_by: None,
                was_derived_from: vec![id.clone()],
                was_attributed_to: "test".into(),
                metadata: ProvenanceMetadata::AdversarialLoop {
                    iterations_count: 0,
                    converged: false,
                },
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::SelfReference { .. }));
    }

    #[test]
    fn runs_move_to_terminal_state() {
        let store = Store::memory_only();
        let thesis_id = EntityId::from("t-9");
        let run = store
            .create_run(
                "adversarial_loop",
                RunParameters {
                    thesis_id: thesis_id.clone(),
                    max_iterations: 3,
                },
            )
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);

        let failed = store.finish_run(&run.id, RunStatus::Failed, None).unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.completed_at.is_some());
        assert_eq!(store.runs_for_thesis(&thesis_id).unwrap().len(), 1);
    }

    #[test]
    fn finished_runs_are_never_reopened() {
        let store = Store::memory_only();
        let run = store
            .create_run(
                "adversarial_loop",
                RunParameters {
                    thesis_id: EntityId::from("t-10"),
                    max_iterations: 1,
                },
            )
            .unwrap();
        store.finish_run(&run.id, RunStatus::Completed, None).unwrap();

        let err = store
            .finish_run(&run.id, RunStatus::Failed, None)
            .unwrap_err();
        assert!(matches!(&err, StoreError::RunFinished { status, .. } if status == "completed"));
        assert!(store.finish_run(&run.id, RunStatus::Running, None).is_err());
        assert_eq!(
            store.get_run(&run.id).unwrap().unwrap().status,
            RunStatus::Completed
        );
    }

    #[test]
    fn vocabulary_terms_are_keyed_case_insensitively() {
        let store = Store::memory_only();
        for term in ["Nihilism", "nihilism", "void"] {
            store
                .add_vocabulary_term(VocabularyTerm {
                    term: term.into(),
                    definition: None,
                })
                .unwrap();
        }
        assert_eq!(store.vocabulary().unwrap().len(), 2);
    }
}
