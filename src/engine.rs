//! Engine facade: top-level API for the PIVE system.
//!
//! The `Engine` owns the entity store, the analyzer and the configuration,
//! and provides the four service entry points (validate, adversarial loop,
//! query, list) plus reference-data seeding.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adversarial::{self, LoopReport};
use crate::analyzer::{Analyzer, CounterexampleCue, Formalization, HeuristicAnalyzer, InferenceCheck};
use crate::config::PiveConfig;
use crate::entity::{
    AttackType, Axiom, Concept, EntityId, EntityKind, GateId, GeneratedEntity, NewArgument,
    NewClaim, NewObjection, NewProvenance, NewThesis, ProvenanceMetadata, RunParameters,
    RunResults, RunStatus, Thesis, ThesisFilter, ThesisStatus, Validity, VocabularyTerm,
};
use crate::error::{GateError, LoopError, PiveResult};
use crate::gates::{self, GateReport, ReferenceData};
use crate::query::QueryEngine;
use crate::service::{
    ListRequest, ListResponse, ListStatistics, LoopRequest, LoopResponse, QueryRequest,
    QueryResponse, ThesisSummary, ValidateRequest, ValidateResponse, ValidationSummary,
};
use crate::store::{EntityStore, Store, StoreResult};

/// `experiment_type` of runs created by the adversarial loop.
pub const LOOP_EXPERIMENT: &str = "adversarial_loop";
/// Attribution of provenance written by [`Engine::validate`].
pub const VALIDATION_AGENT: &str = "npe-pis-validation-pipeline";
/// Attribution of provenance written by [`Engine::adversarial_loop`].
pub const LOOP_AGENT: &str = "adversarial-loop-pipeline";
/// G4 counterexamples persisted as objections per validation.
const MAX_PERSISTED_OBJECTIONS: usize = 3;

/// The PIVE validation engine.
pub struct Engine {
    config: PiveConfig,
    store: Arc<dyn EntityStore>,
    analyzer: Arc<dyn Analyzer>,
}

impl Engine {
    /// Create an engine with the stock store and heuristic analyzer.
    pub fn new(config: PiveConfig) -> PiveResult<Self> {
        config.validate()?;
        let store = Store::open(&config.store)?;
        let analyzer = HeuristicAnalyzer::new(
            config.gates.domain_term_roots.clone(),
            config.adversarial.scope_qualifier.clone(),
        );
        tracing::info!(
            persistent = store.is_persistent(),
            analyzer = analyzer.name(),
            "initializing pive engine"
        );
        Self::with_parts(config, Arc::new(store), Arc::new(analyzer))
    }

    /// Create an engine over a caller-supplied store and analyzer.
    pub fn with_parts(
        config: PiveConfig,
        store: Arc<dyn EntityStore>,
        analyzer: Arc<dyn Analyzer>,
    ) -> PiveResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            analyzer,
        })
    }

    pub fn config(&self) -> &PiveConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn EntityStore {
        &*self.store
    }

    pub fn analyzer(&self) -> &dyn Analyzer {
        &*self.analyzer
    }

    // -----------------------------------------------------------------------
    // Validate
    // -----------------------------------------------------------------------

    /// Create a thesis, run the six gates over it and record the verdict.
    pub fn validate(&self, request: ValidateRequest) -> PiveResult<ValidateResponse> {
        if request.thesis.trim().is_empty() {
            return Err(GateError::EmptyStatement.into());
        }
        let domain = request
            .domain
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.config.validation.default_domain.clone());

        let thesis = self.store.create_thesis(NewThesis {
            statement: request.thesis,
            domain,
            status: ThesisStatus::Validating,
            related_rpe_id: request.related_rpe_id,
            related_axiom_id: request.axiom_references.first().cloned(),
        })?;
        tracing::info!(thesis_id = %thesis.id, domain = %thesis.domain, "validating thesis");

        let reference = ReferenceData {
            vocabulary: self.read_vocabulary(),
            axioms: self.resolve_axioms(&request.axiom_references),
        };
        let report = gates::evaluate(&thesis.statement, &reference, &*self.analyzer);

        let claims = self.persist_claims(&thesis, report.formalizations());
        self.persist_argument(&thesis, report.inference(), claims);
        self.persist_objections(&thesis, report.counterexamples());

        let status = report.status();
        let thesis = match self
            .store
            .record_validation(&thesis.id, status, report.results.clone())
        {
            Ok(thesis) => thesis,
            Err(e) => {
                // Leave the thesis re-validatable instead of stuck in `validating`.
                best_effort(
                    "thesis status reset",
                    self.store
                        .record_validation(&thesis.id, ThesisStatus::Unverified, BTreeMap::new()),
                );
                return Err(e.into());
            }
        };
        let summary = summarize(&report);

        best_effort(
            "validation provenance",
            self.store.create_provenance(NewProvenance {
                entity_type: EntityKind::Thesis.to_string(),
                entity_id: thesis.id.clone(),
                was_generated_by: None,
                was_derived_from: thesis.related_rpe_id.iter().cloned().collect(),
                was_attributed_to: VALIDATION_AGENT.to_string(),
                metadata: ProvenanceMetadata::Validation {
                    status,
                    gates_passed: summary.gates_passed,
                    gates_total: summary.gates_total,
                },
            }),
        );

        tracing::info!(
            thesis_id = %thesis.id,
            status = %status,
            gates_passed = summary.gates_passed,
            "validation complete"
        );
        Ok(ValidateResponse {
            thesis_id: thesis.id,
            validation_status: status,
            gates: report.results,
            summary,
        })
    }

    /// Approved terms, or `None` when the vocabulary cannot be read.
    fn read_vocabulary(&self) -> Option<Vec<String>> {
        match self.store.vocabulary() {
            Ok(terms) => Some(terms.into_iter().map(|t| t.term).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "vocabulary unavailable, G1 degrades to pass");
                None
            }
        }
    }

    /// Referenced axioms that exist; the rest are skipped.
    fn resolve_axioms(&self, references: &[EntityId]) -> Vec<Axiom> {
        references
            .iter()
            .filter_map(|id| match self.store.get_axiom(id) {
                Ok(Some(axiom)) => Some(axiom),
                Ok(None) => {
                    tracing::debug!(axiom_id = %id, "axiom reference not found, skipping");
                    None
                }
                Err(e) => {
                    tracing::warn!(axiom_id = %id, error = %e, "axiom lookup failed, skipping");
                    None
                }
            })
            .collect()
    }

    /// Persist each template-matched formalization as a claim.
    fn persist_claims(&self, thesis: &Thesis, formalizations: &[Formalization]) -> Vec<EntityId> {
        formalizations
            .iter()
            .filter(|f| !f.fallback)
            .filter_map(|f| {
                best_effort(
                    "claim",
                    self.store.create_claim(NewClaim {
                        statement: f.segment.clone(),
                        formal_representation: f.logic.clone(),
                        domain: thesis.domain.clone(),
                        source_concepts: Vec::new(),
                    }),
                )
                .map(|c| c.id)
            })
            .collect()
    }

    fn persist_argument(&self, thesis: &Thesis, check: InferenceCheck, premises: Vec<EntityId>) {
        if !check.valid_inference {
            return;
        }
        let validity_status = if check.has_contradiction {
            Validity::Invalid
        } else {
            Validity::Valid
        };
        best_effort(
            "argument",
            self.store.create_argument(NewArgument {
                structure_type: "deductive".to_string(),
                validity_status,
                formal_proof: format!("Validated inference patterns in thesis {}", thesis.id),
                premises,
                conclusion_id: None,
            }),
        );
    }

    fn persist_objections(&self, thesis: &Thesis, counterexamples: &[CounterexampleCue]) {
        for cue in counterexamples.iter().take(MAX_PERSISTED_OBJECTIONS) {
            best_effort(
                "objection",
                self.store.create_objection(NewObjection {
                    target_type: EntityKind::Thesis,
                    target_id: thesis.id.clone(),
                    statement: cue.objection.clone(),
                    attack_type: AttackType::Counterexample,
                    strength: cue.strength,
                }),
            );
        }
    }

    // -----------------------------------------------------------------------
    // Adversarial loop
    // -----------------------------------------------------------------------

    /// Refine a stored thesis and record the run.
    pub fn adversarial_loop(&self, request: LoopRequest) -> PiveResult<LoopResponse> {
        let settings = &self.config.adversarial;
        let requested = request
            .max_iterations
            .unwrap_or(settings.default_max_iterations);
        let max_iterations = adversarial::check_iterations(requested, settings.max_iterations_limit)?;

        let thesis = self
            .store
            .get_thesis(&request.thesis_id)
            .map_err(LoopError::from)?
            .ok_or_else(|| LoopError::ThesisNotFound {
                thesis_id: request.thesis_id.to_string(),
            })?;

        let run = self
            .store
            .create_run(
                LOOP_EXPERIMENT,
                RunParameters {
                    thesis_id: thesis.id.clone(),
                    max_iterations,
                },
            )
            .map_err(LoopError::from)?;
        tracing::info!(thesis_id = %thesis.id, run_id = %run.id, max_iterations, "adversarial loop started");

        let mut rng = adversarial::loop_rng(settings.phrase_seed);
        let LoopReport {
            iterations,
            final_assessment,
        } = adversarial::refine(&thesis.statement, max_iterations, &*self.analyzer, &mut rng);

        let results = RunResults {
            iterations,
            final_assessment,
        };
        if let Err(e) = self
            .store
            .finish_run(&run.id, RunStatus::Completed, Some(results.clone()))
        {
            best_effort(
                "failed run status",
                self.store.finish_run(&run.id, RunStatus::Failed, None),
            );
            return Err(LoopError::from(e).into());
        }

        best_effort(
            "loop provenance",
            self.store.create_provenance(NewProvenance {
                entity_type: "run".to_string(),
                entity_id: run.id.clone(),
                was_generated_by: Some(thesis.id.clone()),
                was_derived_from: vec![thesis.id.clone()],
                was_attributed_to: LOOP_AGENT.to_string(),
                metadata: ProvenanceMetadata::AdversarialLoop {
                    iterations_count: results.final_assessment.iterations_count,
                    converged: results.final_assessment.converged,
                },
            }),
        );

        tracing::info!(
            run_id = %run.id,
            outcome = ?results.final_assessment.outcome,
            iterations = results.final_assessment.iterations_count,
            "adversarial loop finished"
        );
        Ok(LoopResponse {
            run_id: run.id,
            iterations: results.iterations,
            final_assessment: results.final_assessment,
        })
    }

    // -----------------------------------------------------------------------
    // Query, list
    // -----------------------------------------------------------------------

    /// Run a Phi-QL query.
    pub fn query(&self, request: QueryRequest) -> PiveResult<QueryResponse> {
        let engine = QueryEngine::new(
            &*self.store,
            &*self.analyzer,
            self.config.query.max_repair_scenarios,
        );
        let (query_type, result) = engine.run(
            &request.query_type,
            &request.entity_type,
            &request.entity_id,
            &request.parameters,
        )?;
        Ok(QueryResponse { query_type, result })
    }

    /// List theses newest first, with per-thesis enrichment and statistics.
    pub fn list_theses(&self, request: ListRequest) -> PiveResult<ListResponse> {
        let filter = ThesisFilter {
            status: request.status_filter,
            domain: request.domain_filter,
            limit: Some(request.limit.unwrap_or(self.config.list.default_limit)),
        };
        let theses: Vec<ThesisSummary> = self
            .store
            .list_theses(&filter)?
            .into_iter()
            .map(|thesis| self.summarize_thesis(thesis))
            .collect();
        let statistics = ListStatistics::from_summaries(&theses);
        tracing::info!(total = statistics.total, "listed theses");
        Ok(ListResponse { theses, statistics })
    }

    fn summarize_thesis(&self, thesis: Thesis) -> ThesisSummary {
        let objection_count = match self.store.objections_for(&thesis.id) {
            Ok(objections) => objections
                .iter()
                .filter(|o| o.target_type == EntityKind::Thesis)
                .count(),
            Err(e) => {
                tracing::warn!(thesis_id = %thesis.id, error = %e, "objection count unavailable");
                0
            }
        };
        let rpe_name = thesis.related_rpe_id.as_ref().and_then(|id| {
            match self.store.get_generated_entity(id) {
                Ok(found) => found.map(|rpe| rpe.name),
                Err(e) => {
                    tracing::warn!(rpe_id = %id, error = %e, "rpe lookup failed");
                    None
                }
            }
        });
        ThesisSummary {
            gate_success_rate: thesis.gate_success_rate(),
            objection_count,
            rpe_name,
            thesis,
        }
    }

    // -----------------------------------------------------------------------
    // Reference data
    // -----------------------------------------------------------------------

    /// Load vocabulary, axioms, concepts and generated entities.
    pub fn seed(&self, bundle: SeedBundle) -> PiveResult<SeedReport> {
        let report = SeedReport {
            vocabulary: bundle.vocabulary.len(),
            axioms: bundle.axioms.len(),
            concepts: bundle.concepts.len(),
            generated_entities: bundle.generated_entities.len(),
        };
        for term in bundle.vocabulary {
            self.store.add_vocabulary_term(term)?;
        }
        for axiom in bundle.axioms {
            self.store.put_axiom(axiom)?;
        }
        for concept in bundle.concepts {
            self.store.put_concept(concept)?;
        }
        for entity in bundle.generated_entities {
            self.store.put_generated_entity(entity)?;
        }
        tracing::info!(
            vocabulary = report.vocabulary,
            axioms = report.axioms,
            concepts = report.concepts,
            generated_entities = report.generated_entities,
            "seeded reference data"
        );
        Ok(report)
    }

    /// Summary information about the engine state.
    pub fn info(&self) -> PiveResult<EngineInfo> {
        let theses = self.store.list_theses(&ThesisFilter::default())?;
        Ok(EngineInfo {
            analyzer: self.analyzer.name().to_string(),
            persistent: self.config.store.data_dir.is_some(),
            thesis_count: theses.len(),
            validated_count: theses
                .iter()
                .filter(|t| t.status == ThesisStatus::Validated)
                .count(),
            vocabulary_size: self.store.vocabulary()?.len(),
        })
    }
}

fn summarize(report: &GateReport) -> ValidationSummary {
    ValidationSummary {
        gates_passed: report.passed_count(),
        gates_total: GateId::ALL.len(),
        overall_status: report.status(),
        formalizations: report.formalizations().iter().filter(|f| !f.fallback).count(),
        counterexamples: report.counterexamples().len(),
        repairs_suggested: report.repairs().len(),
    }
}

/// Log and swallow a failed write that must not fail the caller.
fn best_effort<T>(what: &str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "failed to persist {what}, continuing");
            None
        }
    }
}

/// Reference data accepted by [`Engine::seed`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedBundle {
    pub vocabulary: Vec<VocabularyTerm>,
    pub axioms: Vec<Axiom>,
    pub concepts: Vec<Concept>,
    pub generated_entities: Vec<GeneratedEntity>,
}

/// Counts of records written by [`Engine::seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub vocabulary: usize,
    pub axioms: usize,
    pub concepts: usize,
    pub generated_entities: usize,
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub analyzer: String,
    pub persistent: bool,
    pub thesis_count: usize,
    pub validated_count: usize,
    pub vocabulary_size: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pive engine info")?;
        writeln!(f, "  analyzer:     {}", self.analyzer)?;
        writeln!(f, "  persistent:   {}", self.persistent)?;
        writeln!(f, "  theses:       {}", self.thesis_count)?;
        writeln!(f, "  validated:    {}", self.validated_count)?;
        writeln!(f, "  vocabulary:   {}", self.vocabulary_size)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PiveError};

    const SCENARIO_A: &str = "All humans must act morally, because reason requires it.";

    fn engine() -> Engine {
        Engine::new(PiveConfig::default()).unwrap()
    }

    fn seed_vocabulary(engine: &Engine, terms: &[&str]) {
        engine
            .seed(SeedBundle {
                vocabulary: terms
                    .iter()
                    .map(|t| VocabularyTerm {
                        term: t.to_string(),
                        definition: None,
                    })
                    .collect(),
                ..Default::default()
            })
            .unwrap();
    }

    #[test]
    fn create_memory_only_engine() {
        let info = engine().info().unwrap();
        assert_eq!(info.analyzer, "heuristic");
        assert!(!info.persistent);
        assert_eq!(info.thesis_count, 0);
    }

    #[test]
    fn empty_statement_is_rejected_before_any_write() {
        let engine = engine();
        let err = engine
            .validate(ValidateRequest {
                thesis: "   ".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(engine.info().unwrap().thesis_count, 0);
    }

    #[test]
    fn validate_records_status_and_gates() {
        let engine = engine();
        seed_vocabulary(&engine, &["human", "moral", "reason"]);
        let response = engine
            .validate(ValidateRequest {
                thesis: SCENARIO_A.into(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(response.gates.len(), 6);
        assert!(response.gates[&GateId::G1].passed);
        assert!(response.gates[&GateId::G3].passed);
        assert_eq!(response.summary.gates_total, 6);

        let stored = engine.store().get_thesis(&response.thesis_id).unwrap().unwrap();
        assert_eq!(stored.status, response.validation_status);
        assert_eq!(stored.domain, "nihiltheism");
        assert_eq!(
            stored.status == ThesisStatus::Validated,
            stored.gate_results.values().all(|g| g.passed)
        );

        let provenance = engine.store().provenance_for(&response.thesis_id).unwrap();
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance[0].was_attributed_to, VALIDATION_AGENT);
        assert!(provenance[0].was_derived_from.is_empty());
    }

    #[test]
    fn validate_persists_counterexamples_as_objections() {
        let engine = engine();
        let response = engine
            .validate(ValidateRequest {
                thesis: SCENARIO_A.into(),
                ..Default::default()
            })
            .unwrap();
        let objections = engine.store().objections_for(&response.thesis_id).unwrap();
        assert_eq!(objections.len(), response.summary.counterexamples.min(3));
        assert!(objections.iter().all(|o| o.attack_type == AttackType::Counterexample));
    }

    #[test]
    fn loop_on_missing_thesis_creates_no_run() {
        let engine = engine();
        let missing = EntityId::from("missing");
        let err = engine
            .adversarial_loop(LoopRequest {
                thesis_id: missing.clone(),
                max_iterations: None,
            })
            .unwrap_err();
        assert!(matches!(err, PiveError::Loop(LoopError::ThesisNotFound { .. })));
        assert!(engine.store().runs_for_thesis(&missing).unwrap().is_empty());
    }

    #[test]
    fn loop_rejects_out_of_range_iterations() {
        let engine = engine();
        for max_iterations in [0, 26] {
            let err = engine
                .adversarial_loop(LoopRequest {
                    thesis_id: EntityId::from("any"),
                    max_iterations: Some(max_iterations),
                })
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn loop_completes_run_and_writes_provenance() {
        let engine = engine();
        let thesis_id = engine
            .validate(ValidateRequest {
                thesis: SCENARIO_A.into(),
                ..Default::default()
            })
            .unwrap()
            .thesis_id;

        let response = engine
            .adversarial_loop(LoopRequest {
                thesis_id: thesis_id.clone(),
                max_iterations: Some(1),
            })
            .unwrap();
        assert_eq!(response.final_assessment.iterations_count, 1);

        let run = engine.store().get_run(&response.run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.experiment_type, LOOP_EXPERIMENT);
        assert!(run.completed_at.is_some());

        let provenance = engine.store().provenance_for(&response.run_id).unwrap();
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance[0].was_generated_by.as_ref(), Some(&thesis_id));
    }

    #[test]
    fn list_enriches_and_counts() {
        let engine = engine();
        engine
            .seed(SeedBundle {
                generated_entities: vec![GeneratedEntity {
                    id: EntityId::from("rpe-1"),
                    name: "The Abyssal Turn".into(),
                    label: String::new(),
                    content: String::new(),
                    created_at: chrono::Utc::now(),
                }],
                ..Default::default()
            })
            .unwrap();
        for text in [SCENARIO_A, "Nothing is void."] {
            engine
                .validate(ValidateRequest {
                    thesis: text.into(),
                    related_rpe_id: Some(EntityId::from("rpe-1")),
                    ..Default::default()
                })
                .unwrap();
        }

        let listed = engine.list_theses(ListRequest::default()).unwrap();
        assert_eq!(listed.statistics.total, 2);
        assert!(listed
            .theses
            .iter()
            .all(|t| t.rpe_name.as_deref() == Some("The Abyssal Turn")));
        assert_eq!(
            listed.statistics.validated + listed.statistics.rejected,
            listed.statistics.total
        );

        let limited = engine
            .list_theses(ListRequest {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.theses.len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PiveConfig::default();
        config.adversarial.max_iterations_limit = 0;
        assert!(Engine::new(config).is_err());
    }
}
