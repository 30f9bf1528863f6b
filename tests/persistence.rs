//! Persistence and recovery tests for the PIVE engine.
//!
//! These tests verify that theses, objections, runs and provenance written
//! through the redb-backed store survive an engine restart.

use pive::config::PiveConfig;
use pive::engine::{Engine, SeedBundle};
use pive::entity::{EntityId, RunStatus, VocabularyTerm};
use pive::query::{QueryOutput, QueryParameters};
use pive::service::{ListRequest, LoopRequest, QueryRequest, ValidateRequest};

const THESIS: &str = "All beings must confront the void, because existence is finite.";

fn persistent_engine(dir: &std::path::Path) -> Engine {
    let mut config = PiveConfig::default();
    config.store.data_dir = Some(dir.to_path_buf());
    Engine::new(config).unwrap()
}

#[test]
fn theses_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: validate.
    let (thesis_id, status) = {
        let engine = persistent_engine(dir.path());
        let response = engine
            .validate(ValidateRequest {
                thesis: THESIS.into(),
                domain: Some("ontology".into()),
                ..Default::default()
            })
            .unwrap();
        (response.thesis_id, response.validation_status)
    };

    // Second session: reopen and verify.
    {
        let engine = persistent_engine(dir.path());
        let thesis = engine.store().get_thesis(&thesis_id).unwrap().unwrap();
        assert_eq!(thesis.status, status);
        assert_eq!(thesis.domain, "ontology");
        assert_eq!(thesis.gate_results.len(), 6);

        let listed = engine.list_theses(ListRequest::default()).unwrap();
        assert_eq!(listed.statistics.total, 1);
        assert_eq!(engine.info().unwrap().thesis_count, 1);
    }
}

#[test]
fn runs_and_provenance_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    let (thesis_id, run_id) = {
        let engine = persistent_engine(dir.path());
        let thesis_id = engine
            .validate(ValidateRequest {
                thesis: THESIS.into(),
                ..Default::default()
            })
            .unwrap()
            .thesis_id;
        let run_id = engine
            .adversarial_loop(LoopRequest {
                thesis_id: thesis_id.clone(),
                max_iterations: Some(2),
            })
            .unwrap()
            .run_id;
        (thesis_id, run_id)
    };

    {
        let engine = persistent_engine(dir.path());
        let run = engine.store().get_run(&run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.results.is_some());

        let provenance = engine.store().provenance_for(&run_id).unwrap();
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance[0].was_derived_from, vec![thesis_id.clone()]);

        let response = engine
            .query(QueryRequest {
                query_type: "TRACE".into(),
                entity_type: "thesis".into(),
                entity_id: thesis_id,
                parameters: QueryParameters::default(),
            })
            .unwrap();
        let QueryOutput::Trace(trace) = response.result else {
            panic!("expected TRACE output");
        };
        assert_eq!(trace.experiment_runs.len(), 1);
        assert_eq!(trace.experiment_runs[0].id, run_id);
    }
}

#[test]
fn counterexamples_accumulate_across_sessions() {
    let dir = tempfile::TempDir::new().unwrap();
    let counterex = |engine: &Engine, id: &EntityId| {
        let response = engine
            .query(QueryRequest {
                query_type: "COUNTEREX".into(),
                entity_type: "thesis".into(),
                entity_id: id.clone(),
                parameters: QueryParameters::default(),
            })
            .unwrap();
        match response.result {
            QueryOutput::Counterex(result) => result,
            other => panic!("expected COUNTEREX output, got {other:?}"),
        }
    };

    let (thesis_id, seen) = {
        let engine = persistent_engine(dir.path());
        let thesis_id = engine
            .validate(ValidateRequest {
                thesis: THESIS.into(),
                ..Default::default()
            })
            .unwrap()
            .thesis_id;
        let first = counterex(&engine, &thesis_id);
        (thesis_id, first.total_count)
    };

    {
        let engine = persistent_engine(dir.path());
        let second = counterex(&engine, &thesis_id);
        assert_eq!(second.existing_objections.len(), seen);
    }
}

#[test]
fn seeded_vocabulary_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let engine = persistent_engine(dir.path());
        engine
            .seed(SeedBundle {
                vocabulary: ["void", "existence", "being"]
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
    {
        let engine = persistent_engine(dir.path());
        assert_eq!(engine.info().unwrap().vocabulary_size, 3);
    }
}
