// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # pive
//!
//! Philosophical Inference Validation Engine: scores natural-language theses
//! through six quality gates, refines them in a bounded adversarial loop,
//! records every derivation in a provenance graph and answers Phi-QL queries
//! over it.
//!
//! ## Architecture
//!
//! - **Entity store** (`store`): `EntityStore` trait over a DashMap hot tier and optional redb tier
//! - **Analyzer** (`analyzer`): pluggable text heuristics, regex-based by default
//! - **Quality gates** (`gates`): pure G1..G6 scoring
//! - **Adversarial loop** (`adversarial`): steelman, red-team, formalize, countermodel, repair
//! - **Provenance** (`provenance`): one-hop trees, petgraph lineage, timelines
//! - **Phi-QL** (`query`): WHY, COUNTEREX, REPAIR and TRACE
//! - **Engine** (`engine`, `service`): entry points and their JSON contracts
//!
//! ## Library usage
//!
//! ```no_run
//! use pive::config::PiveConfig;
//! use pive::engine::Engine;
//! use pive::service::{LoopRequest, ValidateRequest};
//!
//! let engine = Engine::new(PiveConfig::default()).unwrap();
//! let validated = engine
//!     .validate(ValidateRequest {
//!         thesis: "All beings must confront the void, because existence is finite.".into(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! let run = engine
//!     .adversarial_loop(LoopRequest {
//!         thesis_id: validated.thesis_id,
//!         max_iterations: Some(3),
//!     })
//!     .unwrap();
//! println!("{}", run.final_assessment.final_statement);
//! ```

pub mod adversarial;
pub mod analyzer;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod gates;
pub mod provenance;
pub mod query;
pub mod service;
pub mod store;
