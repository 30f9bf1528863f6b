//! The six quality gates.
//!
//! [`evaluate`] is pure: it reads the statement and the reference data it is
//! handed and returns a [`GateReport`]. Persisting claims, arguments and
//! objections derived from the report is the caller's business.

use std::collections::{BTreeMap, HashSet};

use crate::analyzer::{Analyzer, CounterexampleCue, Formalization, InferenceCheck};
use crate::entity::{Axiom, AxiomCoherence, GateArtifact, GateId, GateResult, ThesisStatus};

/// Minimum approved fraction of domain terms.
pub const VOCABULARY_THRESHOLD: f64 = 0.8;
/// Minimum fraction of segments mapped by a template.
pub const FORMALIZATION_THRESHOLD: f64 = 0.6;
/// Counterexample cues strictly above this strength fail G4.
pub const STRONG_COUNTEREXAMPLE: f64 = 0.7;
/// G5 tolerates at most this many weaknesses.
pub const MAX_REPAIR_ISSUES: usize = 2;
/// Minimum mean overlap with referenced axioms.
pub const COHERENCE_THRESHOLD: f64 = 0.7;
/// Segments considered by G2.
pub const MAX_FORMALIZED_SEGMENTS: usize = 5;
/// Weakness categories G5 can report.
const REPAIR_CATEGORIES: f64 = 3.0;

/// Reference data a validation pass is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Approved terms, or `None` when the vocabulary could not be read.
    pub vocabulary: Option<Vec<String>>,
    /// Axioms the thesis claims to cohere with. Unresolvable ids are dropped
    /// before evaluation.
    pub axioms: Vec<Axiom>,
}

/// Results of all six gates for one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct GateReport {
    pub results: BTreeMap<GateId, GateResult>,
}

impl GateReport {
    pub fn all_passed(&self) -> bool {
        GateId::ALL
            .iter()
            .all(|id| self.results.get(id).is_some_and(|g| g.passed))
    }

    pub fn passed_count(&self) -> usize {
        self.results.values().filter(|g| g.passed).count()
    }

    /// Terminal thesis status implied by the report.
    pub fn status(&self) -> ThesisStatus {
        if self.all_passed() {
            ThesisStatus::Validated
        } else {
            ThesisStatus::Rejected
        }
    }

    pub fn formalizations(&self) -> &[Formalization] {
        match self.results.get(&GateId::G2).map(|g| &g.artifact) {
            Some(GateArtifact::Formalization { formalizations, .. }) => formalizations,
            _ => &[],
        }
    }

    pub fn inference(&self) -> InferenceCheck {
        match self.results.get(&GateId::G3).map(|g| &g.artifact) {
            Some(GateArtifact::Proof {
                has_contradiction,
                valid_inference,
            }) => InferenceCheck {
                has_contradiction: *has_contradiction,
                valid_inference: *valid_inference,
            },
            _ => InferenceCheck {
                has_contradiction: false,
                valid_inference: false,
            },
        }
    }

    pub fn counterexamples(&self) -> &[CounterexampleCue] {
        match self.results.get(&GateId::G4).map(|g| &g.artifact) {
            Some(GateArtifact::Countermodel {
                counterexamples, ..
            }) => counterexamples,
            _ => &[],
        }
    }

    pub fn repairs(&self) -> &[String] {
        match self.results.get(&GateId::G5).map(|g| &g.artifact) {
            Some(GateArtifact::Repair { repairs, .. }) => repairs,
            _ => &[],
        }
    }
}

/// Run all six gates over `statement`.
pub fn evaluate(statement: &str, reference: &ReferenceData, analyzer: &dyn Analyzer) -> GateReport {
    let results = [
        vocabulary(statement, reference.vocabulary.as_deref(), analyzer),
        formalization(statement, analyzer),
        proof(statement, analyzer),
        countermodel(statement, analyzer),
        repair(statement, analyzer),
        coherence(statement, &reference.axioms, analyzer),
    ];
    for r in &results {
        tracing::debug!(gate = %r.gate_id, passed = r.passed, score = r.score, "gate evaluated");
    }
    GateReport {
        results: results.into_iter().map(|r| (r.gate_id, r)).collect(),
    }
}

// ---------------------------------------------------------------------------
// Individual gates
// ---------------------------------------------------------------------------

/// G1: fraction of domain terms present in the controlled vocabulary.
pub fn vocabulary(statement: &str, approved: Option<&[String]>, analyzer: &dyn Analyzer) -> GateResult {
    let domain_terms = analyzer.domain_terms(statement);
    let Some(approved) = approved else {
        return GateResult {
            gate_id: GateId::G1,
            passed: true,
            score: 1.0,
            details: "Vocabulary consistency: 100.0% (vocabulary unavailable)".to_string(),
            artifact: GateArtifact::Vocabulary {
                domain_terms,
                unapproved_terms: Vec::new(),
                vocabulary_available: false,
            },
        };
    };

    let approved: HashSet<String> = approved.iter().map(|t| t.to_lowercase()).collect();
    let unapproved_terms: Vec<String> = domain_terms
        .iter()
        .filter(|t| !approved.contains(t.as_str()))
        .cloned()
        .collect();
    let score = if domain_terms.is_empty() {
        1.0
    } else {
        1.0 - unapproved_terms.len() as f64 / domain_terms.len() as f64
    };

    GateResult {
        gate_id: GateId::G1,
        passed: score >= VOCABULARY_THRESHOLD,
        score,
        details: format!("Vocabulary consistency: {:.1}%", score * 100.0),
        artifact: GateArtifact::Vocabulary {
            domain_terms,
            unapproved_terms,
            vocabulary_available: true,
        },
    }
}

/// G2: share of the leading segments a template could formalize.
pub fn formalization(statement: &str, analyzer: &dyn Analyzer) -> GateResult {
    let formalizations: Vec<Formalization> = analyzer
        .segments(statement)
        .iter()
        .take(MAX_FORMALIZED_SEGMENTS)
        .map(|s| analyzer.formalize(s))
        .collect();
    let attempted = formalizations.len();
    let succeeded = formalizations.iter().filter(|f| !f.fallback).count();
    let score = if attempted == 0 {
        0.0
    } else {
        succeeded as f64 / attempted as f64
    };

    GateResult {
        gate_id: GateId::G2,
        passed: attempted > 0 && score >= FORMALIZATION_THRESHOLD,
        score,
        details: format!("Formalized {succeeded}/{attempted} key claims"),
        artifact: GateArtifact::Formalization {
            formalizations,
            attempted,
        },
    }
}

/// G3: no self-contradiction and at least one inference marker.
pub fn proof(statement: &str, analyzer: &dyn Analyzer) -> GateResult {
    let check = analyzer.inference(statement);
    let sound = if check.has_contradiction { 0.0 } else { 0.5 };
    let inferred = if check.valid_inference { 0.5 } else { 0.0 };
    let score = sound + inferred;
    let details = if check.has_contradiction {
        "Contradiction detected"
    } else if check.valid_inference {
        "Logically sound"
    } else {
        "No explicit inference pattern"
    };

    GateResult {
        gate_id: GateId::G3,
        passed: !check.has_contradiction && check.valid_inference,
        score,
        details: details.to_string(),
        artifact: GateArtifact::Proof {
            has_contradiction: check.has_contradiction,
            valid_inference: check.valid_inference,
        },
    }
}

/// G4: no counterexample cue stronger than [`STRONG_COUNTEREXAMPLE`].
pub fn countermodel(statement: &str, analyzer: &dyn Analyzer) -> GateResult {
    let counterexamples = analyzer.countermodel_cues(statement);
    let strong_count = counterexamples
        .iter()
        .filter(|c| c.strength > STRONG_COUNTEREXAMPLE)
        .count();
    let strongest = counterexamples
        .iter()
        .map(|c| c.strength)
        .fold(0.0_f64, f64::max);

    GateResult {
        gate_id: GateId::G4,
        passed: strong_count == 0,
        score: (1.0 - strongest).clamp(0.0, 1.0),
        details: format!(
            "Generated {} counterexamples, {strong_count} strong",
            counterexamples.len()
        ),
        artifact: GateArtifact::Countermodel {
            counterexamples,
            strong_count,
        },
    }
}

/// G5: few enough structural weaknesses to be repairable.
pub fn repair(statement: &str, analyzer: &dyn Analyzer) -> GateResult {
    let weaknesses = analyzer.weaknesses(statement);
    let count = weaknesses.len();
    let (issues, repairs) = weaknesses.into_iter().map(|w| (w.issue, w.repair)).unzip();

    GateResult {
        gate_id: GateId::G5,
        passed: count <= MAX_REPAIR_ISSUES,
        score: (1.0 - count as f64 / REPAIR_CATEGORIES).clamp(0.0, 1.0),
        details: format!("Identified {count} issues with repair suggestions"),
        artifact: GateArtifact::Repair { issues, repairs },
    }
}

/// G6: mean term overlap with every referenced axiom.
pub fn coherence(statement: &str, axioms: &[Axiom], analyzer: &dyn Analyzer) -> GateResult {
    if axioms.is_empty() {
        return GateResult {
            gate_id: GateId::G6,
            passed: true,
            score: 1.0,
            details: "No axiom conflicts (standalone)".to_string(),
            artifact: GateArtifact::Coherence {
                axiom_scores: Vec::new(),
                standalone: true,
            },
        };
    }

    let axiom_scores: Vec<AxiomCoherence> = axioms
        .iter()
        .map(|a| AxiomCoherence {
            axiom_id: a.id.clone(),
            score: analyzer.coherence(statement, &a.content),
        })
        .collect();
    let mean = axiom_scores.iter().map(|s| s.score).sum::<f64>() / axiom_scores.len() as f64;

    GateResult {
        gate_id: GateId::G6,
        passed: mean >= COHERENCE_THRESHOLD,
        score: mean,
        details: format!("Coherence with axioms: {:.1}%", mean * 100.0),
        artifact: GateArtifact::Coherence {
            axiom_scores,
            standalone: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::analyzer::HeuristicAnalyzer;
    use crate::entity::EntityId;

    const SCENARIO_A: &str = "All humans must act morally, because reason requires it.";

    fn empty_vocabulary() -> ReferenceData {
        ReferenceData {
            vocabulary: Some(Vec::new()),
            axioms: Vec::new(),
        }
    }

    fn axiom(content: &str) -> Axiom {
        Axiom {
            id: EntityId::generate(),
            title: "A".into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn universal_modal_thesis_scores_as_expected() {
        let analyzer = HeuristicAnalyzer::default();
        let report = evaluate(SCENARIO_A, &empty_vocabulary(), &analyzer);

        let g1 = &report.results[&GateId::G1];
        assert!(g1.passed);
        assert_eq!(g1.score, 1.0);

        let g2 = &report.results[&GateId::G2];
        assert!(g2.passed, "{}", g2.details);
        assert!(report.formalizations()[0].logic.starts_with("∀x("));

        assert!(report.results[&GateId::G3].passed);

        let g4 = &report.results[&GateId::G4];
        assert!(!report.counterexamples().is_empty());
        assert!(g4.passed);

        // Short and copula-free: one weakness.
        let g5 = &report.results[&GateId::G5];
        assert!(g5.passed);
        assert_eq!(g5.details, "Identified 1 issues with repair suggestions");

        let g6 = &report.results[&GateId::G6];
        assert!(g6.passed);
        assert_eq!(g6.details, "No axiom conflicts (standalone)");

        assert!(report.all_passed());
        assert_eq!(report.status(), ThesisStatus::Validated);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let analyzer = HeuristicAnalyzer::default();
        let reference = ReferenceData {
            vocabulary: Some(vec!["nihilism".into()]),
            axioms: vec![axiom("Nihilism reveals the void beneath existence")],
        };
        let text = "Nihilism reveals that existence is groundless. Therefore the void remains.";
        assert_eq!(
            evaluate(text, &reference, &analyzer),
            evaluate(text, &reference, &analyzer)
        );
    }

    #[test]
    fn unapproved_domain_terms_fail_vocabulary() {
        let analyzer = HeuristicAnalyzer::default();
        let approved = vec!["nihilism".to_string()];
        let g1 = vocabulary("Nihilism meets transcendence", Some(&approved), &analyzer);
        assert!(!g1.passed);
        assert!((g1.score - 0.5).abs() < f64::EPSILON);
        assert_eq!(g1.details, "Vocabulary consistency: 50.0%");
    }

    #[test]
    fn unavailable_vocabulary_degrades_to_pass() {
        let analyzer = HeuristicAnalyzer::default();
        let g1 = vocabulary("Nihilism meets transcendence", None, &analyzer);
        assert!(g1.passed);
        assert!(matches!(
            g1.artifact,
            GateArtifact::Vocabulary {
                vocabulary_available: false,
                ..
            }
        ));
    }

    #[test]
    fn no_segments_fails_formalization() {
        let analyzer = HeuristicAnalyzer::default();
        let g2 = formalization("Too short.", &analyzer);
        assert!(!g2.passed);
        assert_eq!(g2.score, 0.0);
    }

    #[test]
    fn contradiction_fails_proof() {
        let analyzer = HeuristicAnalyzer::default();
        let g3 = proof("Being is both finite and not finite, therefore nothing", &analyzer);
        assert!(!g3.passed);
        assert_eq!(g3.details, "Contradiction detected");
        assert!((g3.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn three_weaknesses_fail_repair_gate() {
        let analyzer = HeuristicAnalyzer::default();
        let g5 = repair("Being is void and void is being", &analyzer);
        assert!(!g5.passed);
        assert_eq!(g5.score, 0.0);
    }

    #[test]
    fn coherence_averages_axiom_overlap() {
        let analyzer = HeuristicAnalyzer::default();
        let axioms = vec![axiom("void being"), axiom("void nothing")];
        let g6 = coherence("void being", &axioms, &analyzer);
        assert!(!g6.passed);
        assert!((g6.score - (1.0 + 1.0 / 3.0) / 2.0).abs() < 1e-9);
    }
}
