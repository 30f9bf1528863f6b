//! Adversarial refinement loop: steelman → red-team → formalize →
//! countermodel → repair, repeated until the statement stops improving.
//!
//! [`refine`] is pure apart from the caller-supplied RNG, which only picks the
//! wording of the constraint repair. Persisting the run is done by the engine.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analyzer::{Analyzer, Countermodel, Formalization, RedTeam, Repair, Steelman};
use crate::error::LoopError;

/// Label attached to the iteration that converged.
pub const CONVERGED_LABEL: &str = "Achieved — no significant issues remaining";
/// Label attached to the iteration whose repairs stopped shrinking.
pub const STAGNATED_LABEL: &str = "Stagnated — repairs not reducing issues";

const FALLBACK_CONSTRAINT: &str = "generally speaking";

// ---------------------------------------------------------------------------
// Iteration records
// ---------------------------------------------------------------------------

/// Formalization of the steelmanned statement within one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormalizationPass {
    pub formalizations: Vec<Formalization>,
    /// Fraction of segments matched by a template (0 when there are none).
    pub success_rate: f64,
    pub total_propositions: usize,
}

/// Everything produced by one pass of the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based.
    pub iteration_number: usize,
    pub timestamp: DateTime<Utc>,
    /// Strengthened form of the working statement.
    pub steelman: Steelman,
    /// Attacks on the strengthened statement.
    pub red_team: RedTeam,
    pub formalization: FormalizationPass,
    pub countermodels: Vec<Countermodel>,
    pub repairs: Vec<Repair>,
    /// Set only on the iteration that ended the loop early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence: Option<String>,
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopOutcome {
    Converged,
    Stagnated,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAssessment {
    /// True only for [`LoopOutcome::Converged`].
    pub converged: bool,
    pub outcome: LoopOutcome,
    pub iterations_count: usize,
    pub final_statement: String,
    /// Countermodels left after the last iteration.
    pub remaining_issues: usize,
    /// Argument strength of the final statement minus that of the original.
    pub strength_improvement: f64,
}

/// Complete output of [`refine`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub iterations: Vec<Iteration>,
    pub final_assessment: FinalAssessment,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Reject iteration counts outside `1..=limit`.
pub fn check_iterations(requested: usize, limit: usize) -> Result<usize, LoopError> {
    if requested == 0 || requested > limit {
        return Err(LoopError::InvalidIterations { requested, limit });
    }
    Ok(requested)
}

/// RNG for one loop invocation; seeded runs are reproducible.
pub fn loop_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Run the refinement loop over `statement` for at most `max_iterations`.
pub fn refine<R: Rng + ?Sized>(
    statement: &str,
    max_iterations: usize,
    analyzer: &dyn Analyzer,
    rng: &mut R,
) -> LoopReport {
    let mut iterations: Vec<Iteration> = Vec::with_capacity(max_iterations);
    let mut current = statement.to_string();
    let mut outcome = LoopOutcome::Exhausted;

    for i in 0..max_iterations {
        let mut iteration = iterate(i + 1, &current, analyzer, rng);

        if iteration.countermodels.is_empty() || iteration.repairs.is_empty() {
            outcome = LoopOutcome::Converged;
            iteration.convergence = Some(CONVERGED_LABEL.to_string());
        } else if iterations
            .last()
            .is_some_and(|prev| prev.repairs.len() == iteration.repairs.len())
        {
            outcome = LoopOutcome::Stagnated;
            iteration.convergence = Some(STAGNATED_LABEL.to_string());
        }

        tracing::debug!(
            iteration = iteration.iteration_number,
            challenges = iteration.red_team.total_challenges,
            countermodels = iteration.countermodels.len(),
            repairs = iteration.repairs.len(),
            "adversarial iteration"
        );

        let stop = iteration.convergence.is_some();
        if !stop {
            if let Some(first) = iteration.repairs.first() {
                current = first.repaired_statement.clone();
            }
        }
        iterations.push(iteration);
        if stop {
            break;
        }
    }

    let remaining_issues = iterations.last().map_or(0, |it| it.countermodels.len());
    let strength_improvement =
        analyzer.argument_strength(&current) - analyzer.argument_strength(statement);

    LoopReport {
        final_assessment: FinalAssessment {
            converged: outcome == LoopOutcome::Converged,
            outcome,
            iterations_count: iterations.len(),
            final_statement: current,
            remaining_issues,
            strength_improvement,
        },
        iterations,
    }
}

fn iterate<R: Rng + ?Sized>(
    number: usize,
    statement: &str,
    analyzer: &dyn Analyzer,
    rng: &mut R,
) -> Iteration {
    let steelman = analyzer.steelman(statement);
    let red_team = analyzer.red_team(&steelman.strengthened);

    let formalizations: Vec<Formalization> = analyzer
        .segments(&steelman.strengthened)
        .iter()
        .map(|s| analyzer.formalize(s))
        .collect();
    let total_propositions = formalizations.len();
    let matched = formalizations.iter().filter(|f| !f.fallback).count();
    let success_rate = if total_propositions == 0 {
        0.0
    } else {
        matched as f64 / total_propositions as f64
    };

    let countermodels = analyzer.countermodels(&formalizations);
    let phrase = analyzer
        .constraint_phrases()
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_CONSTRAINT);
    let repairs =
        analyzer.propose_repairs(&steelman.strengthened, &red_team, &countermodels, phrase);

    Iteration {
        iteration_number: number,
        timestamp: Utc::now(),
        steelman,
        red_team,
        formalization: FormalizationPass {
            formalizations,
            success_rate,
            total_propositions,
        },
        countermodels,
        repairs,
        convergence: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::HeuristicAnalyzer;

    const UNIVERSAL: &str = "All beings must confront the void, because existence is finite.";

    /// Proposes `schedule[n]` repairs for a statement that has already been
    /// repaired `n` times. Each repair appends `+`, so the iteration index is
    /// readable from the working statement.
    struct ScriptedAnalyzer {
        schedule: Vec<usize>,
    }

    impl ScriptedAnalyzer {
        fn new(schedule: &[usize]) -> Self {
            Self {
                schedule: schedule.to_vec(),
            }
        }
    }

    impl Analyzer for ScriptedAnalyzer {
        fn name(&self) -> &str {
            "scripted"
        }
        fn domain_terms(&self, _text: &str) -> Vec<String> {
            Vec::new()
        }
        fn segments(&self, text: &str) -> Vec<String> {
            vec![text.to_string()]
        }
        fn formalize(&self, segment: &str) -> Formalization {
            Formalization {
                segment: segment.to_string(),
                logic: "∀x P(x)".to_string(),
                template: "scripted".to_string(),
                fallback: false,
            }
        }
        fn inference(&self, _text: &str) -> crate::analyzer::InferenceCheck {
            crate::analyzer::InferenceCheck {
                has_contradiction: false,
                valid_inference: true,
            }
        }
        fn countermodel_cues(&self, _text: &str) -> Vec<crate::analyzer::CounterexampleCue> {
            Vec::new()
        }
        fn counterexamples(&self, _text: &str) -> Vec<crate::analyzer::CounterexampleCue> {
            Vec::new()
        }
        fn weaknesses(&self, _text: &str) -> Vec<crate::analyzer::Weakness> {
            Vec::new()
        }
        fn coherence(&self, _text: &str, _axiom: &str) -> f64 {
            0.0
        }
        fn steelman(&self, text: &str) -> Steelman {
            Steelman {
                original: text.to_string(),
                strengthened: text.to_string(),
                improvements: Vec::new(),
                strength_score: 0.5,
            }
        }
        fn argument_strength(&self, text: &str) -> f64 {
            text.matches('+').count() as f64 / 10.0
        }
        fn red_team(&self, _text: &str) -> RedTeam {
            RedTeam::new(Vec::new())
        }
        fn countermodels(&self, formalizations: &[Formalization]) -> Vec<Countermodel> {
            formalizations
                .iter()
                .map(|f| Countermodel {
                    target: f.segment.clone(),
                    countermodel: "an x with not P(x)".to_string(),
                    logic_form: f.logic.clone(),
                })
                .collect()
        }
        fn propose_repairs(
            &self,
            statement: &str,
            _red_team: &RedTeam,
            _countermodels: &[Countermodel],
            _constraint_phrase: &str,
        ) -> Vec<Repair> {
            let applied = statement.matches('+').count();
            let count = self.schedule.get(applied).copied().unwrap_or(0);
            (0..count)
                .map(|_| Repair {
                    issue: "scripted".to_string(),
                    repair_type: crate::analyzer::RepairType::ConstraintAddition,
                    repaired_statement: format!("{statement}+"),
                    confidence: 0.5,
                })
                .collect()
        }
        fn constraint_phrases(&self) -> &[&str] {
            &[]
        }
    }

    #[test]
    fn single_iteration_never_stagnates() {
        let analyzer = HeuristicAnalyzer::default();
        for text in [UNIVERSAL, "Meaning might be an illusion", "x"] {
            let report = refine(text, 1, &analyzer, &mut loop_rng(Some(7)));
            assert_eq!(report.final_assessment.iterations_count, 1);
            let label = report.iterations[0].convergence.as_deref();
            assert!(label.is_none() || label == Some(CONVERGED_LABEL), "{label:?}");
        }
    }

    #[test]
    fn loop_terminates_within_bound() {
        let analyzer = HeuristicAnalyzer::default();
        for n in 1..=6 {
            let report = refine(UNIVERSAL, n, &analyzer, &mut loop_rng(Some(1)));
            assert!(report.iterations.len() <= n);
            assert_eq!(report.final_assessment.iterations_count, report.iterations.len());
            for (i, it) in report.iterations.iter().enumerate() {
                assert_eq!(it.iteration_number, i + 1);
            }
        }
    }

    #[test]
    fn unformalizable_statement_converges_immediately() {
        let analyzer = HeuristicAnalyzer::default();
        let report = refine("Short.", 3, &analyzer, &mut loop_rng(Some(0)));
        assert_eq!(report.iterations.len(), 1);
        assert_eq!(report.final_assessment.outcome, LoopOutcome::Converged);
        assert!(report.final_assessment.converged);
        assert_eq!(report.final_assessment.remaining_issues, 0);
    }

    #[test]
    fn equal_repair_counts_stagnate() {
        let analyzer = ScriptedAnalyzer::new(&[2, 3, 3, 1]);
        let report = refine("claim", 10, &analyzer, &mut loop_rng(Some(0)));
        let assessment = &report.final_assessment;
        assert_eq!(assessment.outcome, LoopOutcome::Stagnated);
        assert!(!assessment.converged);
        assert_eq!(report.iterations.len(), 3);
        let labels: Vec<Option<&str>> = report
            .iterations
            .iter()
            .map(|it| it.convergence.as_deref())
            .collect();
        assert_eq!(labels, vec![None, None, Some(STAGNATED_LABEL)]);
        // The stagnating iteration's repairs are not applied.
        assert_eq!(assessment.final_statement, "claim++");
        assert_eq!(assessment.remaining_issues, 1);
    }

    #[test]
    fn changing_repair_counts_exhaust_the_bound() {
        let analyzer = ScriptedAnalyzer::new(&[1, 2, 3, 4, 5]);
        let report = refine("claim", 4, &analyzer, &mut loop_rng(Some(0)));
        let assessment = &report.final_assessment;
        assert_eq!(assessment.outcome, LoopOutcome::Exhausted);
        assert!(!assessment.converged);
        assert_eq!(report.iterations.len(), 4);
        assert_eq!(assessment.iterations_count, 4);
        assert!(report.iterations.iter().all(|it| it.convergence.is_none()));
        assert_eq!(assessment.final_statement, "claim++++");
    }

    #[test]
    fn no_repairs_converges_after_progress() {
        let analyzer = ScriptedAnalyzer::new(&[2, 0]);
        let report = refine("claim", 5, &analyzer, &mut loop_rng(Some(0)));
        assert_eq!(report.final_assessment.outcome, LoopOutcome::Converged);
        assert!(report.final_assessment.converged);
        assert_eq!(report.iterations.len(), 2);
        assert_eq!(report.iterations[1].convergence.as_deref(), Some(CONVERGED_LABEL));
        assert_eq!(report.final_assessment.final_statement, "claim+");
    }

    #[test]
    fn working_statement_follows_first_repair() {
        let analyzer = ScriptedAnalyzer::new(&[2, 1, 3]);
        let report = refine("claim", 3, &analyzer, &mut loop_rng(Some(0)));
        assert_eq!(report.iterations.len(), 3);
        for pair in report.iterations.windows(2) {
            assert_eq!(pair[1].steelman.original, pair[0].repairs[0].repaired_statement);
        }
        assert_eq!(report.iterations[0].steelman.original, "claim");
        assert_eq!(report.iterations[2].steelman.original, "claim++");
    }

    #[test]
    fn heuristic_loop_on_universal_thesis_applies_first_repair() {
        let analyzer = HeuristicAnalyzer::default();
        let report = refine(UNIVERSAL, 2, &analyzer, &mut loop_rng(Some(11)));
        let first = &report.iterations[0];
        assert!(first.convergence.is_none());
        assert!(!first.repairs.is_empty());
        assert_eq!(report.iterations.len(), 2);
        assert_eq!(report.iterations[1].steelman.original, first.repairs[0].repaired_statement);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let analyzer = HeuristicAnalyzer::default();
        let a = refine(UNIVERSAL, 3, &analyzer, &mut loop_rng(Some(42)));
        let b = refine(UNIVERSAL, 3, &analyzer, &mut loop_rng(Some(42)));
        assert_eq!(a.final_assessment, b.final_assessment);
    }

    #[test]
    fn iteration_bounds_are_checked() {
        assert!(check_iterations(0, 25).is_err());
        assert!(check_iterations(26, 25).is_err());
        assert_eq!(check_iterations(3, 25).unwrap(), 3);
    }
}
