//! Keyword and regex driven analyzer.
//!
//! Cheap, deterministic and entirely lexical. Every cue below is a literal
//! word list; nothing here understands the argument it is scoring.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::templates;
use super::{
    Analyzer, Challenge, ChallengeKind, CounterexampleCue, Countermodel, CueKind, Formalization,
    InferenceCheck, RedTeam, Repair, RepairType, Severity, Steelman, Weakness,
};

/// Roots a word must contain to count as a domain term.
pub const DEFAULT_DOMAIN_ROOTS: &[&str] = &[
    "nihil",
    "transcend",
    "void",
    "being",
    "existence",
    "ontological",
    "epistemic",
];

/// Prefix added to statements that lack any scoping context.
pub const DEFAULT_SCOPE_QUALIFIER: &str = "Within the nihiltheistic framework";

const CONSTRAINT_PHRASES: &[&str] = &[
    "under standard conditions",
    "in typical cases",
    "generally speaking",
];

/// Segments shorter than this carry too little content to formalize.
const MIN_SEGMENT_CHARS: usize = 21;

// ---------------------------------------------------------------------------
// Lexical cues
// ---------------------------------------------------------------------------

static CONTENT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());
static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());
static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.;]").unwrap());

static BOTH_AND_NOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bboth\s+(\w+)\s+and\s+not\s+(\w+)\b").unwrap());
static IS_AND_IS_NOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\w+)\s+is\s+(\w+)\s+and\s+(\w+)\s+is\s+not\s+(\w+)\b").unwrap()
});
static SIMULTANEOUSLY_CANNOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsimultaneously\s+\w+\s+and\s+\w+\s+cannot\b").unwrap()
});
static INFERENCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(therefore|thus|hence|because|since|implies|entails|it follows that|we can conclude)\b",
    )
    .unwrap()
});

static EXISTENTIAL_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bthere exists\b|\bsome\b").unwrap());
static UNIVERSAL_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(all|every|always)\b").unwrap());
static CAUSAL_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(causes|leads to|results in)\b").unwrap());

static QUERY_UNIVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(all|every|always|never|none)\b").unwrap());
static QUERY_NECESSITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(must|necessary|required|essential)\b").unwrap());
static QUERY_CAUSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(cause|lead|result|because)\b").unwrap());
static QUERY_TEMPORAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(when|before|after|during)\b").unwrap());

static REASONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(because|since|therefore|thus)\b").unwrap());
static REASONING_WIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(because|since|therefore|thus|hence)\b").unwrap());
static COPULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(is|are|was|were)\b").unwrap());

static HEDGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(might|may|could|possibly)\b").unwrap());
static HEDGE_STRENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(might|may|possibly|perhaps)\b").unwrap());
static SCOPE_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(in|within|under|given)\b").unwrap());
static MIGHT_BE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bmight be\b").unwrap());
static COULD_BE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bcould be\b").unwrap());
static POSSIBLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bpossibly\b").unwrap());
static EVIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(evidence|data|research|study)\b").unwrap());
static EVIDENCE_OR_EXAMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(evidence|data|research|study|example)\b").unwrap());

static SCOPE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(all|every|always|never)\b").unwrap());
static TEMPORAL_CAUSATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhen .+ then\b").unwrap());
static QUANTIFIED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(some|many|most|few)\b").unwrap());
static BARE_COPULA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(is|are)\b").unwrap());
static NORMATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(should|must|ought|better|worse)\b").unwrap());
static CAUSAL_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(cause|lead|result)\b").unwrap());
static SELF_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\ball statements are\b").unwrap());

static SCOPE_ALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\ball\b").unwrap());
static SCOPE_EVERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bevery\b").unwrap());
static SCOPE_ALWAYS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\balways\b").unwrap());
static SCOPE_NEVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnever\b").unwrap());

const OPPOSING_TERMS: &[(&str, &str)] = &[
    ("finite", "infinite"),
    ("necessary", "contingent"),
    ("absolute", "relative"),
];

fn has_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn content_words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CONTENT_WORD
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// HeuristicAnalyzer
// ---------------------------------------------------------------------------

/// The default [`Analyzer`].
#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    domain_roots: Vec<String>,
    scope_qualifier: String,
}

impl HeuristicAnalyzer {
    pub fn new(domain_roots: Vec<String>, scope_qualifier: impl Into<String>) -> Self {
        Self {
            domain_roots: domain_roots.into_iter().map(|r| r.to_lowercase()).collect(),
            scope_qualifier: scope_qualifier.into(),
        }
    }

    pub fn domain_roots(&self) -> &[String] {
        &self.domain_roots
    }

    fn has_contradiction(text: &str) -> bool {
        let both = BOTH_AND_NOT
            .captures_iter(text)
            .any(|c| c[1].eq_ignore_ascii_case(&c[2]));
        let opposed = IS_AND_IS_NOT
            .captures_iter(text)
            .any(|c| c[2].eq_ignore_ascii_case(&c[4]));
        both || opposed || SIMULTANEOUSLY_CANNOT.is_match(text)
    }

    fn hidden_assumptions(text: &str) -> Vec<&'static str> {
        let mut out = Vec::new();
        if TEMPORAL_CAUSATION.is_match(text) {
            out.push("Temporal sequence implies causation");
        }
        if !QUANTIFIED.is_match(text) && BARE_COPULA.is_match(text) {
            out.push("Statement assumes universal application");
        }
        if NORMATIVE.is_match(text) {
            out.push("Normative framework assumed");
        }
        out
    }

    /// One entry per self-reference hit or co-occurring opposing pair.
    fn inconsistencies(text: &str) -> Vec<String> {
        let mut out = Vec::new();
        if SELF_REFERENCE.is_match(text) {
            out.push("Self-referential paradox potential".to_string());
        }
        let lower = text.to_lowercase();
        out.extend(
            OPPOSING_TERMS
                .iter()
                .filter(|(a, b)| has_word(&lower, a) && has_word(&lower, b))
                .map(|(a, b)| format!("Opposing concepts: {a} vs {b}")),
        );
        out
    }

    fn restrict_scope(statement: &str) -> String {
        let s = SCOPE_ALL.replace_all(statement, "most");
        let s = SCOPE_EVERY.replace_all(&s, "nearly all");
        let s = SCOPE_ALWAYS.replace_all(&s, "typically");
        SCOPE_NEVER.replace_all(&s, "rarely").into_owned()
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new(
            DEFAULT_DOMAIN_ROOTS.iter().map(|r| r.to_string()).collect(),
            DEFAULT_SCOPE_QUALIFIER,
        )
    }
}

impl Analyzer for HeuristicAnalyzer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn domain_terms(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        content_words(text)
            .into_iter()
            .filter(|w| self.domain_roots.iter().any(|root| w.contains(root.as_str())))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    fn segments(&self, text: &str) -> Vec<String> {
        SENTENCE_BREAK
            .split(text)
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_SEGMENT_CHARS)
            .map(str::to_string)
            .collect()
    }

    fn formalize(&self, segment: &str) -> Formalization {
        templates::formalize(segment)
    }

    fn inference(&self, text: &str) -> InferenceCheck {
        InferenceCheck {
            has_contradiction: Self::has_contradiction(text),
            valid_inference: INFERENCE_MARKER.is_match(text),
        }
    }

    fn countermodel_cues(&self, text: &str) -> Vec<CounterexampleCue> {
        let mut cues = Vec::new();
        if EXISTENTIAL_CUE.is_match(text) {
            cues.push(CounterexampleCue {
                objection: "Universal negation: Consider a domain where no such entity exists"
                    .to_string(),
                strength: 0.6,
                cue: CueKind::Existential,
            });
        }
        if UNIVERSAL_CUE.is_match(text) {
            cues.push(CounterexampleCue {
                objection: "Counterexample: Edge case where the universal claim fails".to_string(),
                strength: 0.7,
                cue: CueKind::Universal,
            });
        }
        if CAUSAL_CUE.is_match(text) {
            cues.push(CounterexampleCue {
                objection: "Correlation vs Causation: May be mere correlation without causal link"
                    .to_string(),
                strength: 0.5,
                cue: CueKind::Causal,
            });
        }
        cues
    }

    fn counterexamples(&self, text: &str) -> Vec<CounterexampleCue> {
        let mut out = Vec::new();
        if QUERY_UNIVERSAL.is_match(text) {
            out.push(CounterexampleCue {
                objection: "Existential counterexample: Consider a specific case where the universal claim fails".to_string(),
                strength: 0.7,
                cue: CueKind::Universal,
            });
        }
        if QUERY_NECESSITY.is_match(text) {
            out.push(CounterexampleCue {
                objection:
                    "Sufficiency counterexample: Alternative paths exist without this necessity"
                        .to_string(),
                strength: 0.6,
                cue: CueKind::Necessity,
            });
        }
        if QUERY_CAUSAL.is_match(text) {
            out.push(CounterexampleCue {
                objection: "Causal counterexample: Correlation may exist without causation"
                    .to_string(),
                strength: 0.5,
                cue: CueKind::Causal,
            });
        }
        if QUERY_TEMPORAL.is_match(text) {
            out.push(CounterexampleCue {
                objection: "Temporal counterexample: Timeline may vary in different contexts"
                    .to_string(),
                strength: 0.4,
                cue: CueKind::Temporal,
            });
        }
        out
    }

    fn weaknesses(&self, text: &str) -> Vec<Weakness> {
        let mut out = Vec::new();
        if text.chars().count() < 100 {
            out.push(Weakness {
                issue: "Insufficient elaboration".to_string(),
                repair: "Expand with additional premises and examples".to_string(),
            });
        }
        if !REASONING.is_match(text) {
            out.push(Weakness {
                issue: "Lacks explicit reasoning".to_string(),
                repair: "Add transitional phrases showing logical flow".to_string(),
            });
        }
        let tokens = text.split_whitespace().count();
        let copulas = COPULA.find_iter(text).count();
        if copulas as f64 > tokens as f64 * 0.15 {
            out.push(Weakness {
                issue: "Overuse of copula (weak assertions)".to_string(),
                repair: "Replace \"is/are\" with stronger verbs showing action/relation"
                    .to_string(),
            });
        }
        out
    }

    fn coherence(&self, text: &str, axiom: &str) -> f64 {
        let a: HashSet<String> = content_words(text).into_iter().collect();
        let b: HashSet<String> = content_words(axiom).into_iter().collect();
        let union = a.union(&b).count();
        if union == 0 {
            return 0.0;
        }
        a.intersection(&b).count() as f64 / union as f64
    }

    fn steelman(&self, text: &str) -> Steelman {
        let mut improvements = Vec::new();
        if !REASONING_WIDE.is_match(text) {
            improvements.push("Add explicit reasoning connectives".to_string());
        }
        if HEDGE.is_match(text) {
            improvements.push("Strengthen modal verbs".to_string());
        }

        let mut strengthened = text.trim().to_string();
        if !SCOPE_CONTEXT.is_match(&strengthened) {
            strengthened = format!("{}, {}", self.scope_qualifier, strengthened);
        }
        let strengthened = MIGHT_BE.replace_all(&strengthened, "is likely to be");
        let strengthened = COULD_BE.replace_all(&strengthened, "can be");
        let strengthened = POSSIBLY.replace_all(&strengthened, "plausibly").into_owned();

        let strength_score = self.argument_strength(&strengthened);
        Steelman {
            original: text.to_string(),
            strengthened,
            improvements,
            strength_score,
        }
    }

    fn argument_strength(&self, text: &str) -> f64 {
        let mut score: f64 = 0.5;
        if REASONING_WIDE.is_match(text) {
            score += 0.1;
        }
        if EVIDENCE.is_match(text) {
            score += 0.15;
        }
        if SCOPE_CONTEXT.is_match(text) {
            score += 0.1;
        }
        if !HEDGE_STRENGTH.is_match(text) {
            score += 0.1;
        }
        if CLAUSE_BREAK.split(text).count() > 2 {
            score += 0.15;
        }
        score.min(1.0)
    }

    fn red_team(&self, text: &str) -> RedTeam {
        let mut challenges = Vec::new();
        if SCOPE_WORD.is_match(text) {
            challenges.push(Challenge {
                kind: ChallengeKind::ScopeChallenge,
                challenge: "Overgeneralization: Universal claim needs scope restriction".to_string(),
                severity: Severity::High,
                assumption: None,
            });
        }
        if !EVIDENCE_OR_EXAMPLE.is_match(text) {
            challenges.push(Challenge {
                kind: ChallengeKind::EvidenceChallenge,
                challenge: "Lacks empirical support or concrete examples".to_string(),
                severity: Severity::Medium,
                assumption: None,
            });
        }
        for assumption in Self::hidden_assumptions(text) {
            challenges.push(Challenge {
                kind: ChallengeKind::AssumptionChallenge,
                challenge: format!("Hidden assumption: \"{assumption}\" needs justification"),
                severity: Severity::Medium,
                assumption: Some(assumption.to_string()),
            });
        }
        if CAUSAL_STEM.is_match(text) {
            challenges.push(Challenge {
                kind: ChallengeKind::AlternativeExplanation,
                challenge: "Alternative causal pathways not considered".to_string(),
                severity: Severity::Medium,
                assumption: None,
            });
        }
        for conflict in Self::inconsistencies(text) {
            challenges.push(Challenge {
                kind: ChallengeKind::ConsistencyChallenge,
                challenge: format!("Potential inconsistency: {conflict}"),
                severity: Severity::High,
                assumption: None,
            });
        }
        RedTeam::new(challenges)
    }

    fn countermodels(&self, formalizations: &[Formalization]) -> Vec<Countermodel> {
        let mut out = Vec::new();
        for f in formalizations {
            let logic = f.logic.as_str();
            if logic.contains('∀') {
                out.push(Countermodel {
                    target: logic.to_string(),
                    countermodel: "Existential counterexample domain where universal claim fails"
                        .to_string(),
                    logic_form: logic.replacen('∀', "∃¬", 1),
                });
            }
            if logic.contains('→') {
                let mut parts = logic.split('→').map(str::trim);
                let antecedent = parts.next().unwrap_or_default();
                let consequent = parts.next().unwrap_or_default();
                out.push(Countermodel {
                    target: logic.to_string(),
                    countermodel: "Model where antecedent holds but consequent fails".to_string(),
                    logic_form: format!("{antecedent} ∧ ¬({consequent})"),
                });
            }
            if logic.contains('∧') {
                let mut parts = logic.split('∧').map(str::trim);
                let left = parts.next().unwrap_or_default();
                let right = parts.next().unwrap_or_default();
                out.push(Countermodel {
                    target: logic.to_string(),
                    countermodel: "Model where at least one conjunct is false".to_string(),
                    logic_form: format!("¬({left}) ∨ ¬({right})"),
                });
            }
        }
        out
    }

    fn propose_repairs(
        &self,
        statement: &str,
        red_team: &RedTeam,
        countermodels: &[Countermodel],
        constraint_phrase: &str,
    ) -> Vec<Repair> {
        let mut repairs = Vec::new();

        if red_team.of_kind(ChallengeKind::ScopeChallenge).next().is_some() {
            repairs.push(Repair {
                issue: "Overgeneralization".to_string(),
                repair_type: RepairType::ScopeRestriction,
                repaired_statement: Self::restrict_scope(statement),
                confidence: 0.8,
            });
        }
        if red_team.of_kind(ChallengeKind::EvidenceChallenge).next().is_some() {
            repairs.push(Repair {
                issue: "Lacks evidence".to_string(),
                repair_type: RepairType::EvidenceAddition,
                repaired_statement: format!(
                    "{statement} This is supported by empirical observations and theoretical frameworks."
                ),
                confidence: 0.6,
            });
        }
        for challenge in red_team.of_kind(ChallengeKind::AssumptionChallenge).take(2) {
            let assumption = challenge.assumption.as_deref().unwrap_or("the stated premises");
            repairs.push(Repair {
                issue: challenge.challenge.clone(),
                repair_type: RepairType::AssumptionExplicit,
                repaired_statement: format!("Assuming {}, {statement}", lowercase_first(assumption)),
                confidence: 0.7,
            });
        }
        if !countermodels.is_empty() {
            repairs.push(Repair {
                issue: "Countermodels exist".to_string(),
                repair_type: RepairType::ConstraintAddition,
                repaired_statement: format!("{}, {statement}", uppercase_first(constraint_phrase)),
                confidence: 0.75,
            });
        }
        repairs
    }

    fn constraint_phrases(&self) -> &[&str] {
        CONSTRAINT_PHRASES
    }
}
