//! Ordered syntactic templates mapping sentences to logical forms.
//!
//! The first template whose pattern matches wins, so more specific shapes
//! (biconditionals, identity) must not be shadowed by broader ones unless the
//! broader reading is the intended one.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Formalization;

/// One sentence shape and how to render it.
pub struct Template {
    pub name: &'static str,
    pub pattern: Regex,
    render: fn(&Captures<'_>) -> String,
}

impl Template {
    fn new(name: &'static str, pattern: &str, render: fn(&Captures<'_>) -> String) -> Self {
        Self {
            name,
            // Patterns are compile-time literals covered by the tests below.
            pattern: Regex::new(pattern).unwrap(),
            render,
        }
    }

    /// Render the logical form if the template matches.
    pub fn apply(&self, sentence: &str) -> Option<String> {
        self.pattern.captures(sentence).map(|caps| (self.render)(&caps))
    }
}

fn cap<'a>(caps: &'a Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| clean_term(m.as_str())).unwrap_or_default()
}

static ARTICLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(a|an|the)\s+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// Turn a phrase into a predicate-safe identifier of at most 30 characters.
pub fn clean_term(term: &str) -> String {
    let trimmed = term.trim();
    let without_article = ARTICLE.replace(trimmed, "");
    let underscored = WHITESPACE.replace_all(&without_article, "_");
    let mut symbol = NON_SYMBOL.replace_all(&underscored, "").into_owned();
    symbol.truncate(30);
    symbol
}

pub static TEMPLATES: LazyLock<Vec<Template>> = LazyLock::new(|| {
    vec![
        // Quantifiers
        Template::new("universal", r"(?i)\ball (.+?) (?:are|is) (.+)", |c| {
            format!("∀x({}(x) → {}(x))", cap(c, 1), cap(c, 2))
        }),
        Template::new("universal_every", r"(?i)\bevery (.+?) (?:are|is) (.+)", |c| {
            format!("∀x({}(x) → {}(x))", cap(c, 1), cap(c, 2))
        }),
        Template::new(
            "universal_modal",
            r"(?i)\b(?:all|every) (.+?) (?:must|should|ought to) (.+)",
            |c| format!("∀x({}(x) → □{}(x))", cap(c, 1), cap(c, 2)),
        ),
        Template::new("universal_negative", r"(?i)\bno (.+?) (?:are|is) (.+)", |c| {
            format!("∀x({}(x) → ¬{}(x))", cap(c, 1), cap(c, 2))
        }),
        Template::new(
            "existential",
            r"(?i)\bthere (?:exists?|is) (?:a|an|some) (.+?) (?:that|which) (.+)",
            |c| format!("∃x({}(x) ∧ {}(x))", cap(c, 1), cap(c, 2)),
        ),
        Template::new("existential_some", r"(?i)\bsome (.+?) (?:are|is) (.+)", |c| {
            format!("∃x({}(x) ∧ {}(x))", cap(c, 1), cap(c, 2))
        }),
        // Conditionals
        Template::new("conditional", r"(?i)\bif (.+?) then (.+)", |c| {
            format!("({}) → ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("implication", r"(?i)(.+?) implies (.+)", |c| {
            format!("({}) → ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("entailment", r"(?i)(.+?) entails (.+)", |c| {
            format!("({}) → ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("temporal_conditional", r"(?i)\bwhen (.+?),? (?:then )?(.+)", |c| {
            format!("({}) → ({})", cap(c, 1), cap(c, 2))
        }),
        // Modality
        Template::new("necessity", r"(?i)(.+?) (?:must be|necessarily is) (.+)", |c| {
            format!("□({} → {})", cap(c, 1), cap(c, 2))
        }),
        Template::new("necessity_clause", r"(?i)\bit is necessary that (.+)", |c| {
            format!("□({})", cap(c, 1))
        }),
        Template::new("possibility", r"(?i)(.+?) (?:can be|possibly is|may be) (.+)", |c| {
            format!("◇({} → {})", cap(c, 1), cap(c, 2))
        }),
        Template::new("possibility_clause", r"(?i)\bit is possible that (.+)", |c| {
            format!("◇({})", cap(c, 1))
        }),
        // Conjunction and disjunction
        Template::new("conjunctive_subject", r"(?i)(.+?) and (.+?) (?:are|is) (.+)", |c| {
            format!("({}) ∧ ({}) → ({})", cap(c, 1), cap(c, 2), cap(c, 3))
        }),
        Template::new("conjunction", r"(?i)\bboth (.+?) and (.+)", |c| {
            format!("({}) ∧ ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("disjunction", r"(?i)\beither (.+?) or (.+)", |c| {
            format!("({}) ∨ ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("exclusive_disjunction", r"(?i)(.+?) or (.+?) but not both", |c| {
            format!("({}) ⊕ ({})", cap(c, 1), cap(c, 2))
        }),
        // Negation
        Template::new("negation_clause", r"(?i)\bit is not the case that (.+)", |c| {
            format!("¬({})", cap(c, 1))
        }),
        Template::new("negation", r"(?i)(.+?) (?:is|are) not (.+)", |c| {
            format!("¬({} → {})", cap(c, 1), cap(c, 2))
        }),
        // Biconditional and identity
        Template::new("biconditional", r"(?i)(.+?) if and only if (.+)", |c| {
            format!("({}) ↔ ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new("biconditional_short", r"(?i)(.+?) \biff\b (.+)", |c| {
            format!("({}) ↔ ({})", cap(c, 1), cap(c, 2))
        }),
        Template::new(
            "identity",
            r"(?i)(.+?) (?:is|are) (?:identical to|the same as|equivalent to) (.+)",
            |c| format!("({}) = ({})", cap(c, 1), cap(c, 2)),
        ),
        // Domain relations
        Template::new("reveals", r"(?i)(.+?) reveals? that (.+)", |c| {
            format!("Reveals({}, {})", cap(c, 1), cap(c, 2))
        }),
        Template::new("emerges", r"(?i)(.+?) emerges? from (.+)", |c| {
            format!("Emerges({}, {})", cap(c, 1), cap(c, 2))
        }),
        Template::new("attribute", r"(?i)\bthe (.+?) of (.+?) is (.+)", |c| {
            format!("{}({}) = {}", cap(c, 1), cap(c, 2), cap(c, 3))
        }),
    ]
});

static CONTENT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());

const FALLBACK_STOPWORDS: &[&str] = &[
    "that", "this", "with", "from", "into", "about", "which", "where", "when",
];

/// Try each template in order; emit an opaque proposition if none match.
pub fn formalize(sentence: &str) -> Formalization {
    let trimmed = sentence.trim();
    for template in TEMPLATES.iter() {
        if let Some(logic) = template.apply(trimmed) {
            return Formalization {
                segment: trimmed.to_string(),
                logic,
                template: template.name.to_string(),
                fallback: false,
            };
        }
    }
    Formalization {
        segment: trimmed.to_string(),
        logic: propositional_symbol(trimmed),
        template: "propositional".to_string(),
        fallback: true,
    }
}

fn propositional_symbol(sentence: &str) -> String {
    let lower = sentence.to_lowercase();
    let terms: Vec<&str> = CONTENT_WORD
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !FALLBACK_STOPWORDS.contains(t))
        .take(3)
        .collect();
    if terms.is_empty() {
        return format!("P({})", clean_term(sentence));
    }
    let initials: String = terms
        .iter()
        .filter_map(|t| t.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("P_{initials}({})", terms.join(", "))
}
