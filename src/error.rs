//! Rich diagnostic error types for the PIVE engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. [`PiveError`] wraps them
//! all and classifies each failure into the small taxonomy exposed to callers
//! through the service error envelope.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the PIVE engine.
#[derive(Debug, Error, Diagnostic)]
pub enum PiveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Loop(#[from] LoopError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced entity does not exist.
    NotFound,
    /// The request was malformed; rejected before any side effect.
    InvalidArgument,
    /// Anything else (storage failure, corrupted record, ...).
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code used in the error envelope.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Internal => "internal",
        }
    }
}

impl PiveError {
    /// Classify this error for the service envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PiveError::Store(inner) => inner.kind(),
            PiveError::Gate(GateError::EmptyStatement) => ErrorKind::InvalidArgument,
            PiveError::Loop(LoopError::ThesisNotFound { .. }) => ErrorKind::NotFound,
            PiveError::Loop(LoopError::InvalidIterations { .. }) => ErrorKind::InvalidArgument,
            PiveError::Loop(LoopError::Store(inner)) => inner.kind(),
            PiveError::Query(QueryError::EntityNotFound { .. }) => ErrorKind::NotFound,
            PiveError::Query(QueryError::UnknownQueryType { .. })
            | PiveError::Query(QueryError::UnknownEntityType { .. })
            | PiveError::Query(QueryError::MissingField { .. }) => ErrorKind::InvalidArgument,
            PiveError::Query(QueryError::Store(inner)) => inner.kind(),
            PiveError::Config(_) => ErrorKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(pive::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(pive::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             Try running with a fresh data directory; if the problem persists, \
             file a bug report."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(pive::store::serde),
        help(
            "Failed to serialize or deserialize a record. \
             The stored format may have changed between versions."
        )
    )]
    Serialization { message: String },

    #[error("{collection} not found: {id}")]
    #[diagnostic(
        code(pive::store::not_found),
        help("No record with this id exists. Verify the id and entity type.")
    )]
    NotFound { collection: String, id: String },

    #[error("provenance record for {entity_id} references itself")]
    #[diagnostic(
        code(pive::store::self_reference),
        help(
            "A provenance record may only point at entities that existed before it. \
             Remove the record's own entity id from `was_derived_from`/`was_generated_by`."
        )
    )]
    SelfReference { entity_id: String },

    #[error("run {id} is already {status}")]
    #[diagnostic(
        code(pive::store::run_finished),
        help("A run moves from `running` to `completed` or `failed` exactly once.")
    )]
    RunFinished { id: String, status: String },
}

impl StoreError {
    /// Classify a store failure for the service envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::SelfReference { .. } => ErrorKind::InvalidArgument,
            _ => ErrorKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Gate errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("thesis statement is empty")]
    #[diagnostic(
        code(pive::gate::empty_statement),
        help("Provide a non-empty `thesis` text to validate.")
    )]
    EmptyStatement,
}

// ---------------------------------------------------------------------------
// Adversarial loop errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LoopError {
    #[error("thesis not found: {thesis_id}")]
    #[diagnostic(
        code(pive::adversarial::thesis_not_found),
        help("Validate the thesis first; the adversarial loop only refines stored theses.")
    )]
    ThesisNotFound { thesis_id: String },

    #[error("max_iterations must be between 1 and {limit}, got {requested}")]
    #[diagnostic(
        code(pive::adversarial::invalid_iterations),
        help("Pass a positive `max_iterations` no larger than the configured limit.")
    )]
    InvalidIterations { requested: usize, limit: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("Unknown query type: {query_type}")]
    #[diagnostic(
        code(pive::query::unknown_query_type),
        help("Supported query types are WHY, COUNTEREX, REPAIR and TRACE.")
    )]
    UnknownQueryType { query_type: String },

    #[error("Unknown entity type: {entity_type}")]
    #[diagnostic(
        code(pive::query::unknown_entity_type),
        help("Phi-QL queries target `thesis`, `argument` or `claim` entities.")
    )]
    UnknownEntityType { entity_type: String },

    #[error("missing required field: {field}")]
    #[diagnostic(code(pive::query::missing_field))]
    MissingField { field: String },

    #[error("Entity not found: {entity_type}/{entity_id}")]
    #[diagnostic(
        code(pive::query::entity_not_found),
        help("Check the entity id; theses are created by the Validate service.")
    )]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(pive::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(pive::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(pive::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(pive::config::invalid))]
    Invalid { message: String },
}

/// Convenience alias for functions returning PIVE results.
pub type PiveResult<T> = std::result::Result<T, PiveError>;
