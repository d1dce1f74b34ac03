//! Error types for planning and fetching with actionable messages.
//!
//! Every failure surfaces as a [`QueryError`] carrying an [`ErrorCode`], a
//! message, optional context (entity, relation, SQL) and suggestions.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: P{category}{number}
//! - 1xxx: Metadata errors (unknown entity, relation, column, filter)
//! - 2xxx: Plan compilation errors (alias collision, nesting depth)
//! - 5xxx: Execution errors (driver failure, cancellation)
//! - 6xxx: Data errors (rows not matching the statement)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use prax_planner::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_relation("User", "lastDocumnet", ["account", "lastDocument"]);
//! assert_eq!(err.code, ErrorCode::UnknownRelation);
//! assert!(err.to_string().contains("lastDocumnet"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for planner operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Metadata errors (1xxx)
    /// Entity type is not registered (P1001).
    UnknownEntity = 1001,
    /// Relation is not declared on the entity (P1002).
    UnknownRelation = 1002,
    /// Column is not declared on the entity (P1003).
    UnknownColumn = 1003,
    /// Invalid filter fragment or criteria (P1004).
    InvalidFilter = 1004,
    /// Entity, relation or filter registered twice (P1005).
    DuplicateDefinition = 1005,
    /// Malformed populate path (P1006).
    InvalidPopulate = 1006,

    // Plan compilation errors (2xxx)
    /// Load plan could not be compiled (P2001).
    PlanCompilation = 2001,
    /// Table alias collision that suffixing could not resolve (P2002).
    AliasCollision = 2002,
    /// Relation nesting exceeds the configured depth (P2003).
    NestingTooDeep = 2003,

    // Execution errors (5xxx)
    /// Statement execution failed at the driver boundary (P5001).
    ExecutionFailed = 5001,
    /// Fetch was cancelled by the caller (P5003).
    Cancelled = 5003,

    // Data errors (6xxx)
    /// A result row is missing a selected column (P6001).
    MissingColumn = 6001,

    // Configuration errors (7xxx)
    /// Invalid configuration (P7001).
    InvalidConfiguration = 7001,
    /// Configuration file could not be read (P7002).
    ConfigurationIo = 7002,

    // Internal errors (9xxx)
    /// Internal error (P9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "P1002").
    pub fn code(&self) -> String {
        format!("P{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownEntity => "Unknown entity",
            Self::UnknownRelation => "Unknown relation",
            Self::UnknownColumn => "Unknown column",
            Self::InvalidFilter => "Invalid filter",
            Self::DuplicateDefinition => "Duplicate definition",
            Self::InvalidPopulate => "Invalid populate path",
            Self::PlanCompilation => "Plan compilation failed",
            Self::AliasCollision => "Alias collision",
            Self::NestingTooDeep => "Relation nesting too deep",
            Self::ExecutionFailed => "Statement execution failed",
            Self::Cancelled => "Fetch cancelled",
            Self::MissingColumn => "Missing column in result row",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::ConfigurationIo => "Configuration file unreadable",
            Self::Internal => "Internal error",
        }
    }

    /// Get the documentation URL for this error.
    pub fn docs_url(&self) -> String {
        format!("https://prax.rs/docs/errors/{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The entity involved.
    pub entity: Option<String>,
    /// The relation path involved.
    pub relation: Option<String>,
    /// The rendered SQL (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur while planning or fetching.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the relation path.
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.context.relation = Some(relation.into());
        self
    }

    /// Set the SQL.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create an unknown entity error.
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::UnknownEntity,
            format!("Entity '{}' is not registered", entity),
        )
        .with_entity(&entity)
        .with_suggestion(format!(
            "Register '{}' with MetadataRegistry::builder() before fetching",
            entity
        ))
    }

    /// Create an unknown relation error listing the relations that do exist.
    pub fn unknown_relation<I, S>(entity: impl Into<String>, relation: impl Into<String>, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entity = entity.into();
        let relation = relation.into();
        let available: Vec<String> = available.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut err = Self::new(
            ErrorCode::UnknownRelation,
            format!("Entity '{}' has no relation named '{}'", entity, relation),
        )
        .with_entity(&entity)
        .with_relation(&relation);
        if !available.is_empty() {
            err = err.with_suggestion(format!("Declared relations: {}", available.join(", ")));
        }
        err
    }

    /// Create an unknown column error.
    pub fn unknown_column(entity: impl Into<String>, column: impl Into<String>) -> Self {
        let entity = entity.into();
        let column = column.into();
        Self::new(
            ErrorCode::UnknownColumn,
            format!("Entity '{}' has no column '{}'", entity, column),
        )
        .with_entity(&entity)
        .with_suggestion("Column names are matched exactly against the registered column list")
    }

    /// Create an invalid filter error.
    pub fn invalid_filter(entity: impl Into<String>, message: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::new(
            ErrorCode::InvalidFilter,
            format!("Invalid filter on '{}': {}", entity, message.into()),
        )
        .with_entity(&entity)
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: &str, name: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DuplicateDefinition,
            format!("{} '{}' is registered more than once", kind, name.into()),
        )
    }

    /// Create an invalid populate path error.
    pub fn invalid_populate(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::InvalidPopulate,
            format!("Populate path '{}' is malformed", path),
        )
        .with_relation(&path)
        .with_code_suggestion("Use dotted relation names", "populate(\"account.owner\")")
    }

    /// Create a generic plan compilation error.
    pub fn plan_compilation(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PlanCompilation,
            format!("Plan compilation failed: {}", message.into()),
        )
    }

    /// Create an alias collision error.
    pub fn alias_collision(alias: impl Into<String>, attempts: u32) -> Self {
        let alias = alias.into();
        Self::new(
            ErrorCode::AliasCollision,
            format!(
                "Alias '{}' collides and could not be resolved after {} suffixes",
                alias, attempts
            ),
        )
        .with_suggestion("Raise sql.max_alias_suffix or sql.max_identifier_length")
    }

    /// Create a nesting depth error.
    pub fn nesting_too_deep(path: impl Into<String>, max_depth: usize) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::NestingTooDeep,
            format!(
                "Relation path '{}' exceeds the maximum nesting depth of {}",
                path, max_depth
            ),
        )
        .with_relation(&path)
        .with_suggestion("Raise loading.max_depth or populate a shorter path")
    }

    /// Create an execution error raised by a driver.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExecutionFailed,
            format!("Statement execution failed: {}", message.into()),
        )
        .with_suggestion("Check the database logs for more details")
    }

    /// Create a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Fetch was cancelled before it completed")
            .with_help("Partially fetched relations are discarded")
    }

    /// Create a missing column error.
    pub fn missing_column(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MissingColumn,
            format!(
                "Result row has no value for '{}.{}'",
                alias.into(),
                column.into()
            ),
        )
        .with_help("Executors must return every selected column, using NULL for unmatched joins")
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration: {}", message.into()),
        )
    }

    /// Create a configuration I/O error.
    pub fn configuration_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(
            ErrorCode::ConfigurationIo,
            format!("Failed to read configuration file '{}'", path.into()),
        )
        .with_source(source)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
            .with_help("This is likely a bug in Prax - please report it at https://github.com/pegasusheavy/prax/issues")
    }

    // ============== Error Checks ==============

    /// Check if this is an unknown relation error.
    pub fn is_unknown_relation(&self) -> bool {
        self.code == ErrorCode::UnknownRelation
    }

    /// Check if the plan failed to compile.
    pub fn is_plan_compilation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::PlanCompilation | ErrorCode::AliasCollision | ErrorCode::NestingTooDeep
        )
    }

    /// Check if this error came from the execution boundary.
    pub fn is_execution(&self) -> bool {
        self.code == ErrorCode::ExecutionFailed
    }

    /// Check if the fetch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Check if the error was raised before any statement could run.
    pub fn is_pre_execution(&self) -> bool {
        (self.code as u16) < 5000
    }

    // ============== Display Functions ==============

    /// Get the documentation URL for this error.
    pub fn docs_url(&self) -> String {
        self.code.docs_url()
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref entity) = self.context.entity {
            output.push_str(&format!("  → Entity: {}\n", entity));
        }
        if let Some(ref relation) = self.context.relation {
            output.push_str(&format!("  → Relation: {}\n", relation));
        }

        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.chars().count() > 200 {
                format!("{}...", sql.chars().take(200).collect::<String>())
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output.push_str(&format!("\nMore info: {}\n", self.docs_url()));

        output
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}
