//! Runtime error types

use likeness_format::{MetadataError, Primitive, UnitError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the host object model
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    /// The member operation raised an exception
    #[error("{type_name}: {message}")]
    Thrown {
        /// Exception type
        type_name: String,
        /// Exception message
        message: String,
    },

    /// The host cannot perform the operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Dispatch contract violations
///
/// Returned immediately; a failed routine leaves nothing to recover.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The unit has no routine of the requested kind
    #[error("{unit} has no {routine} routine")]
    MissingRoutine {
        /// Unit name
        unit: String,
        /// Routine name
        routine: &'static str,
    },

    /// Index outside the routine's table
    #[error("{message}: {index}")]
    InvalidIndex {
        /// Failure message carried by the routine
        message: String,
        /// Requested index
        index: u32,
    },

    /// Wrong number of arguments
    #[error("Wrong number of arguments: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Null passed where a primitive is required
    #[error("Cannot unbox null to {}", .0.keyword())]
    NullUnbox(Primitive),

    /// A value of the wrong primitive kind
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Supplied type
        actual: String,
    },

    /// A reference that fails its cast
    #[error("{actual} cannot be cast to {target}")]
    ClassCast {
        /// Cast target
        target: String,
        /// Runtime type of the value
        actual: String,
    },

    /// Instance member called without a receiver
    #[error("Null receiver for {0}")]
    NullReceiver(String),

    /// Proxy routine run without a handler
    #[error("No proxy handler installed")]
    NoHandler,

    /// Proxy requested for a type that is not an interface
    #[error("{0} is not an interface")]
    NotAnInterface(String),

    /// Instance requested for an abstract or non-generated type
    #[error("{0} cannot be instantiated")]
    NotInstantiable(String),

    /// No constructor accepts the arguments
    #[error("No matching constructor found for {0}")]
    NoMatchingConstructor(String),

    /// No method with the requested signature
    #[error("No method {name} on {type_name}")]
    NoSuchMethod {
        /// Type searched
        type_name: String,
        /// Method name
        name: String,
    },

    /// The code unit is inconsistent with itself
    #[error("Malformed code unit {unit}: {message}")]
    Malformed {
        /// Unit name
        unit: String,
        /// What went wrong
        message: String,
    },

    /// The host failed the operation
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Dispatch result type
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors loading generated code
#[derive(Debug, Error)]
pub enum LoadError {
    /// Filesystem error
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Archive error
    #[error("Failed to read archive {}: {source}", .path.display())]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: zip::result::ZipError,
    },

    /// An entry is missing from the generated output
    #[error("Missing entry {0}")]
    MissingEntry(String),

    /// The service entry names no registry
    #[error("Service entry names no registry unit")]
    EmptyServiceEntry,

    /// A code unit failed to decode
    #[error("Invalid code unit {name}: {source}")]
    Unit {
        /// Unit name
        name: String,
        /// Decode error
        source: UnitError,
    },

    /// The named registry is not a registry unit
    #[error("{0} is not a registry unit")]
    NotARegistry(String),

    /// The registry carries no metadata blob
    #[error("Registry {0} carries no metadata")]
    MissingMetadata(String),

    /// The metadata blob failed to decode
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Registry, metadata and unit disagree
    #[error("Inconsistent generated type {name}: {message}")]
    Inconsistent {
        /// Type name
        name: String,
        /// What disagrees
        message: String,
    },
}

/// A type no provider knows
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Type not found: {0}")]
pub struct TypeNotFound(pub String);
