//! Error types for the FCP manager
//!
//! Provides structured error types for the device registry, template store,
//! allocation engine and the persistence layer underneath them.

use thiserror::Error;

/// Unified error type for the FCP manager
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database {name} is closed")]
    DatabaseClosed { name: String },

    #[error("FCP devices already exist in table fcp: {fcp_ids}")]
    DuplicateFcp { fcp_ids: String },

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("FCP device {fcp_id} does not exist")]
    FcpNotFound { fcp_id: String },

    #[error("FCP device {fcp_id} has no connections in database")]
    FcpNoConnections { fcp_id: String },

    #[error("FCP Multipath Template {template_id} does not exist")]
    TemplateNotFound { template_id: String },

    #[error("No FCP records found {scope}")]
    NoFcpRecords { scope: String },

    #[error("No FCP Multipath Template is specified and no default FCP Multipath Template is found")]
    NoDefaultTemplate,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("FCP Multipath Template {template_id} already exists")]
    TemplateExists { template_id: String },

    #[error("min_fcp_paths_count {min_fcp_paths_count} is larger than fcp device path count {path_count}. Adjust the fcp_devices setting or min_fcp_paths_count.")]
    MinPathsExceeded {
        min_fcp_paths_count: i32,
        path_count: usize,
    },

    #[error("Adding or deleting a FCP device path from FCP Multipath Template {template_id} is not allowed: the template has {current} paths, {requested} were supplied")]
    PathCountChange {
        template_id: String,
        current: usize,
        requested: usize,
    },

    #[error("The FCP devices ({fcp_ids}) are allocated to virtual machines by another FCP Multipath Template and can not be removed from FCP Multipath Template {template_id}")]
    FcpInUse { template_id: String, fcp_ids: String },

    #[error("The FCP devices ({fcp_ids}) already belong to FCP Multipath Template {owner}")]
    FcpMappedElsewhere { owner: String, fcp_ids: String },

    #[error("FCP Multipath Template {template_id} can not be deleted: FCP devices ({fcp_ids}) are in use")]
    TemplateInUse { template_id: String, fcp_ids: String },

    #[error("No available FCP device found from FCP Multipath Template {template_id}")]
    NoAvailableFcp { template_id: String },

    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Invalid FCP device list {input}: {reason}")]
    InvalidFcpList { input: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Serialization / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kinds surfaced to callers of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced FCP device or template has no row
    NotExist,
    /// Business-rule violation the caller can avoid with different inputs
    Conflict,
    /// Malformed input
    InvalidInput,
    /// Unexpected failure in the persistence layer or configuration
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotExist => write!(f, "not_exist"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::Internal => write!(f, "internal_error"),
        }
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FcpNotFound { .. }
            | Error::FcpNoConnections { .. }
            | Error::TemplateNotFound { .. }
            | Error::NoFcpRecords { .. }
            | Error::NoDefaultTemplate => ErrorKind::NotExist,

            Error::TemplateExists { .. }
            | Error::MinPathsExceeded { .. }
            | Error::PathCountChange { .. }
            | Error::FcpInUse { .. }
            | Error::FcpMappedElsewhere { .. }
            | Error::TemplateInUse { .. }
            | Error::NoAvailableFcp { .. } => ErrorKind::Conflict,

            Error::InvalidFcpList { .. } | Error::InvalidInput(_) => ErrorKind::InvalidInput,

            Error::Internal(_)
            | Error::Configuration(_)
            | Error::DatabaseClosed { .. }
            | Error::DuplicateFcp { .. }
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is the "already exists" condition of a bulk insert
    ///
    /// Hardware re-sync callers ignore it explicitly.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::DuplicateFcp { .. })
    }

    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotExist
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Result type alias for the FCP manager
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::FcpNoConnections {
            fcp_id: "1a00".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotExist);

        let err = Error::PathCountChange {
            template_id: "t1".into(),
            current: 2,
            requested: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("Adding or deleting a FCP device path"));

        let err = Error::InvalidInput("bad".into());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_min_paths_message_names_both_counts() {
        let err = Error::MinPathsExceeded {
            min_fcp_paths_count: 3,
            path_count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("min_fcp_paths_count 3"));
        assert!(msg.contains("path count 2"));
    }

    #[test]
    fn test_already_exists() {
        let dup = Error::DuplicateFcp {
            fcp_ids: "1A00".into(),
        };
        assert!(dup.is_already_exists());
        assert_eq!(dup.kind(), ErrorKind::Internal);
        assert!(!Error::Internal("x".into()).is_already_exists());
    }
}
