//! Error types for the reconcile crate

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What a failed lookup was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// A project tag in the tag taxonomy
    ProjectTag,
    /// A cluster or project container object
    Container,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectTag => write!(f, "project tag"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// Errors that can occur while loading or reconciling inventory
#[derive(Error, Debug)]
pub enum Error {
    /// Input file does not exist
    #[error("input file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Input file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not a valid export
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A VM record has an unusable value
    #[error("invalid record for VM '{vm}': {message}")]
    InvalidRecord { vm: String, message: String },

    /// A matched VM references a tag or container RackTables does not know
    #[error("no {kind} named '{name}' (needed by VM '{vm}')")]
    Lookup {
        kind: LookupKind,
        name: String,
        vm: String,
    },

    /// A read from RackTables failed
    #[error("RackTables: {0}")]
    Remote(#[from] racktables::Error),
}

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_message() {
        let err = Error::Lookup {
            kind: LookupKind::ProjectTag,
            name: "proj9".to_string(),
            vm: "vm1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no project tag named 'proj9' (needed by VM 'vm1')"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound {
            path: PathBuf::from("missing.json"),
        };
        assert_eq!(err.to_string(), "input file not found: missing.json");
    }
}
