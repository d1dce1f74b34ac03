//! Dotted populate paths.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};

/// A relation path such as `account.owner`, relative to the fetch root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulatePath {
    segments: Vec<SmolStr>,
}

impl PopulatePath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(path: &str) -> QueryResult<Self> {
        let segments: Vec<SmolStr> = path.split('.').map(|s| SmolStr::new(s.trim())).collect();
        if segments.iter().any(SmolStr::is_empty) {
            return Err(QueryError::invalid_populate(path));
        }
        Ok(Self { segments })
    }

    /// Relation names from the root outwards.
    pub fn segments(&self) -> &[SmolStr] {
        &self.segments
    }

    /// Number of relations in the path.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Dotted form of the first `len` segments.
    pub fn prefix(&self, len: usize) -> String {
        self.segments[..len.min(self.segments.len())].join(".")
    }
}

impl FromStr for PopulatePath {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PopulatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_nested() {
        let path: PopulatePath = "account.owner".parse().unwrap();
        assert_eq!(path.depth(), 2);
        assert_eq!(path.prefix(1), "account");
        assert_eq!(path.to_string(), "account.owner");
    }

    #[test]
    fn test_empty_segment() {
        for bad in ["", "account.", ".owner", "a..b"] {
            let err = PopulatePath::parse(bad).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidPopulate, "{bad}");
        }
    }
}
