use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_SOURCE: &str = "<unknown>";

/// Where a compiled unit, variable, or procedure was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTag {
    pub source: String,
    pub line: usize,
}

impl SourceTag {
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }

    /// Tag used when the compiler cannot attach a location.
    pub fn unknown() -> Self {
        Self {
            source: UNKNOWN_SOURCE.to_string(),
            line: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == UNKNOWN_SOURCE
    }
}

impl Default for SourceTag {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}:{}", self.source, self.line)
        }
    }
}
