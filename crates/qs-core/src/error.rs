use thiserror::Error;

use crate::tag::SourceTag;

/// A single structural error produced while compiling script source.
#[derive(Debug, Clone, Error)]
#[error("compile error at {tag}: {message}")]
pub struct CompileError {
    pub message: String,
    pub tag: SourceTag,
}

impl CompileError {
    pub fn new(message: impl Into<String>, tag: SourceTag) -> Self {
        Self {
            message: message.into(),
            tag,
        }
    }
}

/// Every failing declaration of a bulk compilation, surfaced together.
#[derive(Debug, Clone, Error)]
#[error("{} compile error(s)", .errors.len())]
pub struct CompileErrorGroup {
    pub errors: Vec<CompileError>,
}

impl CompileErrorGroup {
    pub fn new(errors: Vec<CompileError>) -> Self {
        Self { errors }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CompileFailure {
    #[error(transparent)]
    One(#[from] CompileError),
    #[error(transparent)]
    Group(#[from] CompileErrorGroup),
}

impl CompileFailure {
    /// Flat view over the underlying errors, single or grouped.
    pub fn errors(&self) -> Vec<&CompileError> {
        match self {
            Self::One(error) => vec![error],
            Self::Group(group) => group.errors.iter().collect(),
        }
    }
}

/// A structured target type could not be instantiated by the bridge.
///
/// Leaf conversions never produce this; they fall back to sentinels.
#[derive(Debug, Clone, Error)]
#[error("cannot convert into {target}: {reason}")]
pub struct ConversionError {
    pub target: &'static str,
    pub reason: String,
}

impl ConversionError {
    pub fn new(target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
        }
    }

    pub fn no_constructor(target: &'static str) -> Self {
        Self::new(target, "no default constructor")
    }
}

/// The execution engine faulted while evaluating a compiled unit.
#[derive(Debug, Clone, Error)]
#[error("runtime fault at {tag}: {message}")]
pub struct RuntimeFault {
    pub message: String,
    pub tag: SourceTag,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>, tag: SourceTag) -> Self {
        Self {
            message: message.into(),
            tag,
        }
    }
}

/// Cloning an environment's tables failed.
///
/// Soft by contract: `create_root` recovers from it locally, callers of
/// `try_clone` decide whether to propagate or opt into sharing.
#[derive(Debug, Clone, Error)]
#[error("environment clone failed: {reason}")]
pub struct EnvironmentCloneError {
    pub reason: String,
}

impl EnvironmentCloneError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An opaque external service could not be constructed.
#[derive(Debug, Clone, Error)]
#[error("service unavailable: {reason}")]
pub struct ServiceError {
    pub reason: String,
}

impl ServiceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_failure_flattens_single_and_grouped_errors() {
        let single = CompileFailure::from(CompileError::new("bad token", SourceTag::unknown()));
        assert_eq!(single.errors().len(), 1);

        let group = CompileFailure::from(CompileErrorGroup::new(vec![
            CompileError::new("first", SourceTag::unknown()),
            CompileError::new("second", SourceTag::new("lib.qs", 3)),
        ]));
        let errors = group.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].tag.to_string(), "lib.qs:3");
        assert_eq!(group.to_string(), "2 compile error(s)");
    }

    #[test]
    fn conversion_error_reports_target() {
        let error = ConversionError::no_constructor("Point");
        assert_eq!(error.target, "Point");
        assert!(error.to_string().contains("no default constructor"));
    }
}
