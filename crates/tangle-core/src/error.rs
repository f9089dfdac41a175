use serde::Serialize;
use thiserror::Error;

/// Boxed cause carried by graph errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while declaring links or registering builders.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("link on {requires} must not use an empty pattern together with CreateIfNotExist")]
    InvalidLink { requires: &'static str },

    #[error("multi link on {requires} cannot be REQUIRED")]
    RequiredMulti { requires: &'static str },

    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("a builder named '{0}' is already registered")]
    DuplicateBuilder(String),
}

/// Discriminant of a [`GraphError`], for callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotCreatable,
    CreateFailed,
    LinksUnsatisfied,
    InitializeFailed,
    DeinitializeFailed,
}

/// The hook that was running when a lifecycle failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Initialize,
    Start,
    Deinitialize,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Initialize => write!(f, "initialize"),
            LifecyclePhase::Start => write!(f, "start"),
            LifecyclePhase::Deinitialize => write!(f, "deinitialize"),
        }
    }
}

/// A required link that could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetLink {
    pub requires: &'static str,
    pub pattern: String,
}

impl std::fmt::Display for UnmetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} matching '{}'", self.requires, self.pattern)
    }
}

/// Recoverable failures reported while resolving or driving a graph.
///
/// None of these abort resolution. They are handed to the caller's error
/// callback and the graph carries on with the remaining components.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cannot create '{name}': {reason}")]
    NotCreatable { name: String, reason: String },

    #[error("builder '{name}' failed to create a component: {source}")]
    CreateFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("component '{name}' has unsatisfied required links: {}", format_unmet(.links))]
    LinksUnsatisfied { name: String, links: Vec<UnmetLink> },

    #[error("component '{name}' failed to {phase}: {source}")]
    InitializeFailed {
        name: String,
        phase: LifecyclePhase,
        #[source]
        source: BoxError,
    },

    #[error("component '{name}' failed to deinitialize: {source}")]
    DeinitializeFailed {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NotCreatable { .. } => ErrorKind::NotCreatable,
            GraphError::CreateFailed { .. } => ErrorKind::CreateFailed,
            GraphError::LinksUnsatisfied { .. } => ErrorKind::LinksUnsatisfied,
            GraphError::InitializeFailed { .. } => ErrorKind::InitializeFailed,
            GraphError::DeinitializeFailed { .. } => ErrorKind::DeinitializeFailed,
        }
    }

    /// Name of the component or builder the error is about.
    pub fn name(&self) -> &str {
        match self {
            GraphError::NotCreatable { name, .. }
            | GraphError::CreateFailed { name, .. }
            | GraphError::LinksUnsatisfied { name, .. }
            | GraphError::InitializeFailed { name, .. }
            | GraphError::DeinitializeFailed { name, .. } => name,
        }
    }
}

fn format_unmet(links: &[UnmetLink]) -> String {
    links
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_unsatisfied_lists_every_link() {
        let err = GraphError::LinksUnsatisfied {
            name: "server".into(),
            links: vec![
                UnmetLink {
                    requires: "logger",
                    pattern: "^log$".into(),
                },
                UnmetLink {
                    requires: "clock",
                    pattern: ".*".into(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("'server'"));
        assert!(msg.contains("logger matching '^log$'"));
        assert!(msg.contains("clock matching '.*'"));
        assert_eq!(err.kind(), ErrorKind::LinksUnsatisfied);
    }

    #[test]
    fn create_failed_keeps_cause_chain() {
        let cause: BoxError = "disk full".into();
        let err = GraphError::CreateFailed {
            name: "store".into(),
            source: cause,
        };

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk full");
        assert_eq!(err.name(), "store");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::LinksUnsatisfied).unwrap();
        assert_eq!(json, "\"links_unsatisfied\"");
    }
}
