//! Copy specification models and top-level error types.

use std::fmt;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pattern matching mode for excluded field name lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Exact string match.
    Literal,
}

/// Cycle handling policy for capability-typed references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCopyCycleStrategy {
    /// Only redirect references to the immediate enclosing parent.
    ///
    /// Longer cycles (`A -> B -> C -> A`) recurse until `depth_limit` (or the
    /// stack) is exhausted.
    ParentOnly,
    /// Remember every copied source entity for the duration of one top-level
    /// call and reuse its copy on the next encounter.
    Memoize,
}

/// Container abstractions a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumContainerKind {
    /// Ordered sequence; copies preserve iteration order.
    Sequence,
    /// Unique membership; copies are hash-backed with no ordering guarantee.
    UniqueSet,
    /// FIFO queue. Not supported by the copy engine.
    Queue,
    /// Ordered set. Not supported by the copy engine.
    SortedSet,
}

impl EnumContainerKind {
    /// Whether the copy engine can re-materialize this container kind.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Sequence | Self::UniqueSet)
    }
}

impl fmt::Display for EnumContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::Sequence => "Sequence",
            Self::UniqueSet => "UniqueSet",
            Self::Queue => "Queue",
            Self::SortedSet => "SortedSet",
        };
        write!(f, "{c_name}")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for [`crate::GraphCopyEngine`].
#[derive(Debug, Clone)]
pub struct SpecGraphCopyOptions {
    /// Field names never copied, for every type (on top of the
    /// [`crate::ExcludedFieldSet`] collaborator).
    pub patterns_exclude_fields: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumCopyPatternMode,
    /// Cycle handling behavior.
    pub rule_cycle: EnumCopyCycleStrategy,
    /// Optional maximum entity nesting depth (root entity is depth 1).
    pub depth_limit: Option<usize>,
    /// Maximum worker threads for batch copies.
    pub num_workers_max: Option<usize>,
}

impl Default for SpecGraphCopyOptions {
    fn default() -> Self {
        Self {
            patterns_exclude_fields: None,
            rule_pattern: EnumCopyPatternMode::Glob,
            rule_cycle: EnumCopyCycleStrategy::ParentOnly,
            depth_limit: None,
            num_workers_max: None,
        }
    }
}

/// Errors raised by a graph copy. Every variant aborts the whole top-level
/// call; no partial copy is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphCopyError {
    /// The destination type lacks a field present on the source type.
    #[error(
        "Field {field_name} of {type_name_source} is not available in copy {type_name_destination}. Available Fields {}",
        .fields_available.join(", ")
    )]
    StructuralMismatch {
        /// Source runtime type.
        type_name_source: String,
        /// Destination runtime type.
        type_name_destination: String,
        /// Missing field name.
        field_name: String,
        /// Every field name the destination type declares.
        fields_available: Vec<String>,
    },
    /// A container/map field declared with an abstraction the engine cannot
    /// re-materialize.
    #[error("Unsupported type in {field_name} expected a type of {expected} but was {declared}")]
    UnsupportedContainerType {
        /// Offending field name.
        field_name: String,
        /// Declared (or runtime) type of the field.
        declared: String,
        /// Supported abstraction(s).
        expected: String,
    },
    /// Lower-level introspection or construction failure.
    #[error("Error while copying {}{type_name}: {message}", field_prefix(.field_name.as_deref()))]
    CopyFailure {
        /// Enclosing type name.
        type_name: String,
        /// Offending field, `None` for root-level reify/allocation failures.
        field_name: Option<String>,
        /// Underlying error text.
        message: String,
    },
    /// A copy context was built with an absent component.
    #[error("When creating a copy context, the {component} must not be absent")]
    InvalidContext {
        /// Name of the absent component.
        component: &'static str,
    },
    /// Invalid exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// Invalid depth limit value.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// Entity nesting went deeper than `depth_limit`.
    #[error("Depth limit {depth_limit} exceeded while copying {type_name}")]
    DepthLimitExceeded {
        /// Configured limit.
        depth_limit: usize,
        /// Type that would have been copied past the limit.
        type_name: String,
    },
}

fn field_prefix(field_name: Option<&str>) -> String {
    match field_name {
        Some(name) => format!("field {name} of "),
        None => String::new(),
    }
}

impl GraphCopyError {
    pub(crate) fn copy_failure(
        type_name: &str,
        field_name: Option<&str>,
        message: impl fmt::Display,
    ) -> Self {
        Self::CopyFailure {
            type_name: type_name.to_string(),
            field_name: field_name.map(str::to_string),
            message: message.to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{EnumContainerKind, GraphCopyError};

    #[test]
    fn container_kind_support_is_sequence_and_unique_set_only() {
        assert!(EnumContainerKind::Sequence.is_supported());
        assert!(EnumContainerKind::UniqueSet.is_supported());
        assert!(!EnumContainerKind::Queue.is_supported());
        assert!(!EnumContainerKind::SortedSet.is_supported());
    }

    #[test]
    fn error_messages_name_field_and_type() {
        let err = GraphCopyError::StructuralMismatch {
            type_name_source: "ParentEntity".to_string(),
            type_name_destination: "ParentEntityV2".to_string(),
            field_name: "child".to_string(),
            fields_available: vec!["stringField".to_string(), "children".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Field child of ParentEntity is not available in copy ParentEntityV2. Available Fields stringField, children"
        );

        let err = GraphCopyError::copy_failure("ChildEntity", Some("parentEntity"), "poisoned");
        assert_eq!(
            err.to_string(),
            "Error while copying field parentEntity of ChildEntity: poisoned"
        );

        let err = GraphCopyError::copy_failure("ChildEntity", None, "abstract");
        assert_eq!(err.to_string(), "Error while copying ChildEntity: abstract");
    }
}
