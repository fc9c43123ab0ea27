//! `axiomkit_graph_copy` v1:
//! Deep-copy engine for in-memory object graphs.
//!
//! Capability-typed entities are cloned field by field into blank instances,
//! identity/audit fields are left at their zero value, and references back to
//! the enclosing parent are redirected to the parent's copy.
//!
//! Modules:
//! - `copy`      : recursive copy engine and batch copy
//! - `context`   : parent/copy pair threaded one level down
//! - `container` : fresh sequence/set/map instances per declared field type
//! - `schema`    : type and field descriptor tables
//! - `model`     : values and shared entity handles
//! - `policy`    : reify/exclusion/allocation collaborators
//! - `spec`      : enums/options/errors
//! - `report`    : run-time report model
//! - `util`      : shared helper functions

pub mod container;
pub mod context;
pub mod copy;
pub mod model;
pub mod policy;
pub mod report;
pub mod schema;
pub mod spec;
mod util;

#[cfg(test)]
mod proptest_copy;

pub use container::{ContainerFactory, TypeCollectionBuffer};
pub use context::CopyContext;
pub use copy::{GraphCopyEngine, copy_graph};
pub use model::{EntityRef, EnumValue, FieldAccessError, Value};
pub use policy::{
    BlankAllocator, DescriptorAllocator, ExcludeBaseTypeFields, ExcludeFieldNames, ExcludeNothing,
    ExcludedFieldSet, Reify, ReifyIdentity,
};
pub use report::{ReportGraphCopy, ReportGraphCopyBuilder};
pub use schema::{DeclaredType, FieldDescriptor, TypeDescriptor, TypeDescriptorBuilder};
pub use spec::{
    EnumContainerKind, EnumCopyCycleStrategy, EnumCopyPatternMode, GraphCopyError,
    SpecGraphCopyOptions,
};
