//! Collaborator seams consumed by the copy engine: reification, excluded
//! fields and blank allocation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::model::EntityRef;
use crate::schema::TypeDescriptor;

////////////////////////////////////////////////////////////////////////////////
// #region Reify

/// Resolves a lazy wrapper to the concrete instance behind it.
pub trait Reify: Send + Sync {
    /// Return the backing instance, or `entity` itself when it is not a
    /// wrapper.
    fn reify(&self, entity: &EntityRef) -> Result<EntityRef, String>;
}

/// No wrappers: every entity is its own backing instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReifyIdentity;

impl Reify for ReifyIdentity {
    fn reify(&self, entity: &EntityRef) -> Result<EntityRef, String> {
        Ok(entity.clone())
    }
}

impl<F> Reify for F
where
    F: Fn(&EntityRef) -> Result<EntityRef, String> + Send + Sync,
{
    fn reify(&self, entity: &EntityRef) -> Result<EntityRef, String> {
        self(entity)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExcludedFieldSet

/// Names of fields that must never be copied for a type hierarchy
/// (identity keys, lock counters, audit timestamps).
pub trait ExcludedFieldSet: Send + Sync {
    fn excluded_fields(&self, descriptor: &TypeDescriptor) -> BTreeSet<Arc<str>>;
}

/// Copy every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeNothing;

impl ExcludedFieldSet for ExcludeNothing {
    fn excluded_fields(&self, _descriptor: &TypeDescriptor) -> BTreeSet<Arc<str>> {
        BTreeSet::new()
    }
}

/// Exclude every field declared across a base type's hierarchy, for types
/// that extend it.
///
/// With an identity base type such as `BaseEntityWithGeneratedId`
/// (`id`, extending `BaseEntity` with `optLock`, `createDateTime`,
/// `updateDateTime`), copies come out as brand-new entities.
#[derive(Debug, Clone)]
pub struct ExcludeBaseTypeFields {
    type_name_base: String,
}

impl ExcludeBaseTypeFields {
    pub fn new(type_name_base: &str) -> Self {
        Self {
            type_name_base: type_name_base.to_string(),
        }
    }
}

impl ExcludedFieldSet for ExcludeBaseTypeFields {
    fn excluded_fields(&self, descriptor: &TypeDescriptor) -> BTreeSet<Arc<str>> {
        descriptor
            .hierarchy()
            .find(|t| t.name() == self.type_name_base)
            .map(|base| base.all_fields().iter().map(|f| f.name_shared()).collect())
            .unwrap_or_default()
    }
}

/// Explicit per-type table: the names registered for a type apply to it and
/// to every subtype.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFieldNames {
    dict_names_by_type: HashMap<String, BTreeSet<Arc<str>>>,
}

impl ExcludeFieldNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field_names` for `type_name` and its subtypes.
    pub fn with_type(mut self, type_name: &str, field_names: &[&str]) -> Self {
        self.dict_names_by_type
            .entry(type_name.to_string())
            .or_default()
            .extend(field_names.iter().map(|n| Arc::from(*n)));
        self
    }
}

impl ExcludedFieldSet for ExcludeFieldNames {
    fn excluded_fields(&self, descriptor: &TypeDescriptor) -> BTreeSet<Arc<str>> {
        descriptor
            .hierarchy()
            .filter_map(|t| self.dict_names_by_type.get(t.name()))
            .flatten()
            .cloned()
            .collect()
    }
}

impl<F> ExcludedFieldSet for F
where
    F: Fn(&TypeDescriptor) -> BTreeSet<Arc<str>> + Send + Sync,
{
    fn excluded_fields(&self, descriptor: &TypeDescriptor) -> BTreeSet<Arc<str>> {
        self(descriptor)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BlankAllocator

/// Produces the zero-initialized destination instance for a copy.
pub trait BlankAllocator: Send + Sync {
    fn allocate_blank(&self, descriptor: &Arc<TypeDescriptor>) -> Result<EntityRef, String>;
}

/// Allocate a blank instance of exactly the requested type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorAllocator;

impl BlankAllocator for DescriptorAllocator {
    fn allocate_blank(&self, descriptor: &Arc<TypeDescriptor>) -> Result<EntityRef, String> {
        EntityRef::blank(descriptor).map_err(|e| e.to_string())
    }
}

impl<F> BlankAllocator for F
where
    F: Fn(&Arc<TypeDescriptor>) -> Result<EntityRef, String> + Send + Sync,
{
    fn allocate_blank(&self, descriptor: &Arc<TypeDescriptor>) -> Result<EntityRef, String> {
        self(descriptor)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
