//! In-memory object graph: values, entities and shared entity handles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::schema::{FieldDescriptor, TypeDescriptor};

////////////////////////////////////////////////////////////////////////////////
// #region Value

/// Variant of a user-declared enum type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Enum type name.
    pub type_name: Arc<str>,
    /// Variant name.
    pub variant: Arc<str>,
}

impl EnumValue {
    pub fn new(type_name: &str, variant: &str) -> Self {
        Self {
            type_name: Arc::from(type_name),
            variant: Arc::from(variant),
        }
    }
}

/// Any value a field, container element or map entry can hold.
///
/// Entities compare and hash by identity. Sets and maps hash by length only,
/// which keeps `Hash` consistent with their order-independent equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absent value.
    Null,
    Bool(bool),
    Int(i64),
    Text(Arc<str>),
    Enum(EnumValue),
    /// Shared reference to an entity.
    Entity(EntityRef),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unique-membership set.
    Set(HashSet<Value>),
    /// Hash-keyed map.
    Map(HashMap<Value, Value>),
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Text(v) => v.hash(state),
            Self::Enum(v) => v.hash(state),
            Self::Entity(v) => v.hash(state),
            Self::List(v) => v.hash(state),
            Self::Set(v) => v.len().hash(state),
            Self::Map(v) => v.len().hash(state),
        }
    }
}

impl Value {
    pub fn text(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Value>> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<Value, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value is an entity whose runtime type carries the
    /// copy-support marker.
    pub fn is_copy_supported(&self) -> bool {
        self.as_entity()
            .is_some_and(|e| e.descriptor().is_copy_supported())
    }

    /// Short runtime kind name used in diagnostics.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Text(_) => "Text",
            Self::Enum(v) => &v.type_name,
            Self::Entity(v) => v.descriptor().name(),
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<EnumValue> for Value {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl From<EntityRef> for Value {
    fn from(value: EntityRef) -> Self {
        Self::Entity(value)
    }
}

impl From<&EntityRef> for Value {
    fn from(value: &EntityRef) -> Self {
        Self::Entity(value.clone())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Entity

/// Field access failure on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldAccessError {
    /// The entity's type declares no such field.
    #[error("{type_name} has no field {field_name}")]
    UnknownField {
        /// Entity type name.
        type_name: String,
        /// Requested field name.
        field_name: String,
    },
    /// A writer panicked while holding the field table.
    #[error("field table of {type_name} is poisoned")]
    Poisoned {
        /// Entity type name.
        type_name: String,
    },
    /// The type is abstract and cannot be constructed.
    #[error("{type_name} is not instantiable")]
    NotInstantiable {
        /// Entity type name.
        type_name: String,
    },
}

/// Instance of a [`TypeDescriptor`]. Only reachable through [`EntityRef`].
struct Entity {
    descriptor: Arc<TypeDescriptor>,
    dict_fields: RwLock<BTreeMap<Arc<str>, Value>>,
}

/// Shared handle to an entity. Clones point at the same instance;
/// equality and hashing are by identity.
#[derive(Clone)]
pub struct EntityRef(Arc<Entity>);

impl EntityRef {
    /// Normal construction: every field starts at its initial value.
    pub fn instantiate(descriptor: &Arc<TypeDescriptor>) -> Result<Self, FieldAccessError> {
        Self::construct(descriptor, |f| f.initial_value().clone())
    }

    /// Zero-initialized construction that skips field initializers.
    pub fn blank(descriptor: &Arc<TypeDescriptor>) -> Result<Self, FieldAccessError> {
        Self::construct(descriptor, |f| f.zero_value().clone())
    }

    fn construct(
        descriptor: &Arc<TypeDescriptor>,
        derive_value: impl Fn(&FieldDescriptor) -> Value,
    ) -> Result<Self, FieldAccessError> {
        if !descriptor.is_instantiable() {
            return Err(FieldAccessError::NotInstantiable {
                type_name: descriptor.name().to_string(),
            });
        }
        let dict_fields = descriptor
            .all_fields()
            .iter()
            .map(|f| (f.name_shared(), derive_value(f)))
            .collect();
        Ok(Self(Arc::new(Entity {
            descriptor: Arc::clone(descriptor),
            dict_fields: RwLock::new(dict_fields),
        })))
    }

    /// Runtime type.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.0.descriptor
    }

    /// Read one field. The returned value is a snapshot; entity references in
    /// it still point at the shared instances.
    pub fn get(&self, field_name: &str) -> Result<Value, FieldAccessError> {
        let dict_fields = self.0.dict_fields.read().map_err(|_| self.poisoned())?;
        dict_fields
            .get(field_name)
            .cloned()
            .ok_or_else(|| self.unknown_field(field_name))
    }

    /// Overwrite one declared field.
    pub fn set(&self, field_name: &str, value: impl Into<Value>) -> Result<(), FieldAccessError> {
        let mut dict_fields = self.0.dict_fields.write().map_err(|_| self.poisoned())?;
        let Some(slot) = dict_fields.get_mut(field_name) else {
            return Err(self.unknown_field(field_name));
        };
        *slot = value.into();
        Ok(())
    }

    /// Mutate one field in place (e.g. push into a list field).
    pub fn update<R>(
        &self,
        field_name: &str,
        apply: impl FnOnce(&mut Value) -> R,
    ) -> Result<R, FieldAccessError> {
        let mut dict_fields = self.0.dict_fields.write().map_err(|_| self.poisoned())?;
        let Some(slot) = dict_fields.get_mut(field_name) else {
            return Err(self.unknown_field(field_name));
        };
        Ok(apply(slot))
    }

    /// Same instance?
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity for the lifetime of the instance, for logs.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn poisoned(&self) -> FieldAccessError {
        FieldAccessError::Poisoned {
            type_name: self.descriptor().name().to_string(),
        }
    }

    fn unknown_field(&self, field_name: &str) -> FieldAccessError {
        FieldAccessError::UnknownField {
            type_name: self.descriptor().name().to_string(),
            field_name: field_name.to_string(),
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

// Graphs may be cyclic: never print field contents.
impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.descriptor().name(), self.identity())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
