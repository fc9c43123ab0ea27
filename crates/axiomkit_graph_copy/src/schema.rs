//! Per-type descriptor tables: the field layout the copy engine introspects.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::model::Value;
use crate::spec::EnumContainerKind;

////////////////////////////////////////////////////////////////////////////////
// #region DeclaredType

/// Static type a field is declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// Primitive, enum, text or any other plain value.
    Value(Arc<str>),
    /// Reference to another entity type.
    Entity {
        /// Declared entity type name.
        type_name: Arc<str>,
        /// Whether the declared type carries the copy-support marker.
        copy_support: bool,
    },
    /// Multi-value container.
    Collection(EnumContainerKind),
    /// Hash-keyed mapping.
    Mapping,
}

impl DeclaredType {
    /// Plain value declaration, e.g. `i32` or `String`.
    pub fn value(type_name: &str) -> Self {
        Self::Value(Arc::from(type_name))
    }

    /// Reference to an entity type carrying the copy-support marker.
    pub fn copyable(type_name: &str) -> Self {
        Self::Entity {
            type_name: Arc::from(type_name),
            copy_support: true,
        }
    }

    /// Reference to an entity type without the copy-support marker.
    pub fn opaque(type_name: &str) -> Self {
        Self::Entity {
            type_name: Arc::from(type_name),
            copy_support: false,
        }
    }

    /// Container declaration.
    pub fn collection(kind: EnumContainerKind) -> Self {
        Self::Collection(kind)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    pub fn is_copy_supported(&self) -> bool {
        matches!(
            self,
            Self::Entity {
                copy_support: true,
                ..
            }
        )
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(name) => write!(f, "{name}"),
            Self::Entity { type_name, .. } => write!(f, "{type_name}"),
            Self::Collection(kind) => write!(f, "{kind}"),
            Self::Mapping => write!(f, "Mapping"),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldDescriptor

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: Arc<str>,
    declared_type: DeclaredType,
    value_zero: Value,
    value_initial: Value,
}

impl FieldDescriptor {
    /// Field whose zero and initial value are both `zero`.
    pub fn new(name: &str, declared_type: DeclaredType, zero: Value) -> Self {
        Self {
            name: Arc::from(name),
            declared_type,
            value_initial: zero.clone(),
            value_zero: zero,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_shared(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn declared_type(&self) -> &DeclaredType {
        &self.declared_type
    }

    /// Value held after blank allocation.
    pub fn zero_value(&self) -> &Value {
        &self.value_zero
    }

    /// Value held after normal instantiation.
    pub fn initial_value(&self) -> &Value {
        &self.value_initial
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TypeDescriptor

/// Runtime type of an entity: name, parent type, declared fields and marker.
#[derive(Debug)]
pub struct TypeDescriptor {
    name: Arc<str>,
    parent: Option<Arc<TypeDescriptor>>,
    fields_declared: Vec<FieldDescriptor>,
    if_copy_support: bool,
    if_instantiable: bool,
    fields_all: OnceLock<Vec<FieldDescriptor>>,
}

impl TypeDescriptor {
    /// Start describing a type named `name`.
    pub fn builder(name: &str) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: Arc::from(name),
            parent: None,
            fields_declared: Vec::new(),
            if_copy_support: false,
            if_instantiable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<TypeDescriptor>> {
        self.parent.as_ref()
    }

    /// Fields declared directly on this type (ancestors excluded).
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields_declared
    }

    /// Whether this type or one of its ancestors carries the copy-support
    /// marker.
    pub fn is_copy_supported(&self) -> bool {
        self.hierarchy().any(|t| t.if_copy_support)
    }

    pub fn is_instantiable(&self) -> bool {
        self.if_instantiable
    }

    /// This type followed by its ancestors, nearest first.
    pub fn hierarchy(&self) -> impl Iterator<Item = &TypeDescriptor> {
        std::iter::successors(Some(self), |t| t.parent().map(Arc::as_ref))
    }

    /// Whether `type_name` is this type or one of its ancestors.
    pub fn is_subtype_of(&self, type_name: &str) -> bool {
        self.hierarchy().any(|t| t.name() == type_name)
    }

    /// Every field across the hierarchy, own fields first.
    ///
    /// A field redeclared on a subtype shadows the ancestor's field of the same
    /// name. Built once on first use.
    pub fn all_fields(&self) -> &[FieldDescriptor] {
        self.fields_all.get_or_init(|| {
            let mut set_seen: HashSet<&str> = HashSet::new();
            let mut l_fields = Vec::new();
            for t in self.hierarchy() {
                for field in t.declared_fields() {
                    if set_seen.insert(field.name()) {
                        l_fields.push(field.clone());
                    }
                }
            }
            l_fields
        })
    }

    /// Look up a field by name across the hierarchy.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields().iter().find(|f| f.name() == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.all_fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }
}

/// Builder for [`TypeDescriptor`].
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: Arc<str>,
    parent: Option<Arc<TypeDescriptor>>,
    fields_declared: Vec<FieldDescriptor>,
    if_copy_support: bool,
    if_instantiable: bool,
}

impl TypeDescriptorBuilder {
    /// Inherit fields (and the marker) from `parent`.
    pub fn extends(mut self, parent: &Arc<TypeDescriptor>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Attach the copy-support marker.
    pub fn copy_support(mut self) -> Self {
        self.if_copy_support = true;
        self
    }

    /// Mark the type abstract: it cannot be instantiated or blank-allocated.
    pub fn abstract_type(mut self) -> Self {
        self.if_instantiable = false;
        self
    }

    /// Declare a field with a zero value derived from its declared type:
    /// `Null` for everything but integer primitives (`0`) and `bool` (`false`).
    pub fn field(mut self, name: &str, declared_type: DeclaredType) -> Self {
        let value_zero = derive_zero_value(&declared_type);
        self.fields_declared
            .push(FieldDescriptor::new(name, declared_type, value_zero));
        self
    }

    /// Declare a field whose normal instantiation starts at `initial`.
    pub fn field_init(mut self, name: &str, declared_type: DeclaredType, initial: Value) -> Self {
        self.fields_declared.push(FieldDescriptor {
            name: Arc::from(name),
            value_zero: derive_zero_value(&declared_type),
            value_initial: initial,
            declared_type,
        });
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(TypeDescriptor {
            name: self.name,
            parent: self.parent,
            fields_declared: self.fields_declared,
            if_copy_support: self.if_copy_support,
            if_instantiable: self.if_instantiable,
            fields_all: OnceLock::new(),
        })
    }
}

fn derive_zero_value(declared_type: &DeclaredType) -> Value {
    match declared_type {
        DeclaredType::Value(name) => match name.as_ref() {
            "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" => Value::Int(0),
            "bool" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
