//! Fresh container instances matching a field's declared abstraction.

use std::collections::{HashMap, HashSet};

use crate::model::Value;
use crate::schema::{DeclaredType, FieldDescriptor};
use crate::spec::{EnumContainerKind, GraphCopyError};

/// Empty destination collection being filled element by element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCollectionBuffer {
    /// Preserves insertion order.
    Sequence(Vec<Value>),
    /// Hash-backed, no ordering guarantee.
    UniqueSet(HashSet<Value>),
}

impl TypeCollectionBuffer {
    pub fn push(&mut self, value: Value) {
        match self {
            Self::Sequence(l) => l.push(value),
            Self::UniqueSet(s) => {
                s.insert(value);
            }
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Sequence(l) => Value::List(l),
            Self::UniqueSet(s) => Value::Set(s),
        }
    }
}

/// Builds empty containers for the copy engine.
pub struct ContainerFactory;

impl ContainerFactory {
    /// Fresh collection for `field`, or `None` when the source value is absent.
    ///
    /// Only [`EnumContainerKind::Sequence`] and [`EnumContainerKind::UniqueSet`]
    /// declarations are supported.
    pub fn new_collection(
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<Option<TypeCollectionBuffer>, GraphCopyError> {
        if value.is_null() {
            return Ok(None);
        }
        match field.declared_type() {
            DeclaredType::Collection(kind) if kind.is_supported() => {
                if *kind == EnumContainerKind::Sequence {
                    Ok(Some(TypeCollectionBuffer::Sequence(Vec::new())))
                } else {
                    Ok(Some(TypeCollectionBuffer::UniqueSet(HashSet::new())))
                }
            }
            declared_type => Err(GraphCopyError::UnsupportedContainerType {
                field_name: field.name().to_string(),
                declared: declared_type.to_string(),
                expected: format!(
                    "{} or {}",
                    EnumContainerKind::Sequence,
                    EnumContainerKind::UniqueSet
                ),
            }),
        }
    }

    /// Fresh hash-keyed map for `field`, or `None` when the source value is
    /// absent. Source ordering is never carried over.
    pub fn new_mapping(
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<Option<HashMap<Value, Value>>, GraphCopyError> {
        if value.is_null() {
            return Ok(None);
        }
        if !field.declared_type().is_mapping() {
            return Err(GraphCopyError::UnsupportedContainerType {
                field_name: field.name().to_string(),
                declared: field.declared_type().to_string(),
                expected: DeclaredType::Mapping.to_string(),
            });
        }
        Ok(Some(HashMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ContainerFactory, TypeCollectionBuffer};
    use crate::model::Value;
    use crate::schema::{DeclaredType, FieldDescriptor};
    use crate::spec::{EnumContainerKind, GraphCopyError};

    fn field(name: &str, declared_type: DeclaredType) -> FieldDescriptor {
        FieldDescriptor::new(name, declared_type, Value::Null)
    }

    #[test]
    fn absent_source_yields_absent_container() {
        let children = field(
            "children",
            DeclaredType::collection(EnumContainerKind::Sequence),
        );
        let key_values = field("keyValues", DeclaredType::Mapping);

        assert_eq!(
            ContainerFactory::new_collection(&children, &Value::Null).expect("collection"),
            None
        );
        assert_eq!(
            ContainerFactory::new_mapping(&key_values, &Value::Null).expect("mapping"),
            None
        );
    }

    #[test]
    fn sequence_and_unique_set_get_matching_buffers() {
        let children = field(
            "children",
            DeclaredType::collection(EnumContainerKind::Sequence),
        );
        let children_as_set = field(
            "childrenAsSet",
            DeclaredType::collection(EnumContainerKind::UniqueSet),
        );

        let buffer = ContainerFactory::new_collection(&children, &Value::List(vec![Value::Int(1)]))
            .expect("collection")
            .expect("present");
        assert!(matches!(buffer, TypeCollectionBuffer::Sequence(ref l) if l.is_empty()));

        let buffer =
            ContainerFactory::new_collection(&children_as_set, &Value::Set(Default::default()))
                .expect("collection")
                .expect("present");
        assert!(matches!(buffer, TypeCollectionBuffer::UniqueSet(ref s) if s.is_empty()));
    }

    #[test]
    fn fresh_collection_is_independent_of_source() {
        let children = field(
            "children",
            DeclaredType::collection(EnumContainerKind::Sequence),
        );
        let mut l_source = vec![Value::Int(1)];
        let buffer = ContainerFactory::new_collection(&children, &Value::List(l_source.clone()))
            .expect("collection")
            .expect("present");

        l_source.push(Value::Int(2));
        assert_ne!(buffer.into_value(), Value::List(l_source));
    }

    #[test]
    fn unique_set_buffer_deduplicates() {
        let mut buffer = TypeCollectionBuffer::UniqueSet(Default::default());
        buffer.push(Value::Int(1));
        buffer.push(Value::Int(1));
        buffer.push(Value::Int(2));
        assert_eq!(
            buffer.into_value(),
            Value::Set([Value::Int(1), Value::Int(2)].into_iter().collect())
        );
    }

    #[test]
    fn mapping_declared_collection_is_unsupported() {
        let key_values = field("keyValues", DeclaredType::Mapping);
        let err = ContainerFactory::new_collection(&key_values, &Value::Map(HashMap::new()))
            .expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "Unsupported type in keyValues expected a type of Sequence or UniqueSet but was Mapping"
        );
    }

    #[test]
    fn queue_declaration_is_unsupported() {
        let pending = field("pending", DeclaredType::collection(EnumContainerKind::Queue));
        let err = ContainerFactory::new_collection(&pending, &Value::List(Vec::new()))
            .expect_err("must fail");
        assert!(matches!(
            err,
            GraphCopyError::UnsupportedContainerType { ref declared, .. } if declared == "Queue"
        ));
    }

    #[test]
    fn non_mapping_field_is_rejected_by_mapping_factory() {
        let int_field = field("intField", DeclaredType::value("i32"));
        let err = ContainerFactory::new_mapping(&int_field, &Value::Int(3)).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "Unsupported type in intField expected a type of Mapping but was i32"
        );
    }
}
