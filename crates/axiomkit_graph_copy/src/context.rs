//! Back-reference context threaded one level down a recursive copy.

use std::sync::Arc;

use crate::model::{EntityRef, Value};
use crate::schema::TypeDescriptor;
use crate::spec::GraphCopyError;

/// Pairs the source parent currently being expanded with its in-progress
/// copy.
///
/// A context is built right before descending into a field, container element
/// or map entry of the parent, and lives only for that call. It is never
/// mutated.
#[derive(Debug, Clone)]
pub struct CopyContext {
    origin_parent_object: EntityRef,
    origin_parent_type: Arc<TypeDescriptor>,
    copy_of_parent_object: EntityRef,
}

impl CopyContext {
    pub fn new(
        origin_parent_object: EntityRef,
        origin_parent_type: Arc<TypeDescriptor>,
        copy_of_parent_object: EntityRef,
    ) -> Self {
        Self {
            origin_parent_object,
            origin_parent_type,
            copy_of_parent_object,
        }
    }

    /// Build a context from possibly-absent parts.
    ///
    /// Fails with [`GraphCopyError::InvalidContext`] naming the first absent
    /// component.
    pub fn try_from_parts(
        origin_parent_object: Option<EntityRef>,
        origin_parent_type: Option<Arc<TypeDescriptor>>,
        copy_of_parent_object: Option<EntityRef>,
    ) -> Result<Self, GraphCopyError> {
        let origin_parent_object = origin_parent_object.ok_or(GraphCopyError::InvalidContext {
            component: "originParentObject",
        })?;
        let origin_parent_type = origin_parent_type.ok_or(GraphCopyError::InvalidContext {
            component: "originParentType",
        })?;
        let copy_of_parent_object = copy_of_parent_object.ok_or(GraphCopyError::InvalidContext {
            component: "copyOfParentObject",
        })?;
        Ok(Self::new(
            origin_parent_object,
            origin_parent_type,
            copy_of_parent_object,
        ))
    }

    /// Context for descending from `origin` whose copy is `copy`.
    pub(crate) fn for_parent(origin: &EntityRef, copy: &EntityRef) -> Self {
        Self::new(
            origin.clone(),
            Arc::clone(origin.descriptor()),
            copy.clone(),
        )
    }

    pub fn origin_parent_object(&self) -> &EntityRef {
        &self.origin_parent_object
    }

    pub fn origin_parent_type(&self) -> &Arc<TypeDescriptor> {
        &self.origin_parent_type
    }

    pub fn copy_of_parent_object(&self) -> &EntityRef {
        &self.copy_of_parent_object
    }

    /// Whether `value` references the origin parent itself.
    pub fn is_origin_parent(&self, value: &Value) -> bool {
        value
            .as_entity()
            .is_some_and(|e| e.ptr_eq(&self.origin_parent_object))
    }
}

#[cfg(test)]
mod tests {
    use super::CopyContext;
    use crate::model::{EntityRef, Value};
    use crate::schema::TypeDescriptor;
    use crate::spec::GraphCopyError;

    #[test]
    fn try_from_parts_rejects_each_absent_component() {
        let descriptor = TypeDescriptor::builder("ParentEntity").copy_support().build();
        let origin = EntityRef::instantiate(&descriptor).expect("instantiate");
        let copy = EntityRef::blank(&descriptor).expect("blank");

        let err = CopyContext::try_from_parts(None, Some(descriptor.clone()), Some(copy.clone()))
            .expect_err("must fail");
        assert_eq!(
            err,
            GraphCopyError::InvalidContext {
                component: "originParentObject"
            }
        );

        let err = CopyContext::try_from_parts(Some(origin.clone()), None, Some(copy.clone()))
            .expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "When creating a copy context, the originParentType must not be absent"
        );

        let err = CopyContext::try_from_parts(Some(origin.clone()), Some(descriptor.clone()), None)
            .expect_err("must fail");
        assert!(matches!(
            err,
            GraphCopyError::InvalidContext {
                component: "copyOfParentObject"
            }
        ));

        let ctx = CopyContext::try_from_parts(Some(origin.clone()), Some(descriptor), Some(copy))
            .expect("complete context");
        assert!(ctx.is_origin_parent(&Value::from(&origin)));
        assert_eq!(ctx.origin_parent_type().name(), "ParentEntity");
    }

    #[test]
    fn is_origin_parent_uses_identity() {
        let descriptor = TypeDescriptor::builder("ParentEntity").copy_support().build();
        let origin = EntityRef::instantiate(&descriptor).expect("instantiate");
        let twin = EntityRef::instantiate(&descriptor).expect("instantiate");
        let copy = EntityRef::blank(&descriptor).expect("blank");

        let ctx = CopyContext::for_parent(&origin, &copy);
        assert!(ctx.is_origin_parent(&Value::from(&origin)));
        assert!(!ctx.is_origin_parent(&Value::from(&twin)));
        assert!(!ctx.is_origin_parent(&Value::from(&copy)));
        assert!(!ctx.is_origin_parent(&Value::Null));
    }
}
