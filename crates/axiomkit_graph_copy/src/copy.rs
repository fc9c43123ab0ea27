use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::container::ContainerFactory;
use crate::context::CopyContext;
use crate::model::{EntityRef, Value};
use crate::policy::{
    BlankAllocator, DescriptorAllocator, ExcludeNothing, ExcludedFieldSet, Reify, ReifyIdentity,
};
use crate::report::{ReportGraphCopy, ReportGraphCopyBuilder};
use crate::schema::{DeclaredType, FieldDescriptor, TypeDescriptor};
use crate::spec::{EnumContainerKind, EnumCopyCycleStrategy, GraphCopyError, SpecGraphCopyOptions};
use crate::util::{
    SpecFieldPatterns, calculate_worker_limit, is_depth_within_limit, validate_depth_limit,
};

/// Fields to copy for one runtime type, after exclusions.
#[derive(Debug)]
struct SpecCopyPlan {
    descriptor: Arc<TypeDescriptor>,
    l_fields: Vec<FieldDescriptor>,
    n_excluded: u64,
}

/// Per top-level call state.
#[derive(Debug, Default)]
struct SpecCopyState {
    builder_cp_report: ReportGraphCopyBuilder,
    dict_visited: HashMap<EntityRef, EntityRef>,
    n_depth: usize,
}

/// Deep-copies object graphs of capability-typed entities.
///
/// The engine is immutable after construction apart from its copy-plan cache,
/// so one instance can serve concurrent copies of disjoint graphs.
///
/// For every field of a capability-typed entity the first matching rule wins:
/// 1. absent source value stays absent,
/// 2. a reference to the enclosing parent is redirected to the parent's copy,
/// 3. mapping declarations are re-materialized entry by entry,
/// 4. collection declarations are re-materialized element by element,
/// 5. capability-typed declarations are copied recursively,
/// 6. anything else is assigned as is (shared).
pub struct GraphCopyEngine {
    spec_cp_options: SpecGraphCopyOptions,
    spec_cp_pats: SpecFieldPatterns,
    reify: Arc<dyn Reify>,
    excluded_fields: Arc<dyn ExcludedFieldSet>,
    allocator: Arc<dyn BlankAllocator>,
    cache_copy_plans: RwLock<HashMap<String, Arc<SpecCopyPlan>>>,
}

impl fmt::Debug for GraphCopyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCopyEngine")
            .field("spec_cp_options", &self.spec_cp_options)
            .field("spec_cp_pats", &self.spec_cp_pats)
            .finish_non_exhaustive()
    }
}

impl GraphCopyEngine {
    /// Build an engine from options.
    ///
    /// Defaults: no wrappers ([`ReifyIdentity`]), no collaborator exclusions
    /// ([`ExcludeNothing`]) and zero-initialized destinations
    /// ([`DescriptorAllocator`]).
    pub fn new(spec_cp_options: SpecGraphCopyOptions) -> Result<Self, GraphCopyError> {
        validate_depth_limit(spec_cp_options.depth_limit)?;
        let spec_cp_pats = SpecFieldPatterns::from_raw(
            spec_cp_options.patterns_exclude_fields.as_deref(),
            spec_cp_options.rule_pattern,
        )?;
        Ok(Self {
            spec_cp_options,
            spec_cp_pats,
            reify: Arc::new(ReifyIdentity),
            excluded_fields: Arc::new(ExcludeNothing),
            allocator: Arc::new(DescriptorAllocator),
            cache_copy_plans: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_reify(mut self, reify: impl Reify + 'static) -> Self {
        self.reify = Arc::new(reify);
        self
    }

    /// Replace the exclusion collaborator. Cached plans are dropped.
    pub fn with_excluded_fields(
        mut self,
        excluded_fields: impl ExcludedFieldSet + 'static,
    ) -> Self {
        self.excluded_fields = Arc::new(excluded_fields);
        self.cache_copy_plans = RwLock::new(HashMap::new());
        self
    }

    pub fn with_allocator(mut self, allocator: impl BlankAllocator + 'static) -> Self {
        self.allocator = Arc::new(allocator);
        self
    }

    pub fn options(&self) -> &SpecGraphCopyOptions {
        &self.spec_cp_options
    }

    /// Copy a root value with no enclosing parent.
    ///
    /// Values that are not capability-typed entities come back unchanged.
    pub fn copy(&self, value: &Value) -> Result<Value, GraphCopyError> {
        self.run_top_level(value, None).map(|(value_copy, _)| value_copy)
    }

    /// Copy a value reachable from the parent pair in `spec_cp_ctx`: fields of
    /// `value` referencing the origin parent are redirected to its copy.
    pub fn copy_with_context(
        &self,
        value: &Value,
        spec_cp_ctx: &CopyContext,
    ) -> Result<Value, GraphCopyError> {
        self.run_top_level(value, Some(spec_cp_ctx))
            .map(|(value_copy, _)| value_copy)
    }

    /// Like [`GraphCopyEngine::copy`], also returning run counters.
    pub fn copy_with_report(
        &self,
        value: &Value,
    ) -> Result<(Value, ReportGraphCopy), GraphCopyError> {
        self.run_top_level(value, None)
    }

    /// Copy several disjoint roots.
    ///
    /// Each root is an independent top-level copy (memo tables are not shared
    /// between roots). Runs on a rayon pool capped by `num_workers_max`;
    /// output order matches input order and the first error aborts the batch.
    pub fn copy_many(
        &self,
        values: &[Value],
    ) -> Result<(Vec<Value>, ReportGraphCopy), GraphCopyError> {
        let n_workers_max = calculate_worker_limit(self.spec_cp_options.num_workers_max);
        let mut builder_cp_report = ReportGraphCopyBuilder::default();

        let l_results = if n_workers_max <= 1 || values.len() <= 1 {
            self.copy_serial(values)?
        } else {
            match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
                Ok(thread_pool) => thread_pool.install(|| {
                    values
                        .par_iter()
                        .map(|value| self.copy_with_report(value))
                        .collect::<Result<Vec<_>, _>>()
                })?,
                Err(_) => {
                    builder_cp_report.add_warning(format!(
                        "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial copy."
                    ));
                    self.copy_serial(values)?
                }
            }
        };

        let mut l_copies = Vec::with_capacity(l_results.len());
        for (value_copy, report) in l_results {
            builder_cp_report.merge(report);
            l_copies.push(value_copy);
        }
        Ok((l_copies, builder_cp_report.build()))
    }

    fn copy_serial(
        &self,
        values: &[Value],
    ) -> Result<Vec<(Value, ReportGraphCopy)>, GraphCopyError> {
        values
            .iter()
            .map(|value| self.copy_with_report(value))
            .collect()
    }

    fn run_top_level(
        &self,
        value: &Value,
        spec_cp_ctx: Option<&CopyContext>,
    ) -> Result<(Value, ReportGraphCopy), GraphCopyError> {
        let mut spec_cp_state = SpecCopyState::default();
        debug!(
            kind = value.kind_name(),
            rule_cycle = ?self.spec_cp_options.rule_cycle,
            "graph copy started"
        );

        let value_copy = match value {
            Value::Entity(entity) if entity.descriptor().is_copy_supported() => {
                Value::Entity(self.copy_entity(entity, spec_cp_ctx, &mut spec_cp_state)?)
            }
            Value::Entity(_) => {
                spec_cp_state.builder_cp_report.add_shared();
                value.clone()
            }
            _ => value.clone(),
        };

        let report = spec_cp_state.builder_cp_report.build();
        debug!(
            cnt_copied = report.cnt_copied,
            cnt_shared = report.cnt_shared,
            cnt_redirected = report.cnt_redirected,
            cnt_excluded = report.cnt_excluded,
            cnt_memoized = report.cnt_memoized,
            "graph copy finished"
        );
        Ok((value_copy, report))
    }

    fn copy_entity(
        &self,
        source: &EntityRef,
        spec_cp_ctx: Option<&CopyContext>,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<EntityRef, GraphCopyError> {
        let origin = self
            .reify
            .reify(source)
            .map_err(|e| GraphCopyError::copy_failure(source.descriptor().name(), None, e))?;

        if self.spec_cp_options.rule_cycle == EnumCopyCycleStrategy::Memoize {
            if let Some(entity_copy) = spec_cp_state.dict_visited.get(&origin) {
                spec_cp_state.builder_cp_report.add_memoized();
                return Ok(entity_copy.clone());
            }
        }

        spec_cp_state.n_depth += 1;
        let res_copy = self.populate_entity(&origin, spec_cp_ctx, spec_cp_state);
        spec_cp_state.n_depth -= 1;
        res_copy
    }

    fn populate_entity(
        &self,
        origin: &EntityRef,
        spec_cp_ctx: Option<&CopyContext>,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<EntityRef, GraphCopyError> {
        let descriptor = origin.descriptor();
        if let Some(depth_limit) = self.spec_cp_options.depth_limit {
            if !is_depth_within_limit(spec_cp_state.n_depth, Some(depth_limit)) {
                return Err(GraphCopyError::DepthLimitExceeded {
                    depth_limit,
                    type_name: descriptor.name().to_string(),
                });
            }
        }

        let entity_copy = self
            .allocator
            .allocate_blank(descriptor)
            .map_err(|e| GraphCopyError::copy_failure(descriptor.name(), None, e))?;
        spec_cp_state.builder_cp_report.add_copied();
        if self.spec_cp_options.rule_cycle == EnumCopyCycleStrategy::Memoize {
            spec_cp_state
                .dict_visited
                .insert(origin.clone(), entity_copy.clone());
        }
        trace!(
            type_name = descriptor.name(),
            n_depth = spec_cp_state.n_depth,
            source = origin.identity(),
            "copying entity"
        );

        let spec_cp_plan = self.copy_plan(descriptor);
        spec_cp_state
            .builder_cp_report
            .add_excluded(spec_cp_plan.n_excluded);

        let descriptor_copy = entity_copy.descriptor();
        let spec_cp_ctx_child = CopyContext::for_parent(origin, &entity_copy);
        for field in &spec_cp_plan.l_fields {
            let field_name = field.name();
            if descriptor_copy.field(field_name).is_none() {
                return Err(GraphCopyError::StructuralMismatch {
                    type_name_source: descriptor.name().to_string(),
                    type_name_destination: descriptor_copy.name().to_string(),
                    field_name: field_name.to_string(),
                    fields_available: descriptor_copy.field_names(),
                });
            }

            let value_source = origin.get(field_name).map_err(|e| {
                GraphCopyError::copy_failure(descriptor.name(), Some(field_name), e)
            })?;
            let value_copy = self.resolve_field(
                field,
                &value_source,
                spec_cp_ctx,
                &spec_cp_ctx_child,
                spec_cp_state,
            )?;
            entity_copy.set(field_name, value_copy).map_err(|e| {
                GraphCopyError::copy_failure(descriptor_copy.name(), Some(field_name), e)
            })?;
        }
        Ok(entity_copy)
    }

    fn resolve_field(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        spec_cp_ctx: Option<&CopyContext>,
        spec_cp_ctx_child: &CopyContext,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<Value, GraphCopyError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let type_name_owner = spec_cp_ctx_child.origin_parent_type().name();
        if let Some(spec_cp_ctx) = spec_cp_ctx {
            if self.is_back_reference(spec_cp_ctx, value, type_name_owner, field.name())? {
                spec_cp_state.builder_cp_report.add_redirected();
                return Ok(Value::from(spec_cp_ctx.copy_of_parent_object()));
            }
        }

        match field.declared_type() {
            DeclaredType::Mapping => {
                self.copy_mapping(field, value, spec_cp_ctx_child, spec_cp_state)
            }
            DeclaredType::Collection(_) => {
                self.copy_collection(field, value, spec_cp_ctx_child, spec_cp_state)
            }
            declared_type if declared_type.is_copy_supported() => match value {
                Value::Entity(entity) if entity.descriptor().is_copy_supported() => {
                    let entity_copy = self
                        .copy_entity(entity, Some(spec_cp_ctx_child), spec_cp_state)
                        .map_err(|e| attach_owner_field(e, type_name_owner, field.name()))?;
                    Ok(Value::Entity(entity_copy))
                }
                _ => Ok(self.share(value, spec_cp_state)),
            },
            _ => Ok(self.share(value, spec_cp_state)),
        }
    }

    /// Resolve one collection element or map entry side.
    fn resolve_element(
        &self,
        value: &Value,
        field_name: &str,
        spec_cp_ctx_child: &CopyContext,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<Value, GraphCopyError> {
        match value {
            Value::Entity(entity) if entity.descriptor().is_copy_supported() => {
                let type_name_owner = spec_cp_ctx_child.origin_parent_type().name();
                if self.is_back_reference(spec_cp_ctx_child, value, type_name_owner, field_name)? {
                    spec_cp_state.builder_cp_report.add_redirected();
                    return Ok(Value::from(spec_cp_ctx_child.copy_of_parent_object()));
                }
                let entity_copy = self
                    .copy_entity(entity, Some(spec_cp_ctx_child), spec_cp_state)
                    .map_err(|e| attach_owner_field(e, type_name_owner, field_name))?;
                Ok(Value::Entity(entity_copy))
            }
            _ => Ok(self.share(value, spec_cp_state)),
        }
    }

    fn copy_collection(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        spec_cp_ctx_child: &CopyContext,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<Value, GraphCopyError> {
        let Some(mut buffer) = ContainerFactory::new_collection(field, value)? else {
            return Ok(Value::Null);
        };
        let iter_elements: Box<dyn Iterator<Item = &Value> + '_> =
            if let Some(l_values) = value.as_list() {
                Box::new(l_values.iter())
            } else if let Some(set_values) = value.as_set() {
                Box::new(set_values.iter())
            } else {
                return Err(GraphCopyError::UnsupportedContainerType {
                    field_name: field.name().to_string(),
                    declared: value.kind_name().to_string(),
                    expected: format!(
                        "{} or {}",
                        EnumContainerKind::Sequence,
                        EnumContainerKind::UniqueSet
                    ),
                });
            };
        for element in iter_elements {
            buffer.push(self.resolve_element(
                element,
                field.name(),
                spec_cp_ctx_child,
                spec_cp_state,
            )?);
        }
        Ok(buffer.into_value())
    }

    fn copy_mapping(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        spec_cp_ctx_child: &CopyContext,
        spec_cp_state: &mut SpecCopyState,
    ) -> Result<Value, GraphCopyError> {
        let Some(mut dict_copy) = ContainerFactory::new_mapping(field, value)? else {
            return Ok(Value::Null);
        };
        let Some(dict_source) = value.as_map() else {
            return Err(GraphCopyError::UnsupportedContainerType {
                field_name: field.name().to_string(),
                declared: value.kind_name().to_string(),
                expected: DeclaredType::Mapping.to_string(),
            });
        };

        for (key, value_entry) in dict_source {
            let key_copy =
                self.resolve_element(key, field.name(), spec_cp_ctx_child, spec_cp_state)?;
            if key.as_entity().is_some() && key_copy != *key {
                // Lookups by the source key will not find this entry.
                let type_name = spec_cp_ctx_child.origin_parent_type().name();
                warn!(
                    field = field.name(),
                    type_name = type_name,
                    "capability-typed map key replaced by its copy"
                );
                spec_cp_state.builder_cp_report.add_warning(format!(
                    "Map field {} of {type_name} has capability-typed keys; \
                     copied keys replace the source keys.",
                    field.name()
                ));
            }
            let value_entry_copy =
                self.resolve_element(value_entry, field.name(), spec_cp_ctx_child, spec_cp_state)?;
            dict_copy.insert(key_copy, value_entry_copy);
        }
        Ok(Value::Map(dict_copy))
    }

    fn share(&self, value: &Value, spec_cp_state: &mut SpecCopyState) -> Value {
        if value.as_entity().is_some() {
            spec_cp_state.builder_cp_report.add_shared();
        }
        value.clone()
    }

    /// Whether `value` is the context's origin parent, by identity or once
    /// both sides are reified.
    ///
    /// Only capability-typed values are reified; anything else matches by
    /// identity alone. `type_name` is the source type whose field is read.
    fn is_back_reference(
        &self,
        spec_cp_ctx: &CopyContext,
        value: &Value,
        type_name: &str,
        field_name: &str,
    ) -> Result<bool, GraphCopyError> {
        let Some(entity) = value.as_entity() else {
            return Ok(false);
        };
        if spec_cp_ctx.is_origin_parent(value) {
            return Ok(true);
        }
        if !value.is_copy_supported() {
            return Ok(false);
        }
        let entity_reified = self
            .reify
            .reify(entity)
            .map_err(|e| GraphCopyError::copy_failure(type_name, Some(field_name), e))?;
        let origin_reified = self
            .reify
            .reify(spec_cp_ctx.origin_parent_object())
            .map_err(|e| GraphCopyError::copy_failure(type_name, Some(field_name), e))?;
        Ok(entity_reified.ptr_eq(&origin_reified))
    }

    fn copy_plan(&self, descriptor: &Arc<TypeDescriptor>) -> Arc<SpecCopyPlan> {
        if let Ok(cache) = self.cache_copy_plans.read() {
            if let Some(spec_cp_plan) = cache.get(descriptor.name()) {
                if Arc::ptr_eq(&spec_cp_plan.descriptor, descriptor) {
                    return Arc::clone(spec_cp_plan);
                }
            }
        }

        let spec_cp_plan = Arc::new(self.build_copy_plan(descriptor));
        // A poisoned cache only costs a rebuild on the next lookup.
        if let Ok(mut cache) = self.cache_copy_plans.write() {
            cache.insert(descriptor.name().to_string(), Arc::clone(&spec_cp_plan));
        }
        spec_cp_plan
    }

    fn build_copy_plan(&self, descriptor: &Arc<TypeDescriptor>) -> SpecCopyPlan {
        let set_excluded = self.excluded_fields.excluded_fields(descriptor);
        let (l_fields, l_excluded): (Vec<FieldDescriptor>, Vec<FieldDescriptor>) = descriptor
            .all_fields()
            .iter()
            .cloned()
            .partition(|field| {
                !set_excluded.contains(field.name())
                    && !self.spec_cp_pats.should_exclude_field(field.name())
            });
        debug!(
            type_name = descriptor.name(),
            n_fields = l_fields.len(),
            n_excluded = l_excluded.len(),
            "copy plan built"
        );
        SpecCopyPlan {
            descriptor: Arc::clone(descriptor),
            l_fields,
            n_excluded: l_excluded.len() as u64,
        }
    }
}

/// One-shot copy with a fresh engine built from `spec_cp_options`.
pub fn copy_graph(
    value: &Value,
    spec_cp_options: SpecGraphCopyOptions,
) -> Result<Value, GraphCopyError> {
    GraphCopyEngine::new(spec_cp_options)?.copy(value)
}

/// Name the owning field on a failure raised while copying a nested entity.
///
/// Failures that already carry a field name, and other error kinds, pass
/// through unchanged so the innermost owner wins.
fn attach_owner_field(
    err: GraphCopyError,
    type_name_owner: &str,
    field_name: &str,
) -> GraphCopyError {
    match err {
        GraphCopyError::CopyFailure {
            type_name,
            field_name: None,
            message,
        } => GraphCopyError::copy_failure(
            type_name_owner,
            Some(field_name),
            format!("{type_name}: {message}"),
        ),
        other => other,
    }
}
