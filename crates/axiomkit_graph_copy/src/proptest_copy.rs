//! Property tests for the copy laws over generated parent/child graphs.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use crate::copy::GraphCopyEngine;
use crate::model::{EntityRef, EnumValue, Value};
use crate::policy::ExcludeFieldNames;
use crate::schema::{DeclaredType, TypeDescriptor};
use crate::spec::{EnumContainerKind, EnumCopyCycleStrategy, SpecGraphCopyOptions};

fn schema() -> (Arc<TypeDescriptor>, Arc<TypeDescriptor>) {
    let child = TypeDescriptor::builder("Item")
        .copy_support()
        .field("id", DeclaredType::value("Uuid"))
        .field("owner", DeclaredType::copyable("Order"))
        .field("label", DeclaredType::value("String"))
        .field("amount", DeclaredType::value("i64"))
        .build();
    let parent = TypeDescriptor::builder("Order")
        .copy_support()
        .field("id", DeclaredType::value("Uuid"))
        .field("items", DeclaredType::collection(EnumContainerKind::Sequence))
        .field("itemsAsSet", DeclaredType::collection(EnumContainerKind::UniqueSet))
        .build();
    (parent, child)
}

fn engine(rule_cycle: EnumCopyCycleStrategy) -> GraphCopyEngine {
    GraphCopyEngine::new(SpecGraphCopyOptions {
        rule_cycle,
        ..SpecGraphCopyOptions::default()
    })
    .expect("engine")
    .with_excluded_fields(
        ExcludeFieldNames::new()
            .with_type("Order", &["id"])
            .with_type("Item", &["id"]),
    )
}

fn arb_plain_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,12}".prop_map(|s| Value::text(&s)),
        prop::sample::select(vec!["TEST_1", "TEST_2"])
            .prop_map(|variant| Value::from(EnumValue::new("TestEnum", variant))),
    ]
}

fn arb_items() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..12)
}

fn arb_cycle_strategy() -> impl Strategy<Value = EnumCopyCycleStrategy> {
    prop_oneof![
        Just(EnumCopyCycleStrategy::ParentOnly),
        Just(EnumCopyCycleStrategy::Memoize),
    ]
}

fn build_order(l_items: &[(String, i64)]) -> (EntityRef, Vec<EntityRef>) {
    let (parent_type, child_type) = schema();
    let order = EntityRef::instantiate(&parent_type).expect("instantiate");
    order.set("id", "order-id").expect("set");
    let l_entities: Vec<EntityRef> = l_items
        .iter()
        .enumerate()
        .map(|(n_idx, (label, amount))| {
            let item = EntityRef::instantiate(&child_type).expect("instantiate");
            item.set("id", format!("item-{n_idx}").as_str()).expect("set");
            item.set("owner", &order).expect("set");
            item.set("label", label.as_str()).expect("set");
            item.set("amount", *amount).expect("set");
            item
        })
        .collect();
    let l_values: Vec<Value> = l_entities.iter().map(Value::from).collect();
    order
        .set("items", Value::List(l_values.clone()))
        .expect("set");
    order
        .set("itemsAsSet", Value::Set(l_values.into_iter().collect()))
        .expect("set");
    (order, l_entities)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Values that are not capability-typed entities come back unchanged.
    #[test]
    fn prop_plain_values_pass_through(
        value in arb_plain_value(),
        rule_cycle in arb_cycle_strategy()
    ) {
        prop_assert_eq!(engine(rule_cycle).copy(&value).expect("copy"), value);
    }

    /// Sequences keep order, sets keep membership, identity is reset and every
    /// copied item points back at the copied order.
    #[test]
    fn prop_copy_keeps_shape_and_redirects_back_references(
        l_items in arb_items(),
        rule_cycle in arb_cycle_strategy()
    ) {
        let (order, l_entities) = build_order(&l_items);

        let value_copy = engine(rule_cycle).copy(&Value::from(&order)).expect("copy");
        let order_copy = value_copy.as_entity().expect("entity").clone();
        prop_assert!(!order_copy.ptr_eq(&order));
        prop_assert_eq!(order_copy.get("id").expect("get"), Value::Null);

        let Value::List(l_copies) = order_copy.get("items").expect("get") else {
            return Err(TestCaseError::fail("items must stay a list"));
        };
        prop_assert_eq!(l_copies.len(), l_items.len());
        for (value_item, (label, amount)) in l_copies.iter().zip(&l_items) {
            let item_copy = value_item.as_entity().expect("entity");
            prop_assert!(l_entities.iter().all(|item| !item.ptr_eq(item_copy)));
            prop_assert_eq!(item_copy.get("id").expect("get"), Value::Null);
            prop_assert_eq!(item_copy.get("label").expect("get"), Value::text(label));
            prop_assert_eq!(item_copy.get("amount").expect("get"), Value::Int(*amount));
            prop_assert_eq!(item_copy.get("owner").expect("get"), Value::from(&order_copy));
        }

        let Value::Set(set_copies) = order_copy.get("itemsAsSet").expect("get") else {
            return Err(TestCaseError::fail("itemsAsSet must stay a set"));
        };
        prop_assert_eq!(set_copies.len(), l_items.len());
        let set_labels: HashSet<Value> = set_copies
            .iter()
            .map(|v| v.as_entity().expect("entity").get("label").expect("get"))
            .collect();
        let set_labels_expected: HashSet<Value> =
            l_items.iter().map(|(label, _)| Value::text(label)).collect();
        prop_assert_eq!(set_labels, set_labels_expected);

        for item in &l_entities {
            prop_assert_eq!(item.get("owner").expect("get"), Value::from(&order));
            prop_assert!(item.get("id").expect("get") != Value::Null);
        }
    }

    /// Appending to a source container after the copy never shows up in the copy.
    #[test]
    fn prop_copied_containers_are_isolated(l_items in arb_items()) {
        let (order, _) = build_order(&l_items);
        let value_copy = engine(EnumCopyCycleStrategy::ParentOnly)
            .copy(&Value::from(&order))
            .expect("copy");
        let order_copy = value_copy.as_entity().expect("entity").clone();

        order
            .update("items", |v| {
                if let Value::List(l_values) = v {
                    l_values.push(Value::Int(0));
                }
            })
            .expect("update");

        let Value::List(l_copies) = order_copy.get("items").expect("get") else {
            return Err(TestCaseError::fail("items must stay a list"));
        };
        prop_assert_eq!(l_copies.len(), l_items.len());
    }
}
