use arbor_produce::{
    produce, produce_with_patches, DraftValue, ProduceError, Producer, ProducerConfig,
    SequenceRemoval,
};
use arbor_test_utils::{
    assert_fresh, assert_shared, at, init_tracing, scenario_a, scenario_c, Snapshot,
};
use arbor_value::{Prop, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_scenario_a_nested_write() {
    init_tracing();
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        let b = root.child("b").expect("b is a map");
        b.set("ba", 2)
    })
    .unwrap();

    assert!(!result.same(&origin));
    assert_fresh(&origin, &result, "/b");
    assert_shared(&origin, &result, "/c");
    assert_eq!(at(&result, "/b/ba"), &Value::from(2));
    assert_eq!(at(&result, "/b/bb"), &Value::from(2));
    assert_eq!(at(&origin, "/b/ba"), &Value::from(1));
}

#[test]
fn test_scenario_b_nested_delete() {
    init_tracing();
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        root.child("b").expect("b is a map").remove("ba");
        Ok::<_, ProduceError>(())
    })
    .unwrap();

    assert!(!at(&result, "/b").contains(&Prop::from("ba")));
    assert!(at(&origin, "/b").contains(&Prop::from("ba")));
    assert_shared(&origin, &result, "/c");
}

#[test]
fn test_scenario_c_sequence_root() {
    init_tracing();
    let origin = scenario_c();
    let result = produce(&origin, |root| {
        root.child(1_usize).expect("element 1 is a map").set("a", 2)
    })
    .unwrap();

    assert_shared(&origin, &result, "/2");
    assert_fresh(&origin, &result, "/1");
    assert_shared(&origin, &result, "/1/b");
    assert_eq!(at(&result, "/1/a"), &Value::from(2));
    assert_eq!(at(&result, "/0"), &Value::from(1));
}

#[test]
fn test_no_op_returns_origin() {
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        // reads alone allocate nothing
        let _ = root.at(&"/b/ba".parse().unwrap());
        let _ = root.child("c").map(|c| c.props());
        Ok::<_, ProduceError>(())
    })
    .unwrap();
    assert!(result.same(&origin));
}

#[test]
fn test_redundant_writes_allocate_nothing() {
    let origin = scenario_a();
    let produced = produce_with_patches(&origin, |root| {
        root.set("a", 1)?;
        let b = root.get("b").expect("b exists");
        root.set("b", b)?;
        let c = root.child("c").expect("c is a map");
        c.set("ca", 1)?;
        root.set("c", origin.get(&Prop::from("c")).expect("c exists"))
    })
    .unwrap();

    assert!(produced.value.same(&origin));
    assert_eq!(produced.stats.copies_created, 0);
    assert_eq!(produced.stats.nodes_rebuilt, 0);
    assert!(produced.patches.is_empty());
}

#[test]
fn test_write_then_revert_still_rebuilds() {
    // the copy exists once written; a later write back does not undo it
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        root.set("a", 5)?;
        root.set("a", 1)
    })
    .unwrap();
    assert!(!result.same(&origin));
    assert_eq!(result, origin);
    assert_shared(&origin, &result, "/b");
}

#[test]
fn test_origin_untouched_after_failure() {
    let origin = scenario_a();
    let before = Snapshot::take(&origin);

    let result: Result<Value, anyhow::Error> = produce(&origin, |root| {
        root.set("a", 10)?;
        root.child("b").expect("b is a map").remove("bb");
        anyhow::bail!("routine gave up")
    });

    assert_eq!(result.unwrap_err().to_string(), "routine gave up");
    assert_eq!(Snapshot::take(&origin), before);
}

#[test]
fn test_origin_untouched_after_success() {
    let origin = scenario_c();
    let before = Snapshot::take(&origin);
    let result = produce(&origin, |root| {
        root.push(Value::from(json!({"new": true})))?;
        root.child(1_usize).expect("map").remove("b");
        Ok::<_, ProduceError>(())
    })
    .unwrap();
    assert_eq!(Snapshot::take(&origin), before);
    assert_eq!(result.len(), 4);
}

#[test]
fn test_moved_subtree_keeps_identity() {
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        let c = root.get("c").expect("c exists");
        root.set("moved", c)?;
        root.remove("c");
        Ok::<_, ProduceError>(())
    })
    .unwrap();
    assert!(at(&result, "/moved").same(at(&origin, "/c")));
    assert!(!result.contains(&Prop::from("c")));
}

#[test]
fn test_shared_draft_finalizes_to_one_node() {
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        let b = root.child("b").expect("b is a map");
        b.set("ba", 9)?;
        root.set("alias", b)
    })
    .unwrap();
    assert!(at(&result, "/alias").same(at(&result, "/b")));
    assert_eq!(at(&result, "/alias/ba"), &Value::from(9));
}

#[test]
fn test_new_container_can_be_edited_after_attach() {
    let origin = scenario_a();
    let result = produce(&origin, |root| {
        root.set("fresh", Value::from(json!({"x": 1})))?;
        let fresh = root.child("fresh").expect("just attached");
        fresh.set("y", 2)
    })
    .unwrap();
    assert_eq!(at(&result, "/fresh"), &Value::from(json!({"x": 1, "y": 2})));
}

#[test]
fn test_current_and_original_inside_routine() {
    let origin = scenario_a();
    produce(&origin, |root| {
        let b = root.child("b").expect("b is a map");
        b.set("ba", 3)?;

        assert!(b.is_modified());
        assert!(root.is_modified());
        assert!(!root.child("c").expect("c is a map").is_modified());
        assert_eq!(b.original(), Value::from(json!({"ba": 1, "bb": 2})));

        let snapshot = root.current()?;
        assert_eq!(at(&snapshot, "/b/ba"), &Value::from(3));
        assert_shared(&snapshot, &origin, "/c");
        Ok::<_, ProduceError>(())
    })
    .unwrap();
}

#[test]
fn test_hole_removal_keeps_positions() {
    let origin = Value::from(json!([1, 2, 3]));
    let producer =
        Producer::with_config(ProducerConfig::new().with_sequence_removal(SequenceRemoval::Hole));
    let result = producer
        .produce(&origin, |root| {
            root.remove(1_usize);
            Ok::<_, ProduceError>(())
        })
        .unwrap();
    assert_eq!(result, Value::from(json!([1, null, 3])));

    let shifted = produce(&origin, |root| {
        root.remove(1_usize);
        Ok::<_, ProduceError>(())
    })
    .unwrap();
    assert_eq!(shifted, Value::from(json!([1, 3])));
}

#[test]
fn test_reads_return_drafts_for_containers_only() {
    let origin = scenario_c();
    produce(&origin, |root| {
        assert!(matches!(root.get(0_usize), Some(DraftValue::Value(_))));
        assert!(root.get(1_usize).is_some_and(|v| v.is_draft()));
        assert!(root.get(7_usize).is_none());
        assert!(root.has(2_usize));
        assert!(!root.has("a"));
        assert_eq!(root.len(), 3);
        Ok::<_, ProduceError>(())
    })
    .unwrap();
}

#[test]
fn test_concurrent_calls_over_one_origin() {
    let origin = scenario_a();
    let before = Snapshot::take(&origin);
    let results: Vec<Value> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4_i64)
            .map(|n| {
                let origin = &origin;
                scope.spawn(move || {
                    produce(origin, |root| {
                        root.child("b").expect("b is a map").set("ba", n)
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked").expect("produce failed"))
            .collect()
    });

    for (n, result) in (0..4_i64).zip(&results) {
        assert_eq!(at(result, "/b/ba"), &Value::from(n));
        assert_shared(&origin, result, "/c");
    }
    assert_eq!(Snapshot::take(&origin), before);
}
