use arbor_produce::{apply_patches, produce_with_patches, Patch, PatchOp, ProduceError};
use arbor_test_utils::{assert_ordered_eq, assert_shared, catalog, path, scenario_a};
use arbor_value::{Prop, Value, ValuePath};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_scenario_a_patches() {
    let origin = scenario_a();
    let produced = produce_with_patches(&origin, |root| {
        root.child("b").expect("b is a map").set("ba", 2)?;
        root.remove("a");
        root.set("d", "new")
    })
    .unwrap();

    assert_eq!(
        produced.patches,
        vec![
            Patch::remove(path("/a")),
            Patch::replace(path("/b/ba"), Value::from(2)),
            Patch::add(path("/d"), Value::from("new")),
        ]
    );
    // "a" led the origin, so undo re-adds every key after it to restore order
    assert_eq!(
        produced.inverse_patches,
        vec![
            Patch::remove(path("/b")),
            Patch::remove(path("/c")),
            Patch::remove(path("/d")),
            Patch::add(path("/a"), Value::from(1)),
            Patch::add(path("/b"), Value::from(json!({"ba": 1, "bb": 2}))),
            Patch::add(path("/c"), Value::from(json!({"ca": 1, "cb": 2}))),
        ]
    );
    let undone = apply_patches(&produced.value, &produced.inverse_patches).unwrap();
    assert_ordered_eq(&undone, &origin);
    assert_shared(&origin, &undone, "/c");
}

#[test]
fn test_replaced_subtree_is_one_patch() {
    let origin = catalog();
    let produced = produce_with_patches(&origin, |root| {
        root.set("settings", Value::from(json!({"currency": "USD"})))
    })
    .unwrap();

    assert_eq!(produced.patches.len(), 1);
    assert_eq!(produced.patches[0].op(), PatchOp::Replace);
    assert_eq!(produced.patches[0].path(), &path("/settings"));
}

#[test]
fn test_round_trip_on_sequences() {
    let origin = catalog();
    let produced = produce_with_patches(&origin, |root| {
        let items = root.child("items").expect("items is a sequence");
        items.remove(0_usize);
        items.push(Value::from(json!({"id": 4, "price": 40})))?;
        let tags = root.child("tags").expect("tags is a sequence");
        tags.insert(0, "z")?;
        let second = items.child(1_usize).expect("item is a map");
        second.child("meta").expect("meta is a map").set("color", "teal")
    })
    .unwrap();

    let replayed = apply_patches(&origin, &produced.patches).unwrap();
    assert_ordered_eq(&replayed, &produced.value);
    assert_shared(&origin, &replayed, "/settings");

    let undone = apply_patches(&produced.value, &produced.inverse_patches).unwrap();
    assert_ordered_eq(&undone, &origin);
    assert_shared(&produced.value, &undone, "/settings");
}

#[test]
fn test_reinserted_key_moves_to_the_end() {
    let origin = Value::from(json!({"a": 1, "b": 2, "c": 3}));
    let produced = produce_with_patches(&origin, |root| {
        root.remove("a");
        root.set("a", 1)
    })
    .unwrap();

    assert_eq!(
        produced.value.props(),
        vec![Prop::from("b"), Prop::from("c"), Prop::from("a")]
    );
    assert_eq!(
        produced.patches,
        vec![
            Patch::remove(path("/a")),
            Patch::add(path("/a"), Value::from(1)),
        ]
    );

    let replayed = apply_patches(&origin, &produced.patches).unwrap();
    assert_ordered_eq(&replayed, &produced.value);
    let undone = apply_patches(&produced.value, &produced.inverse_patches).unwrap();
    assert_ordered_eq(&undone, &origin);
}

#[test]
fn test_undo_restores_key_position_after_value_change() {
    let origin = Value::from(json!({"a": 1, "b": 2}));
    let produced = produce_with_patches(&origin, |root| {
        root.remove("a");
        root.set("a", 5)
    })
    .unwrap();

    assert_eq!(
        produced.inverse_patches,
        vec![
            Patch::remove(path("/b")),
            Patch::replace(path("/a"), Value::from(1)),
            Patch::add(path("/b"), Value::from(2)),
        ]
    );
    let undone = apply_patches(&produced.value, &produced.inverse_patches).unwrap();
    assert_ordered_eq(&undone, &origin);

    let replayed = apply_patches(&origin, &produced.patches).unwrap();
    assert_ordered_eq(&replayed, &produced.value);
}

#[test]
fn test_no_changes_no_patches() {
    let origin = catalog();
    let produced = produce_with_patches(&origin, |root| {
        let _ = root.child("items").map(|items| items.len());
        Ok::<_, ProduceError>(())
    })
    .unwrap();
    assert!(produced.patches.is_empty());
    assert!(produced.inverse_patches.is_empty());
}

#[test]
fn test_apply_rejects_missing_parent() {
    let origin = scenario_a();
    let err = apply_patches(&origin, &[Patch::add(path("/nope/x"), Value::from(1))]).unwrap_err();
    match err {
        ProduceError::PatchConflict { path, .. } => assert_eq!(path.to_string(), "/nope/x"),
        other => panic!("expected a conflict, got {other}"),
    }

    let err = apply_patches(&origin, &[Patch::replace(path("/zz"), Value::null())]).unwrap_err();
    assert!(matches!(err, ProduceError::PatchConflict { .. }));

    let err = apply_patches(&origin, &[Patch::remove(ValuePath::root())]).unwrap_err();
    assert!(matches!(err, ProduceError::PatchConflict { .. }));
}

#[test]
fn test_apply_whole_value_replacement() {
    let origin = scenario_a();
    let replacement = Value::from(json!({"fresh": true}));
    let result = apply_patches(
        &origin,
        &[Patch::replace(ValuePath::root(), replacement.clone())],
    )
    .unwrap();
    assert!(result.same(&replacement));
}

#[test]
fn test_patches_deserialize_from_json_patch() {
    let patches: Vec<Patch> = serde_json::from_value(json!([
        {"op": "replace", "path": "/b/ba", "value": 5},
        {"op": "add", "path": "/list", "value": []},
        {"op": "add", "path": "/list/-", "value": "x"},
        {"op": "remove", "path": "/a"}
    ]))
    .unwrap();

    let result = apply_patches(&scenario_a(), &patches).unwrap();
    assert_eq!(
        result,
        Value::from(json!({
            "b": {"ba": 5, "bb": 2},
            "c": {"ca": 1, "cb": 2},
            "list": ["x"]
        }))
    );
}
