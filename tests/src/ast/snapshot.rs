use arbor_ast::{Arena, SnapshotChild, TreeSnapshot, Value};

use crate::utils::{program_schema, sample_program};

#[test]
fn test_snapshot_json_shape() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    arena.set(ids[0], "name", "main")?;
    let json: serde_json::Value = serde_json::from_str(&arena.snapshot(ids[0])?.to_json()?)?;

    assert_eq!(json["kind"], "Program");
    assert_eq!(json["values"][0][0], "name");
    assert_eq!(json["children"][0][0], "body");
    assert_eq!(json["children"][1][1], "absent");
    Ok(())
}

#[test]
fn test_snapshot_restore_round_trip() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    arena.set_note(ids[2], "unrolled", false)?;
    let snapshot = arena.snapshot(ids[0])?;

    let mut other = Arena::new(program_schema());
    let root = other.restore(&TreeSnapshot::from_json(&snapshot.to_json()?)?)?;
    assert!(arbor_ast::structurally_equal(&arena, ids[0], &other, root));
    assert_eq!(other.snapshot(root)?, snapshot);
    Ok(())
}

#[test]
fn test_hand_written_snapshot() -> anyhow::Result<()> {
    let snapshot = TreeSnapshot {
        kind: "Loop".to_string(),
        values: vec![("times".to_string(), Value::Int(2))],
        children: vec![(
            "body".to_string(),
            SnapshotChild::List(vec![TreeSnapshot {
                kind: "OpA".to_string(),
                values: vec![],
                children: vec![],
                notes: Default::default(),
            }]),
        )],
        notes: Default::default(),
    };
    let mut arena = Arena::new(program_schema());
    let root = arena.restore(&snapshot)?;
    assert_eq!(arena.child_list(root, "body")?.len(), 1);
    assert!(arena.value(root, "line")?.is_null());
    Ok(())
}
