use arbor_ast::{Arena, Order, Value};

use crate::utils::{program_schema, sample_program};

#[test]
fn test_recursive_delete_clears_every_node() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    for &id in &ids {
        arena.set_note(id, "x", true)?;
    }
    assert!(arena.delete_note(ids[0], "x", true)?);
    for id in arena.traverse(ids[0], Order::PreOrder).collect::<Vec<_>>() {
        assert!(!arena.has_note(id, "x")?);
    }
    Ok(())
}

#[test]
fn test_non_recursive_delete_only_touches_the_node() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    arena.set_note(ids[0], "x", true)?;
    arena.set_note(ids[2], "x", true)?;
    arena.delete_note(ids[0], "x", false)?;
    assert!(!arena.has_note(ids[0], "x")?);
    assert!(arena.has_note(ids[2], "x")?);
    Ok(())
}

#[test]
fn test_notes_overwrite_and_list() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    arena.set_note(ids[1], "type", "void")?;
    arena.set_note(ids[1], "type", "int")?;
    arena.set_note(ids[1], "depth", Value::Int(1))?;
    assert_eq!(arena.note(ids[1], "type")?, Some(&Value::from("int")));
    let mut keys: Vec<_> = arena.notes(ids[1])?.map(|(key, _)| key.to_string()).collect();
    keys.sort();
    assert_eq!(keys, ["depth", "type"]);
    assert_eq!(arena.note(ids[1], "missing")?, None);
    Ok(())
}

#[test]
fn test_notes_do_not_affect_structure() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let a = sample_program(&mut arena)?;
    let b = sample_program(&mut arena)?;
    arena.set_note(a[3], "hot", true)?;
    assert!(arena.structural_eq(a[0], b[0]));
    Ok(())
}
