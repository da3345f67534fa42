use arbor_ast::{Arena, Order};

use crate::utils::{kind_names, pre_order_kinds, program_schema, sample_program};

#[test]
fn test_pre_order_visits_program_first() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    assert_eq!(
        pre_order_kinds(&arena, ids[0]),
        ["Program", "OpA", "Loop", "OpB", "OpA"]
    );
    assert_eq!(arena.traverse(ids[0], Order::PreOrder).collect::<Vec<_>>(), ids);
    Ok(())
}

#[test]
fn test_post_order_visits_program_last() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    let order = kind_names(&arena, arena.traverse(ids[0], Order::PostOrder));
    assert_eq!(order, ["OpA", "OpB", "OpA", "Loop", "Program"]);
    Ok(())
}

#[test]
fn test_level_order() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    let order = kind_names(&arena, arena.traverse(ids[0], Order::LevelOrder));
    assert_eq!(order, ["Program", "OpA", "Loop", "OpB", "OpA"]);
    Ok(())
}

#[test]
fn test_absent_and_empty_slots_contribute_nothing() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let program = arena.construct_named("Program", vec![])?;
    assert_eq!(arena.traverse(program, Order::PreOrder).count(), 1);
    assert_eq!(arena.traverse(program, Order::PostOrder).count(), 1);
    Ok(())
}

#[test]
fn test_single_slot_follows_list_slot_in_declared_order() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    let entry = arena.construct_named("OpB", vec![])?;
    arena.set(ids[0], "entry", entry)?;
    let order: Vec<_> = arena.traverse(ids[0], Order::PreOrder).collect();
    assert_eq!(order.last(), Some(&entry));
    Ok(())
}

#[test]
fn test_deep_tree_does_not_overflow() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let mut current = arena.construct_named("OpA", vec![])?;
    for _ in 0..100_000 {
        let wrapper = arena.construct_named("Loop", vec![])?;
        arena.set(wrapper, "body", vec![current])?;
        current = wrapper;
    }
    assert_eq!(arena.traverse(current, Order::PreOrder).count(), 100_001);
    assert_eq!(arena.traverse(current, Order::PostOrder).count(), 100_001);
    Ok(())
}

#[test]
fn test_reclaimed_root_yields_nothing() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    let keep = arena.construct_named("OpA", vec![])?;
    arena.sweep(&[keep])?;
    assert_eq!(arena.traverse(ids[0], Order::PreOrder).count(), 0);
    Ok(())
}
