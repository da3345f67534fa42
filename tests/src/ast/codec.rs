use arbor_ast::codec::{FORMAT_VERSION, MAGIC};
use arbor_ast::{Arena, SerializationError, Value, decode, encode, structurally_equal};

use crate::utils::{init_tracing, pre_order_kinds, program_schema, sample_program};

#[test]
fn test_round_trip_into_fresh_arena() -> anyhow::Result<()> {
    init_tracing();
    let schema = program_schema();
    let mut source = Arena::new(schema.clone());
    let ids = sample_program(&mut source)?;
    source.set(ids[0], "name", "main")?;
    source.set(ids[2], "times", 3)?;
    source.set_note(ids[3], "cost", Value::Float(0.25))?;

    let bytes = encode(&source, ids[0])?;
    assert_eq!(&bytes[..4], MAGIC);
    assert_eq!(bytes[4], FORMAT_VERSION);

    let mut target = Arena::new(schema);
    let root = decode(&mut target, &bytes)?;
    assert!(structurally_equal(&source, ids[0], &target, root));
    assert_eq!(pre_order_kinds(&target, root), pre_order_kinds(&source, ids[0]));
    assert_eq!(target.value(root, "name")?, &Value::from("main"));
    Ok(())
}

#[test]
fn test_round_trip_restores_parents_and_notes() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    arena.set_note(ids[4], "seen", true)?;
    let bytes = encode(&arena, ids[0])?;

    let root = decode(&mut arena, &bytes)?;
    let body = arena.child_list(root, "body")?.to_vec();
    let inner = arena.child_list(body[1], "body")?.to_vec();
    assert_eq!(arena.parent(inner[1])?, Some(body[1]));
    assert_eq!(arena.parent(body[1])?, Some(root));
    assert_eq!(arena.note(inner[1], "seen")?, Some(&Value::Bool(true)));
    Ok(())
}

#[test]
fn test_decoding_garbage_fails() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    assert!(matches!(decode(&mut arena, b""), Err(SerializationError::Truncated(_))));
    assert!(matches!(decode(&mut arena, b"JUNKJUNK"), Err(SerializationError::BadMagic)));

    let ids = sample_program(&mut arena)?;
    let mut bytes = encode(&arena, ids[0])?;
    let last = bytes.len() - 1;
    bytes.truncate(last);
    assert!(matches!(decode(&mut arena, &bytes), Err(SerializationError::Truncated(_))));
    Ok(())
}

#[test]
fn test_content_violating_the_schema_is_rejected() -> anyhow::Result<()> {
    let loose = std::rc::Rc::new(
        arbor_ast::schema! {
            kind Operation { values { line: Any } };
            kind OpA: Operation;
        }
        .unwrap(),
    );
    let mut source = Arena::new(loose);
    let op = source.construct_named("OpA", vec![arbor_ast::Arg::from("seven")])?;
    let bytes = encode(&source, op)?;

    let mut target = Arena::new(program_schema());
    let err = decode(&mut target, &bytes).unwrap_err();
    assert!(matches!(err, SerializationError::Rejected(_)), "{err}");
    Ok(())
}

#[test]
fn test_encoding_a_reclaimed_node_fails() -> anyhow::Result<()> {
    let mut arena = Arena::new(program_schema());
    let ids = sample_program(&mut arena)?;
    let keep = arena.construct_named("OpA", vec![])?;
    arena.sweep(&[keep])?;
    assert!(matches!(encode(&arena, ids[0]), Err(SerializationError::Rejected(_))));
    Ok(())
}

#[test]
fn test_deeply_nested_loops_round_trip() -> anyhow::Result<()> {
    let schema = program_schema();
    let mut source = Arena::new(schema.clone());
    let mut inner = source.construct_named("OpA", vec![])?;
    for _ in 0..50_000 {
        inner = source.construct_named("Loop", vec![Value::Null.into(), Value::Null.into(), vec![inner].into()])?;
    }
    let program = source.construct_named("Program", vec![arbor_ast::Arg::from("deep"), vec![inner].into()])?;
    source.set_note(inner, "weight", f64::NAN)?;

    let bytes = encode(&source, program)?;
    let mut target = Arena::new(schema);
    let root = decode(&mut target, &bytes)?;
    assert!(structurally_equal(&source, program, &target, root));
    assert_eq!(encode(&target, root)?, bytes);

    let copy = target.map(root, |_, id| Ok(Some(id)))?.unwrap();
    assert!(target.structural_eq(root, copy));
    Ok(())
}
