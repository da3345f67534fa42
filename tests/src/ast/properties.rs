use arbor_ast::{Arena, NodeId, Order, Value, decode, encode, structurally_equal};
use proptest::prelude::*;

use crate::utils::program_schema;

/// A tree shape: leaves are operations, branches are loops, and any subtree
/// may carry an annotation on its root.
#[derive(Clone, Debug)]
enum Shape {
    OpA(i64),
    OpB(String),
    Loop(Vec<Shape>),
    Noted(Box<Shape>, String, Value),
}

/// A program root with an operation list and an optional entry point.
#[derive(Clone, Debug)]
struct ProgramShape {
    name: String,
    body: Vec<Shape>,
    entry: Option<Shape>,
}

fn arb_note_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f64>().prop_map(Value::Float),
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,4}".prop_map(Value::from),
    ]
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Shape::OpA),
        "[a-z]{0,8}".prop_map(Shape::OpB),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::Loop),
            (inner, "[a-z]{1,6}", arb_note_value())
                .prop_map(|(shape, key, value)| Shape::Noted(Box::new(shape), key, value)),
        ]
    })
}

fn arb_program() -> impl Strategy<Value = ProgramShape> {
    (
        "[a-z]{0,6}",
        prop::collection::vec(arb_shape(), 0..4),
        prop::option::of(arb_shape()),
    )
        .prop_map(|(name, body, entry)| ProgramShape { name, body, entry })
}

fn build(arena: &mut Arena, shape: &Shape) -> NodeId {
    match shape {
        Shape::OpA(line) => arena.construct_named("OpA", vec![(*line).into()]).unwrap(),
        Shape::OpB(target) => arena
            .construct_named("OpB", vec![Value::Null.into(), target.as_str().into()])
            .unwrap(),
        Shape::Loop(body) => {
            let children: Vec<_> = body.iter().map(|s| build(arena, s)).collect();
            arena
                .construct_named("Loop", vec![Value::Null.into(), Value::Null.into(), children.into()])
                .unwrap()
        }
        Shape::Noted(inner, key, value) => {
            let id = build(arena, inner);
            arena.set_note(id, key, value.clone()).unwrap();
            id
        }
    }
}

fn build_program(arena: &mut Arena, program: &ProgramShape) -> NodeId {
    let body: Vec<_> = program.body.iter().map(|s| build(arena, s)).collect();
    let entry = program.entry.as_ref().map(|s| build(arena, s));
    arena
        .construct_named("Program", vec![program.name.as_str().into(), body.into(), entry.into()])
        .unwrap()
}

fn count(shape: &Shape) -> usize {
    match shape {
        Shape::Loop(body) => 1 + body.iter().map(count).sum::<usize>(),
        Shape::Noted(inner, _, _) => count(inner),
        _ => 1,
    }
}

fn sorted_notes(arena: &Arena, id: NodeId) -> Vec<(String, Value)> {
    let mut notes: Vec<_> = arena
        .notes(id)
        .unwrap()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    notes.sort_by(|a, b| a.0.cmp(&b.0));
    notes
}

proptest! {
    #[test]
    fn encode_decode_preserves_structure(program in arb_program()) {
        let schema = program_schema();
        let mut source = Arena::new(schema.clone());
        let root = build_program(&mut source, &program);
        let bytes = encode(&source, root).unwrap();

        let mut target = Arena::new(schema);
        let decoded = decode(&mut target, &bytes).unwrap();
        prop_assert!(structurally_equal(&source, root, &target, decoded));
        prop_assert_eq!(target.child(decoded, "entry").unwrap().is_some(), program.entry.is_some());
        prop_assert_eq!(encode(&target, decoded).unwrap(), bytes);

        let before = source.traverse(root, Order::PreOrder);
        let after: Vec<_> = target.traverse(decoded, Order::PreOrder).collect();
        for (a, b) in before.zip(after) {
            let (x, y) = (sorted_notes(&source, a), sorted_notes(&target, b));
            prop_assert_eq!(x.len(), y.len());
            for ((kx, vx), (ky, vy)) in x.iter().zip(&y) {
                prop_assert_eq!(kx, ky);
                prop_assert!(vx.identical(vy), "note {} changed: {:?} vs {:?}", kx, vx, vy);
            }
        }
    }

    #[test]
    fn every_order_visits_every_node_once(shape in arb_shape()) {
        let mut arena = Arena::new(program_schema());
        let root = build(&mut arena, &shape);
        for order in [Order::PreOrder, Order::PostOrder, Order::LevelOrder] {
            let mut seen: Vec<_> = arena.traverse(root, order).collect();
            prop_assert_eq!(seen.len(), count(&shape));
            seen.sort_by_key(|id| id.index());
            seen.dedup();
            prop_assert_eq!(seen.len(), count(&shape));
        }
    }

    #[test]
    fn identity_map_is_structurally_equal(program in arb_program()) {
        let mut arena = Arena::new(program_schema());
        let root = build_program(&mut arena, &program);
        let copy = arena.map(root, |_, id| Ok(Some(id))).unwrap().unwrap();
        prop_assert!(arena.structural_eq(root, copy));
    }

    #[test]
    fn sweep_keeps_exactly_the_reachable_nodes(keep in arb_shape(), drop in arb_shape()) {
        let mut arena = Arena::new(program_schema());
        let root = build(&mut arena, &keep);
        build(&mut arena, &drop);
        let freed = arena.sweep(&[root]).unwrap();
        prop_assert_eq!(freed, count(&drop));
        prop_assert_eq!(arena.len(), count(&keep));
    }
}
