use std::rc::Rc;
use std::sync::Once;

use arbor_ast::{Arena, NodeId, Order, Schema};

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once per process. Set `RUST_LOG` to
/// see the framework's spans and events.
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A small imperative language: operations nested in loops and programs.
pub(crate) fn program_schema() -> Rc<Schema> {
    let schema = arbor_ast::schema! {
        kind Operation { values { line: Int } };
        kind OpA: Operation;
        kind OpB: Operation { values { target: Str } };
        kind Loop: Operation {
            values { times: Int }
            children { body: [Operation] }
        };
        kind Program {
            values { name: Str }
            children { body: [Operation], entry: Operation }
        };
    };
    Rc::new(schema.unwrap())
}

/// Builds `Program([OpA, Loop([OpB, OpA])])` and returns the program root
/// followed by every node in pre-order.
pub(crate) fn sample_program(arena: &mut Arena) -> anyhow::Result<Vec<NodeId>> {
    let first = arena.construct_named("OpA", vec![])?;
    let inner_b = arena.construct_named("OpB", vec![])?;
    let inner_a = arena.construct_named("OpA", vec![])?;
    let body = arena.construct_named("Loop", vec![])?;
    arena.set(body, "body", vec![inner_b, inner_a])?;
    let program = arena.construct_named("Program", vec![])?;
    arena.set(program, "body", vec![first, body])?;
    Ok(vec![program, first, body, inner_b, inner_a])
}

pub(crate) fn kind_names(arena: &Arena, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
    ids.into_iter()
        .map(|id| {
            let kind = arena.kind_of(id).unwrap();
            arena.schema().kind_name(kind).to_string()
        })
        .collect()
}

pub(crate) fn pre_order_kinds(arena: &Arena, root: NodeId) -> Vec<String> {
    kind_names(arena, arena.traverse(root, Order::PreOrder))
}
