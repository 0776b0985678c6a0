#![no_main]

use ferrous_crucible::{FactoryError, InstanceFactory, Lifecycle};
use libfuzzer_sys::fuzz_target;
use std::rc::Rc;

const MAX_NODES: usize = 16;
const MAX_DEPS: usize = 2;
// Unshared cycles only stop at the depth limit; keep the fan-out tree small
const MAX_DEPTH: usize = 12;

struct Node {
    lifecycle: Lifecycle,
    deps: Vec<usize>,
}

struct Built {
    _deps: Vec<Rc<Built>>,
}

// Each node takes up to 1 + MAX_DEPS bytes: a lifecycle byte, then dependency
// bytes until one has its high bit set. Edges may point anywhere, so cycles
// are expected.
fn parse(data: &[u8]) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut bytes = data.iter().copied();
    while nodes.len() < MAX_NODES {
        let Some(head) = bytes.next() else { break };
        let lifecycle = Lifecycle::ALL[usize::from(head % 4)];
        let mut deps = Vec::new();
        for byte in bytes.by_ref().take(MAX_DEPS) {
            deps.push(usize::from(byte & 0x7f));
            if byte & 0x80 != 0 {
                break;
            }
        }
        nodes.push(Node { lifecycle, deps });
    }
    nodes
}

fn build(factory: &InstanceFactory, graph: &[Node], id: usize) -> Rc<Built> {
    let node = &graph[id];
    let construct = || {
        let deps = node
            .deps
            .iter()
            .map(|&dep| build(factory, graph, dep % graph.len()))
            .collect();
        Rc::new(Built { _deps: deps })
    };
    let name = format!("node-{}", id);
    match node.lifecycle {
        Lifecycle::Shared => factory.get_shared(name, construct),
        Lifecycle::WeakShared => factory.get_weak_shared(name, construct),
        Lifecycle::Unshared => factory.get_unshared(name, construct),
        Lifecycle::Scoped => factory.get_scoped(name, construct),
    }
}

fuzz_target!(|data: &[u8]| {
    let graph = parse(data);
    if graph.is_empty() {
        return;
    }

    let factory = InstanceFactory::builder().max_depth(MAX_DEPTH).build();

    for root in 0..graph.len() {
        match factory.try_request(|| build(&factory, &graph, root)) {
            Ok(_) => {}
            Err(FactoryError::Circular { stack, key }) => {
                assert!(key.lifecycle().is_cached());
                assert!(stack.contains(&key));
            }
            Err(FactoryError::DepthExceeded(depth)) => assert_eq!(depth, MAX_DEPTH),
            Err(other) => panic!("unexpected error: {}", other),
        }
        assert!(factory.is_idle());
        assert_eq!(factory.cached_count(Lifecycle::Scoped), 0);
    }
});
