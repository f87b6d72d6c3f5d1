use crate::core::error::GraphError;
use crate::core::graph::node::GraphNode;

/// DFS colouring used while ordering the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Computes a topological order over `nodes`, returned as indices.
///
/// Each node is emitted only after all of its predecessors. Roots are taken in
/// insertion order and predecessors in connection order, so the result is
/// stable for a fixed topology. Meeting an in-progress node means the edge
/// relation has a cycle; the returned error carries that cycle in edge
/// direction, starting and ending at the same node.
pub(crate) fn topological_order(nodes: &[GraphNode]) -> Result<Vec<usize>, GraphError> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut path = Vec::new();

    for idx in 0..nodes.len() {
        visit(nodes, idx, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit(
    nodes: &[GraphNode],
    idx: usize,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), GraphError> {
    match marks[idx] {
        Mark::Done => return Ok(()),
        Mark::InProgress => return Err(cycle_error(nodes, idx, path)),
        Mark::Unvisited => {}
    }

    marks[idx] = Mark::InProgress;
    path.push(idx);

    for &pred in &nodes[idx].incoming {
        visit(nodes, pred, marks, path, order)?;
    }

    path.pop();
    marks[idx] = Mark::Done;
    order.push(idx);
    Ok(())
}

/// `path` walks predecessor links, so the cycle reads backwards; flip it.
fn cycle_error(nodes: &[GraphNode], idx: usize, path: &[usize]) -> GraphError {
    let start = path.iter().position(|&p| p == idx).unwrap_or(0);
    let mut cycle = vec![nodes[idx].id.clone()];
    cycle.extend(path[start..].iter().rev().map(|&p| nodes[p].id.clone()));
    GraphError::CycleDetected { path: cycle }
}
