//! Scheduler: topological expansion into per-block sub-tasks
//!
//! Nodes run in dependency order; each node expands through the
//! dispatcher into one sub-task per result block, executed on the host
//! worker pool. Sub-tasks of one node run concurrently; node-level
//! happens-before is exactly the declared edges. On a failing sub-task
//! the per-node aggregator short-circuits: un-started siblings are
//! skipped cooperatively, the result bundle is invalidated, and every
//! descendant is aborted without being executed.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::library::Library;
use crate::runtime::ExecCtx;

use super::{ExprNode, ExprState, NodeId, NodeState};

/// Topological order of the node arena, or `None` on a cycle
pub(crate) fn topo_order(nodes: &[ExprNode]) -> Option<Vec<NodeId>> {
    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut out_edges: Vec<Vec<NodeId>> = vec![Vec::new(); n];

    for (id, node) in nodes.iter().enumerate() {
        for &dep in &node.deps {
            in_degree[id] += 1;
            out_edges[dep].push(id);
        }
    }

    let mut ready: Vec<NodeId> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(id) = ready.pop() {
        order.push(id);
        for &next in &out_edges[id] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(next);
            }
        }
    }

    (order.len() == n).then_some(order)
}

/// Run all nodes in `order`, returning the expression's terminal state
pub(crate) fn run(
    lib: &Library,
    expr_uid: u64,
    nodes: &mut [ExprNode],
    order: &[NodeId],
) -> ExprState {
    for &id in order {
        let blocked = nodes[id]
            .deps
            .iter()
            .any(|&dep| nodes[dep].state != NodeState::Evaluated);
        if blocked {
            nodes[id].state = NodeState::Aborted;
            debug!("sched: node {id} ({}) aborted", nodes[id].op.name());
            continue;
        }

        nodes[id].state = NodeState::Running;

        let outcome = run_node(lib, expr_uid, id, &nodes[id]);
        match outcome {
            Ok(()) => {
                nodes[id].state = NodeState::Evaluated;
                debug!("sched: node {id} ({}) evaluated", nodes[id].op.name());
            }
            Err(e) => {
                nodes[id].op.invalidate_result();
                nodes[id].state = NodeState::Failed;
                warn!("sched: node {id} ({}) failed: {e}", nodes[id].op.name());
            }
        }
    }

    if nodes.iter().any(|n| n.state == NodeState::Failed) {
        ExprState::Failed
    } else {
        ExprState::Evaluated
    }
}

/// Expand one node into sub-tasks and aggregate their statuses
fn run_node(lib: &Library, expr_uid: u64, id: NodeId, node: &ExprNode) -> Result<()> {
    let ctx = ExecCtx::direct(lib);
    node.op.prepare(&ctx)?;

    let n_blocks = node.op.n_blocks();
    let devices = lib
        .device_manager()
        .fetch_devices(n_blocks, (expr_uid << 20) | id as u64);

    let cancelled = AtomicBool::new(false);
    let run_block = |block: usize| -> Result<()> {
        if cancelled.load(Ordering::Relaxed) {
            return Err(Error::Aborted);
        }
        let ctx = ExecCtx {
            lib,
            device: devices[block],
        };
        let status = node.op.execute_block(block, &ctx);
        if status.is_err() {
            cancelled.store(true, Ordering::Relaxed);
        }
        status
    };

    #[cfg(feature = "rayon")]
    let statuses: Vec<Result<()>> = (0..n_blocks).into_par_iter().map(run_block).collect();

    #[cfg(not(feature = "rayon"))]
    let statuses: Vec<Result<()>> = (0..n_blocks).map(run_block).collect();

    // Short-circuit to the first real failure; cooperative Aborted results
    // are only a consequence of it.
    let mut aborted = None;
    for status in statuses {
        match status {
            Ok(()) => {}
            Err(Error::Aborted) => aborted = Some(Error::Aborted),
            Err(e) => return Err(e),
        }
    }
    match aborted {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
