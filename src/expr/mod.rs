//! Expression graph
//!
//! An expression is a flat arena of operation nodes with integer
//! dependency edges; a node's identity is its index. Building is
//! mutation-only; `submit` freezes the graph, rejects cycles, and runs
//! the schedule. `wait` reports the terminal state.

mod sched;

use std::sync::OnceLock;
use std::sync::Arc;

use crate::desc::Descriptor;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::library::{next_uid, Library};
use crate::matrix::Matrix;
use crate::op::{BinaryOp, SelectOp, UnaryOp};
use crate::registry::{
    Kernel, Task, TaskVAssignMasked, TaskVEwiseAdd, TaskVMap, TaskVReduce, TaskVxmMasked,
};
use crate::runtime::ExecCtx;
use crate::scalar::Scalar;
use crate::vector::Vector;

/// Node identity: the node's index in the frozen graph
pub type NodeId = usize;

/// Per-node state; transitions are one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Built, not yet submitted
    Default,
    /// Submitted, waiting on predecessors
    Scheduled,
    /// Sub-tasks in flight
    Running,
    /// All sub-tasks returned Ok
    Evaluated,
    /// Some sub-task returned an error
    Failed,
    /// A predecessor failed or aborted
    Aborted,
}

/// Terminal state of a whole expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprState {
    /// Not yet submitted
    Default,
    /// Every node evaluated
    Evaluated,
    /// At least one node failed
    Failed,
}

/// Type-erased scheduled operation stored in a node
pub(crate) trait ScheduledTask: Send + Sync {
    fn name(&self) -> &'static str;
    fn n_blocks(&self) -> usize;
    fn prepare(&self, ctx: &ExecCtx<'_>) -> Result<()>;
    fn execute_block(&self, block: usize, ctx: &ExecCtx<'_>) -> Result<()>;
    fn invalidate_result(&self);
}

struct TypedTask<T: Element> {
    task: Task<T>,
    kernel: OnceLock<Arc<dyn Kernel<T>>>,
}

impl<T: Element> ScheduledTask for TypedTask<T> {
    fn name(&self) -> &'static str {
        match self.task.kind() {
            crate::registry::OpKind::VxmMasked => "vxm_masked",
            crate::registry::OpKind::VAssignMasked => "v_assign_masked",
            crate::registry::OpKind::VEwiseAdd => "v_eadd",
            crate::registry::OpKind::VMap => "v_map",
            crate::registry::OpKind::VReduce => "v_reduce",
        }
    }

    fn n_blocks(&self) -> usize {
        self.task.n_blocks()
    }

    fn prepare(&self, ctx: &ExecCtx<'_>) -> Result<()> {
        let registry = ctx.lib.kernels::<T>();
        let kernel = registry.select(&self.task, ctx)?;
        let _ = self.kernel.set(kernel);
        Ok(())
    }

    fn execute_block(&self, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let kernel = self
            .kernel
            .get()
            .ok_or_else(|| Error::invalid_state("sub-task executed before kernel selection"))?;
        kernel.execute(&self.task, block, ctx)
    }

    fn invalidate_result(&self) {
        self.task.invalidate_result();
    }
}

pub(crate) struct ExprNode {
    pub(crate) op: Box<dyn ScheduledTask>,
    pub(crate) deps: Vec<NodeId>,
    pub(crate) state: NodeState,
}

/// User-facing DAG of operation nodes with explicit dependencies
pub struct Expression {
    lib: Library,
    uid: u64,
    nodes: Vec<ExprNode>,
    state: ExprState,
}

impl Expression {
    /// Empty expression bound to a library context
    pub fn new(lib: &Library) -> Self {
        Self {
            lib: lib.clone(),
            uid: next_uid(),
            nodes: Vec::new(),
            state: ExprState::Default,
        }
    }

    fn push_node<T: Element>(&mut self, task: Task<T>) -> Result<NodeId> {
        if self.state != ExprState::Default {
            return Err(Error::invalid_state("expression is frozen after submit"));
        }
        task.validate()?;
        self.nodes.push(ExprNode {
            op: Box::new(TypedTask {
                task,
                kernel: OnceLock::new(),
            }),
            deps: Vec::new(),
            state: NodeState::Default,
        });
        Ok(self.nodes.len() - 1)
    }

    /// Add `r <- mask (.) (v x M)` over `(op_add, op_multiply)` with
    /// select `op_select` and initial value `init`
    #[allow(clippy::too_many_arguments)]
    pub fn vxm_masked<T: Element>(
        &mut self,
        r: &Vector<T>,
        mask: &Vector<T>,
        v: &Vector<T>,
        m: &Matrix<T>,
        op_multiply: &BinaryOp<T>,
        op_add: &BinaryOp<T>,
        op_select: &SelectOp<T>,
        init: &Scalar<T>,
        desc: Descriptor,
    ) -> Result<NodeId> {
        self.push_node(Task::VxmMasked(TaskVxmMasked {
            r: r.clone(),
            mask: mask.clone(),
            v: v.clone(),
            m: m.clone(),
            op_multiply: op_multiply.clone(),
            op_add: op_add.clone(),
            op_select: op_select.clone(),
            init: init.clone(),
            desc,
        }))
    }

    /// Add `r[i] <- op_assign(r[i], value)` where `op_select(mask[i])`
    pub fn assign_masked<T: Element>(
        &mut self,
        r: &Vector<T>,
        mask: &Vector<T>,
        value: &Scalar<T>,
        op_assign: &BinaryOp<T>,
        op_select: &SelectOp<T>,
        desc: Descriptor,
    ) -> Result<NodeId> {
        self.push_node(Task::VAssignMasked(TaskVAssignMasked {
            r: r.clone(),
            mask: mask.clone(),
            value: value.clone(),
            op_assign: op_assign.clone(),
            op_select: op_select.clone(),
            desc,
        }))
    }

    /// Add `w <- mask (.) (a (+) b)`
    pub fn ewise_add<T: Element>(
        &mut self,
        w: &Vector<T>,
        mask: Option<&Vector<T>>,
        op: &BinaryOp<T>,
        a: &Vector<T>,
        b: &Vector<T>,
        desc: Descriptor,
    ) -> Result<NodeId> {
        self.push_node(Task::VEwiseAdd(TaskVEwiseAdd {
            w: w.clone(),
            mask: mask.cloned(),
            op: op.clone(),
            a: a.clone(),
            b: b.clone(),
            desc,
        }))
    }

    /// Add `r[i] <- op(v[i])` over stored entries
    pub fn map<T: Element>(
        &mut self,
        r: &Vector<T>,
        v: &Vector<T>,
        op: &UnaryOp<T>,
        desc: Descriptor,
    ) -> Result<NodeId> {
        self.push_node(Task::VMap(TaskVMap {
            r: r.clone(),
            v: v.clone(),
            op: op.clone(),
            desc,
        }))
    }

    /// Add `s <- fold(op, init, stored entries of v)`
    pub fn reduce<T: Element>(
        &mut self,
        s: &Scalar<T>,
        init: &Scalar<T>,
        v: &Vector<T>,
        op: &BinaryOp<T>,
        desc: Descriptor,
    ) -> Result<NodeId> {
        self.push_node(Task::VReduce(TaskVReduce {
            s: s.clone(),
            init: init.clone(),
            v: v.clone(),
            op: op.clone(),
            desc,
        }))
    }

    /// Declare that `node` happens after `on`
    pub fn depends(&mut self, node: NodeId, on: NodeId) -> Result<()> {
        if self.state != ExprState::Default {
            return Err(Error::invalid_state("expression is frozen after submit"));
        }
        if node >= self.nodes.len() || on >= self.nodes.len() {
            return Err(Error::invalid_argument("node", "unknown node id"));
        }
        self.nodes[node].deps.push(on);
        Ok(())
    }

    /// Number of nodes
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// State of one node
    pub fn node_state(&self, node: NodeId) -> Option<NodeState> {
        self.nodes.get(node).map(|n| n.state)
    }

    /// Freeze the graph and run it
    ///
    /// Returns an error for a repeated submit or a dependency cycle; node
    /// evaluation failures are reported through `wait`/`state`.
    pub fn submit(&mut self) -> Result<()> {
        if self.state != ExprState::Default {
            return Err(Error::invalid_state("expression already submitted"));
        }

        let order = sched::topo_order(&self.nodes)
            .ok_or_else(|| Error::invalid_state("expression graph contains a cycle"))?;

        for node in &mut self.nodes {
            node.state = NodeState::Scheduled;
        }

        self.state = sched::run(&self.lib, self.uid, &mut self.nodes, &order);
        Ok(())
    }

    /// Terminal state after submit
    pub fn state(&self) -> ExprState {
        self.state
    }

    /// Wait for completion and surface a failed evaluation as an error
    pub fn wait(&self) -> Result<()> {
        match self.state {
            ExprState::Default => Err(Error::invalid_state("expression was not submitted")),
            ExprState::Evaluated => Ok(()),
            ExprState::Failed => {
                let failed = self
                    .nodes
                    .iter()
                    .position(|n| n.state == NodeState::Failed);
                Err(Error::Failed(match failed {
                    Some(id) => format!("node {id} ({}) failed", self.nodes[id].op.name()),
                    None => "expression failed".to_string(),
                }))
            }
        }
    }
}
