//! Kernel registry and dispatcher
//!
//! For each `(operation kind, element type)` the registry holds a list of
//! kernel implementations. On dispatch, the selector keeps the
//! implementations whose backend is available and that apply to the task
//! at hand, then ranks them by the number of format conversions their
//! operand requirements would trigger, registered priority, and
//! registration order. Selection is deterministic given the storage
//! bundle state.

mod task;

pub use task::{
    OpKind, Task, TaskVAssignMasked, TaskVEwiseAdd, TaskVMap, TaskVReduce, TaskVxmMasked,
};

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::{BackendKind, ExecCtx};

/// One kernel implementation of one operation kind
pub trait Kernel<T: Element>: Send + Sync {
    /// Implementation name, for logs and tests
    fn name(&self) -> &'static str;

    /// Backend this implementation runs on
    fn backend(&self) -> BackendKind;

    /// Registered priority; higher wins among equal conversion counts
    fn priority(&self) -> u32 {
        0
    }

    /// Whether this implementation can run the given task at all
    fn applicable(&self, _task: &Task<T>, _ctx: &ExecCtx<'_>) -> bool {
        true
    }

    /// Number of operand format conversions this implementation's
    /// requirements would trigger against the current bundle state
    fn conversions_needed(&self, task: &Task<T>) -> u32;

    /// Run one per-block sub-task
    ///
    /// Must either complete or return an error without leaving operands in
    /// an inconsistent intermediate state.
    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()>;
}

/// Table of kernel implementations keyed by operation kind
///
/// The table is internally locked so user implementations can be added
/// to a live library; registration never blocks dispatch for long.
pub struct KernelRegistry<T: Element> {
    table: RwLock<HashMap<OpKind, Vec<Arc<dyn Kernel<T>>>>>,
}

impl<T: Element> KernelRegistry<T> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Append an implementation for `kind`
    ///
    /// Registration order is the final tie-break of the selector, so
    /// defaults registered first stay preferred among equals.
    pub fn register(&self, kind: OpKind, kernel: Arc<dyn Kernel<T>>) {
        self.table.write().entry(kind).or_default().push(kernel);
    }

    /// Implementations registered for `kind`
    pub fn kernels(&self, kind: OpKind) -> Vec<Arc<dyn Kernel<T>>> {
        self.table.read().get(&kind).cloned().unwrap_or_default()
    }

    /// Pick the implementation to run `task` with
    pub fn select(&self, task: &Task<T>, ctx: &ExecCtx<'_>) -> Result<Arc<dyn Kernel<T>>> {
        let kind = task.kind();
        let table = self.table.read();
        let list = table.get(&kind).ok_or(Error::NotImplemented {
            feature: "no kernel registered for operation",
        })?;

        let chosen = list
            .iter()
            .enumerate()
            .filter(|(_, k)| match k.backend() {
                BackendKind::Cpu => true,
                BackendKind::Accelerator => ctx.has_accel(),
            })
            .filter(|(_, k)| k.applicable(task, ctx))
            .min_by_key(|(idx, k)| (k.conversions_needed(task), u32::MAX - k.priority(), *idx))
            .map(|(_, k)| Arc::clone(k))
            .ok_or(Error::NotImplemented {
                feature: "no applicable kernel for operation",
            })?;

        trace!("dispatch: {:?} -> {}", kind, chosen.name());
        Ok(chosen)
    }
}

impl<T: Element> Default for KernelRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    struct FakeKernel {
        name: &'static str,
        backend: BackendKind,
        conversions: u32,
        priority: u32,
    }

    impl Kernel<i32> for FakeKernel {
        fn name(&self) -> &'static str {
            self.name
        }

        fn backend(&self) -> BackendKind {
            self.backend
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn conversions_needed(&self, _task: &Task<i32>) -> u32 {
            self.conversions
        }

        fn execute(&self, _task: &Task<i32>, _block: usize, _ctx: &ExecCtx<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn fake_task(lib: &Library) -> Task<i32> {
        let v = crate::vector::Vector::<i32>::new(lib, 4).unwrap();
        let r = crate::vector::Vector::<i32>::new(lib, 4).unwrap();
        Task::VMap(TaskVMap {
            r,
            v,
            op: crate::op::identity::<i32>(),
            desc: crate::desc::Descriptor::new(),
        })
    }

    #[test]
    fn test_selects_fewest_conversions() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let reg = KernelRegistry::<i32>::new();
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "expensive",
                backend: BackendKind::Cpu,
                conversions: 3,
                priority: 0,
            }),
        );
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "cheap",
                backend: BackendKind::Cpu,
                conversions: 0,
                priority: 0,
            }),
        );

        let task = fake_task(&lib);
        assert_eq!(reg.select(&task, &ctx).unwrap().name(), "cheap");
    }

    #[test]
    fn test_priority_breaks_conversion_ties() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let reg = KernelRegistry::<i32>::new();
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "low",
                backend: BackendKind::Cpu,
                conversions: 1,
                priority: 0,
            }),
        );
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "high",
                backend: BackendKind::Cpu,
                conversions: 1,
                priority: 5,
            }),
        );

        let task = fake_task(&lib);
        assert_eq!(reg.select(&task, &ctx).unwrap().name(), "high");
    }

    #[test]
    fn test_accelerator_filtered_without_device() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let reg = KernelRegistry::<i32>::new();
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "acc",
                backend: BackendKind::Accelerator,
                conversions: 0,
                priority: 9,
            }),
        );
        reg.register(
            OpKind::VMap,
            Arc::new(FakeKernel {
                name: "host",
                backend: BackendKind::Cpu,
                conversions: 2,
                priority: 0,
            }),
        );

        let task = fake_task(&lib);
        assert_eq!(reg.select(&task, &ctx).unwrap().name(), "host");
    }

    #[test]
    fn test_unregistered_kind_not_implemented() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let reg = KernelRegistry::<i32>::new();
        let task = fake_task(&lib);
        assert!(matches!(
            reg.select(&task, &ctx),
            Err(Error::NotImplemented { .. })
        ));
    }
}
