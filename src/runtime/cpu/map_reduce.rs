//! Unary map and scalar reduction on the host

use crate::dtype::Element;
use crate::error::Result;
use crate::format::VectorFormat;
use crate::registry::{Kernel, Task};
use crate::runtime::{BackendKind, ExecCtx};

use super::{snapshot_vec_coo, vec_conversions};

/// `r[i] <- op(v[i])` over stored entries, block by block
pub struct VMapCpu;

impl<T: Element> Kernel<T> for VMapCpu {
    fn name(&self) -> &'static str {
        "v_map_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VMap(t) = task else { return u32::MAX };
        vec_conversions(&t.v, VectorFormat::CpuCoo)
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VMap(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let (ai, ax) = snapshot_vec_coo(&t.v, block, ctx)?;
        let mapped: Vec<T> = ax.iter().map(|&x| t.op.apply(x)).collect();

        let mgr = t.r.manager();
        let mut rb = t.r.blocks()[block].write();
        mgr.validate_wd(VectorFormat::CpuCoo.index(), &mut rb);
        {
            let coo = rb.coo_mut()?;
            coo.ai = ai;
            coo.ax = mapped;
        }
        mgr.commit(VectorFormat::CpuCoo.index(), &mut rb);
        Ok(())
    }
}

/// `s <- fold(op, init, stored entries of v)`, one coarse sub-task
pub struct VReduceCpu;

impl<T: Element> Kernel<T> for VReduceCpu {
    fn name(&self) -> &'static str {
        "v_reduce_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VReduce(t) = task else { return u32::MAX };
        vec_conversions(&t.v, VectorFormat::CpuCoo)
    }

    fn execute(&self, task: &Task<T>, _block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VReduce(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let mut acc = t.init.get();
        for block in 0..t.v.grid().n_blocks() {
            let (_, ax) = snapshot_vec_coo(&t.v, block, ctx)?;
            for &x in &ax {
                acc = t.op.apply(acc, x);
            }
        }
        t.s.set(acc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Descriptor;
    use crate::library::{Config, Library};
    use crate::op;
    use crate::registry::{TaskVMap, TaskVReduce};
    use crate::scalar::Scalar;
    use crate::vector::Vector;

    #[test]
    fn test_map_scales_entries() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let v = Vector::<f32>::new(&lib, 4).unwrap();
        v.build(&[1, 3], &[2.0, 4.0], Descriptor::new()).unwrap();
        let r = Vector::<f32>::new(&lib, 4).unwrap();

        let task = Task::VMap(TaskVMap {
            r: r.clone(),
            v,
            op: op::scale(0.5f32),
            desc: Descriptor::new(),
        });
        VMapCpu.execute(&task, 0, &ctx).unwrap();

        let (idx, val) = r.read().unwrap();
        assert_eq!(idx, vec![1, 3]);
        assert_eq!(val, vec![1.0, 2.0]);
    }

    #[test]
    fn test_map_in_place() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let v = Vector::<i32>::new(&lib, 3).unwrap();
        v.build(&[0, 2], &[1, -2], Descriptor::new()).unwrap();

        let task = Task::VMap(TaskVMap {
            r: v.clone(),
            v: v.clone(),
            op: op::ainv::<i32>(),
            desc: Descriptor::new(),
        });
        VMapCpu.execute(&task, 0, &ctx).unwrap();

        let (_, val) = v.read().unwrap();
        assert_eq!(val, vec![-1, 2]);
    }

    #[test]
    fn test_reduce_folds_all_blocks() {
        let lib = Library::with_config(Config {
            block_size: 2,
            ..Config::default()
        });
        let ctx = ExecCtx::direct(&lib);
        let v = Vector::<i32>::new(&lib, 6).unwrap();
        v.build(&[0, 3, 5], &[1, 2, 3], Descriptor::new()).unwrap();

        let s = Scalar::new(0);
        let task = Task::VReduce(TaskVReduce {
            s: s.clone(),
            init: Scalar::new(10),
            v,
            op: op::plus::<i32>(),
            desc: Descriptor::new(),
        });
        assert_eq!(task.n_blocks(), 1);
        VReduceCpu.execute(&task, 0, &ctx).unwrap();
        assert_eq!(s.get(), 16);
    }

    #[test]
    fn test_reduce_empty_vector_keeps_init() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let v = Vector::<f32>::new(&lib, 4).unwrap();
        let s = Scalar::new(-1.0f32);

        let task = Task::VReduce(TaskVReduce {
            s: s.clone(),
            init: Scalar::new(0.0f32),
            v,
            op: op::plus::<f32>(),
            desc: Descriptor::new(),
        });
        VReduceCpu.execute(&task, 0, &ctx).unwrap();
        assert_eq!(s.get(), 0.0);
    }
}
