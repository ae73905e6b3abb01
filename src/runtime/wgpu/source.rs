//! WGSL source generation
//!
//! Kernel programs are produced by splicing operator source fragments
//! into fixed templates. Binary fragments are written in terms of `a`
//! and `b`, unary and select fragments in terms of `x`; the element type
//! appears as the `T` alias. Every template uses grid-stride loops so
//! the dispatched group count can stay clamped.

use smallvec::smallvec;

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::op::{BinaryOp, SelectOp};

use super::context::ProgramKey;

/// WGSL scalar type for an element tag
pub fn wgsl_type(dtype: DType) -> Result<&'static str> {
    match dtype {
        DType::I32 => Ok("i32"),
        DType::U32 => Ok("u32"),
        DType::F32 => Ok("f32"),
        DType::Void => Err(Error::NotImplemented {
            feature: "accelerator kernels for the void element type",
        }),
    }
}

/// Cache key plus generated source of the masked vxm program
pub fn vxm_program<T: Element>(
    op_multiply: &BinaryOp<T>,
    op_add: &BinaryOp<T>,
    op_select: &SelectOp<T>,
) -> Result<(ProgramKey, String)> {
    let t = wgsl_type(T::DTYPE)?;
    let key = ProgramKey {
        template: "vxm_masked",
        dtype: T::DTYPE,
        ops: smallvec![
            op_multiply.id().raw(),
            op_add.id().raw(),
            op_select.id().raw()
        ],
    };

    let source = format!(
        r#"// Masked vector-matrix product over a generated semiring.
alias T = {t};

struct Params {{
    v_rows: u32,
    r_cols: u32,
    early_exit: u32,
    _pad0: u32,
    v_fill: T,
    init: T,
    _pad1: u32,
    _pad2: u32,
}}

@group(0) @binding(0) var<storage, read> v: array<T>;
@group(0) @binding(1) var<storage, read> m_ap: array<u32>;
@group(0) @binding(2) var<storage, read> m_aj: array<u32>;
@group(0) @binding(3) var<storage, read> m_ax: array<T>;
@group(0) @binding(4) var<storage, read> mask: array<T>;
@group(0) @binding(5) var<storage, read_write> r: array<atomic<u32>>;
@group(0) @binding(6) var<uniform> params: Params;
@group(0) @binding(7) var<storage, read_write> config: array<u32>;
@group(0) @binding(8) var<storage, read_write> config_size: atomic<u32>;

fn op_mult(a: T, b: T) -> T {{ return {mult}; }}
fn op_add(a: T, b: T) -> T {{ return {add}; }}
fn op_select(x: T) -> bool {{ return {select}; }}

// Generic atomic fold via compare-exchange; all element types are 32-bit.
fn accum(j: u32, val: T) {{
    var old = atomicLoad(&r[j]);
    loop {{
        let nxt = bitcast<u32>(op_add(bitcast<T>(old), val));
        let res = atomicCompareExchangeWeak(&r[j], old, nxt);
        if (res.exchanged) {{
            break;
        }}
        old = res.old_value;
    }}
}}

fn scatter_row(k: u32) {{
    let vk = v[k];
    if (vk == params.v_fill) {{
        return;
    }}
    let lo = m_ap[k];
    let hi = m_ap[k + 1u];
    for (var idx = lo; idx < hi; idx = idx + 1u) {{
        let j = m_aj[idx];
        if (params.early_exit != 0u) {{
            if (!op_select(mask[j])) {{
                continue;
            }}
            accum(j, op_mult(vk, m_ax[idx]));
        }} else {{
            let prod = op_mult(vk, m_ax[idx]);
            if (op_select(mask[j])) {{
                accum(j, prod);
            }}
        }}
    }}
}}

@compute @workgroup_size(256)
fn vxm_prepare(@builtin(global_invocation_id) gid: vec3<u32>,
               @builtin(num_workgroups) nwg: vec3<u32>) {{
    let stride = nwg.x * 256u;
    for (var j = gid.x; j < params.r_cols; j = j + stride) {{
        atomicStore(&r[j], bitcast<u32>(params.init));
    }}
}}

@compute @workgroup_size(256)
fn vxm_atomic_scalar(@builtin(global_invocation_id) gid: vec3<u32>,
                     @builtin(num_workgroups) nwg: vec3<u32>) {{
    let stride = nwg.x * 256u;
    for (var k = gid.x; k < params.v_rows; k = k + stride) {{
        scatter_row(k);
    }}
}}

// One work-group cooperates on each source row; threads stride the
// row's non-zeros.
@compute @workgroup_size(256)
fn vxm_atomic_vector(@builtin(workgroup_id) wg: vec3<u32>,
                     @builtin(local_invocation_id) lid: vec3<u32>,
                     @builtin(num_workgroups) nwg: vec3<u32>) {{
    for (var k = wg.x; k < params.v_rows; k = k + nwg.x) {{
        let vk = v[k];
        if (vk == params.v_fill) {{
            continue;
        }}
        let lo = m_ap[k];
        let hi = m_ap[k + 1u];
        for (var idx = lo + lid.x; idx < hi; idx = idx + 256u) {{
            let j = m_aj[idx];
            let prod = op_mult(vk, m_ax[idx]);
            if (op_select(mask[j])) {{
                accum(j, prod);
            }}
        }}
    }}
}}

// Prepass compacting the rows that carry a source entry.
@compute @workgroup_size(256)
fn vxm_config(@builtin(global_invocation_id) gid: vec3<u32>,
              @builtin(num_workgroups) nwg: vec3<u32>) {{
    let stride = nwg.x * 256u;
    for (var k = gid.x; k < params.v_rows; k = k + stride) {{
        if (v[k] != params.v_fill) {{
            let slot = atomicAdd(&config_size, 1u);
            config[slot] = k;
        }}
    }}
}}

@compute @workgroup_size(256)
fn vxm_config_atomic_scalar(@builtin(global_invocation_id) gid: vec3<u32>,
                            @builtin(num_workgroups) nwg: vec3<u32>) {{
    let count = atomicLoad(&config_size);
    let stride = nwg.x * 256u;
    for (var c = gid.x; c < count; c = c + stride) {{
        scatter_row(config[c]);
    }}
}}
"#,
        t = t,
        mult = op_multiply.source(),
        add = op_add.source(),
        select = op_select.source(),
    );

    Ok((key, source))
}

/// Cache key plus generated source of the masked assign program
pub fn assign_program<T: Element>(
    op_assign: &BinaryOp<T>,
    op_select: &SelectOp<T>,
) -> Result<(ProgramKey, String)> {
    let t = wgsl_type(T::DTYPE)?;
    let key = ProgramKey {
        template: "v_assign_masked",
        dtype: T::DTYPE,
        ops: smallvec![op_assign.id().raw(), op_select.id().raw()],
    };

    let source = format!(
        r#"// Masked vector assignment.
alias T = {t};

struct Params {{
    n: u32,
    _pad0: u32,
    value: T,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read_write> r: array<T>;
@group(0) @binding(1) var<storage, read> mask: array<T>;
@group(0) @binding(2) var<uniform> params: Params;
@group(0) @binding(3) var<storage, read> mask_ai: array<u32>;

fn op_assign(a: T, b: T) -> T {{ return {assign}; }}
fn op_select(x: T) -> bool {{ return {select}; }}

// Dense mask: one lane per target position.
@compute @workgroup_size(256)
fn assign_dense(@builtin(global_invocation_id) gid: vec3<u32>,
                @builtin(num_workgroups) nwg: vec3<u32>) {{
    let stride = nwg.x * 256u;
    for (var i = gid.x; i < params.n; i = i + stride) {{
        if (op_select(mask[i])) {{
            r[i] = op_assign(r[i], params.value);
        }}
    }}
}}

// Sparse mask: one lane per stored mask entry, scattering into r.
@compute @workgroup_size(256)
fn assign_sparse(@builtin(global_invocation_id) gid: vec3<u32>,
                 @builtin(num_workgroups) nwg: vec3<u32>) {{
    let stride = nwg.x * 256u;
    for (var k = gid.x; k < params.n; k = k + stride) {{
        if (op_select(mask[k])) {{
            r[mask_ai[k]] = op_assign(r[mask_ai[k]], params.value);
        }}
    }}
}}
"#,
        t = t,
        assign = op_assign.source(),
        select = op_select.source(),
    );

    Ok((key, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op;

    fn validate(source: &str) {
        let mut frontend = wgpu::naga::front::wgsl::Frontend::new();
        if let Err(e) = frontend.parse(source) {
            panic!("generated WGSL failed to parse: {e}\n{source}");
        }
    }

    #[test]
    fn test_vxm_source_parses_for_all_types() {
        let (_, src) =
            vxm_program(&op::band::<i32>(), &op::bor::<i32>(), &op::nonzero::<i32>()).unwrap();
        validate(&src);

        let (_, src) =
            vxm_program(&op::plus::<f32>(), &op::min::<f32>(), &op::nonzero::<f32>()).unwrap();
        validate(&src);

        let (_, src) =
            vxm_program(&op::mult::<u32>(), &op::plus::<u32>(), &op::always::<u32>()).unwrap();
        validate(&src);
    }

    #[test]
    fn test_assign_source_parses() {
        let (_, src) = assign_program(&op::second::<f32>(), &op::nonzero::<f32>()).unwrap();
        validate(&src);
    }

    #[test]
    fn test_void_type_rejected() {
        assert!(wgsl_type(DType::Void).is_err());
        assert_eq!(wgsl_type(DType::F32).unwrap(), "f32");
    }

    #[test]
    fn test_key_tracks_operator_identity() {
        let mult = op::mult::<f32>();
        let add = op::plus::<f32>();
        let sel = op::nonzero::<f32>();
        let (k1, _) = vxm_program(&mult, &add, &sel).unwrap();
        let (k2, _) = vxm_program(&mult, &add, &sel).unwrap();
        assert_eq!(k1, k2);

        let (k3, _) = vxm_program(&op::mult::<f32>(), &add, &sel).unwrap();
        assert_ne!(k1, k3);
    }
}
