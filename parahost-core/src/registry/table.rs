use std::sync::Arc;

use futures::future::BoxFuture;

use super::{OpContext, OpError, OpResult, OperationDescriptor as Op};
use crate::broadcast::{COORDINATOR, broadcast_bytes};
use crate::capability::CapabilitySet;
use crate::eval::Value;

const DISTRIBUTED: CapabilitySet = CapabilitySet::DISTRIBUTED;
const SCALAPACK: CapabilitySet = DISTRIBUTED.union(CapabilitySet::SCALAPACK);
const MR3: CapabilitySet = SCALAPACK.union(CapabilitySet::MR3);
const ELPA: CapabilitySet = SCALAPACK.union(CapabilitySet::ELPA);

/// Every operation this image can expose, in registry order.
pub static OPERATIONS: &[Op] = &[
    Op::kernel("symmetrize"),
    Op::kernel("symmetrize_ft"),
    Op::kernel("symmetrize_wavefunction"),
    Op::kernel("symmetrize_return_index"),
    Op::kernel("symmetrize_with_index"),
    Op::kernel("map_k_points"),
    Op::kernel("scal"),
    Op::kernel("mmm"),
    Op::kernel("tetrahedron_weight"),
    Op::kernel("gemm"),
    Op::kernel("gemv"),
    Op::kernel("axpy"),
    Op::kernel("czher"),
    Op::kernel("rk"),
    Op::kernel("r2k"),
    Op::kernel("dotc"),
    Op::kernel("dotu"),
    Op::kernel("multi_dotu"),
    Op::kernel("multi_axpy"),
    Op::kernel("diagonalize"),
    Op::kernel("diagonalize_mr3"),
    Op::kernel("general_diagonalize"),
    Op::kernel("inverse_cholesky"),
    Op::kernel("banded_cholesky"),
    Op::kernel("solve_banded_cholesky"),
    Op::kernel("inverse_symmetric"),
    Op::kernel("inverse_general"),
    Op::kernel("linear_solve_band"),
    Op::kernel("linear_solve_tridiag"),
    Op::kernel("right_eigenvectors"),
    Op::kernel("add_to_density"),
    Op::kernel("utilities_gaussian_wave"),
    Op::kernel("utilities_vdot"),
    Op::kernel("utilities_vdot_self"),
    Op::kernel("eed_region"),
    Op::kernel("plane_wave_grid"),
    Op::kernel("pwlfc_expand"),
    Op::kernel("pw_insert"),
    Op::kernel("pw_precond"),
    Op::kernel("erf"),
    Op::kernel("cerf"),
    Op::kernel("pack"),
    Op::kernel("unpack"),
    Op::kernel("unpack_complex"),
    Op::kernel("hartree"),
    Op::kernel("localize"),
    Op::kernel("lxcXCFuncNum"),
    Op::kernel("overlap"),
    Op::kernel("tci_overlap"),
    Op::kernel("vdw"),
    Op::kernel("vdw2"),
    Op::kernel("spherical_harmonics"),
    Op::kernel("pc_potential"),
    Op::kernel("spline_to_grid"),
    Op::constructor("LocalizedFunctions"),
    Op::constructor("Operator"),
    Op::constructor("WOperator"),
    Op::constructor("Spline"),
    Op::constructor("Transformer"),
    Op::constructor("XCFunctional"),
    Op::constructor("lxcXCFunctional"),
    Op::constructor("LFC"),
    Op::builtin("globally_broadcast_bytes", globally_broadcast_bytes),
    Op::builtin("rank", rank).no_args(),
    Op::builtin("size", size).no_args(),
    Op::builtin("Communicator", communicator)
        .returning("Communicator")
        .requires(DISTRIBUTED),
    Op::kernel("new_blacs_context").requires(SCALAPACK),
    Op::kernel("get_blacs_gridinfo").requires(SCALAPACK),
    Op::kernel("get_blacs_local_shape").requires(SCALAPACK),
    Op::kernel("blacs_destroy").requires(SCALAPACK),
    Op::kernel("scalapack_set").requires(SCALAPACK),
    Op::kernel("scalapack_redist").requires(SCALAPACK),
    Op::kernel("scalapack_diagonalize_dc").requires(SCALAPACK),
    Op::kernel("scalapack_diagonalize_ex").requires(SCALAPACK),
    Op::kernel("scalapack_diagonalize_mr3").requires(MR3),
    Op::kernel("scalapack_general_diagonalize_dc").requires(SCALAPACK),
    Op::kernel("scalapack_general_diagonalize_ex").requires(SCALAPACK),
    Op::kernel("scalapack_general_diagonalize_mr3").requires(MR3),
    Op::kernel("scalapack_inverse_cholesky").requires(SCALAPACK),
    Op::kernel("scalapack_inverse").requires(SCALAPACK),
    Op::kernel("scalapack_solve").requires(SCALAPACK),
    Op::kernel("pblas_tran").requires(SCALAPACK),
    Op::kernel("pblas_gemm").requires(SCALAPACK),
    Op::kernel("pblas_hemm").requires(SCALAPACK),
    Op::kernel("pblas_gemv").requires(SCALAPACK),
    Op::kernel("pblas_r2k").requires(SCALAPACK),
    Op::kernel("pblas_rk").requires(SCALAPACK),
    Op::kernel("pyelpa_allocate").requires(ELPA),
    Op::kernel("pyelpa_set").requires(ELPA),
    Op::kernel("pyelpa_setup").requires(ELPA),
    Op::kernel("pyelpa_set_comm").requires(ELPA),
    Op::kernel("pyelpa_diagonalize").requires(ELPA),
    Op::kernel("pyelpa_general_diagonalize").requires(ELPA),
    Op::kernel("pyelpa_hermitian_multiply").requires(ELPA),
    Op::kernel("pyelpa_constants").requires(ELPA),
    Op::kernel("pyelpa_deallocate").requires(ELPA),
    Op::kernel("hpm_start").requires(CapabilitySet::HPM),
    Op::kernel("hpm_stop").requires(CapabilitySet::HPM),
    Op::kernel("mpi_start")
        .no_args()
        .requires(CapabilitySet::HPM),
    Op::kernel("mpi_stop").no_args().requires(CapabilitySet::HPM),
    Op::kernel("craypat_region_begin").requires(CapabilitySet::CRAYPAT),
    Op::kernel("craypat_region_end").requires(CapabilitySet::CRAYPAT),
    Op::kernel("papi_mem_info").requires(CapabilitySet::PAPI),
    Op::kernel("libvdwxc_create").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_has").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_init_serial").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_calculate").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_tostring").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_free").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_init_mpi").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("libvdwxc_init_pfft").requires(CapabilitySet::LIBVDWXC),
    Op::kernel("mlsqr"),
    Op::builtin("githash", githash)
        .no_args()
        .requires(CapabilitySet::GITHASH),
];

fn expect_args(name: &str, args: &[Value], expected: usize) -> OpResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(OpError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

/// Replicates the coordinator's bytes to every rank. In a serial image the
/// argument is returned unchanged.
fn globally_broadcast_bytes(
    ctx: Arc<OpContext>,
    args: Vec<Value>,
) -> BoxFuture<'static, OpResult<Value>> {
    Box::pin(async move {
        expect_args("globally_broadcast_bytes", &args, 1)?;
        let mut args = args;
        let arg = args.remove(0);
        if !ctx.flags.contains(CapabilitySet::DISTRIBUTED) {
            return Ok(arg);
        }

        let payload = if ctx.comm.rank() == COORDINATOR {
            match arg {
                Value::Bytes(bytes) => Some(bytes),
                Value::String(s) => Some(s.into_bytes()),
                // The coordinator still enters the collective so that every
                // rank fails together.
                _ => None,
            }
        } else {
            None
        };
        let bytes = broadcast_bytes(ctx.comm.as_ref(), payload.as_deref(), COORDINATOR).await?;
        Ok(Value::Bytes(bytes))
    })
}

fn rank(ctx: Arc<OpContext>, _args: Vec<Value>) -> BoxFuture<'static, OpResult<Value>> {
    Box::pin(async move { Ok(Value::Integer(ctx.comm.rank() as i64)) })
}

fn size(ctx: Arc<OpContext>, _args: Vec<Value>) -> BoxFuture<'static, OpResult<Value>> {
    Box::pin(async move { Ok(Value::Integer(ctx.comm.size() as i64)) })
}

/// Handle on the world communicator.
fn communicator(ctx: Arc<OpContext>, args: Vec<Value>) -> BoxFuture<'static, OpResult<Value>> {
    Box::pin(async move {
        expect_args("Communicator", &args, 0)?;
        let object = ctx.types.instantiate(
            "Communicator",
            vec![
                ("rank".to_string(), Value::Integer(ctx.comm.rank() as i64)),
                ("size".to_string(), Value::Integer(ctx.comm.size() as i64)),
            ],
        )?;
        Ok(Value::Object(object))
    })
}

fn githash(_ctx: Arc<OpContext>, _args: Vec<Value>) -> BoxFuture<'static, OpResult<Value>> {
    Box::pin(async move {
        Ok(Value::String(
            option_env!("PARAHOST_GITHASH").unwrap_or("unknown").to_string(),
        ))
    })
}
