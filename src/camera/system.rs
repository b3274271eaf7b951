//! SoC-wide bring-up: system, common pools and the VIN engine.

use vin_buffer::{calc_pool_floorplan, PoolFloorplan, PoolSpec};

use crate::camera::backend::CaptureBackend;
use crate::camera::error::Result;

/// Initialise the system layer and install the common pool floorplan.
///
/// Pools left from a previous run are released first; a failure there is
/// only logged since there may be nothing to release.
pub fn init_system(backend: &dyn CaptureBackend, floorplan: &PoolFloorplan) -> Result<()> {
    backend.sys_init()?;
    if let Err(e) = backend.pool_exit() {
        tracing::debug!("no stale pools released: {e}");
    }
    backend.pool_set_floorplan(floorplan)?;
    backend.pool_init()?;
    tracing::info!(
        "system up with {} common pool(s), {} bytes",
        floorplan.len(),
        floorplan.total_bytes()
    );
    Ok(())
}

pub fn deinit_system(backend: &dyn CaptureBackend) -> Result<()> {
    backend.pool_exit()?;
    backend.sys_deinit()
}

/// Plan and install the VIN-private pools for a set of image requests.
pub fn init_private_pool(
    backend: &dyn CaptureBackend,
    specs: &[PoolSpec],
) -> Result<PoolFloorplan> {
    let plan = calc_pool_floorplan(specs)?;
    backend.vin_set_pool_floorplan(&plan)?;
    tracing::debug!("private floorplan: {} pool(s)", plan.len());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::error::{CameraError, Module};
    use crate::camera::mock::MockBackend;
    use vin_buffer::{ImageSpec, PixelFormat, PoolError, MAX_COMM_POOLS};

    fn nv12(height: u32, count: u32) -> PoolSpec {
        PoolSpec {
            image: ImageSpec::new(height, 1920, PixelFormat::Yuv420Semiplanar),
            block_count: count,
        }
    }

    #[test]
    fn init_tolerates_pool_exit_failure() {
        let backend = MockBackend::new()
            .with_error("pool_exit", CameraError::driver(Module::Pool, "exit", -1));
        init_system(&backend, &PoolFloorplan::new()).unwrap();
        assert_eq!(
            backend.calls(),
            vec!["sys_init()", "pool_exit()", "pool_set_floorplan(0)", "pool_init()"]
        );
    }

    #[test]
    fn init_stops_on_floorplan_failure() {
        let backend = MockBackend::new().with_error(
            "pool_set_floorplan",
            CameraError::ResourceExhausted {
                module: Module::Pool,
            },
        );
        assert!(init_system(&backend, &PoolFloorplan::new()).is_err());
        assert!(backend.calls_to("pool_init").is_empty());
    }

    #[test]
    fn private_pool_merges_equal_sizes() {
        let backend = MockBackend::new();
        let plan = init_private_pool(&backend, &[nv12(1080, 4), nv12(1080, 2)]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.pools()[0].block_count, 6);
        assert_eq!(backend.calls(), vec!["vin_set_pool_floorplan(1)"]);
    }

    #[test]
    fn private_pool_over_capacity_installs_nothing() {
        let backend = MockBackend::new();
        let specs: Vec<PoolSpec> = (1..=MAX_COMM_POOLS as u32 + 1)
            .map(|i| nv12(i * 64, 1))
            .collect();
        let err = init_private_pool(&backend, &specs).unwrap_err();
        assert!(matches!(
            err,
            CameraError::Pool(PoolError::CapacityExceeded { .. })
        ));
        assert!(backend.calls().is_empty());
    }
}
