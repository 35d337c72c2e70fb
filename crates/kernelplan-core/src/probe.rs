//! Accelerator runtime selection
//!
//! The host is only reached through [`HostProbe`], so selection is a pure
//! function of the [`BuildEnvironment`] and whatever the probe reports.

use crate::config::{vars, BuildEnvironment};
use crate::error::{Error, Result};
use crate::types::{AcceleratorFamily, AcceleratorRuntime, Device};

/// Read-only view of the build host's accelerator toolchains
pub trait HostProbe {
    /// CUDA version reported by the installed toolkit, if any
    fn cuda_version(&self, env: &BuildEnvironment) -> Result<Option<String>>;

    /// Check if the host has a usable ROCm/HIP toolchain
    fn rocm_supported(&self, env: &BuildEnvironment) -> bool;

    /// Accelerators visible to the build host
    fn devices(&self, env: &BuildEnvironment, family: AcceleratorFamily) -> Result<Vec<Device>>;

    /// Check if torch still ships the pre-2.0 generator header
    fn legacy_generator_api(&self, env: &BuildEnvironment) -> bool;
}

/// Select the accelerator runtime for this build
///
/// `ROCM_VERSION` selects ROCm and must be backed by a ROCm toolchain.
/// Otherwise CUDA is used, with `CUDA_VERSION` taking precedence over the
/// toolkit's own report.
pub fn probe<P: HostProbe + ?Sized>(
    env: &BuildEnvironment,
    host: &P,
) -> Result<AcceleratorRuntime> {
    if let Some(version) = &env.rocm_version {
        if !host.rocm_supported(env) {
            return Err(Error::InconsistentOverride(format!(
                "{}={} requests ROCm, but no ROCm toolchain is installed",
                vars::ROCM_VERSION,
                version
            )));
        }
        let runtime = AcceleratorRuntime::rocm(version.clone());
        tracing::info!(%runtime, "selected accelerator runtime from override");
        return Ok(runtime);
    }

    if let Some(version) = &env.cuda_version {
        let runtime = AcceleratorRuntime::cuda(version.clone());
        tracing::info!(%runtime, "selected accelerator runtime from override");
        return Ok(runtime);
    }

    match host.cuda_version(env)? {
        Some(version) => {
            let runtime = AcceleratorRuntime::cuda(version);
            tracing::info!(%runtime, "detected accelerator runtime");
            Ok(runtime)
        }
        None => Err(Error::NoAcceleratorFound(format!(
            "no CUDA toolkit detected and neither {} nor {} is set; an NVIDIA or AMD GPU toolchain is required",
            vars::CUDA_VERSION,
            vars::ROCM_VERSION
        ))),
    }
}
