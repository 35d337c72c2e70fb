//! Compute capability policy
//!
//! Installed devices are only validated against the minimum supported
//! generation. The codegen target list is a fixed policy set so a build host
//! with no (or different) GPUs still produces the same binaries.

use crate::error::{Error, Result};
use crate::types::{AcceleratorFamily, ComputeCapability, Device};

/// Lowest compute capability the kernels support (Turing)
pub const MIN_COMPUTE_CAPABILITY: ComputeCapability = ComputeCapability(75);

/// Generations code is emitted for: Turing, Ampere, Ampere consumer, Ada, Hopper
pub const CODEGEN_TARGETS: [ComputeCapability; 5] = [
    ComputeCapability(75),
    ComputeCapability(80),
    ComputeCapability(86),
    ComputeCapability(89),
    ComputeCapability(90),
];

/// Reject any device below [`MIN_COMPUTE_CAPABILITY`]
///
/// An empty device list is accepted.
pub fn validate_devices(devices: &[Device]) -> Result<()> {
    for device in devices {
        let capability = device.capability();
        if capability < MIN_COMPUTE_CAPABILITY {
            return Err(Error::UnsupportedHardware {
                index: device.index,
                code: capability.code(),
                minimum: MIN_COMPUTE_CAPABILITY.code(),
            });
        }
        tracing::debug!(index = device.index, capability = %capability, "device accepted");
    }
    Ok(())
}

/// Validate installed devices and return the codegen target set
///
/// ROCm dispatches architectures through its own toolchain, so no explicit
/// codegen targets are returned for it.
pub fn codegen_targets(
    devices: &[Device],
    family: AcceleratorFamily,
) -> Result<Vec<ComputeCapability>> {
    validate_devices(devices)?;

    let targets = match family {
        AcceleratorFamily::Cuda => CODEGEN_TARGETS.to_vec(),
        AcceleratorFamily::Rocm => Vec::new(),
    };

    tracing::info!(
        devices = devices.len(),
        targets = ?targets.iter().map(ComputeCapability::code).collect::<Vec<_>>(),
        "resolved codegen targets"
    );
    Ok(targets)
}
