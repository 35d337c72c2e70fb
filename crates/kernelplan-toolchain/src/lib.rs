//! kernelplan toolchain - host probing for CUDA and ROCm
//!
//! Implements [`HostProbe`] against the real build host:
//! - toolkit discovery and `nvcc` version queries
//! - HIP compiler detection
//! - device enumeration through `nvidia-smi` and `rocminfo`
//! - torch header feature detection

#![warn(clippy::all)]

pub mod devices;
pub mod headers;
pub mod toolkit;

use kernelplan_core::{AcceleratorFamily, BuildEnvironment, Device, HostProbe};
use thiserror::Error;

/// Toolchain error type
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// Tool exists but could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program path
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Tool exited with a failure status
    #[error("{program} exited with status {status:?}: {stderr}")]
    CommandFailed {
        /// Program path
        program: String,
        /// Exit code, if any
        status: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Tool output was not understood
    #[error("Could not parse {tool} output: {detail}")]
    Parse {
        /// Tool name
        tool: String,
        /// What went wrong
        detail: String,
    },
}

/// Result type alias for toolchain queries
pub type Result<T> = std::result::Result<T, ToolchainError>;

impl From<ToolchainError> for kernelplan_core::Error {
    fn from(err: ToolchainError) -> Self {
        kernelplan_core::Error::Toolchain(err.to_string())
    }
}

/// [`HostProbe`] backed by the installed toolchains
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl SystemProbe {
    /// Create a probe for the current host
    pub fn new() -> Self {
        Self
    }
}

impl HostProbe for SystemProbe {
    fn cuda_version(&self, env: &BuildEnvironment) -> kernelplan_core::Result<Option<String>> {
        Ok(toolkit::nvcc_version(env)?)
    }

    fn rocm_supported(&self, env: &BuildEnvironment) -> bool {
        toolkit::hip_available(env)
    }

    fn devices(
        &self,
        env: &BuildEnvironment,
        family: AcceleratorFamily,
    ) -> kernelplan_core::Result<Vec<Device>> {
        let source = devices::source_for(env, family);
        let found = source.enumerate()?;
        tracing::info!(source = source.name(), count = found.len(), "enumerated devices");
        Ok(found)
    }

    fn legacy_generator_api(&self, env: &BuildEnvironment) -> bool {
        env.torch_dir
            .as_deref()
            .is_some_and(headers::has_legacy_generator)
    }
}
