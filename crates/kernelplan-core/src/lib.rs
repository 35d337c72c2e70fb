//! kernelplan core - build-plan orchestration for GPU extension modules
//!
//! This crate decides, at build time, how the AWQ kernels are compiled:
//! - which accelerator runtime (CUDA or ROCm) is used
//! - which compute capabilities code is generated for
//! - which compiler and linker flags are safe on the host OS
//! - which extension modules are built, and under what package version
//!
//! Host access is abstracted behind [`probe::HostProbe`]; the
//! `kernelplan-toolchain` crate provides the real implementation.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod capability;
pub mod config;
pub mod flags;
pub mod package;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod version;

pub mod error;
pub mod types;

pub use config::BuildEnvironment;
pub use error::{Error, Result};
pub use pipeline::BuildPipeline;
pub use plan::BuildPlan;
pub use probe::HostProbe;
pub use types::{
    AcceleratorFamily, AcceleratorRuntime, CompilerStage, ComputeCapability, Device,
    ExtensionTarget, FlagSet, HostOs, PlatformGate,
};
pub use version::VersionIdentifier;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::BuildEnvironment;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::pipeline::BuildPipeline;
    pub use crate::plan::BuildPlan;
    pub use crate::probe::HostProbe;
    pub use crate::types::*;
    pub use crate::version::VersionIdentifier;
}
