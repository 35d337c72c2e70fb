//! The build-configuration pipeline
//!
//! Stages run strictly in order: runtime probe, version, device validation,
//! flags, targets. A failing stage aborts the run and nothing after it is
//! consulted.

use crate::capability;
use crate::config::BuildEnvironment;
use crate::error::Result;
use crate::flags::{self, FlagOptions};
use crate::package::PackageMetadata;
use crate::plan::{self, BuildPlan};
use crate::probe::{self, HostProbe};
use crate::types::{AcceleratorRuntime, ExtensionTarget};
use crate::version::{self, VersionIdentifier};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Compiler used for both C and C++ sources
pub const HOST_COMPILER: &str = "g++";

/// Drives one build invocation against a host
pub struct BuildPipeline<'a, P: HostProbe + ?Sized> {
    env: &'a BuildEnvironment,
    host: &'a P,
}

impl<'a, P: HostProbe + ?Sized> BuildPipeline<'a, P> {
    /// Create a pipeline
    pub fn new(env: &'a BuildEnvironment, host: &'a P) -> Self {
        Self { env, host }
    }

    /// Select the runtime if any later stage needs one
    fn runtime(&self) -> Result<Option<AcceleratorRuntime>> {
        if self.env.public_build && !self.env.build_extensions {
            return Ok(None);
        }
        probe::probe(self.env, self.host).map(Some)
    }

    /// Compose only the package version
    pub fn version(&self) -> Result<VersionIdentifier> {
        let runtime = self.runtime()?;
        version::compose_version(&self.env.base_version, runtime.as_ref(), self.env.public_build)
    }

    fn targets(&self, runtime: &AcceleratorRuntime) -> Result<Vec<ExtensionTarget>> {
        let devices = self.host.devices(self.env, runtime.family)?;
        let codes = capability::codegen_targets(&devices, runtime.family)?;

        let options = FlagOptions {
            include_arch: self.env.include_arch,
            legacy_generator: self.host.legacy_generator_api(self.env),
        };
        let flags = flags::compose_flags(runtime, &codes, self.env.os, options)?;

        Ok(plan::assemble(&flags, self.env.os))
    }

    fn include_dirs(&self, runtime: Option<&AcceleratorRuntime>) -> Vec<PathBuf> {
        let Some(runtime) = runtime.filter(|r| r.is_cuda()) else {
            return Vec::new();
        };

        let mut dirs = Vec::new();
        if let Some(python_lib) = &self.env.python_lib {
            let bundled = python_lib.join("nvidia").join("cuda_runtime").join("include");
            if bundled.is_dir() {
                tracing::debug!(path = %bundled.display(), "using pip-installed CUDA runtime headers");
                dirs.push(bundled);
            }
        }
        dirs.push(self.env.project_root.clone());
        tracing::debug!(count = dirs.len(), runtime = %runtime, "resolved include dirs");
        dirs
    }

    /// Run every stage and produce the complete plan
    pub fn run(&self) -> Result<BuildPlan> {
        let runtime = self.runtime()?;
        let version =
            version::compose_version(&self.env.base_version, runtime.as_ref(), self.env.public_build)?;
        tracing::info!(%version, "composed package version");

        let targets = match (&runtime, self.env.build_extensions) {
            (Some(runtime), true) => self.targets(runtime)?,
            _ => {
                tracing::info!("accelerated extensions disabled");
                Vec::new()
            }
        };

        let package = PackageMetadata::load(&self.env.project_root)?;

        let compiler_env = ["CC", "CXX"]
            .iter()
            .map(|var| (var.to_string(), HOST_COMPILER.to_string()))
            .collect::<BTreeMap<_, _>>();

        Ok(BuildPlan {
            package,
            version: version.to_string(),
            include_dirs: self.include_dirs(runtime.as_ref()),
            runtime,
            os: self.env.os,
            targets,
            compiler_env,
        })
    }
}
