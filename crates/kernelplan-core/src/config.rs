//! Build environment configuration
//!
//! Every process-wide input the build consults is captured once, at process
//! start, into a [`BuildEnvironment`]. Stages receive it explicitly and never
//! read the process environment themselves.

use crate::error::{Error, Result};
use crate::types::{Device, HostOs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Base semantic version of the kernels package
pub const BASE_VERSION: &str = "0.0.1";

/// Environment variable names consulted by [`BuildEnvironment::from_env`]
pub mod vars {
    /// Selects ROCm and carries its version
    pub const ROCM_VERSION: &str = "ROCM_VERSION";
    /// Overrides the detected CUDA version
    pub const CUDA_VERSION: &str = "CUDA_VERSION";
    /// `1` for a public package-index build
    pub const PYPI_BUILD: &str = "PYPI_BUILD";
    /// `1` to emit architecture codegen flags on Windows
    pub const INCLUDE_ARCH: &str = "INCLUDE_ARCH";
    /// Integer toggle for building the accelerated extensions at all
    pub const BUILD_CUDA_EXT: &str = "BUILD_CUDA_EXT";
    /// CUDA toolkit root
    pub const CUDA_HOME: &str = "CUDA_HOME";
    /// CUDA toolkit root, Windows installer spelling
    pub const CUDA_PATH: &str = "CUDA_PATH";
    /// ROCm root
    pub const ROCM_PATH: &str = "ROCM_PATH";
    /// HIP root, used when `ROCM_PATH` is unset
    pub const HIP_PATH: &str = "HIP_PATH";
    /// Installed libtorch / torch package directory
    pub const LIBTORCH: &str = "LIBTORCH";
    /// Host interpreter's site-packages directory
    pub const PYTHON_LIB: &str = "PYTHON_LIB";
    /// Explicit device list, e.g. `8.6,8.0`
    pub const KERNELPLAN_DEVICES: &str = "KERNELPLAN_DEVICES";
}

/// Snapshot of every input a build invocation depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    /// Base semantic version before any accelerator suffix
    pub base_version: String,

    /// ROCm version override; its presence selects ROCm
    pub rocm_version: Option<String>,

    /// CUDA version override; beats the version reported by the toolkit
    pub cuda_version: Option<String>,

    /// Public package-index build (no local version suffix)
    pub public_build: bool,

    /// Emit architecture codegen flags on Windows
    pub include_arch: bool,

    /// Build the accelerated extension modules
    pub build_extensions: bool,

    /// CUDA toolkit root, if configured
    pub cuda_home: Option<PathBuf>,

    /// ROCm root, if configured
    pub rocm_home: Option<PathBuf>,

    /// Torch installation used for header feature detection
    pub torch_dir: Option<PathBuf>,

    /// Host interpreter's site-packages directory
    pub python_lib: Option<PathBuf>,

    /// Devices to validate instead of querying the host
    pub device_override: Option<Vec<Device>>,

    /// Root of the kernels source tree
    pub project_root: PathBuf,

    /// OS the plan is assembled for
    pub os: HostOs,
}

impl Default for BuildEnvironment {
    fn default() -> Self {
        Self {
            base_version: BASE_VERSION.to_string(),
            rocm_version: None,
            cuda_version: None,
            public_build: false,
            include_arch: true,
            build_extensions: true,
            cuda_home: None,
            rocm_home: None,
            torch_dir: None,
            python_lib: None,
            device_override: None,
            project_root: PathBuf::from("."),
            os: HostOs::current(),
        }
    }
}

impl BuildEnvironment {
    /// Capture the current process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |name: &str| map.get(name).map(|v| v.trim().to_string());

        let build_extensions = match get(vars::BUILD_CUDA_EXT) {
            Some(raw) => {
                let value: i64 = raw.parse().map_err(|_| {
                    Error::invalid_config(format!(
                        "{} must be an integer, got {:?}",
                        vars::BUILD_CUDA_EXT,
                        raw
                    ))
                })?;
                value == 1
            }
            None => true,
        };

        let device_override = get(vars::KERNELPLAN_DEVICES)
            .map(|raw| parse_device_list(&raw))
            .transpose()?;

        Ok(Self {
            rocm_version: get(vars::ROCM_VERSION),
            cuda_version: get(vars::CUDA_VERSION),
            public_build: get(vars::PYPI_BUILD).as_deref() == Some("1"),
            include_arch: get(vars::INCLUDE_ARCH).map_or(true, |v| v == "1"),
            build_extensions,
            cuda_home: get(vars::CUDA_HOME)
                .or_else(|| get(vars::CUDA_PATH))
                .map(PathBuf::from),
            rocm_home: get(vars::ROCM_PATH)
                .or_else(|| get(vars::HIP_PATH))
                .map(PathBuf::from),
            torch_dir: get(vars::LIBTORCH).map(PathBuf::from),
            python_lib: get(vars::PYTHON_LIB).map(PathBuf::from),
            device_override,
            ..Default::default()
        })
    }

    /// Set the project root
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Set the target OS
    pub fn with_os(mut self, os: HostOs) -> Self {
        self.os = os;
        self
    }

    /// Mark this as a public package-index build
    pub fn with_public_build(mut self, public_build: bool) -> Self {
        self.public_build = public_build;
        self
    }

    /// Override the CUDA version
    pub fn with_cuda_version(mut self, version: impl Into<String>) -> Self {
        self.cuda_version = Some(version.into());
        self
    }

    /// Select ROCm with the given version
    pub fn with_rocm_version(mut self, version: impl Into<String>) -> Self {
        self.rocm_version = Some(version.into());
        self
    }

    /// Enable or disable the accelerated extensions
    pub fn with_extensions(mut self, enabled: bool) -> Self {
        self.build_extensions = enabled;
        self
    }

    /// Enable or disable Windows codegen flags
    pub fn with_include_arch(mut self, include_arch: bool) -> Self {
        self.include_arch = include_arch;
        self
    }

    /// Validate against a fixed device list instead of querying the host
    pub fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.device_override = Some(devices);
        self
    }

    /// Set the torch installation directory
    pub fn with_torch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.torch_dir = Some(dir.into());
        self
    }

    /// Set the host interpreter's site-packages directory
    pub fn with_python_lib(mut self, dir: impl Into<PathBuf>) -> Self {
        self.python_lib = Some(dir.into());
        self
    }
}

/// Parse a comma-separated list of `major.minor` generations
///
/// Devices are indexed in list order.
pub fn parse_device_list(raw: &str) -> Result<Vec<Device>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| {
            let invalid = || {
                Error::invalid_config(format!(
                    "{}: expected major.minor, got {:?}",
                    vars::KERNELPLAN_DEVICES,
                    entry
                ))
            };
            let (major, minor) = entry.split_once('.').ok_or_else(invalid)?;
            let major = major.parse().map_err(|_| invalid())?;
            let minor = minor.parse().map_err(|_| invalid())?;
            Device::checked(index, major, minor).ok_or_else(invalid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let env = BuildEnvironment::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(env.base_version, "0.0.1");
        assert!(env.build_extensions);
        assert!(env.include_arch);
        assert!(!env.public_build);
        assert!(env.rocm_version.is_none());
        assert!(env.device_override.is_none());
    }

    #[test]
    fn test_from_vars() {
        let env = BuildEnvironment::from_vars([
            ("ROCM_VERSION", "5.6"),
            ("PYPI_BUILD", "1"),
            ("INCLUDE_ARCH", "0"),
            ("BUILD_CUDA_EXT", "0"),
            ("CUDA_PATH", "/opt/cuda"),
            ("HIP_PATH", "/opt/hip"),
            ("KERNELPLAN_DEVICES", "8.6, 9.0"),
        ])
        .unwrap();

        assert_eq!(env.rocm_version.as_deref(), Some("5.6"));
        assert!(env.public_build);
        assert!(!env.include_arch);
        assert!(!env.build_extensions);
        assert_eq!(env.cuda_home, Some(PathBuf::from("/opt/cuda")));
        assert_eq!(env.rocm_home, Some(PathBuf::from("/opt/hip")));
        assert_eq!(
            env.device_override,
            Some(vec![Device::new(0, 8, 6), Device::new(1, 9, 0)])
        );
    }

    #[test]
    fn test_cuda_home_precedence() {
        let env = BuildEnvironment::from_vars([
            ("CUDA_HOME", "/usr/local/cuda-12.1"),
            ("CUDA_PATH", "/opt/cuda"),
        ])
        .unwrap();
        assert_eq!(env.cuda_home, Some(PathBuf::from("/usr/local/cuda-12.1")));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let env = BuildEnvironment::from_vars([("ROCM_VERSION", ""), ("CUDA_VERSION", " ")])
            .unwrap();
        assert!(env.rocm_version.is_none());
        assert!(env.cuda_version.is_none());
    }

    #[test]
    fn test_pypi_build_requires_exact_one() {
        let env = BuildEnvironment::from_vars([("PYPI_BUILD", "true")]).unwrap();
        assert!(!env.public_build);
    }

    #[test]
    fn test_invalid_extension_toggle() {
        let err = BuildEnvironment::from_vars([("BUILD_CUDA_EXT", "yes")]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_device_list() {
        assert_eq!(
            parse_device_list("7.5,8.0").unwrap(),
            vec![Device::new(0, 7, 5), Device::new(1, 8, 0)]
        );
        assert!(parse_device_list("").unwrap().is_empty());
        assert!(parse_device_list("86").is_err());
        assert!(parse_device_list("8.x").is_err());
        assert!(parse_device_list("8.10").is_err());
    }

    #[test]
    fn test_device_list_rejects_oversized_generation() {
        let err =
            BuildEnvironment::from_vars([("KERNELPLAN_DEVICES", "429496730.0")]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("429496730.0"));
    }

    #[test]
    fn test_builder() {
        let env = BuildEnvironment::default()
            .with_os(HostOs::Windows)
            .with_cuda_version("12.1")
            .with_public_build(true)
            .with_project_root("/src/awq");

        assert_eq!(env.os, HostOs::Windows);
        assert_eq!(env.cuda_version.as_deref(), Some("12.1"));
        assert!(env.public_build);
        assert_eq!(env.project_root, PathBuf::from("/src/awq"));
    }
}
