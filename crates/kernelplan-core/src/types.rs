//! Core data model shared by every build stage

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    /// Linux, macOS and other POSIX-like hosts
    Posix,
    /// Windows
    Windows,
}

impl HostOs {
    /// The OS this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else {
            HostOs::Posix
        }
    }

    /// Check if this is a POSIX-like host
    pub fn is_posix(&self) -> bool {
        matches!(self, HostOs::Posix)
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOs::Posix => write!(f, "posix"),
            HostOs::Windows => write!(f, "windows"),
        }
    }
}

/// Accelerator vendor stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorFamily {
    /// NVIDIA CUDA
    Cuda,
    /// AMD ROCm (HIP)
    Rocm,
}

impl fmt::Display for AcceleratorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceleratorFamily::Cuda => write!(f, "cuda"),
            AcceleratorFamily::Rocm => write!(f, "rocm"),
        }
    }
}

/// The accelerator runtime selected for this build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorRuntime {
    /// Vendor stack
    pub family: AcceleratorFamily,

    /// Runtime version as reported or overridden, e.g. `12.1` or `5.6.0`
    pub version: String,

    /// Whether the runtime can actually be used for this build
    pub available: bool,
}

impl AcceleratorRuntime {
    /// A usable CUDA runtime
    pub fn cuda(version: impl Into<String>) -> Self {
        Self {
            family: AcceleratorFamily::Cuda,
            version: version.into(),
            available: true,
        }
    }

    /// A usable ROCm runtime
    pub fn rocm(version: impl Into<String>) -> Self {
        Self {
            family: AcceleratorFamily::Rocm,
            version: version.into(),
            available: true,
        }
    }

    /// Check if CUDA is selected
    pub fn is_cuda(&self) -> bool {
        self.family == AcceleratorFamily::Cuda
    }

    /// Check if ROCm is selected
    pub fn is_rocm(&self) -> bool {
        self.family == AcceleratorFamily::Rocm
    }
}

impl fmt::Display for AcceleratorRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.version)
    }
}

/// A physical accelerator visible to the build host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device index
    pub index: usize,

    /// Major hardware generation
    pub major: u32,

    /// Minor hardware generation
    pub minor: u32,
}

impl Device {
    /// Create a device record
    pub fn new(index: usize, major: u32, minor: u32) -> Self {
        Self {
            index,
            major,
            minor,
        }
    }

    /// Create a device record, `None` when the generation has no capability code
    pub fn checked(index: usize, major: u32, minor: u32) -> Option<Self> {
        ComputeCapability::try_from_generation(major, minor)?;
        Some(Self::new(index, major, minor))
    }

    /// Compute capability code of this device
    pub fn capability(&self) -> ComputeCapability {
        ComputeCapability::from_generation(self.major, self.minor)
    }
}

/// Compute capability code, `major * 10 + minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputeCapability(pub u32);

impl ComputeCapability {
    /// Encode a hardware generation, saturating out-of-range values
    pub fn from_generation(major: u32, minor: u32) -> Self {
        Self::try_from_generation(major, minor).unwrap_or(Self(u32::MAX))
    }

    /// Encode a hardware generation
    ///
    /// `None` when the minor version is not a single digit or the code does
    /// not fit in a `u32`.
    pub fn try_from_generation(major: u32, minor: u32) -> Option<Self> {
        if minor > 9 {
            return None;
        }
        major.checked_mul(10)?.checked_add(minor).map(Self)
    }

    /// Raw code
    pub fn code(&self) -> u32 {
        self.0
    }

    /// `-gencode arch=compute_X,code=sm_X` pair for this code
    pub fn gencode_flags(&self) -> [String; 2] {
        [
            "-gencode".to_string(),
            format!("arch=compute_{0},code=sm_{0}", self.0),
        ]
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiler stage a flag sequence is passed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerStage {
    /// Host C++ frontend
    Cxx,
    /// GPU compiler driver (nvcc, or hipcc under ROCm)
    Nvcc,
}

/// Ordered compiler and linker flags for one extension target
///
/// Later flags may override earlier ones in the underlying toolchain, so the
/// order within each sequence is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    /// Compile flags keyed by compiler stage
    pub compile: BTreeMap<CompilerStage, Vec<String>>,

    /// Linker flags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<String>,
}

impl FlagSet {
    /// An empty flag set; the toolchain's own defaults apply
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flags for a stage, replacing anything already there
    pub fn with_stage<I, S>(mut self, stage: CompilerStage, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile
            .insert(stage, flags.into_iter().map(Into::into).collect());
        self
    }

    /// Set the linker flags
    pub fn with_link<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Flags for a stage, empty if the stage is absent
    pub fn stage(&self, stage: CompilerStage) -> &[String] {
        self.compile.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check if a flag is present in any compile stage
    pub fn contains(&self, flag: &str) -> bool {
        self.compile.values().flatten().any(|f| f == flag)
    }

    /// Check if there are no flags at all
    pub fn is_empty(&self) -> bool {
        self.compile.is_empty() && self.link.is_empty()
    }
}

/// Platforms an extension target is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformGate {
    /// Built everywhere
    Any,
    /// Built only on POSIX-like hosts
    PosixOnly,
}

impl PlatformGate {
    /// Check if a target with this gate is built on `os`
    pub fn admits(&self, os: HostOs) -> bool {
        match self {
            PlatformGate::Any => true,
            PlatformGate::PosixOnly => os.is_posix(),
        }
    }
}

/// One compiled native module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionTarget {
    /// Importable module name
    pub name: String,

    /// Source files, in compilation order
    pub sources: Vec<PathBuf>,

    /// Compiler and linker flags
    pub flags: FlagSet,

    /// Platform restriction
    pub platform_gate: PlatformGate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_code() {
        assert_eq!(Device::new(0, 8, 6).capability(), ComputeCapability(86));
        assert_eq!(Device::new(1, 7, 5).capability().code(), 75);
        assert_eq!(Device::new(2, 9, 0).capability().to_string(), "90");
    }

    #[test]
    fn test_capability_bounds() {
        assert_eq!(
            ComputeCapability::try_from_generation(429_496_729, 5),
            Some(ComputeCapability(u32::MAX))
        );
        assert_eq!(ComputeCapability::try_from_generation(429_496_729, 6), None);
        assert_eq!(ComputeCapability::try_from_generation(429_496_730, 0), None);
        assert_eq!(ComputeCapability::try_from_generation(8, 10), None);

        assert_eq!(
            Device::new(0, 429_496_730, 0).capability(),
            ComputeCapability(u32::MAX)
        );
        assert!(Device::checked(0, 8, 6).is_some());
        assert!(Device::checked(0, 429_496_730, 0).is_none());
    }

    #[test]
    fn test_gencode_flags() {
        let flags = ComputeCapability(89).gencode_flags();
        assert_eq!(flags[0], "-gencode");
        assert_eq!(flags[1], "arch=compute_89,code=sm_89");
    }

    #[test]
    fn test_platform_gate() {
        assert!(PlatformGate::Any.admits(HostOs::Windows));
        assert!(PlatformGate::Any.admits(HostOs::Posix));
        assert!(PlatformGate::PosixOnly.admits(HostOs::Posix));
        assert!(!PlatformGate::PosixOnly.admits(HostOs::Windows));
    }

    #[test]
    fn test_flag_set_stages() {
        let flags = FlagSet::new()
            .with_stage(CompilerStage::Nvcc, ["-O3", "--use_fast_math"])
            .with_link(["-lgomp"]);

        assert_eq!(flags.stage(CompilerStage::Nvcc), ["-O3", "--use_fast_math"]);
        assert!(flags.stage(CompilerStage::Cxx).is_empty());
        assert!(flags.contains("--use_fast_math"));
        assert!(!flags.contains("-lgomp"));
        assert!(!flags.is_empty());
        assert!(FlagSet::new().is_empty());
    }

    #[test]
    fn test_flag_set_json_shape() {
        let flags = FlagSet::new().with_stage(CompilerStage::Cxx, ["-O3"]);
        let json = serde_json::to_value(&flags).unwrap();
        assert_eq!(json, serde_json::json!({ "compile": { "cxx": ["-O3"] } }));
    }
}
