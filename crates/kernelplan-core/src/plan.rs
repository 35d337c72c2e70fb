//! Extension target assembly and the build plan handed to the native builder

use crate::package::PackageMetadata;
use crate::types::{AcceleratorRuntime, ExtensionTarget, FlagSet, HostOs, PlatformGate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Static description of one extension module
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    /// Importable module name
    pub name: &'static str,

    /// Sources relative to the project root, in compilation order
    pub sources: &'static [&'static str],

    /// Platform restriction
    pub platform_gate: PlatformGate,
}

/// GEMM, GEMV, layernorm and rotary embedding kernels
pub const AWQ_EXT: TargetSpec = TargetSpec {
    name: "awq_ext",
    sources: &[
        "awq_ext/pybind_awq.cpp",
        "awq_ext/quantization/gemm_cuda_gen.cu",
        "awq_ext/layernorm/layernorm.cu",
        "awq_ext/position_embedding/pos_encoding_kernels.cu",
        "awq_ext/quantization/gemv_cuda.cu",
    ],
    platform_gate: PlatformGate::Any,
};

/// Fused decoder attention kernels. These have never been ported to Windows.
pub const AWQ_FT_EXT: TargetSpec = TargetSpec {
    name: "awq_ft_ext",
    sources: &[
        "awq_ext/pybind_awq_ft.cpp",
        "awq_ext/attention/ft_attention.cpp",
        "awq_ext/attention/decoder_masked_multihead_attention.cu",
    ],
    platform_gate: PlatformGate::PosixOnly,
};

/// Every extension module, in build order
pub const TARGETS: &[TargetSpec] = &[AWQ_EXT, AWQ_FT_EXT];

impl TargetSpec {
    fn instantiate(&self, flags: &FlagSet) -> ExtensionTarget {
        ExtensionTarget {
            name: self.name.to_string(),
            sources: self.sources.iter().map(PathBuf::from).collect(),
            flags: flags.clone(),
            platform_gate: self.platform_gate,
        }
    }
}

/// Build the extension targets admitted on `os`
pub fn assemble(flags: &FlagSet, os: HostOs) -> Vec<ExtensionTarget> {
    TARGETS
        .iter()
        .filter(|spec| {
            let admitted = spec.platform_gate.admits(os);
            if !admitted {
                tracing::info!(extension = spec.name, %os, "skipping extension target");
            }
            admitted
        })
        .map(|spec| spec.instantiate(flags))
        .collect()
}

/// Everything the native-build collaborator needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Package metadata
    pub package: PackageMetadata,

    /// Final package version, including any accelerator label
    pub version: String,

    /// Selected runtime, absent for public builds without extensions
    pub runtime: Option<AcceleratorRuntime>,

    /// OS the plan was assembled for
    pub os: HostOs,

    /// Extension modules to compile
    pub targets: Vec<ExtensionTarget>,

    /// Extra include directories
    pub include_dirs: Vec<PathBuf>,

    /// Environment to set for the native compiler
    pub compiler_env: BTreeMap<String, String>,
}

impl BuildPlan {
    /// Look up a target by name
    pub fn target(&self, name: &str) -> Option<&ExtensionTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Names of all targets, in build order
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
