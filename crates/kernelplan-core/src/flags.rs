//! Compiler and linker flag composition
//!
//! Flags depend on two independent axes, the host OS and the accelerator
//! family. Each axis is resolved through a lookup (`composer_for`,
//! `family_flags`) rather than nested conditionals.

use crate::error::{Error, Result};
use crate::types::{
    AcceleratorFamily, AcceleratorRuntime, CompilerStage, ComputeCapability, FlagSet, HostOs,
};

/// Flags passed to the host C++ compiler on POSIX
pub const CXX_FLAGS: &[&str] = &["-g", "-O3", "-fopenmp", "-std=c++17", "-DENABLE_BF16"];

/// Linker flags on POSIX
pub const LINK_FLAGS: &[&str] = &["-lgomp"];

/// Leading GPU compiler flags on POSIX, shared by both families
pub const GPU_BASE_FLAGS: &[&str] = &["-O3", "-std=c++17", "-DENABLE_BF16"];

/// Re-enables half/bfloat16 operators and conversions hidden by the CUDA headers
pub const CUDA_FLAGS: &[&str] = &[
    "-U__CUDA_NO_HALF_OPERATORS__",
    "-U__CUDA_NO_HALF_CONVERSIONS__",
    "-U__CUDA_NO_BFLOAT16_OPERATORS__",
    "-U__CUDA_NO_BFLOAT16_CONVERSIONS__",
    "-U__CUDA_NO_BFLOAT162_OPERATORS__",
    "-U__CUDA_NO_BFLOAT162_CONVERSIONS__",
    "--expt-relaxed-constexpr",
    "--expt-extended-lambda",
    "--use_fast_math",
];

/// HIP spelling of the half/bfloat16 undefines
pub const HIP_FLAGS: &[&str] = &[
    "-U__HIP_NO_HALF_OPERATORS__",
    "-U__HIP_NO_HALF_CONVERSIONS__",
    "-U__HIP_NO_BFLOAT16_OPERATORS__",
    "-U__HIP_NO_BFLOAT16_CONVERSIONS__",
    "-U__HIP_NO_BFLOAT162_OPERATORS__",
    "-U__HIP_NO_BFLOAT162_CONVERSIONS__",
];

/// Added when torch still ships the old `ATen/CUDAGeneratorImpl.h` layout
pub const OLD_GENERATOR_FLAG: &str = "-DOLD_GENERATOR_PATH";

/// Inputs to flag composition that come from the environment or host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagOptions {
    /// Emit codegen flags on Windows
    pub include_arch: bool,

    /// Torch exposes the pre-2.0 generator header
    pub legacy_generator: bool,
}

struct FlagInputs<'a> {
    family: AcceleratorFamily,
    codes: &'a [ComputeCapability],
    options: FlagOptions,
}

type Composer = fn(&FlagInputs<'_>) -> Result<FlagSet>;

fn composer_for(os: HostOs) -> Composer {
    match os {
        HostOs::Posix => compose_posix,
        HostOs::Windows => compose_windows,
    }
}

/// GPU compiler flags specific to an accelerator family
pub fn family_flags(family: AcceleratorFamily) -> &'static [&'static str] {
    match family {
        AcceleratorFamily::Cuda => CUDA_FLAGS,
        AcceleratorFamily::Rocm => HIP_FLAGS,
    }
}

/// `-gencode` pairs for every code, CUDA only
///
/// Fails when CUDA needs codegen flags but no codes were resolved.
pub fn arch_flags(family: AcceleratorFamily, codes: &[ComputeCapability]) -> Result<Vec<String>> {
    match family {
        AcceleratorFamily::Rocm => Ok(Vec::new()),
        AcceleratorFamily::Cuda => {
            if codes.is_empty() {
                return Err(Error::invalid_config(
                    "CUDA codegen requires at least one compute capability",
                ));
            }
            let mut sorted = codes.to_vec();
            sorted.sort();
            sorted.dedup();
            Ok(sorted.iter().flat_map(ComputeCapability::gencode_flags).collect())
        }
    }
}

fn compose_windows(inputs: &FlagInputs<'_>) -> Result<FlagSet> {
    if !inputs.options.include_arch {
        return Ok(FlagSet::new());
    }

    let arch = arch_flags(inputs.family, inputs.codes)?;
    if arch.is_empty() {
        return Ok(FlagSet::new());
    }
    Ok(FlagSet::new().with_stage(CompilerStage::Nvcc, arch))
}

fn compose_posix(inputs: &FlagInputs<'_>) -> Result<FlagSet> {
    let mut gpu: Vec<String> = GPU_BASE_FLAGS.iter().map(|f| f.to_string()).collect();
    gpu.extend(family_flags(inputs.family).iter().map(|f| f.to_string()));
    gpu.extend(arch_flags(inputs.family, inputs.codes)?);
    if inputs.options.legacy_generator {
        gpu.push(OLD_GENERATOR_FLAG.to_string());
    }

    Ok(FlagSet::new()
        .with_stage(CompilerStage::Cxx, CXX_FLAGS.iter().copied())
        .with_stage(CompilerStage::Nvcc, gpu)
        .with_link(LINK_FLAGS.iter().copied()))
}

/// Compose the flag set shared by every extension target
pub fn compose_flags(
    runtime: &AcceleratorRuntime,
    codes: &[ComputeCapability],
    os: HostOs,
    options: FlagOptions,
) -> Result<FlagSet> {
    let inputs = FlagInputs {
        family: runtime.family,
        codes,
        options,
    };
    let flags = composer_for(os)(&inputs)?;

    tracing::debug!(
        %os,
        family = %runtime.family,
        cxx = flags.stage(CompilerStage::Cxx).len(),
        nvcc = flags.stage(CompilerStage::Nvcc).len(),
        "composed flags"
    );
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CODEGEN_TARGETS;

    fn posix(runtime: &AcceleratorRuntime, options: FlagOptions) -> FlagSet {
        let codes = if runtime.is_cuda() { CODEGEN_TARGETS.to_vec() } else { Vec::new() };
        compose_flags(runtime, &codes, HostOs::Posix, options).unwrap()
    }

    #[test]
    fn test_posix_cuda_order() {
        let flags = posix(&AcceleratorRuntime::cuda("12.1"), FlagOptions::default());
        let nvcc = flags.stage(CompilerStage::Nvcc);

        assert_eq!(&nvcc[..3], GPU_BASE_FLAGS);
        assert_eq!(&nvcc[3..3 + CUDA_FLAGS.len()], CUDA_FLAGS);
        let arch = &nvcc[3 + CUDA_FLAGS.len()..];
        assert_eq!(arch.len(), 10);
        assert_eq!(arch[0], "-gencode");
        assert_eq!(arch[1], "arch=compute_75,code=sm_75");
        assert_eq!(arch[9], "arch=compute_90,code=sm_90");

        assert_eq!(flags.stage(CompilerStage::Cxx), CXX_FLAGS);
        assert_eq!(flags.link, LINK_FLAGS);
    }

    #[test]
    fn test_posix_rocm_has_no_codegen() {
        let flags = posix(&AcceleratorRuntime::rocm("5.6"), FlagOptions::default());
        let nvcc = flags.stage(CompilerStage::Nvcc);

        assert_eq!(nvcc.len(), GPU_BASE_FLAGS.len() + HIP_FLAGS.len());
        assert!(!nvcc.iter().any(|f| f == "-gencode"));
        assert!(!flags.contains("--use_fast_math"));
    }

    #[test]
    fn test_family_blocks_are_exclusive() {
        for runtime in [AcceleratorRuntime::cuda("11.8"), AcceleratorRuntime::rocm("6.0")] {
            let flags = posix(&runtime, FlagOptions::default());
            let has_cuda = CUDA_FLAGS.iter().any(|f| flags.contains(f));
            let has_hip = HIP_FLAGS.iter().any(|f| flags.contains(f));
            assert!(has_cuda != has_hip, "exactly one family block for {runtime}");
        }
    }

    #[test]
    fn test_legacy_generator_flag_is_last() {
        let options = FlagOptions {
            legacy_generator: true,
            ..Default::default()
        };
        let flags = posix(&AcceleratorRuntime::cuda("11.8"), options);
        assert_eq!(flags.stage(CompilerStage::Nvcc).last().unwrap(), OLD_GENERATOR_FLAG);

        let flags = posix(&AcceleratorRuntime::cuda("11.8"), FlagOptions::default());
        assert!(!flags.contains(OLD_GENERATOR_FLAG));
    }

    #[test]
    fn test_windows_without_opt_in_is_empty() {
        let flags = compose_flags(
            &AcceleratorRuntime::cuda("12.1"),
            &CODEGEN_TARGETS,
            HostOs::Windows,
            FlagOptions::default(),
        )
        .unwrap();
        assert!(flags.is_empty());
    }

    #[test]
    fn test_windows_opt_in_is_arch_only() {
        let options = FlagOptions {
            include_arch: true,
            legacy_generator: true,
        };
        let flags = compose_flags(
            &AcceleratorRuntime::cuda("12.1"),
            &CODEGEN_TARGETS,
            HostOs::Windows,
            options,
        )
        .unwrap();

        let expected = arch_flags(AcceleratorFamily::Cuda, &CODEGEN_TARGETS).unwrap();
        assert_eq!(flags.stage(CompilerStage::Nvcc), expected.as_slice());
        assert!(flags.stage(CompilerStage::Cxx).is_empty());
        assert!(flags.link.is_empty());
    }

    #[test]
    fn test_arch_flags_sorted_and_deduplicated() {
        let codes = [ComputeCapability(86), ComputeCapability(80), ComputeCapability(86)];
        let flags = arch_flags(AcceleratorFamily::Cuda, &codes).unwrap();
        assert_eq!(
            flags,
            vec![
                "-gencode",
                "arch=compute_80,code=sm_80",
                "-gencode",
                "arch=compute_86,code=sm_86",
            ]
        );
    }

    #[test]
    fn test_cuda_requires_codes() {
        let err = compose_flags(
            &AcceleratorRuntime::cuda("12.1"),
            &[],
            HostOs::Posix,
            FlagOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
