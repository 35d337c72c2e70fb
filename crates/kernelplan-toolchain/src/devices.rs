//! Accelerator device enumeration
//!
//! Devices are discovered through the vendor management tools rather than by
//! linking the driver, so a build host without a driver still works and
//! simply reports no devices.

use crate::toolkit::{cuda_home, rocm_home, run_tool, tool_path};
use crate::{Result, ToolchainError};
use kernelplan_core::{AcceleratorFamily, BuildEnvironment, Device};
use std::path::{Path, PathBuf};

/// Something that can list the accelerators on this host
pub trait DeviceSource {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Enumerate devices; an absent or failing tool yields an empty list
    fn enumerate(&self) -> Result<Vec<Device>>;
}

/// Run a query tool, treating "not installed" and "no driver" as zero devices
///
/// Output that cannot be parsed is still an error.
fn query_devices(
    tool: &'static str,
    program: &Path,
    args: &[&str],
    parse: fn(&str) -> Result<Vec<Device>>,
) -> Result<Vec<Device>> {
    match run_tool(program, args) {
        Ok(Some(out)) => parse(&out),
        Ok(None) => {
            tracing::warn!("{tool} not found, assuming no visible devices");
            Ok(Vec::new())
        }
        Err(ToolchainError::CommandFailed { status, stderr, .. }) => {
            tracing::warn!(?status, %stderr, "{tool} failed, assuming no visible devices");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// NVIDIA devices via `nvidia-smi`
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: PathBuf,
}

impl NvidiaSmi {
    /// Look for `nvidia-smi` under the configured CUDA root first
    pub fn for_env(env: &BuildEnvironment) -> Self {
        Self::with_program(tool_path(&cuda_home(env), "nvidia-smi"))
    }

    /// Use a specific `nvidia-smi` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::with_program("nvidia-smi")
    }
}

impl DeviceSource for NvidiaSmi {
    fn name(&self) -> &'static str {
        "nvidia-smi"
    }

    fn enumerate(&self) -> Result<Vec<Device>> {
        let args = ["--query-gpu=index,compute_cap", "--format=csv,noheader"];
        query_devices(self.name(), &self.program, &args, parse_nvidia_smi)
    }
}

/// AMD devices via `rocminfo`
#[derive(Debug, Clone)]
pub struct Rocminfo {
    program: PathBuf,
}

impl Rocminfo {
    /// Look for `rocminfo` under the configured ROCm root first
    pub fn for_env(env: &BuildEnvironment) -> Self {
        Self::with_program(tool_path(&rocm_home(env), "rocminfo"))
    }

    /// Use a specific `rocminfo` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DeviceSource for Rocminfo {
    fn name(&self) -> &'static str {
        "rocminfo"
    }

    fn enumerate(&self) -> Result<Vec<Device>> {
        query_devices(self.name(), &self.program, &[], parse_rocminfo)
    }
}

/// A fixed device list
#[derive(Debug, Clone, Default)]
pub struct FixedDevices(pub Vec<Device>);

impl DeviceSource for FixedDevices {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn enumerate(&self) -> Result<Vec<Device>> {
        Ok(self.0.clone())
    }
}

/// Pick the device source for a build
pub fn source_for(env: &BuildEnvironment, family: AcceleratorFamily) -> Box<dyn DeviceSource> {
    if let Some(devices) = &env.device_override {
        return Box::new(FixedDevices(devices.clone()));
    }
    match family {
        AcceleratorFamily::Cuda => Box::new(NvidiaSmi::for_env(env)),
        AcceleratorFamily::Rocm => Box::new(Rocminfo::for_env(env)),
    }
}

fn parse_error(tool: &str, detail: String) -> ToolchainError {
    ToolchainError::Parse {
        tool: tool.to_string(),
        detail,
    }
}

/// Parse `index, major.minor` rows from `nvidia-smi`
pub fn parse_nvidia_smi(output: &str) -> Result<Vec<Device>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let bad = || parse_error("nvidia-smi", format!("unexpected row {line:?}"));
            let (index, cap) = line.split_once(',').ok_or_else(bad)?;
            let (major, minor) = cap.trim().split_once('.').ok_or_else(bad)?;
            Device::checked(
                index.trim().parse().map_err(|_| bad())?,
                major.parse().map_err(|_| bad())?,
                minor.parse().map_err(|_| bad())?,
            )
            .ok_or_else(bad)
        })
        .collect()
}

/// Decode a `gfxNNN` target into a hardware generation
///
/// The last two characters are the minor version and stepping, in hex; the
/// rest is the major version. `gfx90a` is 9.0, `gfx942` is 9.4 and
/// `gfx1100` is 11.0. Feature suffixes such as `:xnack-` are ignored.
pub fn parse_gfx_target(target: &str) -> Option<(u32, u32)> {
    let digits = target.strip_prefix("gfx")?.split(':').next()?;
    if digits.len() < 3 || !digits.is_ascii() {
        return None;
    }
    let (major, rest) = digits.split_at(digits.len() - 2);
    let major = major.parse().ok()?;
    let minor = rest.chars().next()?.to_digit(16)?;
    Some((major, minor))
}

/// Collect GPU agents from `rocminfo` output, in agent order
pub fn parse_rocminfo(output: &str) -> Result<Vec<Device>> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        if key.trim() != "Name" || !value.starts_with("gfx") {
            continue;
        }
        let device = parse_gfx_target(value)
            .and_then(|(major, minor)| Device::checked(devices.len(), major, minor))
            .ok_or_else(|| parse_error("rocminfo", format!("unrecognised target {value:?}")))?;
        devices.push(device);
    }
    Ok(devices)
}

/// Executable stand-ins for vendor tools
#[cfg(all(test, unix))]
pub(crate) mod fake_tools {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Install `<home>/bin/<name>` printing `stdout` and exiting with `code`
    pub fn install(home: &Path, name: &str, stdout: &str, code: i32) -> PathBuf {
        let bin = home.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        let script = format!("#!/bin/sh\ncat <<'EOF'\n{stdout}\nEOF\nexit {code}\n");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nvidia_smi() {
        let out = "0, 8.6\n1, 9.0\n\n";
        assert_eq!(
            parse_nvidia_smi(out).unwrap(),
            vec![Device::new(0, 8, 6), Device::new(1, 9, 0)]
        );
        assert!(parse_nvidia_smi("").unwrap().is_empty());
        assert!(parse_nvidia_smi("0, [N/A]").is_err());
    }

    #[test]
    fn test_parse_gfx_target() {
        assert_eq!(parse_gfx_target("gfx90a"), Some((9, 0)));
        assert_eq!(parse_gfx_target("gfx942"), Some((9, 4)));
        assert_eq!(parse_gfx_target("gfx1100"), Some((11, 0)));
        assert_eq!(parse_gfx_target("gfx90a:sramecc+:xnack-"), Some((9, 0)));
        assert_eq!(parse_gfx_target("gfx9"), None);
        assert_eq!(parse_gfx_target("AMD Ryzen 9"), None);
    }

    #[test]
    fn test_parse_rocminfo() {
        let out = "\
*******
Agent 1
*******
  Name:                    AMD EPYC 7763 64-Core Processor
  Marketing Name:          AMD EPYC 7763 64-Core Processor
*******
Agent 2
*******
  Name:                    gfx90a
  Marketing Name:          AMD Instinct MI250X
ISA Info:
  ISA 1
    Name:                    amdgcn-amd-amdhsa--gfx90a:sramecc+:xnack-
*******
Agent 3
*******
  Name:                    gfx942
";
        assert_eq!(
            parse_rocminfo(out).unwrap(),
            vec![Device::new(0, 9, 0), Device::new(1, 9, 4)]
        );
    }

    #[test]
    fn test_override_wins() {
        let env = BuildEnvironment::default().with_devices(vec![Device::new(0, 8, 0)]);
        let source = source_for(&env, AcceleratorFamily::Cuda);
        assert_eq!(source.name(), "fixed");
        assert_eq!(source.enumerate().unwrap(), vec![Device::new(0, 8, 0)]);
    }

    #[test]
    fn test_source_by_family() {
        let env = BuildEnvironment::default();
        assert_eq!(source_for(&env, AcceleratorFamily::Cuda).name(), "nvidia-smi");
        assert_eq!(source_for(&env, AcceleratorFamily::Rocm).name(), "rocminfo");
    }

    #[cfg(unix)]
    #[test]
    fn test_nvidia_smi_tool_output() {
        let home = tempfile::tempdir().unwrap();
        fake_tools::install(home.path(), "nvidia-smi", "0, 8.6\n1, 8.9", 0);

        let env = BuildEnvironment::from_vars([("CUDA_HOME", home.path().to_str().unwrap())])
            .unwrap();
        assert_eq!(
            NvidiaSmi::for_env(&env).enumerate().unwrap(),
            vec![Device::new(0, 8, 6), Device::new(1, 8, 9)]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tools_report_no_devices() {
        let home = tempfile::tempdir().unwrap();
        let smi = fake_tools::install(
            home.path(),
            "nvidia-smi",
            "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.",
            9,
        );
        let rocminfo = fake_tools::install(
            home.path(),
            "rocminfo",
            "ROCk module is NOT loaded, possibly no GPU devices",
            1,
        );

        assert!(NvidiaSmi::with_program(smi).enumerate().unwrap().is_empty());
        assert!(Rocminfo::with_program(rocminfo).enumerate().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_tool_output_is_fatal() {
        let home = tempfile::tempdir().unwrap();
        let smi = fake_tools::install(home.path(), "nvidia-smi", "0, [N/A]", 0);
        let err = NvidiaSmi::with_program(smi).enumerate().unwrap_err();
        assert!(matches!(err, ToolchainError::Parse { .. }));
    }

    #[test]
    fn test_missing_tool_reports_no_devices() {
        let source = Rocminfo::with_program("kernelplan-definitely-not-installed");
        assert!(source.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_oversized_generation_is_rejected() {
        assert!(parse_nvidia_smi("0, 429496730.0").is_err());
        assert!(parse_nvidia_smi("0, 8.10").is_err());
        assert!(parse_rocminfo("  Name:   gfx9f0").is_err());
    }
}
