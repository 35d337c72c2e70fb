//! Toolkit location and version queries

use crate::{Result, ToolchainError};
use kernelplan_core::BuildEnvironment;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default CUDA toolkit location
pub const DEFAULT_CUDA_HOME: &str = "/usr/local/cuda";

/// Default ROCm location
pub const DEFAULT_ROCM_HOME: &str = "/opt/rocm";

/// CUDA toolkit root: configured path, else the default install location
pub fn cuda_home(env: &BuildEnvironment) -> PathBuf {
    env.cuda_home
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CUDA_HOME))
}

/// ROCm root: configured path, else the default install location
pub fn rocm_home(env: &BuildEnvironment) -> PathBuf {
    env.rocm_home
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROCM_HOME))
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// A tool under `<home>/bin` if present, else the bare name for a `PATH` lookup
pub fn tool_path(home: &Path, name: &str) -> PathBuf {
    let candidate = home.join("bin").join(exe(name));
    if candidate.is_file() {
        candidate
    } else {
        PathBuf::from(exe(name))
    }
}

/// Run a tool and capture stdout
///
/// Returns `Ok(None)` when the tool is not installed.
pub fn run_tool(program: &Path, args: &[&str]) -> Result<Option<String>> {
    tracing::debug!(program = %program.display(), ?args, "running toolchain query");

    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ToolchainError::Spawn {
                program: program.display().to_string(),
                source: e,
            })
        }
    };

    if !output.status.success() {
        return Err(ToolchainError::CommandFailed {
            program: program.display().to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Extract `X.Y` from the `release X.Y, VX.Y.Z` line of `nvcc --version`
pub fn parse_nvcc_release(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once("release ")?;
        let version: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let version = version.trim_end_matches('.');
        (!version.is_empty()).then(|| version.to_string())
    })
}

/// CUDA version reported by `nvcc`, `None` when no toolkit is installed
pub fn nvcc_version(env: &BuildEnvironment) -> Result<Option<String>> {
    let nvcc = tool_path(&cuda_home(env), "nvcc");
    let Some(output) = run_tool(&nvcc, &["--version"])? else {
        tracing::debug!(nvcc = %nvcc.display(), "nvcc not found");
        return Ok(None);
    };

    parse_nvcc_release(&output)
        .map(Some)
        .ok_or_else(|| ToolchainError::Parse {
            tool: "nvcc".to_string(),
            detail: "no `release` line in --version output".to_string(),
        })
}

/// Check for a usable HIP compiler
pub fn hip_available(env: &BuildEnvironment) -> bool {
    let hipcc = rocm_home(env).join("bin").join(exe("hipcc"));
    if hipcc.is_file() {
        return true;
    }
    matches!(run_tool(Path::new(&exe("hipcc")), &["--version"]), Ok(Some(_)))
}
