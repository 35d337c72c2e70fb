//! Package version composition
//!
//! The published version carries the accelerator runtime as a local version
//! label (`0.0.1+cu121`, `0.0.1+rocm5.6`) so wheels built against different
//! runtimes can coexist. Public package-index builds omit the label, since
//! strict versioning schemes reject local versions there.

use crate::error::{Error, Result};
use crate::types::{AcceleratorFamily, AcceleratorRuntime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters of the separator-free CUDA version kept in the suffix
pub const CUDA_SUFFIX_LEN: usize = 3;

/// A package version with an optional accelerator label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIdentifier {
    /// Base semantic version
    pub base: String,

    /// Local version label, without the leading `+`
    pub accel_suffix: Option<String>,
}

impl VersionIdentifier {
    /// A version without a label
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            accel_suffix: None,
        }
    }

    /// Split a rendered version at its local label
    pub fn parse(version: &str) -> Self {
        match version.split_once('+') {
            Some((base, suffix)) => Self {
                base: base.to_string(),
                accel_suffix: Some(suffix.to_string()).filter(|s| !s.is_empty()),
            },
            None => Self::new(version),
        }
    }

    /// Check if a local label is present
    pub fn is_local(&self) -> bool {
        self.accel_suffix.is_some()
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.accel_suffix {
            Some(suffix) => write!(f, "{}+{}", self.base, suffix),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Local version label for a runtime
///
/// CUDA versions lose their separators and are cut to [`CUDA_SUFFIX_LEN`]
/// characters, so `12.1` and `12.1.105` both give `cu121`. This also maps
/// `12.10` to `cu121`.
pub fn accelerator_suffix(runtime: &AcceleratorRuntime) -> String {
    match runtime.family {
        AcceleratorFamily::Rocm => format!("rocm{}", runtime.version),
        AcceleratorFamily::Cuda => {
            let digits: String = runtime
                .version
                .chars()
                .filter(|c| *c != '.')
                .take(CUDA_SUFFIX_LEN)
                .collect();
            format!("cu{}", digits)
        }
    }
}

/// Compose the package version
///
/// Any label already present on `base` is replaced, never extended, so
/// composing twice gives the same result. Public builds need no runtime;
/// every other build fails without a usable one.
pub fn compose_version(
    base: &str,
    runtime: Option<&AcceleratorRuntime>,
    public_build: bool,
) -> Result<VersionIdentifier> {
    let mut version = VersionIdentifier::new(VersionIdentifier::parse(base).base);

    if public_build {
        return Ok(version);
    }

    match runtime {
        Some(runtime) if runtime.available => {
            version.accel_suffix = Some(accelerator_suffix(runtime));
            Ok(version)
        }
        _ => Err(Error::NoAcceleratorFound(
            "a local version label needs a CUDA or ROCm runtime".to_string(),
        )),
    }
}
