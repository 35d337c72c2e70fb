//! Package metadata for the kernels distribution

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Distribution name
pub const PACKAGE_NAME: &str = "autoawq_kernels";

/// File whose contents become the long description
pub const README_FILE: &str = "README.md";

/// Descriptive metadata published alongside the extension modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Distribution name
    pub name: String,

    /// Author
    pub author: String,

    /// License identifier
    pub license: String,

    /// Supported interpreter versions
    pub python_requires: String,

    /// One-line summary
    pub description: String,

    /// README contents
    pub long_description: String,

    /// MIME type of `long_description`
    pub long_description_content_type: String,

    /// Project homepage
    pub url: String,

    /// Search keywords
    pub keywords: Vec<String>,

    /// Supported platforms
    pub platforms: Vec<String>,

    /// Trove classifiers
    pub classifiers: Vec<String>,

    /// Runtime requirements
    pub install_requires: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PackageMetadata {
    /// Metadata for the AWQ kernels package with the given long description
    pub fn awq_kernels(long_description: impl Into<String>) -> Self {
        Self {
            name: PACKAGE_NAME.to_string(),
            author: "Casper Hansen".to_string(),
            license: "MIT".to_string(),
            python_requires: ">=3.8.0".to_string(),
            description: "AutoAWQ Kernels implements the AWQ kernels.".to_string(),
            long_description: long_description.into(),
            long_description_content_type: "text/markdown".to_string(),
            url: "https://github.com/casper-hansen/AutoAWQ_kernels".to_string(),
            keywords: strings(&["awq", "autoawq", "quantization", "transformers"]),
            platforms: strings(&["linux", "windows"]),
            classifiers: strings(&[
                "Environment :: GPU :: NVIDIA CUDA :: 11.8",
                "Environment :: GPU :: NVIDIA CUDA :: 12",
                "License :: OSI Approved :: MIT License",
                "Natural Language :: English",
                "Programming Language :: Python :: 3.8",
                "Programming Language :: Python :: 3.9",
                "Programming Language :: Python :: 3.10",
                "Programming Language :: Python :: 3.11",
                "Programming Language :: C++",
            ]),
            install_requires: strings(&["torch==1.13.1"]),
        }
    }

    /// Load metadata, reading the README from `project_root` verbatim
    pub fn load(project_root: &Path) -> Result<Self> {
        let readme = project_root.join(README_FILE);
        let long_description = std::fs::read_to_string(&readme)
            .with_context(|| format!("reading {}", readme.display()))?;
        Ok(Self::awq_kernels(long_description))
    }
}
