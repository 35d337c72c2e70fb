//! Python bindings for kernelplan
//!
//! This module provides Python bindings via PyO3 so a `setup.py` can ask for
//! the resolved build plan instead of re-implementing the detection logic.
//! Build with the `python` feature to produce the `_core` extension module.

use kernelplan_core::{AcceleratorFamily, AcceleratorRuntime, BuildEnvironment, BuildPipeline};
use kernelplan_toolchain::SystemProbe;
use std::path::Path;

/// Parse an accelerator family name (`cuda` or `rocm`, any case)
pub fn parse_family(name: &str) -> kernelplan_core::Result<AcceleratorFamily> {
    match name.to_ascii_lowercase().as_str() {
        "cuda" => Ok(AcceleratorFamily::Cuda),
        "rocm" | "hip" => Ok(AcceleratorFamily::Rocm),
        other => Err(kernelplan_core::Error::invalid_config(format!(
            "unknown accelerator family {other:?}"
        ))),
    }
}

/// Compose a package version for an explicit runtime
pub fn compose_version_string(
    base: &str,
    family: &str,
    version: &str,
    public_build: bool,
) -> kernelplan_core::Result<String> {
    let runtime = AcceleratorRuntime {
        family: parse_family(family)?,
        version: version.to_string(),
        available: true,
    };
    let composed = kernelplan_core::version::compose_version(base, Some(&runtime), public_build)?;
    Ok(composed.to_string())
}

/// Resolve the build plan for `project_root` against the live host, as JSON
pub fn build_plan_json(project_root: &Path) -> kernelplan_core::Result<String> {
    let env = BuildEnvironment::from_env()?.with_project_root(project_root);
    BuildPipeline::new(&env, &SystemProbe::new()).run()?.to_json()
}

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::PyRuntimeError;
    use pyo3::prelude::*;

    fn to_py_err(err: kernelplan_core::Error) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }

    /// Compose the package version for an explicit runtime
    #[pyfunction]
    #[pyo3(signature = (base, family, version, public_build = false))]
    fn compose_version(base: &str, family: &str, version: &str, public_build: bool) -> PyResult<String> {
        super::compose_version_string(base, family, version, public_build).map_err(to_py_err)
    }

    /// Resolve the build plan as a JSON string
    #[pyfunction]
    #[pyo3(signature = (project_root = "."))]
    fn build_plan_json(project_root: &str) -> PyResult<String> {
        super::build_plan_json(std::path::Path::new(project_root)).map_err(to_py_err)
    }

    /// kernelplan Python module
    #[pymodule]
    fn _core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        m.add_function(wrap_pyfunction!(compose_version, m)?)?;
        m.add_function(wrap_pyfunction!(build_plan_json, m)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_family() {
        assert_eq!(parse_family("CUDA").unwrap(), AcceleratorFamily::Cuda);
        assert_eq!(parse_family("hip").unwrap(), AcceleratorFamily::Rocm);
        assert!(parse_family("metal").is_err());
    }

    #[test]
    fn test_compose_version_string() {
        assert_eq!(
            compose_version_string("0.0.1", "cuda", "12.1", false).unwrap(),
            "0.0.1+cu121"
        );
        assert_eq!(
            compose_version_string("0.0.1", "rocm", "5.6", false).unwrap(),
            "0.0.1+rocm5.6"
        );
        assert_eq!(
            compose_version_string("0.0.1", "cuda", "12.1", true).unwrap(),
            "0.0.1"
        );
    }
}
