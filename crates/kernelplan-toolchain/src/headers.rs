//! Header-based feature detection

use std::path::Path;

/// Present only in torch releases that predate the generator header move
pub const LEGACY_GENERATOR_HEADER: &str = "include/ATen/CUDAGeneratorImpl.h";

/// Check if the torch installation at `torch_dir` uses the old generator API
pub fn has_legacy_generator(torch_dir: &Path) -> bool {
    let header = torch_dir.join(LEGACY_GENERATOR_HEADER);
    let found = header.is_file();
    tracing::debug!(header = %header.display(), found, "generator header probe");
    found
}
