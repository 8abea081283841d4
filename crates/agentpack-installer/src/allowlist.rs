use std::path::{Path, PathBuf};

/// Bounds the blast radius of tracked-state-driven deletions. Tracked state
/// is reachable by corruption or tampering, so a path may only be deleted if
/// it sits inside the managed agents directory or is exactly one of the two
/// installed binaries.
pub fn is_allowed_managed_path(
    path: &Path,
    agents_root: &Path,
    allowed_binary_paths: &[PathBuf],
) -> bool {
    if path.starts_with(agents_root) {
        return true;
    }
    allowed_binary_paths.iter().any(|allowed| allowed == path)
}
