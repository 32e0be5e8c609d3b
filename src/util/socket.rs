//! Socket path probing

use nix::unistd::{access, AccessFlags};
use std::path::Path;

/// Check that `path` exists and is writable by the current process
///
/// Uses the real uid/gid, like `access(2)`. The answer can be stale by
/// the time a connect is attempted.
pub fn is_endpoint_writable(path: &Path) -> bool {
    access(path, AccessFlags::W_OK).is_ok()
}
