//! Atomic file replacement

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temp file beside `path`: its file name plus `suffix`
pub fn temp_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Write data atomically through `<path>.tmp`
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    atomic_write_via(path, ".tmp", data)
}

/// Write data atomically using temp file + fsync + rename, where the temp
/// file is `path` with `temp_suffix` appended.
///
/// On any failure the temp file is removed and `path` is left as it was.
pub fn atomic_write_via(path: &Path, temp_suffix: &str, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path, temp_suffix);
    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, path)
    })();

    if written.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    written
}
