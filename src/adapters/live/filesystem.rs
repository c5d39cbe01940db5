use std::io::ErrorKind;
use std::path::Path;

use crate::ports::{FileSystem, PortError};

/// `std::fs` on the local disk.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_optional(&self, path: &Path) -> Result<Option<String>, PortError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // The rename replaces the log atomically.
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, contents)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none_and_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/log.json");
        assert_eq!(LiveFileSystem.read_optional(&path).unwrap(), None);

        LiveFileSystem.write(&path, "[]").unwrap();
        assert_eq!(LiveFileSystem.read_optional(&path).unwrap().as_deref(), Some("[]"));
        assert!(!path.with_extension("tmp").exists());
    }
}
