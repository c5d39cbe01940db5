//! Local file storage used by the attempt memory.

use std::path::Path;

use super::PortError;

/// Reads and writes small text files on the local machine.
pub trait FileSystem: Send + Sync {
    /// Reads a file; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read as UTF-8.
    fn read_optional(&self, path: &Path) -> Result<Option<String>, PortError>;

    /// Replaces a file's contents, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError>;
}
