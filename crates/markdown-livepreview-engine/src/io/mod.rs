use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a markdown source file
pub fn read_source(path: &Path) -> Result<String, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(IoError::Io)
}

/// Read a markdown source from a stream such as stdin
pub fn read_source_from(mut reader: impl Read) -> Result<String, IoError> {
    let mut source = String::new();
    reader.read_to_string(&mut source)?;
    Ok(source)
}

/// Write rendered HTML, creating parent directories as needed
pub fn write_rendered(path: &Path, html: &str) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(IoError::Io)?;
    }
    fs::write(path, html).map_err(IoError::Io)
}

/// Persists the most recent editor buffer in a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStore {
    path: PathBuf,
}

impl BufferStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved buffer, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<String>, IoError> {
        match read_source(&self.path) {
            Ok(buffer) => Ok(Some(buffer)),
            Err(IoError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the saved buffer.
    pub fn save(&self, buffer: &str) -> Result<(), IoError> {
        write_rendered(&self.path, buffer)
    }
}
