use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

pub trait CoverStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsCoverStore;

impl FsCoverStore {
    pub fn new() -> Self {
        Self
    }
}

impl CoverStore for FsCoverStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp = Builder::new()
            .prefix(".cover-fetcher")
            .suffix(".part")
            .tempfile_in(parent)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

pub fn is_invalid_file_name(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidFilename
    )
}
