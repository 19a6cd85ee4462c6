use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::domain::{Identifier, WorkItem};
use crate::error::CoverError;

pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "avi"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub items: Vec<WorkItem>,
    pub satisfied: Vec<(Identifier, PathBuf)>,
}

pub fn scan(root: &Path) -> Result<ScanResult, CoverError> {
    if !root.exists() {
        return Err(CoverError::PathNotFound(root.to_path_buf()));
    }

    let mut directories: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(CoverError::Filesystem(err.to_string()));
            }
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        // Follows file symlinks; directory links are listed but not descended.
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("skipping non UTF-8 file name: {}", entry.path().display());
            continue;
        };
        let directory = entry
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        directories
            .entry(directory)
            .or_default()
            .push(name.to_string());
    }

    let mut result = ScanResult::default();
    for (directory, files) in directories {
        let mut seen = BTreeSet::new();
        for identifier in files
            .iter()
            .filter(|name| is_video(name))
            .filter_map(|name| Identifier::from_file_name(name))
        {
            if !seen.insert(identifier.clone()) {
                continue;
            }
            if has_cover(&files, &identifier) {
                result.satisfied.push((identifier, directory.clone()));
            } else {
                result.items.push(WorkItem::new(identifier, directory.clone()));
            }
        }
    }
    Ok(result)
}

pub fn is_video(file_name: &str) -> bool {
    has_extension(file_name, &VIDEO_EXTENSIONS)
}

fn has_cover(files: &[String], identifier: &Identifier) -> bool {
    files.iter().any(|name| {
        has_extension(name, &["jpg"]) && name.to_uppercase().contains(identifier.as_str())
    })
}

fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
