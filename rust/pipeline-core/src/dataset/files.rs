// rust/pipeline-core/src/dataset/files.rs

//! Resolution of data-file glob patterns.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{PipelineError, Result};
use crate::storage::StorageBackend;

/// A (possibly endless) sequence of data files to read, made of repeated
/// passes over one file list.
#[derive(Debug, Clone)]
pub struct FileSource {
    files: Vec<PathBuf>,
    num_epochs: Option<u32>,
    position: usize,
    epoch: u32,
}

impl FileSource {
    /// Number of files in one pass.
    pub fn pass_len(&self) -> usize {
        self.files.len()
    }
}

impl Iterator for FileSource {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.files.is_empty() {
            return None;
        }

        if self.position == self.files.len() {
            self.position = 0;
            self.epoch = self.epoch.saturating_add(1);
        }
        if self.num_epochs.is_some_and(|epochs| self.epoch >= epochs) {
            return None;
        }

        let path = self.files[self.position].clone();
        self.position += 1;
        Some(path)
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Resolves `pattern` to the sorted list of regular files it matches.
///
/// Wildcards (`*`, `?`, `[...]`) may appear in any path component; each
/// wildcard component is matched against the entries the storage backend
/// lists for the directories resolved so far. Hidden entries are only
/// matched by a pattern that starts with a literal dot.
///
/// A pattern that matches nothing yields an empty list.
///
/// # Errors
///
/// Returns an error if a component is not a valid glob pattern or a
/// directory listing fails.
pub fn list_files(storage: &dyn StorageBackend, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut candidates = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                for candidate in &mut candidates {
                    candidate.push(component.as_os_str());
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                for candidate in &mut candidates {
                    candidate.push("..");
                }
            }
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    PipelineError::config(format!("file pattern is not valid UTF-8: {pattern}"))
                })?;

                if has_wildcard(part) {
                    let glob = Pattern::new(part).map_err(|e| {
                        PipelineError::config_with_source(
                            format!("invalid file pattern '{pattern}'"),
                            e,
                        )
                    })?;
                    candidates = expand(storage, &candidates, &glob)?;
                } else {
                    for candidate in &mut candidates {
                        candidate.push(part);
                    }
                }
            }
        }

        if candidates.is_empty() {
            break;
        }
    }

    let mut files = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.as_os_str().is_empty() || !storage.exists(&candidate)? {
            continue;
        }
        if !storage.metadata(&candidate)?.is_dir {
            files.push(candidate);
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Repeats the file list for `num_epochs` epochs.
///
/// `None` cycles through the files forever (an empty list still ends
/// immediately). Readers stop an endless source early once a whole pass
/// over it has produced nothing.
pub fn repeat_files(files: Vec<PathBuf>, num_epochs: Option<u32>) -> FileSource {
    FileSource {
        files,
        num_epochs,
        position: 0,
        epoch: 0,
    }
}

fn has_wildcard(part: &str) -> bool {
    part.contains(['*', '?', '['])
}

fn expand(
    storage: &dyn StorageBackend,
    dirs: &[PathBuf],
    glob: &Pattern,
) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();

    for dir in dirs {
        let listing_path: &Path = if dir.as_os_str().is_empty() {
            Path::new("")
        } else {
            if !storage.exists(dir)? || !storage.metadata(dir)?.is_dir {
                continue;
            }
            dir
        };

        for name in storage.list(listing_path)? {
            if glob.matches_with(&name, MATCH_OPTIONS) {
                matched.push(dir.join(name));
            }
        }
    }

    Ok(matched)
}
