use std::fmt;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::config::IndexingConfig;
use crate::error::{ReviewError, Result};

/// One indexed source file. Created during indexing, consumed by pattern
/// extraction and the knowledge store, never persisted individually.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path relative to the repository root
    pub relative_path: String,

    /// File text
    pub content: String,

    /// Lowercased extension with leading dot, empty when absent
    pub extension: String,
}

/// The active filters, reported back when indexing matches nothing so the
/// caller can adjust configuration.
#[derive(Debug, Clone)]
pub struct IndexDiagnostics {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub ignore_dirs: Vec<String>,
}

impl fmt::Display for IndexDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no files matched under {} (extensions searched: {}; directories ignored: {})",
            self.root.display(),
            self.extensions.join(", "),
            self.ignore_dirs.join(", ")
        )
    }
}

#[derive(Debug)]
pub struct IndexOutcome {
    /// Indexed files, sorted by relative path
    pub files: Vec<FileRecord>,

    /// Files skipped because they could not be read
    pub skipped: usize,

    pub diagnostics: IndexDiagnostics,
}

/// Lowercased final extension of a path, with leading dot.
pub fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Walks a resolved repository root and returns the text of every file that
/// passes the extension and ignore-directory filters.
pub struct FileIndexer {
    extensions: Vec<String>,
    ignore_dirs: Vec<String>,
}

impl FileIndexer {
    pub fn new(config: &IndexingConfig) -> Self {
        Self {
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            ignore_dirs: config.ignore_dirs.clone(),
        }
    }

    pub fn index(&self, root: &Path) -> Result<IndexOutcome> {
        if !root.exists() {
            return Err(ReviewError::Resolve(format!(
                "repository path does not exist: {}",
                root.display()
            )));
        }

        info!("Indexing repository: {}", root.display());

        let mut files = Vec::new();
        let mut skipped = 0usize;

        let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to walk entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.is_ignored(relative) {
                continue;
            }

            let relative_path = relative.to_string_lossy().replace('\\', "/");
            let extension = file_extension(&relative_path);
            if !self.extensions.contains(&extension) {
                continue;
            }

            // Tolerate non-UTF-8 bytes the way a lossy text read would
            let content = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("Failed to read file {}: {}", path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            files.push(FileRecord {
                relative_path,
                content,
                extension,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let diagnostics = IndexDiagnostics {
            root: root.to_path_buf(),
            extensions: self.extensions.clone(),
            ignore_dirs: self.ignore_dirs.clone(),
        };

        if files.is_empty() {
            warn!("{}", diagnostics);
        } else {
            info!("Indexed {} files from the repository", files.len());
            debug!("Skipped {} unreadable entries", skipped);
        }

        Ok(IndexOutcome {
            files,
            skipped,
            diagnostics,
        })
    }

    /// Ignore-list entries match whole path segments, not substrings.
    fn is_ignored(&self, relative: &Path) -> bool {
        relative.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .map(|segment| self.ignore_dirs.iter().any(|dir| dir == segment))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn indexer() -> FileIndexer {
        FileIndexer::new(&Config::default().indexing)
    }

    #[test]
    fn test_index_filters_by_extension_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", "x = 1\n");
        write(dir.path(), "Main.PY", "y = 2\n");
        write(dir.path(), "notes.txt", "not code\n");

        let outcome = indexer().index(dir.path()).unwrap();
        let paths: Vec<_> = outcome.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["Main.PY", "app.py"]);
        assert_eq!(outcome.files[0].extension, ".py");
    }

    #[test]
    fn test_ignore_matches_path_segments_not_substrings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "venv/lib.py", "a = 1\n");
        write(dir.path(), "my_venv_tools/lib.py", "b = 2\n");

        let outcome = indexer().index(dir.path()).unwrap();
        let paths: Vec<_> = outcome.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["my_venv_tools/lib.py"]);
    }

    #[test]
    fn test_empty_result_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", "not code\n");

        let outcome = indexer().index(dir.path()).unwrap();
        assert!(outcome.files.is_empty());
        let message = outcome.diagnostics.to_string();
        assert!(message.contains("no files matched"));
        assert!(message.contains(".py"));
        assert!(message.contains("node_modules"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(indexer().index(Path::new("/definitely/not/here")).is_err());
    }
}
