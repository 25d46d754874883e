//! File registry: workspace-relative identities and staleness.
//!
//! Files are stored under their path relative to the workspace root. Paths
//! outside the root keep their absolute form. The registry caches path to id
//! lookups for the lifetime of one `Cidx`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::db::{FileMeta, Index};
use crate::error::Result;
use crate::types::FileId;

/// Maps source paths to registry ids and detects stale files.
#[derive(Debug)]
pub struct FileRegistry {
    workspace_root: PathBuf,
    ids: HashMap<PathBuf, FileId>,
}

impl FileRegistry {
    /// Create a registry for a workspace. The root should already be
    /// canonical so that relativization is deterministic.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            ids: HashMap::new(),
        }
    }

    /// The workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Path relative to the workspace root, or the path unchanged when it
    /// lies outside it.
    #[must_use]
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let absolute = self.absolute_path(path);
        let absolute = absolute.canonicalize().unwrap_or(absolute);
        absolute
            .strip_prefix(&self.workspace_root)
            .map_or_else(|_| absolute.clone(), Path::to_path_buf)
    }

    /// Absolute form of a stored or workspace-relative path.
    #[must_use]
    pub fn absolute_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    /// Current registry data for a file on disk.
    ///
    /// The hash is computed from the file's bytes. When the file cannot be
    /// read the hash is absent and mtime and size are zero; extraction still
    /// goes ahead with whatever the parser can see.
    #[must_use]
    pub fn file_meta(&self, path: &Path) -> FileMeta {
        let absolute = self.absolute_path(path);
        let relative = self.relative_path(&absolute);

        let content = match std::fs::read(&absolute) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %absolute.display(), error = %e, "Cannot read file for hashing");
                return FileMeta {
                    path: relative,
                    mtime_ns: 0,
                    size_bytes: 0,
                    content_hash: None,
                };
            }
        };

        FileMeta {
            path: relative,
            mtime_ns: modified_ns(&absolute).unwrap_or(0),
            size_bytes: content.len() as u64,
            content_hash: Some(xxh3_64(&content)),
        }
    }

    /// The registry id of a file, inserting a row for it when it has never
    /// been seen.
    pub fn resolve_or_create(&mut self, index: &Index, path: &Path) -> Result<FileId> {
        let absolute = self.absolute_path(path);
        if let Some(id) = self.ids.get(&absolute) {
            return Ok(*id);
        }

        let relative = self.relative_path(&absolute);
        let id = match index.get_file_id(&relative)? {
            Some(id) => id,
            None => {
                let id = index.upsert_file(&self.file_meta(&absolute))?;
                trace!(path = %relative.display(), id = id.as_i64(), "Registered file");
                id
            }
        };
        self.ids.insert(absolute, id);
        Ok(id)
    }

    /// Drop the cached id of a file about to be re-indexed or purged.
    pub fn forget(&mut self, path: &Path) {
        let absolute = self.absolute_path(path);
        self.ids.remove(&absolute);
    }

    /// Drop every cached id.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Candidates whose on-disk state is newer than the index.
    ///
    /// A file is stale when it was never indexed, when its modification time
    /// moved past the stored one, or when it was indexed and has since
    /// disappeared. Filesystem errors other than a missing file count as
    /// stale.
    pub fn stale_files(&self, index: &Index, candidates: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut stale = Vec::new();

        for candidate in candidates {
            let absolute = self.absolute_path(candidate);
            let stored = index.get_file(&self.relative_path(&absolute))?;

            let is_stale = match (std::fs::metadata(&absolute), &stored) {
                (Err(e), None) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %absolute.display(), "Never indexed and not on disk, ignoring");
                    false
                }
                (Err(e), _) => {
                    debug!(path = %absolute.display(), error = %e, "Cannot stat file, treating as stale");
                    true
                }
                (Ok(_), None) => true,
                (Ok(_), Some(file)) => match modified_ns(&absolute) {
                    Some(mtime) => mtime > file.mtime_ns,
                    None => true,
                },
            };

            if is_stale {
                stale.push(absolute);
            }
        }

        Ok(stale)
    }
}

/// Modification time in nanoseconds since the Unix epoch.
// i64 nanoseconds cover dates up to 2262
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn modified_ns(path: &Path) -> Option<i64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, SystemTime};

    use tempfile::TempDir;

    use super::*;
    use crate::db::FileExtraction;

    fn workspace() -> (TempDir, FileRegistry, Index) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let root = dir.path().canonicalize().expect("should canonicalize");
        let index = Index::open(&root.join(".cidx/index.db")).expect("should open index");
        (dir, FileRegistry::new(root), index)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).expect("should open");
        file.set_modified(time).expect("should set mtime");
    }

    #[test]
    fn paths_inside_the_root_are_relative() {
        let (_dir, registry, _index) = workspace();
        let root = registry.workspace_root().to_path_buf();

        assert_eq!(registry.relative_path(&root.join("src/a.c")), PathBuf::from("src/a.c"));
        assert_eq!(
            registry.relative_path(Path::new("/elsewhere/x.h")),
            PathBuf::from("/elsewhere/x.h")
        );
    }

    #[test]
    fn unreadable_files_get_zeroed_meta() {
        let (_dir, registry, _index) = workspace();

        let meta = registry.file_meta(Path::new("missing.c"));

        assert_eq!(meta.path, PathBuf::from("missing.c"));
        assert_eq!(meta.mtime_ns, 0);
        assert_eq!(meta.size_bytes, 0);
        assert_eq!(meta.content_hash, None);
    }

    #[test]
    fn meta_hashes_contents() {
        let (_dir, registry, _index) = workspace();
        let path = registry.workspace_root().join("a.c");
        fs::write(&path, "int x;\n").unwrap();

        let meta = registry.file_meta(&path);

        assert_eq!(meta.size_bytes, 7);
        assert_eq!(meta.content_hash, Some(xxh3_64(b"int x;\n")));
        assert!(meta.mtime_ns > 0);
    }

    #[test]
    fn resolve_or_create_is_stable_and_cached() {
        let (_dir, mut registry, index) = workspace();
        let path = registry.workspace_root().join("a.c");
        fs::write(&path, "int x;\n").unwrap();

        let first = registry.resolve_or_create(&index, &path).unwrap();
        registry.clear();
        let second = registry.resolve_or_create(&index, Path::new("a.c")).unwrap();

        assert_eq!(first, second);
        assert_eq!(index.list_files().unwrap().len(), 1);
    }

    #[test]
    fn staleness_tracks_mtime_and_removal() {
        let (_dir, registry, index) = workspace();
        let path = registry.workspace_root().join("a.c");
        fs::write(&path, "int x;\n").unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&path, base);

        let candidates = vec![path.clone()];
        assert_eq!(registry.stale_files(&index, &candidates).unwrap(), vec![path.clone()]);

        index
            .store_file_extraction(&registry.file_meta(&path), &FileExtraction::default(), None)
            .unwrap();
        assert!(registry.stale_files(&index, &candidates).unwrap().is_empty());

        set_mtime(&path, base + Duration::from_nanos(1));
        assert_eq!(registry.stale_files(&index, &candidates).unwrap(), vec![path.clone()]);

        fs::remove_file(&path).unwrap();
        assert_eq!(registry.stale_files(&index, &candidates).unwrap(), vec![path]);
    }

    #[test]
    fn missing_files_that_were_never_indexed_are_not_stale() {
        let (_dir, registry, index) = workspace();

        let stale = registry
            .stale_files(&index, &[PathBuf::from("ghost.c")])
            .unwrap();

        assert!(stale.is_empty());
    }
}
