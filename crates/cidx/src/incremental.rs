//! Per-file indexing pipeline and the incremental update controller.
//!
//! A file moves through `unknown -> indexed -> stale -> reindexing -> indexed`.
//! Reindexing replaces the file's rows wholesale in one transaction, so a
//! failure part way through leaves the previous rows in place. A file gone
//! from disk is purged and ends in the terminal `removed` state.
//!
//! Per-file problems (unparseable source, a missing compile command, a
//! storage error scoped to that file) are collected in the [`BuildReport`].
//! Only a foreign-key or constraint violation aborts the batch: it means the
//! extraction itself is inconsistent.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::compile_db::{CompileCommand, CompileDatabase};
use crate::config::Config;
use crate::db::{FileExtraction, Index, META_EXTRACTED_AT, META_WORKSPACE_ROOT};
use crate::error::{Error, IndexError, Result};
use crate::extract::{ExtractOptions, extract_file};
use crate::frontend::{Frontend, ParseFailure};
use crate::registry::FileRegistry;
use crate::resolver;
use crate::types::{BuildReport, FileState};

/// Borrowed state for one build or update batch.
pub(crate) struct Pipeline<'a> {
    pub(crate) index: &'a Index,
    pub(crate) registry: &'a mut FileRegistry,
    pub(crate) frontend: &'a mut dyn Frontend,
    pub(crate) config: &'a Config,
}

impl Pipeline<'_> {
    /// Parse, walk and store one file.
    ///
    /// Whatever happens to the parse, the file's previous rows are replaced:
    /// a file the front end cannot handle ends up with no rows at all. When
    /// storing fails, a file registered by this call is unregistered again
    /// so it stays unknown and stale.
    pub(crate) fn index_file(
        &mut self,
        source: &Path,
        command: &CompileCommand,
        report: &mut BuildReport,
    ) -> Result<()> {
        self.registry.forget(source);
        let meta = self.registry.file_meta(source);
        let path = meta.path.clone();
        let mut errors = Vec::new();

        let registered = match self.index.get_file_id(&path) {
            Ok(existing) => existing.is_none(),
            Err(e) => return self.per_file_database_error(&path, e, report),
        };
        let file_id = match self.registry.resolve_or_create(self.index, source) {
            Ok(id) => id,
            Err(e) => return self.per_file_database_error(&path, e, report),
        };
        debug!(path = %path.display(), file_id = file_id.as_i64(), registered, "Indexing file");

        let extraction = match self.frontend.parse(source, command) {
            Ok(tu) => {
                let syntax_errors = tu.main_file_errors().count();
                if syntax_errors > 0 {
                    errors.push(IndexError::syntax_errors(path.clone(), syntax_errors));
                }
                let extracted = extract_file(
                    &tu,
                    &path,
                    command,
                    self.index,
                    ExtractOptions {
                        typedef_chain_limit: self.config.typedef_chain_limit,
                    },
                );
                errors.extend(extracted.errors);
                extracted.extraction
            }
            Err(failure) => {
                errors.push(parse_failure_error(&path, &failure));
                FileExtraction::default()
            }
        };

        let cached = if self.config.cache_source {
            std::fs::read_to_string(source).ok()
        } else {
            None
        };

        match self
            .index
            .store_file_extraction(&meta, &extraction, cached.as_deref())
        {
            Ok(stored) => report.add_rows(&stored.rows),
            Err(e) => {
                if registered {
                    self.unregister(&path);
                }
                return self.per_file_database_error(&path, e, report);
            }
        }

        if errors.is_empty() {
            report.files_processed += 1;
        } else {
            for error in &errors {
                warn!(path = %path.display(), kind = %error.kind, error = %error.message, "Indexing problem");
            }
            report.files_failed += 1;
            report.errors.extend(errors);
        }
        Ok(())
    }

    /// Record a storage failure against one file, or abort the batch when
    /// the failure is an integrity violation.
    fn per_file_database_error(
        &mut self,
        path: &Path,
        error: Error,
        report: &mut BuildReport,
    ) -> Result<()> {
        if is_integrity_violation(&error) {
            return Err(error);
        }
        warn!(path = %path.display(), error = %error, "Failed to store file");
        self.registry.forget(path);
        report.errors.push(IndexError::database_error(path.to_path_buf(), &error));
        report.files_failed += 1;
        Ok(())
    }

    /// Drop the row `resolve_or_create` inserted for a file whose contents
    /// never made it into the index.
    fn unregister(&mut self, path: &Path) {
        self.registry.forget(path);
        match self.index.delete_file(path) {
            Ok(_) => debug!(path = %path.display(), "Unregistered file after failed store"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to unregister file"),
        }
    }

    /// Remove a file and everything extracted from it.
    ///
    /// Returns `false` when the file was never indexed.
    pub(crate) fn purge(&mut self, source: &Path) -> Result<bool> {
        let relative = self.registry.relative_path(source);
        self.registry.forget(source);
        let removed = self.index.delete_file(&relative)?;
        if removed {
            info!(path = %relative.display(), "Removed file from index");
        }
        Ok(removed)
    }

    /// Run the resolver over the whole index and stamp the batch.
    pub(crate) fn finish(&self, report: &mut BuildReport) -> Result<()> {
        let summary = resolver::resolve(self.index, self.config.call_resolution)?;
        report.calls_resolved = summary.calls_resolved;
        report.calls_unresolved = summary.calls_unresolved;

        self.index
            .set_meta(META_EXTRACTED_AT, &Index::now_ns()?.to_string())?;
        self.index.set_meta(
            META_WORKSPACE_ROOT,
            &self.registry.workspace_root().display().to_string(),
        )?;
        Ok(())
    }

    /// Re-extract `files`, purging those no longer on disk.
    ///
    /// Files without a manifest entry are reported and left as they are.
    pub(crate) fn update(
        &mut self,
        manifest: &CompileDatabase,
        files: &[PathBuf],
        report: &mut BuildReport,
    ) -> Result<()> {
        let root = self.registry.workspace_root().to_path_buf();
        for file in files {
            let source = self.registry.absolute_path(file);
            if !source.exists() {
                if self.purge(&source)? {
                    report.files_removed += 1;
                }
                continue;
            }

            match manifest.find(&source, &root) {
                Some(command) => self.index_file(&source, command, report)?,
                None => {
                    let relative = self.registry.relative_path(&source);
                    warn!(path = %relative.display(), "No compile command, skipping");
                    report.errors.push(IndexError::no_compile_command(relative));
                    report.files_failed += 1;
                }
            }
        }
        self.finish(report)
    }
}

/// Where a file stands relative to the index.
pub(crate) fn file_state(index: &Index, registry: &FileRegistry, path: &Path) -> Result<FileState> {
    let source = registry.absolute_path(path);
    if index.get_file(&registry.relative_path(&source))?.is_none() {
        return Ok(FileState::Unknown);
    }
    if !source.exists() {
        return Ok(FileState::Removed);
    }
    let stale = registry.stale_files(index, std::slice::from_ref(&source))?;
    Ok(if stale.is_empty() {
        FileState::Indexed
    } else {
        FileState::Stale
    })
}

/// Manifest files plus indexed files, each once, as absolute paths.
pub(crate) fn candidates(
    index: &Index,
    registry: &FileRegistry,
    manifest: &CompileDatabase,
) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = manifest
        .entries()
        .iter()
        .map(|entry| {
            let source = entry.source_path();
            source.canonicalize().unwrap_or(source)
        })
        .collect();
    for file in index.list_files()? {
        let absolute = registry.absolute_path(&file.path);
        if !paths.contains(&absolute) {
            paths.push(absolute);
        }
    }
    paths.dedup();
    Ok(paths)
}

fn parse_failure_error(path: &Path, failure: &ParseFailure) -> IndexError {
    let path = path.to_path_buf();
    match failure {
        ParseFailure::Io(e) => IndexError::io_error(path, e),
        ParseFailure::Encoding => IndexError::encoding_error(path),
        ParseFailure::NoTree => IndexError::parse_failed(path, failure.to_string()),
    }
}

fn is_integrity_violation(error: &Error) -> bool {
    matches!(
        error,
        Error::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
