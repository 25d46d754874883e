//! Loading of `compile_commands.json` manifests.
//!
//! Each entry names a source file, the directory the compiler ran in, and the
//! compiler arguments, given either as an `arguments` array or as a single
//! shell-quoted `command` string. The compiler itself (first word) is dropped.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// One entry as it appears in the JSON file.
#[derive(Debug, Deserialize)]
struct RawEntry {
    file: String,
    #[serde(default)]
    directory: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
}

/// Compiler invocation for a single translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    /// Source file as written in the manifest
    pub file: PathBuf,
    /// Working directory of the compiler
    pub directory: PathBuf,
    /// Compiler arguments, without the compiler itself
    pub args: Vec<String>,
}

impl CompileCommand {
    /// Create a command from its parts.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, directory: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            file: file.into(),
            directory: directory.into(),
            args,
        }
    }

    /// The source file, joined onto the working directory when relative.
    #[must_use]
    pub fn source_path(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }

    /// Directories given with `-I`.
    #[must_use]
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        self.flag_values("-I")
            .into_iter()
            .map(|dir| self.directory.join(dir))
            .collect()
    }

    /// Directories given with `-iquote`.
    #[must_use]
    pub fn quote_dirs(&self) -> Vec<PathBuf> {
        self.flag_values("-iquote")
            .into_iter()
            .map(|dir| self.directory.join(dir))
            .collect()
    }

    /// Directories given with `-isystem`.
    #[must_use]
    pub fn system_dirs(&self) -> Vec<PathBuf> {
        self.flag_values("-isystem")
            .into_iter()
            .map(|dir| self.directory.join(dir))
            .collect()
    }

    /// Macros given with `-D`, as `(name, value)`; a bare name has value `1`.
    ///
    /// The name keeps a parameter list when one was given (`-DSQ(x)=x*x`).
    #[must_use]
    pub fn defines(&self) -> Vec<(String, String)> {
        self.flag_values("-D")
            .into_iter()
            .filter(|def| !def.is_empty())
            .map(|def| match def.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (def.to_string(), "1".to_string()),
            })
            .collect()
    }

    /// Values of a flag given either joined (`-Ifoo`) or separate (`-I foo`).
    fn flag_values(&self, flag: &str) -> Vec<&str> {
        let mut values = Vec::new();
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == flag {
                if let Some(value) = args.next() {
                    values.push(value.as_str());
                }
            } else if let Some(value) = arg.strip_prefix(flag) {
                values.push(value);
            }
        }
        values
    }
}

/// A parsed compile commands manifest.
#[derive(Debug, Clone, Default)]
pub struct CompileDatabase {
    entries: Vec<CompileCommand>,
}

impl CompileDatabase {
    /// Load a manifest from disk.
    ///
    /// Relative `directory` values are taken relative to the manifest's own
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let db = Self::from_json(&content, base)?;
        debug!(
            path = %path.display(),
            entries = db.entries.len(),
            "Loaded compile commands"
        );
        Ok(db)
    }

    /// Parse manifest JSON, resolving relative directories against `base`.
    pub fn from_json(json: &str, base: &Path) -> Result<Self> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|entry| Self::convert(entry, base))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Build a manifest from already-parsed commands.
    #[must_use]
    pub fn from_commands(entries: Vec<CompileCommand>) -> Self {
        Self { entries }
    }

    fn convert(entry: RawEntry, base: &Path) -> Result<CompileCommand> {
        let directory = match entry.directory {
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        };

        let words = match (entry.arguments, entry.command) {
            (Some(arguments), _) => arguments,
            (None, Some(command)) => shlex::split(&command).ok_or_else(|| {
                Error::Config(format!(
                    "unbalanced quoting in compile command for {}",
                    entry.file
                ))
            })?,
            (None, None) => Vec::new(),
        };
        let args = words.into_iter().skip(1).collect();

        Ok(CompileCommand::new(entry.file, directory, args))
    }

    /// All entries, in manifest order.
    #[must_use]
    pub fn entries(&self) -> &[CompileCommand] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a file.
    ///
    /// Matches the path as written in the manifest first, then the resolved
    /// source path, then the path relative to `workspace_root`.
    #[must_use]
    pub fn find(&self, path: &Path, workspace_root: &Path) -> Option<&CompileCommand> {
        if let Some(entry) = self.entries.iter().find(|e| e.file == path) {
            return Some(entry);
        }

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace_root.join(path)
        };
        let absolute = absolute.canonicalize().unwrap_or(absolute);

        self.entries.iter().find(|e| {
            let source = e.source_path();
            source == absolute || source.canonicalize().is_ok_and(|s| s == absolute)
        })
    }
}
