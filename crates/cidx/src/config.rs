//! Workspace configuration, stored as YAML in `.cidx/config.yaml`.
//!
//! Every field has a default, so a workspace without a config file indexes
//! with `compile_commands.json` at its root and a database under `.cidx/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the per-workspace directory holding the index and config
pub const CIDX_DIR_NAME: &str = ".cidx";

/// Name of the configuration file inside [`CIDX_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default hop limit when chasing typedef chains
pub const DEFAULT_TYPEDEF_CHAIN_LIMIT: usize = 64;

/// Default depth to which project headers are parsed for declarations
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Tie-break used when several definitions share a callee name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResolution {
    /// First definition by file path, then line
    #[default]
    FirstMatch,
    /// Externally linked definitions win over `static` ones, then path order
    PreferExternalLinkage,
}

/// Configuration for one indexed workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Index database, relative to the workspace root unless absolute
    pub database: PathBuf,

    /// Compile commands manifest, relative to the workspace root unless absolute
    pub compile_commands: PathBuf,

    /// Keep a copy of each file's text in the index
    pub cache_source: bool,

    /// Maximum typedef hops before extraction reports an error
    pub typedef_chain_limit: usize,

    /// Tie-break for ambiguous call resolution
    pub call_resolution: CallResolution,

    /// Directories whose headers are classified as system headers
    pub system_include_dirs: Vec<PathBuf>,

    /// How deep `#include`d project headers are followed while parsing
    pub max_include_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(CIDX_DIR_NAME).join("index.db"),
            compile_commands: PathBuf::from("compile_commands.json"),
            cache_source: true,
            typedef_chain_limit: DEFAULT_TYPEDEF_CHAIN_LIMIT,
            call_resolution: CallResolution::default(),
            system_include_dirs: vec![
                PathBuf::from("/usr/local/include"),
                PathBuf::from("/usr/include"),
            ],
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl Config {
    /// Path of the config file for a workspace.
    #[must_use]
    pub fn path_in(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CIDX_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load the workspace config, falling back to defaults when absent.
    pub fn load_or_default(workspace_root: &Path) -> Result<Self> {
        let path = Self::path_in(workspace_root);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the indexer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.typedef_chain_limit == 0 {
            return Err(Error::Config(
                "typedef-chain-limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute database path for a workspace.
    #[must_use]
    pub fn database_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.database)
    }

    /// Absolute manifest path for a workspace.
    #[must_use]
    pub fn compile_commands_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.compile_commands)
    }
}
