//! Session configuration, read from TOML.
//!
//! ```toml
//! sync_delay_ms = 1000
//! completion_delay_ms = 1000
//! abbreviation_triggers = " ,"
//! translations = "translations.json"
//!
//! [server]
//! command = "lean"
//! args = ["--server"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use lemma_primitives::AbbreviationTable;
use serde::{Deserialize, Serialize};

use crate::Result;

/// How to start the Lean server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommand {
	/// Executable to spawn.
	pub command: String,
	/// Arguments to pass to the command.
	#[serde(default)]
	pub args: Vec<String>,
	/// Working directory, usually the project root holding `leanpkg.toml`.
	#[serde(default)]
	pub root: Option<PathBuf>,
}

impl Default for ServerCommand {
	fn default() -> Self {
		Self {
			command: "lean".into(),
			args: vec!["--server".into()],
			root: None,
		}
	}
}

/// Tunables for [`crate::SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
	/// Quiet period after the last edit before a document is pushed.
	pub sync_delay_ms: u64,
	/// Quiet period before a completion request is sent.
	pub completion_delay_ms: u64,
	/// Characters that expand a backslash abbreviation when typed.
	pub abbreviation_triggers: String,
	/// JSON shortcut table; the bundled table is used when absent.
	/// Relative paths resolve against the config file's directory.
	pub translations: Option<PathBuf>,
	/// Server process for [`crate::SessionManager::from_config`].
	pub server: Option<ServerCommand>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			sync_delay_ms: 1000,
			completion_delay_ms: 1000,
			abbreviation_triggers: " ,".into(),
			translations: None,
			server: None,
		}
	}
}

impl SessionConfig {
	/// Parses a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Reads a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let input = std::fs::read_to_string(path)?;
		let mut config = Self::from_toml_str(&input)?;
		if let (Some(table), Some(dir)) = (&config.translations, path.parent())
			&& table.is_relative()
		{
			config.translations = Some(dir.join(table));
		}
		tracing::debug!(path = %path.display(), "loaded session config");
		Ok(config)
	}

	/// [`Self::sync_delay_ms`] as a duration.
	pub fn sync_delay(&self) -> Duration {
		Duration::from_millis(self.sync_delay_ms)
	}

	/// [`Self::completion_delay_ms`] as a duration.
	pub fn completion_delay(&self) -> Duration {
		Duration::from_millis(self.completion_delay_ms)
	}

	/// Loads the configured shortcut table, or the bundled one.
	pub fn abbreviation_table(&self) -> Result<AbbreviationTable> {
		match &self.translations {
			Some(path) => Ok(AbbreviationTable::load(path)?),
			None => Ok(AbbreviationTable::builtin()),
		}
	}

	/// The server command, defaulting to `lean --server`.
	pub fn server_command(&self) -> ServerCommand {
		self.server.clone().unwrap_or_default()
	}
}
