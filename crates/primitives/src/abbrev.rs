//! Backslash abbreviations such as `\alpha` and their Unicode replacements.

use std::collections::HashMap;
use std::path::Path;

/// Shortcut table shipped with the crate.
const BUILTIN_TABLE: &str = include_str!("../data/translations.json");

/// Failure to load a translation table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
	/// The table file could not be read.
	#[error("failed to read abbreviation table: {0}")]
	Io(#[from] std::io::Error),
	/// The table is not a JSON object of strings.
	#[error("invalid abbreviation table: {0}")]
	Parse(#[from] serde_json::Error),
}

/// Immutable map from backslash shortcut (without the backslash) to its
/// Unicode replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationTable {
	entries: HashMap<String, String>,
}

/// A shortcut found on a line. Columns count chars and are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbbreviationMatch<'a> {
	/// Column of the backslash.
	pub start: usize,
	/// Column just past the key.
	pub end: usize,
	/// The key between backslash and `end`.
	pub key: &'a str,
	/// Replacement text from the table.
	pub replacement: &'a str,
}

impl AbbreviationMatch<'_> {
	/// Char length of the replacement.
	pub fn replacement_len(&self) -> usize {
		self.replacement.chars().count()
	}
}

/// A line after expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
	/// The rewritten line.
	pub line: String,
	/// Cursor column (0-based, chars) right after the replacement.
	pub cursor: usize,
}

impl AbbreviationTable {
	/// The table bundled with the crate.
	pub fn builtin() -> Self {
		match Self::from_json(BUILTIN_TABLE) {
			Ok(table) => table,
			Err(err) => {
				tracing::error!(error = %err, "bundled abbreviation table is invalid");
				Self::default()
			}
		}
	}

	/// Parses a JSON object of `"shortcut": "replacement"` pairs.
	pub fn from_json(json: &str) -> Result<Self, TableError> {
		let entries: HashMap<String, String> = serde_json::from_str(json)?;
		Ok(Self { entries })
	}

	/// Reads and parses a JSON table from disk.
	pub fn load(path: &Path) -> Result<Self, TableError> {
		let json = std::fs::read_to_string(path)?;
		let table = Self::from_json(&json)?;
		tracing::debug!(path = %path.display(), entries = table.len(), "loaded abbreviation table");
		Ok(table)
	}

	/// Builds a table from pairs.
	pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}

	/// Replacement for `key`, if any.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.get(key).map(String::as_str)
	}

	/// Number of shortcuts.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True if the table has no shortcuts.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Finds the shortcut ending at `cursor` on `line`.
	///
	/// Scans backwards from `cursor` for the nearest backslash; the text between
	/// it and `cursor` is the key. Returns `None` when there is no backslash
	/// before the cursor or the key is unknown.
	pub fn find<'a>(&'a self, line: &'a str, cursor: usize) -> Option<AbbreviationMatch<'a>> {
		let boundaries: Vec<usize> = line.char_indices().map(|(i, _)| i).chain(std::iter::once(line.len())).collect();
		let cursor_byte = *boundaries.get(cursor)?;
		let slash_byte = line[..cursor_byte].rfind('\\')?;
		let start = boundaries.partition_point(|&b| b < slash_byte);

		let key = &line[slash_byte + 1..cursor_byte];
		let (key, replacement) = self.entries.get_key_value(key)?;
		Some(AbbreviationMatch {
			start,
			end: cursor,
			key: key.as_str(),
			replacement: replacement.as_str(),
		})
	}

	/// Expands the shortcut ending at `cursor`, leaving the cursor right after
	/// the replacement.
	pub fn expand(&self, line: &str, cursor: usize) -> Option<Expansion> {
		let found = self.find(line, cursor)?;
		let mut out = String::with_capacity(line.len());
		out.extend(line.chars().take(found.start));
		out.push_str(found.replacement);
		out.extend(line.chars().skip(found.end));
		Some(Expansion {
			cursor: found.start + found.replacement_len(),
			line: out,
		})
	}
}
