//! JSON-lines encoding of the Lean server protocol.

use serde::Serialize;
use serde_json::Value;

use crate::protocol::ServerMessage;
use crate::{Error, Result};

/// Outgoing request, one JSON object per line.
#[derive(Debug, Serialize)]
pub(super) struct Request<'a> {
	pub seq_num: u64,
	#[serde(flatten)]
	pub command: Command<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub(super) enum Command<'a> {
	Sync {
		file_name: &'a str,
		content: &'a str,
	},
	Complete {
		file_name: &'a str,
		line: u32,
		column: u32,
		skip_completions: bool,
	},
	Info {
		file_name: &'a str,
		line: u32,
		column: u32,
	},
}

impl Command<'_> {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Sync { .. } => "sync",
			Self::Complete { .. } => "complete",
			Self::Info { .. } => "info",
		}
	}
}

/// Decoded server line.
#[derive(Debug, PartialEq)]
pub(super) enum Response {
	/// Successful reply; `body` is the whole object, payload fields included.
	Ok { seq_num: u64, body: Value },
	Error { seq_num: Option<u64>, message: String },
	AllMessages(Vec<ServerMessage>),
	CurrentTasks { is_running: bool },
	Unknown(String),
}

pub(super) fn parse_response(line: &str) -> Result<Response> {
	let mut value: Value = serde_json::from_str(line)?;
	let kind = value.get("response").and_then(Value::as_str).unwrap_or_default().to_owned();
	let seq_num = value.get("seq_num").and_then(Value::as_u64);

	let response = match kind.as_str() {
		"ok" => Response::Ok {
			seq_num: seq_num.ok_or_else(|| Error::Transport("ok response without seq_num".into()))?,
			body: value,
		},
		"error" => Response::Error {
			seq_num,
			message: value.get("message").and_then(Value::as_str).unwrap_or("unknown server error").to_owned(),
		},
		"all_messages" => {
			let msgs = value.get_mut("msgs").map(Value::take).unwrap_or(Value::Array(Vec::new()));
			Response::AllMessages(serde_json::from_value(msgs)?)
		}
		"current_tasks" => Response::CurrentTasks {
			is_running: value.get("is_running").and_then(Value::as_bool).unwrap_or(false),
		},
		_ => Response::Unknown(kind),
	};
	Ok(response)
}
