use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown task {field} value {value:?}.")]
pub struct ParseTaskFieldError {
	pub field: &'static str,
	pub value: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	#[default]
	Medium,
	High,
}
impl Priority {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}
impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Priority {
	type Err = ParseTaskFieldError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"low" => Ok(Self::Low),
			"medium" => Ok(Self::Medium),
			"high" => Ok(Self::High),
			_ => Err(ParseTaskFieldError { field: "priority", value: raw.to_string() }),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
	#[default]
	Pending,
	#[serde(alias = "in_progress")]
	InProgress,
	Done,
}
impl TaskStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::InProgress => "in-progress",
			Self::Done => "done",
		}
	}
}
impl fmt::Display for TaskStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for TaskStatus {
	type Err = ParseTaskFieldError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"in-progress" | "in_progress" => Ok(Self::InProgress),
			"done" => Ok(Self::Done),
			_ => Err(ParseTaskFieldError { field: "status", value: raw.to_string() }),
		}
	}
}

/// A task as the CRUD layer stores it. Only the fields search needs are carried.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskRecord {
	pub task_id: Uuid,
	pub owner_id: Uuid,
	pub title: String,
	pub priority: Priority,
	pub status: TaskStatus,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
