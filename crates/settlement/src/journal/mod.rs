// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod file;
mod memory;

use ferry_sdk::types::{IcpTransferJob, SwapJob, TransactionNotification};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileJobLog;
pub use memory::MemoryJobLog;

/// Sequence number type for log entries
pub type SequenceNumber = u64;

/// Error types for Job Log operations
#[derive(Debug, Error)]
pub enum LogError {
	#[error("Failed to append entry: {0}")]
	AppendFailed(String),
	#[error("Corrupted log entry at line {line}: {reason}")]
	Corrupted { line: usize, reason: String },
	#[error("Log storage error: {0}")]
	StorageError(String),
}

/// A committed record version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum LogRecord {
	Swap(SwapJob),
	Icp(IcpTransferJob),
	Notification(TransactionNotification),
}

/// A record version stamped with its position in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
	pub seq: SequenceNumber,
	/// Unix timestamp (milliseconds) of the append
	pub timestamp: u64,
	pub record: LogRecord,
}

/// Job Log trait - write-ahead persistence for the job store
///
/// Every committed version of a job or notification is appended here
/// before it becomes visible to readers. Replaying the log in sequence
/// order and keeping the last version per key rebuilds the store exactly.
///
/// Key semantic constraints:
/// - Entries are append-only and never rewritten
/// - Sequence numbers are assigned by the log and strictly increase
/// - A failed append must leave no visible trace in the store
///
/// Implementations hold their own synchronization, so one log can be
/// shared between the swap table, the ICP table and the notification book.
pub trait JobLog: Send + Sync {
	/// Append a record version, returning its sequence number
	///
	/// Must be durable before returning when the implementation is
	/// persistent.
	fn append(&self, record: LogRecord) -> Result<SequenceNumber, LogError>;

	/// Replay all entries in sequence order
	fn replay(&self) -> Result<Vec<LogEntry>, LogError>;

	/// Sequence number of the last appended entry (0 when empty)
	fn last_sequence(&self) -> SequenceNumber;
}

pub(crate) fn now_millis() -> u64 {
	chrono::Utc::now().timestamp_millis().max(0) as u64
}
