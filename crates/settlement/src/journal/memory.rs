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

use std::sync::{
	Mutex, PoisonError,
	atomic::{AtomicBool, Ordering},
};

use super::{JobLog, LogEntry, LogError, LogRecord, SequenceNumber, now_millis};

/// In-memory implementation of the Job Log
///
/// Keeps every entry in a vector. Nothing survives a restart, which makes
/// it the log of choice for tests and local development.
#[derive(Default)]
pub struct MemoryJobLog {
	entries: Mutex<Vec<LogEntry>>,
	failing: AtomicBool,
}

impl MemoryJobLog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every subsequent append fail until reset
	///
	/// Lets callers exercise the "log failure leaves the record unchanged"
	/// path of the job store.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn len(&self) -> usize {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl JobLog for MemoryJobLog {
	fn append(&self, record: LogRecord) -> Result<SequenceNumber, LogError> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(LogError::AppendFailed("log is failing".to_string()));
		}

		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		let seq = entries.last().map(|e| e.seq).unwrap_or(0) + 1;
		entries.push(LogEntry {
			seq,
			timestamp: now_millis(),
			record,
		});
		Ok(seq)
	}

	fn replay(&self) -> Result<Vec<LogEntry>, LogError> {
		Ok(self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone())
	}

	fn last_sequence(&self) -> SequenceNumber {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.last()
			.map(|e| e.seq)
			.unwrap_or(0)
	}
}
