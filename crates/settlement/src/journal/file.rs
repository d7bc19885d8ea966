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

use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
	sync::{Mutex, PoisonError},
};

use tracing::{info, warn};

use super::{JobLog, LogEntry, LogError, LogRecord, SequenceNumber, now_millis};

/// File-backed Job Log
///
/// Stores one JSON entry per line and calls `sync_data` after every
/// append, so an entry acknowledged to the store survives a crash.
///
/// A process killed mid-write can leave a torn final line. It is dropped
/// (and the file truncated to the last complete entry) when the log is
/// opened. A malformed line anywhere else is reported as corruption.
pub struct FileJobLog {
	path: PathBuf,
	inner: Mutex<FileLogState>,
}

struct FileLogState {
	file: File,
	last_seq: SequenceNumber,
}

impl FileJobLog {
	/// Open (or create) the log at `path`
	pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| {
				LogError::StorageError(format!("create {}: {}", parent.display(), e))
			})?;
		}

		let (entries, valid_len) = read_entries(&path)?;
		let last_seq = entries.last().map(|e| e.seq).unwrap_or(0);

		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&path)
			.map_err(|e| LogError::StorageError(format!("open {}: {}", path.display(), e)))?;

		let current_len = file
			.metadata()
			.map_err(|e| LogError::StorageError(e.to_string()))?
			.len();
		if current_len > valid_len {
			warn!(
				target: "journal",
				path = %path.display(),
				dropped_bytes = current_len - valid_len,
				"Truncating torn entry at end of job log"
			);
			file.set_len(valid_len)
				.map_err(|e| LogError::StorageError(format!("truncate: {}", e)))?;
		}

		info!(
			target: "journal",
			path = %path.display(),
			entries = entries.len(),
			last_seq,
			"Opened job log"
		);

		Ok(Self {
			path,
			inner: Mutex::new(FileLogState { file, last_seq }),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl JobLog for FileJobLog {
	fn append(&self, record: LogRecord) -> Result<SequenceNumber, LogError> {
		let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		let entry = LogEntry {
			seq: state.last_seq + 1,
			timestamp: now_millis(),
			record,
		};

		let mut line =
			serde_json::to_vec(&entry).map_err(|e| LogError::AppendFailed(e.to_string()))?;
		line.push(b'\n');

		state
			.file
			.write_all(&line)
			.map_err(|e| LogError::AppendFailed(e.to_string()))?;
		state
			.file
			.sync_data()
			.map_err(|e| LogError::AppendFailed(format!("sync: {}", e)))?;

		state.last_seq = entry.seq;
		Ok(entry.seq)
	}

	fn replay(&self) -> Result<Vec<LogEntry>, LogError> {
		// Hold the lock so no append interleaves with the read
		let _state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
		read_entries(&self.path).map(|(entries, _)| entries)
	}

	fn last_sequence(&self) -> SequenceNumber {
		self.inner
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.last_seq
	}
}

/// Parse all complete entries, returning them with the byte length they span
fn read_entries(path: &Path) -> Result<(Vec<LogEntry>, u64), LogError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
		Err(e) => {
			return Err(LogError::StorageError(format!(
				"read {}: {}",
				path.display(),
				e
			)));
		}
	};

	let mut entries = Vec::new();
	let mut offset = 0usize;
	let mut line_no = 0usize;

	while offset < bytes.len() {
		line_no += 1;
		let rest = &bytes[offset..];
		let (line, consumed, terminated) = match rest.iter().position(|b| *b == b'\n') {
			Some(pos) => (&rest[..pos], pos + 1, true),
			None => (rest, rest.len(), false),
		};
		let is_last = offset + consumed >= bytes.len();

		if line.iter().all(u8::is_ascii_whitespace) {
			offset += consumed;
			continue;
		}

		match serde_json::from_slice::<LogEntry>(line) {
			Ok(entry) if terminated => {
				entries.push(entry);
				offset += consumed;
			}
			// Valid JSON without its newline is still an unfinished write
			Ok(_) => break,
			Err(_) if is_last => break,
			Err(e) => {
				return Err(LogError::Corrupted {
					line: line_no,
					reason: e.to_string(),
				});
			}
		}
	}

	Ok((entries, offset as u64))
}

#[cfg(test)]
mod tests {
	use super::*;
	use ferry_sdk::types::{TransactionNotification, TransactionStatus};

	fn temp_path(name: &str) -> PathBuf {
		std::env::temp_dir()
			.join(format!("ferry-log-{}", uuid::Uuid::new_v4()))
			.join(name)
	}

	fn notification(signature: &str) -> LogRecord {
		LogRecord::Notification(TransactionNotification {
			signature: signature.to_string(),
			status: TransactionStatus::Finalized,
			job_id: Some(4),
			metadata: None,
			error_message: None,
			timestamp: 7,
			consumed_by: None,
		})
	}

	#[test]
	fn test_append_survives_reopen() {
		let path = temp_path("jobs.log");
		{
			let log = FileJobLog::open(&path).unwrap();
			log.append(notification("a")).unwrap();
			log.append(notification("b")).unwrap();
		}

		let log = FileJobLog::open(&path).unwrap();
		assert_eq!(log.last_sequence(), 2);
		assert_eq!(log.append(notification("c")).unwrap(), 3);

		let entries = log.replay().unwrap();
		assert_eq!(entries.len(), 3);
		assert_eq!(entries[2].record, notification("c"));
	}

	#[test]
	fn test_torn_final_line_is_dropped() {
		let path = temp_path("jobs.log");
		{
			let log = FileJobLog::open(&path).unwrap();
			log.append(notification("a")).unwrap();
		}
		let mut file = OpenOptions::new().append(true).open(&path).unwrap();
		file.write_all(br#"{"seq":2,"timestamp":1,"rec"#).unwrap();
		drop(file);

		let log = FileJobLog::open(&path).unwrap();
		assert_eq!(log.last_sequence(), 1);
		assert_eq!(log.append(notification("b")).unwrap(), 2);
		assert_eq!(log.replay().unwrap().len(), 2);
	}

	#[test]
	fn test_corruption_in_the_middle_is_an_error() {
		let path = temp_path("jobs.log");
		{
			let log = FileJobLog::open(&path).unwrap();
			log.append(notification("a")).unwrap();
		}
		let mut file = OpenOptions::new().append(true).open(&path).unwrap();
		file.write_all(b"not json\n").unwrap();
		drop(file);
		{
			let mut file = OpenOptions::new().append(true).open(&path).unwrap();
			let entry = LogEntry {
				seq: 3,
				timestamp: 1,
				record: notification("c"),
			};
			let mut line = serde_json::to_vec(&entry).unwrap();
			line.push(b'\n');
			file.write_all(&line).unwrap();
		}

		assert!(matches!(
			FileJobLog::open(&path),
			Err(LogError::Corrupted { line: 2, .. })
		));
	}
}
