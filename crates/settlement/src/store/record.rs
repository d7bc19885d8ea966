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

use std::fmt;

use ferry_sdk::{
	signing::is_payment_fingerprint,
	types::{IcpTransferJob, IcpTransferStatus, JobId, SwapJob, SwapJobStatus},
};

use crate::journal::LogRecord;

/// What the store needs to know about a job kind
pub trait JobRecord: Clone + Send + Sync + 'static {
	type Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync;

	/// Short name used in logs
	const KIND: &'static str;

	fn id(&self) -> JobId;
	fn status(&self) -> Self::Status;
	fn fingerprint(&self) -> &str;

	/// Set id and creation timestamps on a new job
	fn assign(&mut self, id: JobId, now: u64);

	/// Refresh `updated_at` after a committed transition
	fn touch(&mut self, now: u64);

	/// Non-terminal: the job still needs the engine or the sweeper
	fn is_open(&self) -> bool;

	/// A failed job frees its fingerprint for a fresh attempt, unless the
	/// fingerprint names a payment
	fn releases_fingerprint(&self) -> bool;

	fn to_log_record(&self) -> LogRecord;
}

impl JobRecord for SwapJob {
	type Status = SwapJobStatus;

	const KIND: &'static str = "swap";

	fn id(&self) -> JobId {
		self.id
	}

	fn status(&self) -> SwapJobStatus {
		self.status
	}

	fn fingerprint(&self) -> &str {
		&self.request_fingerprint
	}

	fn assign(&mut self, id: JobId, now: u64) {
		self.id = id;
		self.created_at = now;
		self.updated_at = now;
	}

	fn touch(&mut self, now: u64) {
		self.updated_at = now.max(self.updated_at);
	}

	fn is_open(&self) -> bool {
		!self.status.is_terminal()
	}

	fn releases_fingerprint(&self) -> bool {
		self.status == SwapJobStatus::Failed && !is_payment_fingerprint(&self.request_fingerprint)
	}

	fn to_log_record(&self) -> LogRecord {
		LogRecord::Swap(self.clone())
	}
}

impl JobRecord for IcpTransferJob {
	type Status = IcpTransferStatus;

	const KIND: &'static str = "icp";

	fn id(&self) -> JobId {
		self.id
	}

	fn status(&self) -> IcpTransferStatus {
		self.status
	}

	fn fingerprint(&self) -> &str {
		&self.request_fingerprint
	}

	fn assign(&mut self, id: JobId, now: u64) {
		self.id = id;
		self.created_at = now;
		self.updated_at = now;
	}

	fn touch(&mut self, now: u64) {
		self.updated_at = now.max(self.updated_at);
	}

	fn is_open(&self) -> bool {
		!self.status.is_terminal()
	}

	fn releases_fingerprint(&self) -> bool {
		self.status == IcpTransferStatus::Failed
	}

	fn to_log_record(&self) -> LogRecord {
		LogRecord::Icp(self.clone())
	}
}
