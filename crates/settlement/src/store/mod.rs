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

//! Job Store
//!
//! The store is the sole owner of job records. Each table is a `DashMap`
//! keyed by job id, so a transition holds the lock of exactly one key and
//! jobs never contend with each other. Every committed version goes to the
//! [`JobLog`] first and only then replaces the visible record.

mod record;

use std::{
	fmt,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use dashmap::{DashMap, mapref::entry::Entry};
use ferry_sdk::types::{IcpTransferJob, JobId, SwapJob};
use thiserror::Error;
use tracing::debug;

use crate::{
	journal::{JobLog, LogError, LogRecord, now_millis},
	notifications::NotificationBook,
};

pub use record::JobRecord;

/// Error types for Job Store operations
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Job {0} not found")]
	NotFound(JobId),
	#[error("Job {id} changed concurrently: expected {expected}, found {actual}")]
	Conflict {
		id: JobId,
		expected: String,
		actual: String,
	},
	#[error("Duplicate request {fingerprint}: already handled by job {existing}")]
	DuplicateRequest { fingerprint: String, existing: JobId },
	#[error("Storage error: {0}")]
	Log(#[from] LogError),
}

/// Keyed table of one job kind
pub struct JobStore<J: JobRecord> {
	jobs: DashMap<JobId, J>,
	/// Reserved fingerprints mapped to the job holding them
	fingerprints: DashMap<String, JobId>,
	next_id: AtomicU64,
	log: Arc<dyn JobLog>,
}

impl<J: JobRecord> JobStore<J> {
	pub fn new(log: Arc<dyn JobLog>) -> Self {
		Self {
			jobs: DashMap::new(),
			fingerprints: DashMap::new(),
			next_id: AtomicU64::new(1),
			log,
		}
	}

	/// Insert a new job, assigning its id and timestamps
	///
	/// Fails with `DuplicateRequest` while another job holds the same
	/// fingerprint.
	pub fn create(&self, mut job: J) -> Result<J, StoreError> {
		let fingerprint = job.fingerprint().to_string();

		// The fingerprint entry stays locked until the job is visible, so two
		// identical requests cannot both pass the check.
		match self.fingerprints.entry(fingerprint.clone()) {
			Entry::Occupied(existing) => Err(StoreError::DuplicateRequest {
				fingerprint,
				existing: *existing.get(),
			}),
			Entry::Vacant(slot) => {
				let id = self.next_id.fetch_add(1, Ordering::SeqCst);
				job.assign(id, now_millis());
				self.log.append(job.to_log_record())?;

				self.jobs.insert(id, job.clone());
				slot.insert(id);

				debug!(target: "store", kind = J::KIND, id, "Created job");
				Ok(job)
			}
		}
	}

	pub fn get(&self, id: JobId) -> Result<J, StoreError> {
		self.jobs
			.get(&id)
			.map(|entry| entry.value().clone())
			.ok_or(StoreError::NotFound(id))
	}

	/// Apply `transition` to a job whose status is still `expected`
	///
	/// Runs under the job's key lock. The transition works on a copy; the
	/// copy is logged and only then swapped in, so a rejected transition or
	/// a failed append leaves the stored record untouched.
	pub fn update<F, E>(&self, id: JobId, expected: J::Status, transition: F) -> Result<J, E>
	where
		F: FnOnce(&mut J) -> Result<(), E>,
		E: From<StoreError>,
	{
		let updated = {
			let mut entry = self.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

			let actual = entry.status();
			if actual != expected {
				return Err(StoreError::Conflict {
					id,
					expected: expected.to_string(),
					actual: actual.to_string(),
				}
				.into());
			}

			let mut next = entry.value().clone();
			transition(&mut next)?;
			next.touch(now_millis());
			self.log
				.append(next.to_log_record())
				.map_err(StoreError::from)?;

			*entry.value_mut() = next.clone();
			next
		};

		// Key lock released above; the fingerprint index is never locked
		// while a job entry is held.
		if updated.releases_fingerprint() {
			self.fingerprints
				.remove_if(updated.fingerprint(), |_, holder| *holder == id);
		}

		debug!(
			target: "store",
			kind = J::KIND,
			id,
			from = %expected,
			to = %updated.status(),
			"Committed transition"
		);
		Ok(updated)
	}

	/// Jobs still awaiting work, oldest first
	///
	/// Returns at most `limit` jobs with an id strictly greater than
	/// `after`.
	pub fn list_pending(&self, after: Option<JobId>, limit: usize) -> Vec<J> {
		self.list_where(after, limit, |job| job.is_open())
	}

	/// Jobs matching `predicate`, oldest first, paged like `list_pending`
	pub fn list_where<P>(&self, after: Option<JobId>, limit: usize, predicate: P) -> Vec<J>
	where
		P: Fn(&J) -> bool,
	{
		let floor = after.unwrap_or(0);
		let mut jobs: Vec<J> = self
			.jobs
			.iter()
			.filter(|entry| *entry.key() > floor && predicate(entry.value()))
			.map(|entry| entry.value().clone())
			.collect();
		jobs.sort_by_key(|job| job.id());
		jobs.truncate(limit);
		jobs
	}

	/// All jobs matching `predicate`, oldest first
	pub fn list_by<P>(&self, predicate: P) -> Vec<J>
	where
		P: Fn(&J) -> bool,
	{
		self.list_where(None, usize::MAX, predicate)
	}

	/// Job currently holding `fingerprint`, if any
	pub fn reserved_by(&self, fingerprint: &str) -> Option<JobId> {
		self.fingerprints.get(fingerprint).map(|entry| *entry.value())
	}

	/// Reinstate a job version read back from the log
	///
	/// Does not append to the log. Later versions of the same id replace
	/// earlier ones, and the id counter moves past every restored id.
	pub fn restore(&self, job: J) {
		let id = job.id();
		self.next_id.fetch_max(id + 1, Ordering::SeqCst);

		let fingerprint = job.fingerprint().to_string();
		if job.releases_fingerprint() {
			self.fingerprints.remove_if(&fingerprint, |_, holder| *holder == id);
		} else {
			self.fingerprints.insert(fingerprint, id);
		}
		self.jobs.insert(id, job);
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}
}

impl<J: JobRecord> fmt::Debug for JobStore<J> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobStore")
			.field("kind", &J::KIND)
			.field("jobs", &self.jobs.len())
			.field("reserved_fingerprints", &self.fingerprints.len())
			.finish()
	}
}

/// The shared mutable state of the service
///
/// Both job tables and the notification book write to one log, so a
/// single replay restores all of them consistently.
#[derive(Clone)]
pub struct JobStores {
	pub swaps: Arc<JobStore<SwapJob>>,
	pub icp: Arc<JobStore<IcpTransferJob>>,
	pub notifications: Arc<NotificationBook>,
	pub log: Arc<dyn JobLog>,
}

impl JobStores {
	pub fn new(log: Arc<dyn JobLog>) -> Self {
		Self {
			swaps: Arc::new(JobStore::new(log.clone())),
			icp: Arc::new(JobStore::new(log.clone())),
			notifications: Arc::new(NotificationBook::new(log.clone())),
			log,
		}
	}

	/// Route one replayed record to the table that owns it
	pub(crate) fn restore(&self, record: LogRecord) {
		match record {
			LogRecord::Swap(job) => self.swaps.restore(job),
			LogRecord::Icp(job) => self.icp.restore(job),
			LogRecord::Notification(notification) => self.notifications.restore(notification),
		}
	}
}
