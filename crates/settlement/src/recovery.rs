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

//! Crash recovery
//!
//! The job log is the only durable state. Recovery replays it in sequence
//! order into empty stores:
//!
//! 1. Every entry is restored into the table that owns it; the last version
//!    of an id wins
//! 2. Id counters move past the highest restored id and the fingerprint
//!    index is rebuilt from jobs still holding their fingerprint
//! 3. A Solana payment referenced by a swap job is marked consumed even if
//!    the crash came between logging the job and logging the consumption
//! 4. Jobs left Submitted / InProgress are counted; they are not touched
//!    here; the sweeper reconciles them against the ledger once their
//!    timeout elapses

use std::sync::Arc;

use ferry_sdk::types::{IcpTransferStatus, PaySide, SwapJobStatus};
use tracing::{info, warn};

use crate::{
	journal::{JobLog, LogError, SequenceNumber},
	store::JobStores,
};

/// Summary of a completed replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredState {
	pub swap_jobs: usize,
	pub icp_jobs: usize,
	pub notifications: usize,
	/// Swaps claimed before the crash with no recorded outcome
	pub in_flight_swaps: usize,
	pub in_flight_transfers: usize,
	/// Payments whose consumption marker was lost in the crash
	pub reclaimed_payments: usize,
	pub last_seq: SequenceNumber,
}

impl RecoveredState {
	pub fn is_clean_start(&self) -> bool {
		self.last_seq == 0
	}
}

/// Crash recovery coordinator
pub struct RecoveryCoordinator {
	log: Arc<dyn JobLog>,
}

impl RecoveryCoordinator {
	pub fn new(log: Arc<dyn JobLog>) -> Self {
		Self { log }
	}

	/// Replay the log into `stores`
	///
	/// `stores` must be freshly built; replay does not write to the log.
	pub fn recover(&self, stores: &JobStores) -> Result<RecoveredState, LogError> {
		info!(target: "recovery", "Starting crash recovery...");

		let entries = self.log.replay()?;
		if entries.is_empty() {
			info!(target: "recovery", "Job log is empty, starting from clean state");
			return Ok(RecoveredState::default());
		}

		let mut last_seq = 0;
		for entry in entries {
			if entry.seq <= last_seq {
				warn!(
					target: "recovery",
					seq = entry.seq,
					last_seq,
					"Out of order log entry, applying anyway"
				);
			}
			last_seq = last_seq.max(entry.seq);
			stores.restore(entry.record);
		}

		let mut reclaimed_payments = 0;
		for job in stores.swaps.list_by(|job| matches!(job.intent.pay, PaySide::Solana { .. })) {
			if let PaySide::Solana { tx_signature } = &job.intent.pay
				&& stores.notifications.restore_consumed(tx_signature, job.id)
			{
				warn!(
					target: "recovery",
					id = job.id,
					signature = %tx_signature,
					"Payment consumption was not logged, marking it consumed"
				);
				reclaimed_payments += 1;
			}
		}

		let in_flight_swaps = stores
			.swaps
			.list_by(|job| job.status == SwapJobStatus::Submitted)
			.len();
		let in_flight_transfers = stores
			.icp
			.list_by(|job| job.status == IcpTransferStatus::InProgress)
			.len();

		let state = RecoveredState {
			swap_jobs: stores.swaps.len(),
			icp_jobs: stores.icp.len(),
			notifications: stores.notifications.len(),
			in_flight_swaps,
			in_flight_transfers,
			reclaimed_payments,
			last_seq,
		};

		if in_flight_swaps + in_flight_transfers > 0 {
			warn!(
				target: "recovery",
				in_flight_swaps,
				in_flight_transfers,
				"Jobs were in flight at shutdown, they will be reconciled by the sweeper"
			);
		}
		info!(target: "recovery", ?state, "Crash recovery complete");
		Ok(state)
	}
}

#[cfg(test)]
mod tests {
	use ferry_sdk::types::IcpTransferJob;

	use super::*;
	use crate::journal::{LogRecord, MemoryJobLog};

	fn transfer(id: u64, status: IcpTransferStatus) -> IcpTransferJob {
		IcpTransferJob {
			id,
			status,
			created_at: 1,
			updated_at: 1,
			attempts: 1,
			from_principal: None,
			to_principal: "alice".to_string(),
			token: "ICP".to_string(),
			amount: 5,
			memo: None,
			request_fingerprint: format!("fp-{}", id),
			block_index: None,
			error_message: None,
		}
	}

	#[test]
	fn test_empty_log_is_clean_start() {
		let log = Arc::new(MemoryJobLog::new());
		let stores = JobStores::new(log.clone());
		let state = RecoveryCoordinator::new(log).recover(&stores).unwrap();
		assert!(state.is_clean_start());
		assert!(stores.icp.is_empty());
	}

	#[test]
	fn test_last_version_wins_and_in_flight_counted() {
		let log = Arc::new(MemoryJobLog::new());
		log.append(LogRecord::Icp(transfer(1, IcpTransferStatus::Pending)))
			.unwrap();
		log.append(LogRecord::Icp(transfer(1, IcpTransferStatus::InProgress)))
			.unwrap();
		log.append(LogRecord::Icp(transfer(2, IcpTransferStatus::Pending)))
			.unwrap();
		log.append(LogRecord::Icp(transfer(2, IcpTransferStatus::Failed)))
			.unwrap();

		let stores = JobStores::new(log.clone());
		let state = RecoveryCoordinator::new(log.clone())
			.recover(&stores)
			.unwrap();

		assert_eq!(state.icp_jobs, 2);
		assert_eq!(state.in_flight_transfers, 1);
		assert_eq!(state.last_seq, 4);
		assert_eq!(
			stores.icp.get(1).unwrap().status,
			IcpTransferStatus::InProgress
		);
		assert_eq!(stores.icp.reserved_by("fp-1"), Some(1));
		assert_eq!(stores.icp.reserved_by("fp-2"), None);
		// Replay must not grow the log
		assert_eq!(log.len(), 4);
	}
}
