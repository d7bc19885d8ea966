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

//! Settlement engine
//!
//! The engine owns the job state machine. It never keeps job data of its
//! own: every decision starts from a fresh read of the store and every
//! change goes through [`JobStore::update`] with the status it expects.
//!
//! External effects follow claim-before-effect. A job is marked Submitted
//! (or InProgress) and persisted before the ledger is called, so a crash
//! between the two leaves a stale claim for the sweeper to reconcile and
//! never an unrecorded payout.

mod icp;
pub mod state;
mod swap;

use std::sync::Arc;

use ferry_sdk::{
	signing::PayoutSigner,
	types::{IcpTransferJob, IcpTransferStatus, SwapJob, SwapJobStatus},
};
use tracing::{debug, info, warn};

use crate::{
	config::{
		DEFAULT_FINGERPRINT_BUCKET_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_SUBMITTED_TIMEOUT_MS,
		DEFAULT_SWEEP_BATCH_SIZE,
	},
	error::SettlementError,
	journal::now_millis,
	ledger::LedgerAdapter,
	store::JobStores,
	validator::SwapValidator,
};

/// Settlement policy
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Submission attempts per job before it fails
	pub max_attempts: u32,
	/// Age after which a Submitted / InProgress job is reconciled
	pub submitted_timeout_ms: u64,
	pub fingerprint_bucket_ms: u64,
	/// Queue a refund transfer when an IC-paid swap fails
	pub refund_failed_swaps: bool,
	/// Jobs examined per table and sweep
	pub sweep_batch_size: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			submitted_timeout_ms: DEFAULT_SUBMITTED_TIMEOUT_MS,
			fingerprint_bucket_ms: DEFAULT_FINGERPRINT_BUCKET_MS,
			refund_failed_swaps: true,
			sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
		}
	}
}

/// Outcome counts of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Pending jobs handed to the ledger
	pub processed: usize,
	/// Stale claims polled
	pub reconciled: usize,
	/// Jobs that ended Failed during the sweep
	pub failed: usize,
	/// Jobs another actor moved first
	pub conflicts: usize,
	pub errors: usize,
}

impl SweepReport {
	fn tally<T>(
		&mut self,
		id: u64,
		result: Result<T, SettlementError>,
		failed: impl Fn(&T) -> bool,
	) {
		match result {
			Ok(job) if failed(&job) => self.failed += 1,
			Ok(_) => {}
			Err(e) if e.is_conflict() => {
				debug!(target: "engine", id, "Job moved during sweep");
				self.conflicts += 1;
			}
			Err(e) => {
				warn!(target: "engine", id, error = %e, "Sweep step failed");
				self.errors += 1;
			}
		}
	}

	pub fn is_idle(&self) -> bool {
		self.processed == 0 && self.reconciled == 0
	}
}

/// The swap settlement state machine
pub struct SettlementEngine {
	stores: JobStores,
	solana: Arc<dyn LedgerAdapter>,
	ic: Arc<dyn LedgerAdapter>,
	signer: PayoutSigner,
	validator: SwapValidator,
	config: EngineConfig,
}

impl SettlementEngine {
	pub fn new(
		stores: JobStores,
		solana: Arc<dyn LedgerAdapter>,
		ic: Arc<dyn LedgerAdapter>,
		signer: PayoutSigner,
		validator: SwapValidator,
		config: EngineConfig,
	) -> Self {
		info!(
			target: "engine",
			payout_key = %signer.public_key_hex(),
			max_attempts = config.max_attempts,
			submitted_timeout_ms = config.submitted_timeout_ms,
			"Settlement engine initialized"
		);

		Self {
			stores,
			solana,
			ic,
			signer,
			validator,
			config,
		}
	}

	pub fn stores(&self) -> &JobStores {
		&self.stores
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn payout_public_key(&self) -> String {
		self.signer.public_key_hex()
	}

	fn is_stale(&self, updated_at: u64, now: u64) -> bool {
		now.saturating_sub(updated_at) >= self.config.submitted_timeout_ms
	}

	/// Drive every table one step
	///
	/// Submits up to one batch of Pending jobs and reconciles up to one batch
	/// of stale claims per table, oldest first. Each job is handled through
	/// the same public operations an external caller would use, so a sweep
	/// racing with a caller only ever loses with a conflict.
	pub async fn sweep(&self) -> SweepReport {
		let mut report = SweepReport::default();
		let batch = self.config.sweep_batch_size;
		let now = now_millis();

		// Stale claims are picked before this sweep makes claims of its own
		let stale_swaps = self.stores.swaps.list_where(None, batch, |j| {
			j.status == SwapJobStatus::Submitted && self.is_stale(j.updated_at, now)
		});
		let stale_transfers = self.stores.icp.list_where(None, batch, |j| {
			j.status == IcpTransferStatus::InProgress && self.is_stale(j.updated_at, now)
		});

		let pending = self
			.stores
			.swaps
			.list_where(None, batch, |j| j.status == SwapJobStatus::Pending);
		for job in pending {
			report.processed += 1;
			let result = self.process_swap_job(job.id).await;
			report.tally(job.id, result, swap_failed);
		}

		for job in stale_swaps {
			report.reconciled += 1;
			let result = self.reconcile_swap_job(job.id).await;
			report.tally(job.id, result, swap_failed);
		}

		let pending = self
			.stores
			.icp
			.list_where(None, batch, |j| j.status == IcpTransferStatus::Pending);
		for job in pending {
			report.processed += 1;
			let result = self.process_icp_job(job.id).await;
			report.tally(job.id, result, transfer_failed);
		}

		for job in stale_transfers {
			report.reconciled += 1;
			let result = self.reconcile_icp_job(job.id).await;
			report.tally(job.id, result, transfer_failed);
		}

		if !report.is_idle() {
			debug!(target: "engine", ?report, "Sweep complete");
		}
		report
	}
}

fn swap_failed(job: &SwapJob) -> bool {
	job.status == SwapJobStatus::Failed
}

fn transfer_failed(job: &IcpTransferJob) -> bool {
	job.status == IcpTransferStatus::Failed
}
