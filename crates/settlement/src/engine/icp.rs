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

use ferry_sdk::{
	signing::transfer_fingerprint,
	types::{IcpTransferJob, IcpTransferRequest, IcpTransferStatus, JobId},
};
use tracing::{debug, info, warn};

use super::{SettlementEngine, state};
use crate::{
	error::SettlementError,
	journal::now_millis,
	ledger::{LedgerOutcome, LedgerPayload, SubmitReceipt, icp_reference},
};

impl SettlementEngine {
	/// Queue a transfer on the IC ledger on behalf of `caller`
	pub fn enqueue_icp_transfer(
		&self,
		caller: &str,
		request: IcpTransferRequest,
	) -> Result<IcpTransferJob, SettlementError> {
		let fingerprint =
			transfer_fingerprint(caller, &request, self.config.fingerprint_bucket_ms, now_millis());
		self.create_icp_job(Some(caller.to_string()), request, fingerprint)
	}

	pub(super) fn create_icp_job(
		&self,
		from_principal: Option<String>,
		request: IcpTransferRequest,
		request_fingerprint: String,
	) -> Result<IcpTransferJob, SettlementError> {
		self.validator.check_transfer(&request)?;
		let token = self.validator.token(&request.token)?.symbol.clone();

		let job = self.stores.icp.create(IcpTransferJob {
			id: 0,
			status: IcpTransferStatus::Pending,
			created_at: 0,
			updated_at: 0,
			attempts: 0,
			from_principal,
			to_principal: request.to_principal,
			token,
			amount: request.amount,
			memo: request.memo,
			request_fingerprint,
			block_index: None,
			error_message: None,
		})?;

		info!(
			target: "engine",
			id = job.id,
			to = %job.to_principal,
			token = %job.token,
			amount = job.amount,
			"ICP transfer queued"
		);
		Ok(job)
	}

	/// Claim a Pending transfer and submit it to the ledger
	pub async fn process_icp_job(&self, id: JobId) -> Result<IcpTransferJob, SettlementError> {
		let job = self.stores.icp.get(id)?;
		if job.status != IcpTransferStatus::Pending {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be processed",
			));
		}

		let max_attempts = self.config.max_attempts;
		if job.attempts >= max_attempts {
			return Ok(self
				.stores
				.icp
				.update(id, IcpTransferStatus::Pending, |j| state::exhaust_icp(j, max_attempts))?);
		}

		let claimed = self
			.stores
			.icp
			.update(id, IcpTransferStatus::Pending, |j| state::claim_icp(j, max_attempts))?;

		let payload = LedgerPayload::IcTransfer {
			reference: icp_reference(id),
			job_id: id,
			from: claimed.from_principal.clone(),
			to: claimed.to_principal.clone(),
			token: claimed.token.clone(),
			amount: claimed.amount,
			memo: claimed.memo.clone(),
		};

		match self.ic.submit(&payload).await {
			Ok(SubmitReceipt {
				block_index: Some(block_index),
				..
			}) => self.complete_icp(id, block_index),
			Ok(_) => {
				warn!(
					target: "engine",
					id,
					"Ledger accepted transfer without a block index, leaving it to reconciliation"
				);
				Ok(claimed)
			}
			Err(error) => {
				warn!(
					target: "engine",
					id,
					attempt = claimed.attempts,
					kind = %error.kind,
					error = %error.message,
					"ICP transfer failed"
				);
				if !error.is_permanent() && claimed.attempts >= max_attempts {
					self.hold_icp(id, &error.to_string())
				} else {
					self.release_icp(id, &error.to_string(), error.is_permanent())
				}
			}
		}
	}

	/// Resolve an InProgress transfer whose ledger call went unanswered
	///
	/// The job is never assumed failed: the ledger is asked about the
	/// reference first. A poll error leaves the job untouched.
	pub async fn reconcile_icp_job(&self, id: JobId) -> Result<IcpTransferJob, SettlementError> {
		let job = self.stores.icp.get(id)?;
		if job.status != IcpTransferStatus::InProgress
			|| !self.is_stale(job.updated_at, now_millis())
		{
			return Ok(job);
		}

		let outcome = self.ic.poll_status(&icp_reference(id)).await?;
		debug!(target: "engine", id, ?outcome, "Polled stale transfer");

		match outcome {
			LedgerOutcome::Confirmed {
				block_index: Some(block_index),
				..
			} => self.complete_icp(id, block_index),
			// Still settling on the ledger side
			LedgerOutcome::Confirmed {
				block_index: None, ..
			}
			| LedgerOutcome::Pending => Ok(job),
			LedgerOutcome::Failed { reason } => self.release_icp(id, &reason, true),
			LedgerOutcome::NotFound => {
				let message = job
					.error_message
					.clone()
					.unwrap_or_else(|| "transfer not found on ledger".to_string());
				self.release_icp(id, &message, false)
			}
		}
	}

	/// Cancel a transfer that has not been started
	pub fn cancel_icp_job(
		&self,
		id: JobId,
		reason: &str,
	) -> Result<IcpTransferJob, SettlementError> {
		let job = self.stores.icp.get(id)?;
		if job.status != IcpTransferStatus::Pending {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be cancelled",
			));
		}

		let cancelled = self
			.stores
			.icp
			.update(id, IcpTransferStatus::Pending, |j| state::cancel_icp(j, reason))?;
		info!(target: "engine", id, reason, "ICP transfer cancelled");
		Ok(cancelled)
	}

	fn complete_icp(&self, id: JobId, block_index: u64) -> Result<IcpTransferJob, SettlementError> {
		match self
			.stores
			.icp
			.update(id, IcpTransferStatus::InProgress, |j| state::complete_icp(j, block_index))
		{
			Ok(job) => {
				info!(target: "engine", id, block_index, "ICP transfer completed");
				Ok(job)
			}
			Err(e) if e.is_conflict() => Ok(self.stores.icp.get(id)?),
			Err(e) => Err(e),
		}
	}

	fn hold_icp(&self, id: JobId, message: &str) -> Result<IcpTransferJob, SettlementError> {
		match self
			.stores
			.icp
			.update(id, IcpTransferStatus::InProgress, |j| state::hold_icp(j, message))
		{
			Ok(job) => {
				warn!(
					target: "engine",
					id,
					"Last transfer attempt unanswered, leaving it to reconciliation"
				);
				Ok(job)
			}
			Err(e) if e.is_conflict() => Ok(self.stores.icp.get(id)?),
			Err(e) => Err(e),
		}
	}

	fn release_icp(
		&self,
		id: JobId,
		message: &str,
		permanent: bool,
	) -> Result<IcpTransferJob, SettlementError> {
		let max_attempts = self.config.max_attempts;
		match self.stores.icp.update(id, IcpTransferStatus::InProgress, |j| {
			state::release_icp(j, message, permanent, max_attempts)
		}) {
			Ok(job) => Ok(job),
			Err(e) if e.is_conflict() => Ok(self.stores.icp.get(id)?),
			Err(e) => Err(e),
		}
	}
}
