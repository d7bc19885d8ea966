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

use std::collections::HashSet;

use ferry_sdk::{
	signing::{PayoutMessage, SignedPayout, request_fingerprint},
	types::{
		IcpTransferRequest, JobId, PaySide, QueuedSwapReply, SwapArgs, SwapJob, SwapJobStatus,
		TransactionNotification, TransactionStatus, UpdateSolanaTransactionArgs,
	},
};
use tracing::{debug, error, info, warn};

use super::{SettlementEngine, state};
use crate::{
	error::SettlementError,
	journal::now_millis,
	ledger::{LedgerOutcome, LedgerPayload, swap_reference},
	store::StoreError,
	validator::ValidationError,
};

impl SettlementEngine {
	/// Queue a swap
	///
	/// Validates the request, reserves its fingerprint and stores a Pending
	/// job. A Solana-paid swap also consumes the payment notification it
	/// references.
	pub fn swap(&self, caller: &str, args: SwapArgs) -> Result<QueuedSwapReply, SettlementError> {
		let now = now_millis();
		let intent = self.validator.check_swap(caller, &args, now)?;
		if let PaySide::Solana { tx_signature } = &intent.pay {
			self.stores.notifications.check_payment(tx_signature)?;
		}

		let fingerprint =
			request_fingerprint(caller, &args, self.config.fingerprint_bucket_ms, now);
		let original_args_json = serde_json::to_string(&args)
			.map_err(|e| SettlementError::Serialization(e.to_string()))?;

		let job = self.stores.swaps.create(SwapJob {
			id: 0,
			status: SwapJobStatus::Pending,
			created_at: 0,
			updated_at: 0,
			attempts: 0,
			caller: caller.to_string(),
			request_fingerprint: fingerprint,
			original_args_json,
			intent,
			encoded_signed_solana_tx: String::new(),
			solana_tx_signature_of_payout: None,
			error_message: None,
		})?;

		if let PaySide::Solana { tx_signature } = &job.intent.pay
			&& let Err(e) = self.stores.notifications.consume(tx_signature, job.id)
		{
			if let Err(cancel) = self.cancel_swap_job(job.id, "payment could not be reserved") {
				error!(
					target: "engine",
					id = job.id,
					error = %cancel,
					"Failed to cancel unfunded job"
				);
			}
			return Err(e);
		}

		info!(
			target: "engine",
			id = job.id,
			caller,
			pay_token = %job.intent.pay_token,
			pay_amount = job.intent.pay_amount,
			receive_token = %job.intent.receive_token,
			receive_amount = job.intent.receive_amount,
			"Swap queued"
		);

		Ok(QueuedSwapReply {
			status: job.status,
			job_id: job.id,
			message: format!("Swap queued as job {}", job.id),
		})
	}

	/// Claim a Pending job for submission with its signed payout
	///
	/// Increments `attempts`. Fails with `InvalidTransition` unless the job
	/// is Pending, `AttemptsExhausted` when no attempt is left and with a
	/// conflict when another actor claimed it first.
	pub fn mark_swap_job_submitted(
		&self,
		id: JobId,
		encoded_signed_solana_tx: &str,
	) -> Result<SwapJob, SettlementError> {
		if encoded_signed_solana_tx.trim().is_empty() {
			return Err(ValidationError::MissingField("encoded_signed_solana_tx").into());
		}

		let job = self.stores.swaps.get(id)?;
		if job.status != SwapJobStatus::Pending {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be marked submitted",
			));
		}

		let max_attempts = self.config.max_attempts;
		let claimed = self.stores.swaps.update(id, SwapJobStatus::Pending, |j| {
			state::claim_swap(j, encoded_signed_solana_tx, max_attempts)
		})?;

		debug!(target: "engine", id, attempt = claimed.attempts, "Swap claimed");
		Ok(claimed)
	}

	/// Record the chain outcome of a submitted swap
	///
	/// Idempotent: on a job that is already Confirmed or Failed this returns
	/// the unchanged record, logging a warning when the reported outcome
	/// disagrees with the recorded one.
	pub fn finalize_swap_job(
		&self,
		id: JobId,
		signature: &str,
		success: bool,
		error: Option<String>,
	) -> Result<SwapJob, SettlementError> {
		let job = self.stores.swaps.get(id)?;
		if job.status.is_terminal() {
			warn_if_disagrees(&job, success);
			return Ok(job);
		}
		if job.status != SwapJobStatus::Submitted {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be finalized",
			));
		}

		match self.stores.swaps.update(id, SwapJobStatus::Submitted, |j| {
			state::finalize_swap(j, signature, success, error)
		}) {
			Ok(job) => {
				if job.status == SwapJobStatus::Failed {
					warn!(target: "engine", id, error = ?job.error_message, "Swap failed on chain");
					self.after_swap_failed(&job);
				} else {
					info!(target: "engine", id, signature, "Swap confirmed");
				}
				Ok(job)
			}
			Err(e) if e.is_conflict() => {
				let current = self.stores.swaps.get(id)?;
				if current.status.is_terminal() {
					warn_if_disagrees(&current, success);
					Ok(current)
				} else {
					Err(e)
				}
			}
			Err(e) => Err(e),
		}
	}

	/// Cancel a swap that has not been submitted
	pub fn cancel_swap_job(&self, id: JobId, reason: &str) -> Result<SwapJob, SettlementError> {
		let job = self.stores.swaps.get(id)?;
		if job.status != SwapJobStatus::Pending {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be cancelled",
			));
		}

		let cancelled = self
			.stores
			.swaps
			.update(id, SwapJobStatus::Pending, |j| state::cancel_swap(j, reason))?;
		info!(target: "engine", id, reason, "Swap cancelled");
		self.after_swap_failed(&cancelled);
		Ok(cancelled)
	}

	/// Record a Solana transaction report from the relay
	///
	/// A final report for one of our payouts finalizes the job. Reports for
	/// unknown jobs, or for jobs not currently Submitted, are only kept in
	/// the notification book; a successful one settles the job after its
	/// next accepted submission.
	pub fn update_solana_transaction(
		&self,
		args: UpdateSolanaTransactionArgs,
	) -> Result<TransactionNotification, SettlementError> {
		let notification = self.stores.notifications.record(args)?;

		let Some(job_id) = notification.job_id else {
			return Ok(notification);
		};
		if notification.status == TransactionStatus::Pending {
			return Ok(notification);
		}

		let result = self.finalize_swap_job(
			job_id,
			&notification.signature,
			notification.status.is_success(),
			notification.error_message.clone(),
		);
		match result {
			Ok(_) => Ok(notification),
			Err(e) if e.is_not_found() => {
				debug!(target: "engine", job_id, "Notification for unknown job recorded");
				Ok(notification)
			}
			Err(SettlementError::InvalidTransition { status, .. }) => {
				warn!(
					target: "engine",
					job_id,
					%status,
					signature = %notification.signature,
					"Notification arrived for a job that is not submitted"
				);
				Ok(notification)
			}
			Err(e) => Err(e),
		}
	}

	/// Sign, claim and submit a Pending swap
	pub async fn process_swap_job(&self, id: JobId) -> Result<SwapJob, SettlementError> {
		let job = self.stores.swaps.get(id)?;
		if job.status != SwapJobStatus::Pending {
			return Err(SettlementError::invalid_transition(
				id,
				job.status,
				"be processed",
			));
		}

		let max_attempts = self.config.max_attempts;
		if job.attempts >= max_attempts {
			let failed = self
				.stores
				.swaps
				.update(id, SwapJobStatus::Pending, |j| state::exhaust_swap(j, max_attempts))?;
			self.after_swap_failed(&failed);
			return Ok(failed);
		}

		let reference = swap_reference(id);
		let signed = self.signer.sign(PayoutMessage {
			reference: reference.clone(),
			job_id: id,
			recipient: job.intent.receive_address.clone(),
			token: job.intent.receive_token.clone(),
			amount: job.intent.receive_amount,
			attempt: job.attempts + 1,
		})?;
		let encoded = signed.encode()?;

		let claimed = self.mark_swap_job_submitted(id, &encoded)?;

		let payload = LedgerPayload::SolanaPayout {
			reference,
			job_id: id,
			encoded_tx: encoded,
			recipient: claimed.intent.receive_address.clone(),
			token: claimed.intent.receive_token.clone(),
			amount: claimed.intent.receive_amount,
		};

		match self.solana.submit(&payload).await {
			Ok(receipt) => {
				info!(
					target: "engine",
					id,
					attempt = claimed.attempts,
					tx = ?receipt.tx_id,
					"Payout submitted"
				);
				// An earlier attempt may have landed after it was released
				match self.stores.notifications.landed_payout(id) {
					Some(landed) => self.finalize_swap_job(id, &landed.signature, true, None),
					None => Ok(claimed),
				}
			}
			Err(error) => {
				warn!(
					target: "engine",
					id,
					attempt = claimed.attempts,
					kind = %error.kind,
					error = %error.message,
					"Payout submission failed"
				);
				if !error.is_permanent() && claimed.attempts >= self.config.max_attempts {
					self.hold_swap(id, &error.to_string())
				} else {
					self.release_swap(id, &error.to_string(), error.is_permanent())
				}
			}
		}
	}

	/// Resolve a Submitted swap that has gone quiet
	///
	/// Polls the relay by the job's reference once the claim is older than
	/// the submission timeout. A poll error leaves the job untouched.
	pub async fn reconcile_swap_job(&self, id: JobId) -> Result<SwapJob, SettlementError> {
		let job = self.stores.swaps.get(id)?;
		if job.status != SwapJobStatus::Submitted || !self.is_stale(job.updated_at, now_millis()) {
			return Ok(job);
		}

		let outcome = self.solana.poll_status(&swap_reference(id)).await?;
		debug!(target: "engine", id, ?outcome, "Polled stale payout");

		match outcome {
			LedgerOutcome::Confirmed { tx_id, .. } => {
				let signature = tx_id.unwrap_or_else(|| payout_signature(&job));
				self.finalize_swap_job(id, &signature, true, None)
			}
			LedgerOutcome::Failed { reason } => self.finalize_swap_job(id, "", false, Some(reason)),
			LedgerOutcome::Pending | LedgerOutcome::NotFound => {
				let message = job.error_message.clone().unwrap_or_else(|| {
					format!(
						"no confirmation within {}ms",
						self.config.submitted_timeout_ms
					)
				});
				self.release_swap(id, &message, false)
			}
		}
	}

	fn hold_swap(&self, id: JobId, message: &str) -> Result<SwapJob, SettlementError> {
		match self
			.stores
			.swaps
			.update(id, SwapJobStatus::Submitted, |j| state::hold_swap(j, message))
		{
			Ok(job) => {
				warn!(
					target: "engine",
					id,
					"Last payout attempt unanswered, leaving it to reconciliation"
				);
				Ok(job)
			}
			Err(e) if e.is_conflict() => Ok(self.stores.swaps.get(id)?),
			Err(e) => Err(e),
		}
	}

	fn release_swap(
		&self,
		id: JobId,
		message: &str,
		permanent: bool,
	) -> Result<SwapJob, SettlementError> {
		let max_attempts = self.config.max_attempts;
		match self.stores.swaps.update(id, SwapJobStatus::Submitted, |j| {
			state::release_swap(j, message, permanent, max_attempts)
		}) {
			Ok(job) => {
				if job.status == SwapJobStatus::Failed {
					warn!(target: "engine", id, error = ?job.error_message, "Swap failed");
					self.after_swap_failed(&job);
				} else {
					debug!(target: "engine", id, "Swap released for retry");
				}
				Ok(job)
			}
			// Finalized by a notification while the ledger call was in flight
			Err(e) if e.is_conflict() => Ok(self.stores.swaps.get(id)?),
			Err(e) => Err(e),
		}
	}

	/// Queue the refund of an IC payment whose swap failed
	///
	/// Only payments evidenced by a block index are refunded. The refund
	/// fingerprint is derived from the swap id, so a swap is refunded at
	/// most once.
	pub(super) fn after_swap_failed(&self, job: &SwapJob) {
		if !self.config.refund_failed_swaps {
			return;
		}
		let Some(request) = refund_request(job) else {
			return;
		};

		match self.create_icp_job(None, request, refund_fingerprint(job.id)) {
			Ok(refund) => info!(
				target: "engine",
				swap_id = job.id,
				refund_id = refund.id,
				amount = refund.amount,
				"Refund queued"
			),
			Err(SettlementError::Store(StoreError::DuplicateRequest { existing, .. })) => {
				debug!(target: "engine", swap_id = job.id, existing, "Refund already queued")
			}
			Err(e) => {
				error!(target: "engine", swap_id = job.id, error = %e, "Failed to queue refund")
			}
		}
	}

	/// Queue refunds that a crash prevented
	///
	/// Run once after recovery. Returns the number of refunds queued.
	pub fn ensure_refunds(&self) -> usize {
		if !self.config.refund_failed_swaps {
			return 0;
		}

		let queued: HashSet<String> = self
			.stores
			.icp
			.list_by(|j| j.from_principal.is_none())
			.into_iter()
			.map(|j| j.request_fingerprint)
			.collect();

		let missing = self.stores.swaps.list_by(|j| {
			j.status == SwapJobStatus::Failed
				&& refund_request(j).is_some()
				&& !queued.contains(&refund_fingerprint(j.id))
		});

		for job in &missing {
			self.after_swap_failed(job);
		}
		missing.len()
	}
}

fn refund_fingerprint(id: JobId) -> String {
	format!("refund:swap:{}", id)
}

fn refund_request(job: &SwapJob) -> Option<IcpTransferRequest> {
	match &job.intent.pay {
		PaySide::Ic {
			principal,
			block_index: Some(_),
		} => Some(IcpTransferRequest {
			to_principal: principal.clone(),
			token: job.intent.pay_token.clone(),
			amount: job.intent.pay_amount,
			memo: Some(format!("refund swap {}", job.id)),
		}),
		_ => None,
	}
}

fn payout_signature(job: &SwapJob) -> String {
	SignedPayout::decode(&job.encoded_signed_solana_tx)
		.map(|payout| payout.signature)
		.unwrap_or_else(|_| swap_reference(job.id))
}

fn warn_if_disagrees(job: &SwapJob, success: bool) {
	let recorded_success = job.status == SwapJobStatus::Confirmed;
	if recorded_success != success {
		warn!(
			target: "engine",
			id = job.id,
			status = %job.status,
			reported_success = success,
			"Ignoring outcome that disagrees with finalized job"
		);
	}
}
