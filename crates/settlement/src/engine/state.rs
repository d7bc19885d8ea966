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

//! Job state transitions
//!
//! Pure functions applied by the job store under the job's key lock. Each
//! one checks the status it starts from, so a transition can never be
//! applied to a job that moved on in the meantime.
//!
//! ```text
//! SwapJob:         Pending -> Submitted -> Confirmed | Failed
//!                  Submitted -> Pending (retry) ; Pending -> Failed (cancel)
//! IcpTransferJob:  Pending -> InProgress -> Completed | Failed
//!                  InProgress -> Pending (retry) ; Pending -> Failed (cancel)
//! ```
//!
//! A transient error on the last attempt holds the claim instead of
//! failing it; only reconciliation against the ledger may fail it then.

use ferry_sdk::types::{IcpTransferJob, IcpTransferStatus, SwapJob, SwapJobStatus};

use crate::error::SettlementError;

fn retry_message(error: &str, attempts: u32, max_attempts: u32) -> String {
	if attempts >= max_attempts {
		format!("{} (attempts exhausted: {}/{})", error, attempts, max_attempts)
	} else {
		error.to_string()
	}
}

/// Claim a pending swap for submission, recording the signed payout
pub fn claim_swap(
	job: &mut SwapJob,
	encoded_tx: &str,
	max_attempts: u32,
) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Pending {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be marked submitted",
		));
	}
	if job.attempts >= max_attempts {
		return Err(SettlementError::AttemptsExhausted {
			id: job.id,
			attempts: job.attempts,
		});
	}

	job.status = SwapJobStatus::Submitted;
	job.attempts += 1;
	job.encoded_signed_solana_tx = encoded_tx.to_string();
	job.error_message = None;
	Ok(())
}

/// Take back a submission that did not go through
///
/// Returns the job to Pending for another attempt, or fails it when the
/// error is permanent or no attempt is left.
pub fn release_swap(
	job: &mut SwapJob,
	error: &str,
	permanent: bool,
	max_attempts: u32,
) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Submitted {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be released",
		));
	}

	if permanent || job.attempts >= max_attempts {
		job.status = SwapJobStatus::Failed;
	} else {
		job.status = SwapJobStatus::Pending;
		job.encoded_signed_solana_tx.clear();
	}
	job.error_message = Some(retry_message(error, job.attempts, max_attempts));
	Ok(())
}

/// Keep a submission whose last attempt went unanswered in flight
///
/// A transient error may hide a payout the relay accepted, so with no
/// attempt left the job waits for reconciliation instead of failing.
pub fn hold_swap(job: &mut SwapJob, error: &str) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Submitted {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be held for reconciliation",
		));
	}

	job.error_message = Some(error.to_string());
	Ok(())
}

/// Record the chain outcome of a submitted payout
pub fn finalize_swap(
	job: &mut SwapJob,
	signature: &str,
	success: bool,
	error: Option<String>,
) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Submitted {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be finalized",
		));
	}

	if success {
		job.status = SwapJobStatus::Confirmed;
		job.solana_tx_signature_of_payout = Some(signature.to_string());
		job.error_message = None;
	} else {
		job.status = SwapJobStatus::Failed;
		job.error_message =
			Some(error.unwrap_or_else(|| "payout transaction failed on chain".to_string()));
	}
	Ok(())
}

pub fn cancel_swap(job: &mut SwapJob, reason: &str) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Pending {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be cancelled",
		));
	}

	job.status = SwapJobStatus::Failed;
	job.error_message = Some(format!("cancelled: {}", reason));
	Ok(())
}

/// Fail a pending swap that has no attempt left
pub fn exhaust_swap(job: &mut SwapJob, max_attempts: u32) -> Result<(), SettlementError> {
	if job.status != SwapJobStatus::Pending || job.attempts < max_attempts {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be failed as exhausted",
		));
	}

	job.status = SwapJobStatus::Failed;
	let last = job.error_message.take().unwrap_or_else(|| "no confirmation".to_string());
	job.error_message = Some(retry_message(&last, job.attempts, max_attempts));
	Ok(())
}

/// Claim a pending transfer for submission
pub fn claim_icp(job: &mut IcpTransferJob, max_attempts: u32) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::Pending {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"start",
		));
	}
	if job.attempts >= max_attempts {
		return Err(SettlementError::AttemptsExhausted {
			id: job.id,
			attempts: job.attempts,
		});
	}

	job.status = IcpTransferStatus::InProgress;
	job.attempts += 1;
	job.error_message = None;
	Ok(())
}

pub fn complete_icp(job: &mut IcpTransferJob, block_index: u64) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::InProgress {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"complete",
		));
	}

	job.status = IcpTransferStatus::Completed;
	job.block_index = Some(block_index);
	job.error_message = None;
	Ok(())
}

pub fn release_icp(
	job: &mut IcpTransferJob,
	error: &str,
	permanent: bool,
	max_attempts: u32,
) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::InProgress {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be released",
		));
	}

	job.status = if permanent || job.attempts >= max_attempts {
		IcpTransferStatus::Failed
	} else {
		IcpTransferStatus::Pending
	};
	job.error_message = Some(retry_message(error, job.attempts, max_attempts));
	Ok(())
}

/// Transfer counterpart of [`hold_swap`]
pub fn hold_icp(job: &mut IcpTransferJob, error: &str) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::InProgress {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be held for reconciliation",
		));
	}

	job.error_message = Some(error.to_string());
	Ok(())
}

pub fn cancel_icp(job: &mut IcpTransferJob, reason: &str) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::Pending {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be cancelled",
		));
	}

	job.status = IcpTransferStatus::Failed;
	job.error_message = Some(format!("cancelled: {}", reason));
	Ok(())
}

pub fn exhaust_icp(job: &mut IcpTransferJob, max_attempts: u32) -> Result<(), SettlementError> {
	if job.status != IcpTransferStatus::Pending || job.attempts < max_attempts {
		return Err(SettlementError::invalid_transition(
			job.id,
			job.status,
			"be failed as exhausted",
		));
	}

	job.status = IcpTransferStatus::Failed;
	let last = job.error_message.take().unwrap_or_else(|| "no confirmation".to_string());
	job.error_message = Some(retry_message(&last, job.attempts, max_attempts));
	Ok(())
}
