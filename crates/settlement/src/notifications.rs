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

//! Solana transaction notifications
//!
//! The relay reports what it sees on Solana through
//! `update_solana_transaction`. A report either carries a `job_id` (the
//! outcome of one of our payouts) or none (an incoming user payment that a
//! later `swap` call will reference by signature).

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use ferry_sdk::types::{
	JobId, TransactionNotification, TransactionStatus, UpdateSolanaTransactionArgs,
};
use tracing::{debug, info};

use crate::{
	error::SettlementError,
	journal::{JobLog, LogRecord, now_millis},
	store::StoreError,
	validator::ValidationError,
};

/// Recorded notifications keyed by transaction signature
pub struct NotificationBook {
	entries: DashMap<String, TransactionNotification>,
	log: Arc<dyn JobLog>,
}

impl NotificationBook {
	pub fn new(log: Arc<dyn JobLog>) -> Self {
		Self {
			entries: DashMap::new(),
			log,
		}
	}

	/// Record (or refresh) the notification for a signature
	///
	/// A final status is never downgraded by a late `pending` report, and
	/// the consumption marker of an incoming payment is preserved.
	pub fn record(
		&self,
		args: UpdateSolanaTransactionArgs,
	) -> Result<TransactionNotification, StoreError> {
		let entry = self.entries.entry(args.signature.clone());
		let mut next = match &entry {
			Entry::Occupied(existing) => existing.get().clone(),
			Entry::Vacant(_) => TransactionNotification {
				signature: args.signature.clone(),
				status: TransactionStatus::Pending,
				job_id: None,
				metadata: None,
				error_message: None,
				timestamp: 0,
				consumed_by: None,
			},
		};

		if args.status != TransactionStatus::Pending || next.status == TransactionStatus::Pending {
			next.status = args.status;
		}
		next.job_id = args.job_id.or(next.job_id);
		next.metadata = args.metadata.or(next.metadata);
		next.error_message = args.error_message.or(next.error_message);
		next.timestamp = now_millis();

		self.log.append(LogRecord::Notification(next.clone()))?;
		entry.insert(next.clone());

		debug!(
			target: "notifications",
			signature = %next.signature,
			status = ?next.status,
			job_id = ?next.job_id,
			"Recorded Solana transaction notification"
		);
		Ok(next)
	}

	pub fn get(&self, signature: &str) -> Option<TransactionNotification> {
		self.entries.get(signature).map(|entry| entry.value().clone())
	}

	/// Check that `signature` is a confirmed, unused incoming payment
	pub fn check_payment(
		&self,
		signature: &str,
	) -> Result<TransactionNotification, ValidationError> {
		let notification = self
			.get(signature)
			.ok_or_else(|| ValidationError::UnknownPayment(signature.to_string()))?;
		payment_usable(&notification)?;
		Ok(notification)
	}

	/// Mark an incoming payment as used by `job_id`
	///
	/// Consumption is permanent: a payment funds at most one swap job, even
	/// if that job later fails.
	pub fn consume(
		&self,
		signature: &str,
		job_id: JobId,
	) -> Result<TransactionNotification, SettlementError> {
		let mut entry = match self.entries.entry(signature.to_string()) {
			Entry::Occupied(entry) => entry,
			Entry::Vacant(_) => {
				return Err(ValidationError::UnknownPayment(signature.to_string()).into());
			}
		};

		payment_usable(entry.get())?;

		let mut next = entry.get().clone();
		next.consumed_by = Some(job_id);
		self.log
			.append(LogRecord::Notification(next.clone()))
			.map_err(StoreError::from)?;
		entry.insert(next.clone());

		info!(
			target: "notifications",
			signature,
			job_id,
			"Incoming payment consumed"
		);
		Ok(next)
	}

	/// Latest successful report for one of our payouts
	///
	/// Every attempt of a job carries the same relay reference, so a payout
	/// that landed settles the job whichever attempt sent it. Failure
	/// reports are not returned: one recorded while the job was not
	/// submitted belongs to an attempt that has since been released.
	pub fn landed_payout(&self, job_id: JobId) -> Option<TransactionNotification> {
		self.entries
			.iter()
			.filter(|entry| entry.job_id == Some(job_id) && entry.status.is_success())
			.map(|entry| entry.value().clone())
			.max_by_key(|notification| notification.timestamp)
	}

	/// Mark `signature` as consumed by `job_id` without logging it
	///
	/// Used by recovery when a swap job was logged but the consumption of
	/// its payment was not. Returns whether the marker was missing.
	pub fn restore_consumed(&self, signature: &str, job_id: JobId) -> bool {
		match self.entries.get_mut(signature) {
			Some(mut entry) if entry.consumed_by.is_none() => {
				entry.consumed_by = Some(job_id);
				true
			}
			_ => false,
		}
	}

	/// Reinstate a notification read back from the log
	pub fn restore(&self, notification: TransactionNotification) {
		self.entries
			.insert(notification.signature.clone(), notification);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

fn payment_usable(notification: &TransactionNotification) -> Result<(), ValidationError> {
	if notification.job_id.is_some() {
		return Err(ValidationError::InvalidPayment(format!(
			"{} is a payout transaction",
			notification.signature
		)));
	}
	if !notification.status.is_success() {
		return Err(ValidationError::PaymentNotConfirmed(
			notification.signature.clone(),
		));
	}
	if let Some(job_id) = notification.consumed_by {
		return Err(ValidationError::PaymentAlreadyUsed {
			signature: notification.signature.clone(),
			job_id,
		});
	}
	Ok(())
}
