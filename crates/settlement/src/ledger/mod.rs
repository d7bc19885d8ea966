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

//! Ledger adapters
//!
//! The I/O boundary between the settlement engine and the two rails. An
//! adapter never touches job state: it submits a payload and reports what
//! the ledger says, classifying every failure as transient or permanent.

mod ic;
mod solana;

use std::fmt;

use async_trait::async_trait;
use ferry_sdk::types::{Chain, JobId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ic::IcLedgerAdapter;
pub use solana::SolanaRelayAdapter;

/// Deterministic reference of a swap payout
pub fn swap_reference(id: JobId) -> String {
	format!("swap-{}", id)
}

/// Deterministic reference of an ICP transfer
pub fn icp_reference(id: JobId) -> String {
	format!("icp-{}", id)
}

/// Whether retrying the same call can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
	/// Timeouts, unavailable endpoints, rate limits
	Transient,
	/// Rejected transactions, invalid signatures, insufficient balance
	Permanent,
}

impl fmt::Display for LedgerErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LedgerErrorKind::Transient => f.write_str("transient"),
			LedgerErrorKind::Permanent => f.write_str("permanent"),
		}
	}
}

/// Classified ledger failure
#[derive(Debug, Clone, Error)]
#[error("{kind} ledger error: {message}")]
pub struct LedgerError {
	pub kind: LedgerErrorKind,
	pub message: String,
}

impl LedgerError {
	pub fn transient(message: impl Into<String>) -> Self {
		Self {
			kind: LedgerErrorKind::Transient,
			message: message.into(),
		}
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		Self {
			kind: LedgerErrorKind::Permanent,
			message: message.into(),
		}
	}

	pub fn is_permanent(&self) -> bool {
		self.kind == LedgerErrorKind::Permanent
	}

	/// Classify a non-success HTTP response
	///
	/// 4xx means the ledger rejected the request itself and resending it
	/// unchanged cannot help, except for timeouts and rate limiting.
	pub fn from_status(status: StatusCode, body: &str) -> Self {
		let message = if body.is_empty() {
			format!("HTTP {}", status)
		} else {
			format!("HTTP {}: {}", status, body)
		};

		if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
			Self::transient(message)
		} else if status.is_client_error() {
			Self::permanent(message)
		} else {
			Self::transient(message)
		}
	}

	/// Classify a transport failure
	pub fn from_transport(error: reqwest::Error) -> Self {
		if error.is_builder() {
			Self::permanent(format!("invalid request: {}", error))
		} else {
			Self::transient(format!("request failed: {}", error))
		}
	}
}

/// Work handed to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerPayload {
	/// Signed Solana payout of a swap job
	SolanaPayout {
		reference: String,
		job_id: JobId,
		encoded_tx: String,
		recipient: String,
		token: String,
		amount: u64,
	},
	/// Transfer on the IC ledger
	IcTransfer {
		reference: String,
		job_id: JobId,
		from: Option<String>,
		to: String,
		token: String,
		amount: u64,
		memo: Option<String>,
	},
}

impl LedgerPayload {
	pub fn reference(&self) -> &str {
		match self {
			LedgerPayload::SolanaPayout { reference, .. } => reference,
			LedgerPayload::IcTransfer { reference, .. } => reference,
		}
	}

	pub fn job_id(&self) -> JobId {
		match self {
			LedgerPayload::SolanaPayout { job_id, .. } => *job_id,
			LedgerPayload::IcTransfer { job_id, .. } => *job_id,
		}
	}
}

/// Acknowledgement of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
	pub reference: String,
	/// Transaction signature, when the rail assigns one on acceptance
	pub tx_id: Option<String>,
	/// Block index, when the rail settles synchronously
	pub block_index: Option<u64>,
}

/// What the ledger knows about a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
	/// Seen but not final yet
	Pending,
	Confirmed {
		tx_id: Option<String>,
		block_index: Option<u64>,
	},
	Failed {
		reason: String,
	},
	/// Never seen; the submission was lost
	NotFound,
}

/// Ledger adapter trait - one capability interface over both rails
///
/// Implementations must be idempotent on the payload reference: submitting
/// the same reference twice settles at most once.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
	/// Rail served by this adapter
	fn chain(&self) -> Chain;

	async fn submit(&self, payload: &LedgerPayload) -> Result<SubmitReceipt, LedgerError>;

	async fn poll_status(&self, reference: &str) -> Result<LedgerOutcome, LedgerError>;
}
