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

use serde::{Deserialize, Serialize};

/// Job identifier, assigned monotonically by the job store
pub type JobId = u64;

/// Principal reported for callers that did not identify themselves
pub const ANONYMOUS_PRINCIPAL: &str = "2vxsx-fae";

/// Settlement rail a token lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
	Ic,
	Solana,
}

/// Reference to the transfer that paid for a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxId {
	/// IC ledger block index
	BlockIndex(u64),
	/// Solana transaction signature
	TransactionId(String),
}

/// Arguments of the `swap` call
///
/// For cross-chain swaps `pay_tx_id` references the Solana payment and
/// `timestamp` (milliseconds) is required whenever `pay_signature` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapArgs {
	pub pay_token: String,
	pub pay_amount: u64,
	#[serde(default)]
	pub pay_tx_id: Option<TxId>,
	pub receive_token: String,
	#[serde(default)]
	pub receive_amount: Option<u64>,
	#[serde(default)]
	pub receive_address: Option<String>,
	#[serde(default)]
	pub max_slippage: Option<f64>,
	#[serde(default)]
	pub referred_by: Option<String>,
	#[serde(default)]
	pub pay_signature: Option<String>,
	#[serde(default)]
	pub timestamp: Option<u64>,
}

/// How the paying side of a swap was funded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rail", rename_all = "snake_case")]
pub enum PaySide {
	/// Paid on the IC ledger by `principal`
	Ic {
		principal: String,
		block_index: Option<u64>,
	},
	/// Paid by a Solana transfer observed through a notification
	Solana { tx_signature: String },
}

/// Decoded snapshot of the originating swap request
///
/// Holds exactly what the engine needs to rebuild the payout on retry, so
/// `original_args_json` never has to be parsed again after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapIntent {
	pub payer: String,
	pub pay: PaySide,
	pub pay_token: String,
	pub pay_amount: u64,
	pub receive_token: String,
	pub receive_amount: u64,
	pub receive_address: String,
	pub max_slippage: Option<f64>,
	pub referred_by: Option<String>,
}

/// Swap job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapJobStatus {
	Pending,
	Submitted,
	Confirmed,
	Failed,
}

impl SwapJobStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, SwapJobStatus::Confirmed | SwapJobStatus::Failed)
	}
}

impl fmt::Display for SwapJobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			SwapJobStatus::Pending => "pending",
			SwapJobStatus::Submitted => "submitted",
			SwapJobStatus::Confirmed => "confirmed",
			SwapJobStatus::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// A Solana payout tracked through its settlement lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapJob {
	pub id: JobId,
	pub status: SwapJobStatus,
	/// Unix timestamp (milliseconds)
	pub created_at: u64,
	/// Unix timestamp (milliseconds), refreshed on every transition
	pub updated_at: u64,
	pub attempts: u32,
	pub caller: String,
	pub request_fingerprint: String,
	pub original_args_json: String,
	pub intent: SwapIntent,
	/// Empty until the job has been claimed for submission
	pub encoded_signed_solana_tx: String,
	pub solana_tx_signature_of_payout: Option<String>,
	pub error_message: Option<String>,
}

/// ICP transfer job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcpTransferStatus {
	Pending,
	InProgress,
	Completed,
	Failed,
}

impl IcpTransferStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, IcpTransferStatus::Completed | IcpTransferStatus::Failed)
	}
}

impl fmt::Display for IcpTransferStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			IcpTransferStatus::Pending => "pending",
			IcpTransferStatus::InProgress => "in_progress",
			IcpTransferStatus::Completed => "completed",
			IcpTransferStatus::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// A transfer on the IC ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcpTransferJob {
	pub id: JobId,
	pub status: IcpTransferStatus,
	pub created_at: u64,
	pub updated_at: u64,
	pub attempts: u32,
	/// Absent for system-initiated transfers such as refunds
	pub from_principal: Option<String>,
	pub to_principal: String,
	pub token: String,
	pub amount: u64,
	pub memo: Option<String>,
	pub request_fingerprint: String,
	/// Set once the ledger accepts the transfer
	pub block_index: Option<u64>,
	pub error_message: Option<String>,
}

/// Reply of the `swap` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSwapReply {
	pub status: SwapJobStatus,
	pub job_id: JobId,
	pub message: String,
}

/// Body of `mark_swap_job_submitted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkSubmittedRequest {
	pub encoded_signed_solana_tx: String,
}

/// Body of `finalize_swap_job`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeSwapRequest {
	pub signature: String,
	pub success: bool,
	#[serde(default)]
	pub error: Option<String>,
}

/// Body of the cancellation calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobRequest {
	pub reason: String,
}

/// Request to queue a transfer on the IC ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcpTransferRequest {
	pub to_principal: String,
	pub token: String,
	pub amount: u64,
	#[serde(default)]
	pub memo: Option<String>,
}

/// Chain-side status reported for a Solana transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
	Pending,
	Confirmed,
	Finalized,
	Failed,
}

impl TransactionStatus {
	/// True when the transaction landed successfully
	pub fn is_success(self) -> bool {
		matches!(self, TransactionStatus::Confirmed | TransactionStatus::Finalized)
	}
}

/// Body of `update_solana_transaction`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSolanaTransactionArgs {
	pub signature: String,
	pub status: TransactionStatus,
	/// Payout job this transaction belongs to; absent for incoming payments
	#[serde(default)]
	pub job_id: Option<JobId>,
	#[serde(default)]
	pub metadata: Option<String>,
	#[serde(default)]
	pub error_message: Option<String>,
}

/// Recorded Solana transaction notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNotification {
	pub signature: String,
	pub status: TransactionStatus,
	pub job_id: Option<JobId>,
	pub metadata: Option<String>,
	pub error_message: Option<String>,
	pub timestamp: u64,
	/// Swap job that consumed this incoming payment
	pub consumed_by: Option<JobId>,
}

/// Error body returned by the settlement service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_terminal_statuses() {
		assert!(!SwapJobStatus::Pending.is_terminal());
		assert!(!SwapJobStatus::Submitted.is_terminal());
		assert!(SwapJobStatus::Confirmed.is_terminal());
		assert!(SwapJobStatus::Failed.is_terminal());

		assert!(!IcpTransferStatus::InProgress.is_terminal());
		assert!(IcpTransferStatus::Completed.is_terminal());
	}

	#[test]
	fn test_status_wire_names() {
		assert_eq!(
			serde_json::to_string(&IcpTransferStatus::InProgress).unwrap(),
			"\"in_progress\""
		);
		assert_eq!(
			serde_json::to_string(&SwapJobStatus::Submitted).unwrap(),
			"\"submitted\""
		);
		assert_eq!(IcpTransferStatus::InProgress.to_string(), "in_progress");
	}

	#[test]
	fn test_swap_args_optional_fields_default() {
		let args: SwapArgs = serde_json::from_str(
			r#"{"pay_token":"ksUSDT","pay_amount":1000,"receive_token":"SOL"}"#,
		)
		.unwrap();

		assert_eq!(args.pay_amount, 1000);
		assert!(args.pay_tx_id.is_none());
		assert!(args.pay_signature.is_none());
		assert!(args.timestamp.is_none());
	}

	#[test]
	fn test_pay_side_is_tagged() {
		let side = PaySide::Solana {
			tx_signature: "sig".to_string(),
		};
		let json = serde_json::to_value(&side).unwrap();
		assert_eq!(json["rail"], "solana");
		assert_eq!(json["tx_signature"], "sig");
	}
}
