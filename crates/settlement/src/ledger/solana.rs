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

//! Solana relay adapter
//!
//! The relay owns the Solana RPC connection. It accepts a signed payout
//! keyed by its reference, broadcasts it and later reports the outcome,
//! either through `update_solana_transaction` or when polled here.

use std::time::Duration;

use async_trait::async_trait;
use ferry_sdk::types::{Chain, JobId, TransactionStatus};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LedgerAdapter, LedgerError, LedgerOutcome, LedgerPayload, SubmitReceipt};

#[derive(Serialize)]
struct RelaySubmitRequest<'a> {
	reference: &'a str,
	job_id: JobId,
	encoded_tx: &'a str,
	recipient: &'a str,
	token: &'a str,
	amount: u64,
}

#[derive(Deserialize)]
struct RelaySubmitResponse {
	#[serde(default)]
	signature: Option<String>,
}

#[derive(Deserialize)]
struct RelayStatusResponse {
	status: TransactionStatus,
	#[serde(default)]
	signature: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

/// HTTP client for the Solana relay
pub struct SolanaRelayAdapter {
	base_url: String,
	client: Client,
}

impl SolanaRelayAdapter {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| LedgerError::permanent(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			client,
		})
	}
}

#[async_trait]
impl LedgerAdapter for SolanaRelayAdapter {
	fn chain(&self) -> Chain {
		Chain::Solana
	}

	async fn submit(&self, payload: &LedgerPayload) -> Result<SubmitReceipt, LedgerError> {
		let LedgerPayload::SolanaPayout {
			reference,
			job_id,
			encoded_tx,
			recipient,
			token,
			amount,
		} = payload
		else {
			return Err(LedgerError::permanent(
				"Solana relay only accepts Solana payouts",
			));
		};

		let body = RelaySubmitRequest {
			reference,
			job_id: *job_id,
			encoded_tx,
			recipient,
			token,
			amount: *amount,
		};

		let url = format!("{}/v1/transactions", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(LedgerError::from_transport)?;

		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			let error = LedgerError::from_status(status, &text);
			warn!(
				target: "ledger",
				reference = %reference,
				%status,
				kind = %error.kind,
				"Relay rejected payout"
			);
			return Err(error);
		}

		let accepted: RelaySubmitResponse = response
			.json()
			.await
			.map_err(|e| LedgerError::transient(format!("Invalid relay response: {}", e)))?;

		debug!(
			target: "ledger",
			reference = %reference,
			signature = ?accepted.signature,
			"Relay accepted payout"
		);
		Ok(SubmitReceipt {
			reference: reference.clone(),
			tx_id: accepted.signature,
			block_index: None,
		})
	}

	async fn poll_status(&self, reference: &str) -> Result<LedgerOutcome, LedgerError> {
		let url = format!("{}/v1/transactions/{}", self.base_url, reference);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(LedgerError::from_transport)?;

		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Ok(LedgerOutcome::NotFound);
		}
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			return Err(LedgerError::from_status(status, &text));
		}

		let report: RelayStatusResponse = response
			.json()
			.await
			.map_err(|e| LedgerError::transient(format!("Invalid relay response: {}", e)))?;

		Ok(match report.status {
			TransactionStatus::Pending => LedgerOutcome::Pending,
			TransactionStatus::Confirmed | TransactionStatus::Finalized => {
				LedgerOutcome::Confirmed {
					tx_id: report.signature,
					block_index: None,
				}
			}
			TransactionStatus::Failed => LedgerOutcome::Failed {
				reason: report
					.error
					.unwrap_or_else(|| "transaction failed on chain".to_string()),
			},
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_rejects_foreign_payload() {
		let adapter =
			SolanaRelayAdapter::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
		let payload = LedgerPayload::IcTransfer {
			reference: "icp-1".to_string(),
			job_id: 1,
			from: None,
			to: "bob".to_string(),
			token: "ICP".to_string(),
			amount: 1,
			memo: None,
		};

		let err = adapter.submit(&payload).await.unwrap_err();
		assert!(err.is_permanent());
	}

	#[tokio::test]
	async fn test_unreachable_relay_is_transient() {
		let adapter =
			SolanaRelayAdapter::new("http://127.0.0.1:9/", Duration::from_millis(200)).unwrap();

		let err = adapter.poll_status("swap-1").await.unwrap_err();
		assert!(!err.is_permanent());
	}

	#[test]
	fn test_status_report_parses() {
		let report: RelayStatusResponse =
			serde_json::from_str(r#"{"status":"finalized","signature":"5x"}"#).unwrap();
		assert_eq!(report.status, TransactionStatus::Finalized);
		assert_eq!(report.signature.as_deref(), Some("5x"));
		assert!(report.error.is_none());
	}
}
