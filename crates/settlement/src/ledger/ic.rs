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

use std::time::Duration;

use async_trait::async_trait;
use ferry_sdk::types::Chain;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LedgerAdapter, LedgerError, LedgerOutcome, LedgerPayload, SubmitReceipt};

#[derive(Serialize)]
struct TransferRequest<'a> {
	reference: &'a str,
	from: Option<&'a str>,
	to: &'a str,
	token: &'a str,
	amount: u64,
	memo: Option<&'a str>,
}

#[derive(Deserialize)]
struct TransferResponse {
	block_index: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransferState {
	Pending,
	Completed,
	Rejected,
}

#[derive(Deserialize)]
struct TransferStatusResponse {
	status: TransferState,
	#[serde(default)]
	block_index: Option<u64>,
	#[serde(default)]
	error: Option<String>,
}

/// HTTP client for the IC ledger bridge
///
/// Ledger transfers settle synchronously: an accepted transfer answers
/// with its block index. A call that timed out is resolved by polling the
/// reference, which the bridge uses as the transfer memo.
pub struct IcLedgerAdapter {
	base_url: String,
	client: Client,
}

impl IcLedgerAdapter {
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
impl LedgerAdapter for IcLedgerAdapter {
	fn chain(&self) -> Chain {
		Chain::Ic
	}

	async fn submit(&self, payload: &LedgerPayload) -> Result<SubmitReceipt, LedgerError> {
		let LedgerPayload::IcTransfer {
			reference,
			from,
			to,
			token,
			amount,
			memo,
			..
		} = payload
		else {
			return Err(LedgerError::permanent(
				"IC ledger only accepts IC transfers",
			));
		};

		let body = TransferRequest {
			reference,
			from: from.as_deref(),
			to,
			token,
			amount: *amount,
			memo: memo.as_deref(),
		};

		let url = format!("{}/v1/transfers", self.base_url);
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
				"Ledger rejected transfer"
			);
			return Err(error);
		}

		let accepted: TransferResponse = response
			.json()
			.await
			.map_err(|e| LedgerError::transient(format!("Invalid ledger response: {}", e)))?;

		debug!(
			target: "ledger",
			reference = %reference,
			block_index = accepted.block_index,
			"Ledger accepted transfer"
		);
		Ok(SubmitReceipt {
			reference: reference.clone(),
			tx_id: None,
			block_index: Some(accepted.block_index),
		})
	}

	async fn poll_status(&self, reference: &str) -> Result<LedgerOutcome, LedgerError> {
		let url = format!("{}/v1/transfers/{}", self.base_url, reference);
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

		let report: TransferStatusResponse = response
			.json()
			.await
			.map_err(|e| LedgerError::transient(format!("Invalid ledger response: {}", e)))?;

		Ok(match report.status {
			TransferState::Pending => LedgerOutcome::Pending,
			TransferState::Completed => LedgerOutcome::Confirmed {
				tx_id: None,
				block_index: report.block_index,
			},
			TransferState::Rejected => LedgerOutcome::Failed {
				reason: report
					.error
					.unwrap_or_else(|| "transfer rejected by ledger".to_string()),
			},
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transfer_report_parses() {
		let report: TransferStatusResponse =
			serde_json::from_str(r#"{"status":"completed","block_index":42}"#).unwrap();
		assert!(matches!(report.status, TransferState::Completed));
		assert_eq!(report.block_index, Some(42));

		let report: TransferStatusResponse =
			serde_json::from_str(r#"{"status":"rejected","error":"insufficient funds"}"#).unwrap();
		assert!(matches!(report.status, TransferState::Rejected));
		assert_eq!(report.error.as_deref(), Some("insufficient funds"));
	}

	#[tokio::test]
	async fn test_rejects_foreign_payload() {
		let adapter =
			IcLedgerAdapter::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
		let payload = LedgerPayload::SolanaPayout {
			reference: "swap-1".to_string(),
			job_id: 1,
			encoded_tx: "00".to_string(),
			recipient: "r".to_string(),
			token: "SOL".to_string(),
			amount: 1,
		};

		assert!(adapter.submit(&payload).await.unwrap_err().is_permanent());
	}
}
