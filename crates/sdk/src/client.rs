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

use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::{
	FinalizeSwapRequest, IcpTransferJob, JobId, MarkSubmittedRequest, QueuedSwapReply, SwapArgs,
	SwapJob, UpdateSolanaTransactionArgs,
};

/// Header carrying the caller principal
pub const CALLER_HEADER: &str = "x-caller-principal";

/// Error types for client operations
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Server error: {0}")]
	Server(String),
}

/// Client for the settlement service HTTP surface
///
/// Used by the frontend bridge and by the relay that reports Solana
/// transaction outcomes back into the queue.
pub struct Client {
	base_url: String,
	caller: Option<String>,
	client: ReqwestClient,
}

impl Client {
	/// Create a new client with the given base URL
	pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
		Self::with_config(base_url, Duration::from_secs(30))
	}

	/// Create a new client with a custom request timeout
	pub fn with_config(
		base_url: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, ClientError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			base_url: base_url.into(),
			caller: None,
			client,
		})
	}

	/// Identify subsequent requests as coming from `principal`
	pub fn with_caller(mut self, principal: impl Into<String>) -> Self {
		self.caller = Some(principal.into());
		self
	}

	/// Queue a swap
	pub async fn swap(&self, args: &SwapArgs) -> Result<QueuedSwapReply, ClientError> {
		let url = format!("{}/api/v1/swap", self.base_url);
		self.send(self.client.post(&url).json(args)).await
	}

	pub async fn get_swap_job(&self, id: JobId) -> Result<Option<SwapJob>, ClientError> {
		let url = format!("{}/api/v1/swap_jobs/{}", self.base_url, id);
		self.send_optional(self.client.get(&url)).await
	}

	pub async fn get_pending_swap_jobs(
		&self,
		after: Option<JobId>,
		limit: usize,
	) -> Result<Vec<SwapJob>, ClientError> {
		let url = format!("{}/api/v1/swap_jobs/pending", self.base_url);
		let mut query = vec![("limit", limit.to_string())];
		if let Some(after) = after {
			query.push(("after", after.to_string()));
		}
		self.send(self.client.get(&url).query(&query)).await
	}

	pub async fn mark_swap_job_submitted(
		&self,
		id: JobId,
		encoded_signed_solana_tx: impl Into<String>,
	) -> Result<SwapJob, ClientError> {
		let url = format!("{}/api/v1/swap_jobs/{}/submitted", self.base_url, id);
		let body = MarkSubmittedRequest {
			encoded_signed_solana_tx: encoded_signed_solana_tx.into(),
		};
		self.send(self.client.post(&url).json(&body)).await
	}

	pub async fn finalize_swap_job(
		&self,
		id: JobId,
		request: &FinalizeSwapRequest,
	) -> Result<SwapJob, ClientError> {
		let url = format!("{}/api/v1/swap_jobs/{}/finalize", self.base_url, id);
		self.send(self.client.post(&url).json(request)).await
	}

	/// Report a Solana transaction outcome observed on chain
	pub async fn update_solana_transaction(
		&self,
		args: &UpdateSolanaTransactionArgs,
	) -> Result<(), ClientError> {
		let url = format!("{}/api/v1/solana/transactions", self.base_url);
		let response = self
			.authorize(self.client.post(&url).json(args))
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;
		Self::check_status(response).await.map(|_| ())
	}

	pub async fn get_icp_job(&self, id: JobId) -> Result<Option<IcpTransferJob>, ClientError> {
		let url = format!("{}/api/v1/icp_jobs/{}", self.base_url, id);
		self.send_optional(self.client.get(&url)).await
	}

	/// ICP transfer jobs paying out to the configured caller
	pub async fn get_icp_jobs_for_caller(&self) -> Result<Vec<IcpTransferJob>, ClientError> {
		let url = format!("{}/api/v1/icp_jobs/mine", self.base_url);
		self.send(self.client.get(&url)).await
	}

	fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
		match &self.caller {
			Some(caller) => builder.header(CALLER_HEADER, caller),
			None => builder,
		}
	}

	async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
		let response = self
			.authorize(builder)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		let response = Self::check_status(response).await?;
		response
			.json()
			.await
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))
	}

	async fn send_optional<T: DeserializeOwned>(
		&self,
		builder: RequestBuilder,
	) -> Result<Option<T>, ClientError> {
		let response = self
			.authorize(builder)
			.send()
			.await
			.map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let response = Self::check_status(response).await?;
		response
			.json()
			.await
			.map(Some)
			.map_err(|e| ClientError::Serialization(format!("Failed to parse response: {}", e)))
	}

	async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
		if response.status().is_success() {
			return Ok(response);
		}

		let status = response.status();
		let error_text = response
			.text()
			.await
			.unwrap_or_else(|_| format!("HTTP {}", status));
		Err(ClientError::Server(format!("{}: {}", status, error_text)))
	}
}
