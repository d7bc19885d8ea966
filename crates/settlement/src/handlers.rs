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

use actix_web::{HttpRequest, HttpResponse, Responder, http::StatusCode, web};
use ferry_sdk::{
	client::CALLER_HEADER,
	types::{
		ANONYMOUS_PRINCIPAL, CancelJobRequest, ErrorResponse, FinalizeSwapRequest,
		IcpTransferRequest, JobId, MarkSubmittedRequest, SwapArgs, UpdateSolanaTransactionArgs,
	},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::{error::SettlementError, query::MAX_PAGE_SIZE, server::AppState, store::StoreError};

/// Error types for the HTTP surface
#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Settlement(#[from] SettlementError),
	#[error("{kind} job {id} not found")]
	NotFound { kind: &'static str, id: JobId },
	#[error("Invalid request: {0}")]
	BadRequest(String),
}

impl ApiError {
	fn status(&self) -> StatusCode {
		match self {
			ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::Settlement(e) => match e {
				SettlementError::Validation(_) => StatusCode::BAD_REQUEST,
				SettlementError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
				SettlementError::Store(StoreError::Conflict { .. })
				| SettlementError::Store(StoreError::DuplicateRequest { .. })
				| SettlementError::InvalidTransition { .. }
				| SettlementError::AttemptsExhausted { .. } => StatusCode::CONFLICT,
				SettlementError::Ledger(_) => StatusCode::BAD_GATEWAY,
				SettlementError::Store(StoreError::Log(_))
				| SettlementError::Signing(_)
				| SettlementError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
			},
		}
	}
}

impl actix_web::ResponseError for ApiError {
	fn status_code(&self) -> StatusCode {
		self.status()
	}

	fn error_response(&self) -> HttpResponse {
		let status = self.status();
		if status.is_server_error() {
			error!(target: "server", error = %self, "Request failed");
		}

		HttpResponse::build(status).json(ErrorResponse {
			error: self.to_string(),
		})
	}
}

/// `after` / `limit` paging parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
	pub after: Option<JobId>,
	pub limit: Option<usize>,
}

impl PageQuery {
	fn limit(&self) -> usize {
		self.limit.unwrap_or(MAX_PAGE_SIZE)
	}
}

/// Principal the request acts for
///
/// Falls back to the anonymous principal when the header is missing or
/// blank.
fn caller(req: &HttpRequest) -> String {
	req.headers()
		.get(CALLER_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.unwrap_or(ANONYMOUS_PRINCIPAL)
		.to_string()
}

/// Health check endpoint
pub async fn health(state: web::Data<AppState>) -> impl Responder {
	let stores = state.engine.stores();
	HttpResponse::Ok().json(serde_json::json!({
		"status": "ok",
		"service": "ferry-settlement",
		"swap_jobs": stores.swaps.len(),
		"icp_jobs": stores.icp.len(),
		"log_seq": stores.log.last_sequence(),
	}))
}

/// Queue a swap for settlement
pub async fn swap(
	state: web::Data<AppState>,
	request: web::Json<SwapArgs>,
	req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
	let caller = caller(&req);
	debug!(target: "server", %caller, "Swap request");
	let reply = state.engine.swap(&caller, request.into_inner())?;
	Ok(HttpResponse::Ok().json(reply))
}

pub async fn get_swap_job(
	state: web::Data<AppState>,
	path: web::Path<JobId>,
) -> Result<HttpResponse, ApiError> {
	let id = path.into_inner();
	let job = state
		.query
		.get_swap_job(id)
		.ok_or(ApiError::NotFound { kind: "Swap", id })?;
	Ok(HttpResponse::Ok().json(job))
}

pub async fn get_pending_swap_jobs(
	state: web::Data<AppState>,
	page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
	let jobs = state.query.get_pending_swap_jobs(page.after, page.limit());
	Ok(HttpResponse::Ok().json(jobs))
}

/// Record that the payout transaction for a swap was handed to the relay
pub async fn mark_swap_job_submitted(
	state: web::Data<AppState>,
	path: web::Path<JobId>,
	request: web::Json<MarkSubmittedRequest>,
) -> Result<HttpResponse, ApiError> {
	let job = state
		.engine
		.mark_swap_job_submitted(path.into_inner(), &request.encoded_signed_solana_tx)?;
	Ok(HttpResponse::Ok().json(job))
}

pub async fn finalize_swap_job(
	state: web::Data<AppState>,
	path: web::Path<JobId>,
	request: web::Json<FinalizeSwapRequest>,
) -> Result<HttpResponse, ApiError> {
	let FinalizeSwapRequest {
		signature,
		success,
		error,
	} = request.into_inner();
	let job = state
		.engine
		.finalize_swap_job(path.into_inner(), &signature, success, error)?;
	Ok(HttpResponse::Ok().json(job))
}

pub async fn cancel_swap_job(
	state: web::Data<AppState>,
	path: web::Path<JobId>,
	request: web::Json<CancelJobRequest>,
) -> Result<HttpResponse, ApiError> {
	let job = state
		.engine
		.cancel_swap_job(path.into_inner(), &request.reason)?;
	Ok(HttpResponse::Ok().json(job))
}

/// Report a Solana transaction outcome
///
/// Accepted for any signature, including payouts of jobs this service no
/// longer tracks.
pub async fn update_solana_transaction(
	state: web::Data<AppState>,
	request: web::Json<UpdateSolanaTransactionArgs>,
) -> Result<HttpResponse, ApiError> {
	let notification = state.engine.update_solana_transaction(request.into_inner())?;
	Ok(HttpResponse::Ok().json(notification))
}

pub async fn enqueue_icp_transfer(
	state: web::Data<AppState>,
	request: web::Json<IcpTransferRequest>,
	req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
	let job = state
		.engine
		.enqueue_icp_transfer(&caller(&req), request.into_inner())?;
	Ok(HttpResponse::Ok().json(job))
}

pub async fn get_icp_job(
	state: web::Data<AppState>,
	path: web::Path<JobId>,
) -> Result<HttpResponse, ApiError> {
	let id = path.into_inner();
	let job = state
		.query
		.get_icp_job(id)
		.ok_or(ApiError::NotFound { kind: "ICP", id })?;
	Ok(HttpResponse::Ok().json(job))
}

pub async fn get_icp_jobs_for_caller(
	state: web::Data<AppState>,
	req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
	let jobs = state.query.get_icp_jobs_for_caller(&caller(&req));
	Ok(HttpResponse::Ok().json(jobs))
}

pub async fn get_pending_icp_jobs(
	state: web::Data<AppState>,
	page: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
	let jobs = state.query.get_pending_icp_jobs(page.after, page.limit());
	Ok(HttpResponse::Ok().json(jobs))
}

/// Turn body and query extraction failures into the JSON error shape
pub fn json_error_handler(
	err: actix_web::error::JsonPayloadError,
	_req: &HttpRequest,
) -> actix_web::Error {
	ApiError::BadRequest(err.to_string()).into()
}

pub fn query_error_handler(
	err: actix_web::error::QueryPayloadError,
	_req: &HttpRequest,
) -> actix_web::Error {
	ApiError::BadRequest(err.to_string()).into()
}
