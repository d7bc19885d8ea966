mod common;

use actix_web::{App, http::StatusCode, test};
use ferry_sdk::{
	client::CALLER_HEADER,
	types::{
		ANONYMOUS_PRINCIPAL, ErrorResponse, FinalizeSwapRequest, IcpTransferJob, IcpTransferRequest,
		MarkSubmittedRequest, QueuedSwapReply, SwapJob, SwapJobStatus, TransactionNotification,
		TransactionStatus, UpdateSolanaTransactionArgs,
	},
};
use ferry_settlement::server::{AppState, configure_app};

use common::{Harness, PAYER, ic_swap_args, test_config};

#[actix_web::test]
async fn test_health() {
	let harness = Harness::new(test_config(3));
	let app = test::init_service(
		App::new().configure(configure_app(AppState::new(harness.engine.clone()))),
	)
	.await;

	let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
	assert_eq!(resp.status(), StatusCode::OK);
	let body: serde_json::Value = test::read_body_json(resp).await;
	assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_swap_lifecycle_over_http() {
	let harness = Harness::new(test_config(3));
	let app = test::init_service(
		App::new().configure(configure_app(AppState::new(harness.engine.clone()))),
	)
	.await;

	let req = test::TestRequest::post()
		.uri("/api/v1/swap")
		.insert_header((CALLER_HEADER, PAYER))
		.set_json(ic_swap_args(1000, Some(4)))
		.to_request();
	let reply: QueuedSwapReply = test::call_and_read_body_json(&app, req).await;
	assert_eq!(reply.status, SwapJobStatus::Pending);
	let id = reply.job_id;

	let req = test::TestRequest::get()
		.uri(&format!("/api/v1/swap_jobs/{}", id))
		.to_request();
	let job: SwapJob = test::call_and_read_body_json(&app, req).await;
	assert_eq!(job.caller, PAYER);

	let req = test::TestRequest::get()
		.uri("/api/v1/swap_jobs/pending?limit=10")
		.to_request();
	let pending: Vec<SwapJob> = test::call_and_read_body_json(&app, req).await;
	assert_eq!(pending.len(), 1);

	let req = test::TestRequest::post()
		.uri(&format!("/api/v1/swap_jobs/{}/submitted", id))
		.set_json(MarkSubmittedRequest {
			encoded_signed_solana_tx: "0xsignedtx".to_string(),
		})
		.to_request();
	let job: SwapJob = test::call_and_read_body_json(&app, req).await;
	assert_eq!(job.status, SwapJobStatus::Submitted);

	// Cancelling a submitted job is a conflict
	let req = test::TestRequest::post()
		.uri(&format!("/api/v1/swap_jobs/{}/cancel", id))
		.set_json(serde_json::json!({ "reason": "changed my mind" }))
		.to_request();
	let resp = test::call_service(&app, req).await;
	assert_eq!(resp.status(), StatusCode::CONFLICT);
	let body: ErrorResponse = test::read_body_json(resp).await;
	assert!(!body.error.is_empty());

	let finalize = FinalizeSwapRequest {
		signature: "sig123".to_string(),
		success: true,
		error: None,
	};
	let mut records = Vec::new();
	for _ in 0..2 {
		let req = test::TestRequest::post()
			.uri(&format!("/api/v1/swap_jobs/{}/finalize", id))
			.set_json(&finalize)
			.to_request();
		let job: SwapJob = test::call_and_read_body_json(&app, req).await;
		records.push(job);
	}
	assert_eq!(records[0], records[1]);
	assert_eq!(records[0].status, SwapJobStatus::Confirmed);
}

#[actix_web::test]
async fn test_error_statuses() {
	let harness = Harness::new(test_config(3));
	let app = test::init_service(
		App::new().configure(configure_app(AppState::new(harness.engine.clone()))),
	)
	.await;

	let req = test::TestRequest::get()
		.uri("/api/v1/swap_jobs/999")
		.to_request();
	let resp = test::call_service(&app, req).await;
	assert_eq!(resp.status(), StatusCode::NOT_FOUND);
	let body: ErrorResponse = test::read_body_json(resp).await;
	assert!(body.error.contains("999"));

	let req = test::TestRequest::post()
		.uri("/api/v1/swap_jobs/999/finalize")
		.set_json(FinalizeSwapRequest {
			signature: "sig".to_string(),
			success: true,
			error: None,
		})
		.to_request();
	assert_eq!(
		test::call_service(&app, req).await.status(),
		StatusCode::NOT_FOUND
	);

	// Unknown token fails validation
	let mut args = ic_swap_args(1000, None);
	args.pay_token = "DOGE".to_string();
	let req = test::TestRequest::post()
		.uri("/api/v1/swap")
		.set_json(args)
		.to_request();
	assert_eq!(
		test::call_service(&app, req).await.status(),
		StatusCode::BAD_REQUEST
	);

	// Malformed bodies get the same error shape
	let req = test::TestRequest::post()
		.uri("/api/v1/swap")
		.insert_header(("content-type", "application/json"))
		.set_payload("{\"pay_token\": 5}")
		.to_request();
	let resp = test::call_service(&app, req).await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	let body: ErrorResponse = test::read_body_json(resp).await;
	assert!(body.error.starts_with("Invalid request"));

	// Duplicate swap
	let req = test::TestRequest::post()
		.uri("/api/v1/swap")
		.set_json(ic_swap_args(1000, Some(1)))
		.to_request();
	assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
	let req = test::TestRequest::post()
		.uri("/api/v1/swap")
		.set_json(ic_swap_args(1000, Some(1)))
		.to_request();
	assert_eq!(
		test::call_service(&app, req).await.status(),
		StatusCode::CONFLICT
	);
}

#[actix_web::test]
async fn test_icp_jobs_scoped_to_caller() {
	let harness = Harness::new(test_config(3));
	let app = test::init_service(
		App::new().configure(configure_app(AppState::new(harness.engine.clone()))),
	)
	.await;

	let req = test::TestRequest::post()
		.uri("/api/v1/icp_jobs")
		.insert_header((CALLER_HEADER, PAYER))
		.set_json(IcpTransferRequest {
			to_principal: "receiver-principal".to_string(),
			token: "ICP".to_string(),
			amount: 42,
			memo: None,
		})
		.to_request();
	let job: IcpTransferJob = test::call_and_read_body_json(&app, req).await;

	let req = test::TestRequest::get()
		.uri(&format!("/api/v1/icp_jobs/{}", job.id))
		.to_request();
	let fetched: IcpTransferJob = test::call_and_read_body_json(&app, req).await;
	assert_eq!(fetched, job);

	let req = test::TestRequest::get()
		.uri("/api/v1/icp_jobs/mine")
		.insert_header((CALLER_HEADER, "receiver-principal"))
		.to_request();
	let mine: Vec<IcpTransferJob> = test::call_and_read_body_json(&app, req).await;
	assert_eq!(mine.len(), 1);

	// A transfer enqueued without a caller header belongs to nobody
	let req = test::TestRequest::post()
		.uri("/api/v1/icp_jobs")
		.set_json(IcpTransferRequest {
			to_principal: "receiver-principal".to_string(),
			token: "ICP".to_string(),
			amount: 7,
			memo: Some("anonymous".to_string()),
		})
		.to_request();
	let anonymous: IcpTransferJob = test::call_and_read_body_json(&app, req).await;
	assert_eq!(anonymous.from_principal.as_deref(), Some(ANONYMOUS_PRINCIPAL));

	let req = test::TestRequest::get().uri("/api/v1/icp_jobs/mine").to_request();
	let mine: Vec<IcpTransferJob> = test::call_and_read_body_json(&app, req).await;
	assert!(mine.is_empty());

	let req = test::TestRequest::get()
		.uri("/api/v1/icp_jobs/pending?after=0&limit=500")
		.to_request();
	let pending: Vec<IcpTransferJob> = test::call_and_read_body_json(&app, req).await;
	assert_eq!(pending.len(), 2);
}

#[actix_web::test]
async fn test_solana_report_for_unknown_job() {
	let harness = Harness::new(test_config(3));
	let app = test::init_service(
		App::new().configure(configure_app(AppState::new(harness.engine.clone()))),
	)
	.await;

	let req = test::TestRequest::post()
		.uri("/api/v1/solana/transactions")
		.set_json(UpdateSolanaTransactionArgs {
			signature: "ghost".to_string(),
			status: TransactionStatus::Finalized,
			job_id: Some(12),
			metadata: None,
			error_message: None,
		})
		.to_request();
	let notification: TransactionNotification = test::call_and_read_body_json(&app, req).await;
	assert_eq!(notification.status, TransactionStatus::Finalized);
}
