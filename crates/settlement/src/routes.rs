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

use actix_web::web;

use crate::handlers;

/// Configure API routes for the settlement service
///
/// - `/api/v1/swap`, `/api/v1/swap_jobs/...` - swap jobs
/// - `/api/v1/solana/transactions` - Solana transaction reports
/// - `/api/v1/icp_jobs/...` - ICP transfer jobs
/// - `/health` - Health check endpoint
///
/// Fixed segments (`pending`, `mine`) are registered ahead of `{id}`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
	cfg.service(
		web::scope("/api/v1")
			.route("/swap", web::post().to(handlers::swap))
			.route(
				"/swap_jobs/pending",
				web::get().to(handlers::get_pending_swap_jobs),
			)
			.route("/swap_jobs/{id}", web::get().to(handlers::get_swap_job))
			.route(
				"/swap_jobs/{id}/submitted",
				web::post().to(handlers::mark_swap_job_submitted),
			)
			.route(
				"/swap_jobs/{id}/finalize",
				web::post().to(handlers::finalize_swap_job),
			)
			.route(
				"/swap_jobs/{id}/cancel",
				web::post().to(handlers::cancel_swap_job),
			)
			.route(
				"/solana/transactions",
				web::post().to(handlers::update_solana_transaction),
			)
			.route("/icp_jobs", web::post().to(handlers::enqueue_icp_transfer))
			.route("/icp_jobs/mine", web::get().to(handlers::get_icp_jobs_for_caller))
			.route(
				"/icp_jobs/pending",
				web::get().to(handlers::get_pending_icp_jobs),
			)
			.route("/icp_jobs/{id}", web::get().to(handlers::get_icp_job)),
	)
	.route("/health", web::get().to(handlers::health));
}
