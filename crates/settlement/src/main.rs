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

//! Settlement service entry point
//!
//! This binary wires up all components of the settlement service:
//! - Job Log (write-ahead persistence)
//! - Job Stores (swap jobs, ICP transfer jobs, Solana notifications)
//! - Recovery (log replay into the stores)
//! - Ledger Adapters (Solana relay, IC ledger bridge)
//! - Settlement Engine (job state machine)
//! - Sweeper (periodic submit and reconcile)
//! - HTTP Server (external API)

use std::sync::Arc;

use anyhow::{Context, Result};
use ferry_sdk::PayoutSigner;
use tracing::{info, warn};

use ferry_settlement::{
	FileJobLog, IcLedgerAdapter, JobLog, JobStores, RecoveryCoordinator, SettlementEngine,
	SolanaRelayAdapter, SwapValidator, Sweeper, config::SettlementConfig,
	logging::init_logging, server::SettlementServer,
};

/// Path of an optional configuration file
const CONFIG_PATH_VAR: &str = "SETTLEMENT_CONFIG";

#[actix_web::main]
async fn main() -> Result<()> {
	// Initialize logging first
	init_logging()?;

	let config = load_config()?;
	info!(target: "server", "Starting Ferry Settlement");
	info!(target: "server", "Listening on: {}", config.bind_addr);
	info!(target: "server", "Job log: {}", config.job_log_path().display());
	info!(target: "server", "Max attempts: {}", config.max_attempts);

	// Phase 1: Open the job log and replay it
	let log: Arc<dyn JobLog> = Arc::new(
		FileJobLog::open(config.job_log_path()).context("Failed to open job log")?,
	);
	let stores = JobStores::new(log.clone());
	let recovered = RecoveryCoordinator::new(log)
		.recover(&stores)
		.context("Failed to recover job state")?;
	if !recovered.is_clean_start() {
		info!(
			target: "server",
			"Recovered {} swap jobs and {} ICP jobs up to seq={}",
			recovered.swap_jobs, recovered.icp_jobs, recovered.last_seq
		);
	}

	// Phase 2: Ledger adapters
	let solana = SolanaRelayAdapter::new(&config.solana_relay_url, config.ledger_timeout())
		.context("Failed to build Solana relay adapter")?;
	let ic = IcLedgerAdapter::new(&config.ic_ledger_url, config.ledger_timeout())
		.context("Failed to build IC ledger adapter")?;

	// Phase 3: Settlement engine
	let signer = match &config.payout_signing_key {
		Some(seed) => PayoutSigner::from_seed_hex(seed).context("Invalid payout signing key")?,
		None => {
			warn!(
				target: "server",
				"No payout signing key configured, generating an ephemeral one"
			);
			PayoutSigner::generate()
		}
	};
	let validator = SwapValidator::new(&config.tokens, config.max_signature_age_ms);
	let engine = Arc::new(SettlementEngine::new(
		stores,
		Arc::new(solana),
		Arc::new(ic),
		signer,
		validator,
		config.engine_config(),
	));

	// Refunds owed by swaps that failed just before a crash
	let refunds = engine.ensure_refunds();
	if refunds > 0 {
		info!(target: "server", "Queued {} missing refunds", refunds);
	}

	// Phase 4: Sweeper
	let sweeper = Sweeper::start(engine.clone(), config.sweeper_config());

	// Phase 5: HTTP server, runs until Ctrl-C
	let result = SettlementServer::new(engine, config.workers)
		.serve(config.bind_addr)
		.await;

	info!(target: "server", "Shutting down components...");
	sweeper.shutdown().await;
	result.context("HTTP server error")?;

	info!(target: "server", "Shutdown complete");
	Ok(())
}

fn load_config() -> Result<SettlementConfig> {
	match std::env::var(CONFIG_PATH_VAR) {
		Ok(path) => SettlementConfig::from_file(&path)
			.with_context(|| format!("Failed to load configuration from {}", path)),
		Err(_) => Ok(SettlementConfig::from_env().unwrap_or_else(|e| {
			warn!(
				target: "server",
				error = %e,
				"Invalid SETTLEMENT_* environment, using default configuration"
			);
			SettlementConfig::default()
		})),
	}
}
