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

use std::{
	net::{Ipv4Addr, SocketAddr, SocketAddrV4},
	path::PathBuf,
	time::Duration,
};

use ferry_sdk::types::Chain;
use serde::{Deserialize, Serialize};

use crate::{engine::EngineConfig, sweeper::SweeperConfig};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "settlement";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Server configuration constants
/// Default HTTP port (can be overridden by SETTLEMENT_BIND_ADDR)
pub const DEFAULT_PORT: u16 = 8090;

/// Default number of HTTP workers (can be overridden by SETTLEMENT_WORKERS)
pub const DEFAULT_WORKERS: usize = 4;

/// Default directory holding the job log (can be overridden by SETTLEMENT_DATA_DIR)
pub const DEFAULT_DATA_DIR: &str = "data/settlement";

/// File name of the job log inside the data directory
pub const JOB_LOG_FILE: &str = "jobs.log";

// Settlement policy constants
/// Default submission attempts per job (can be overridden by SETTLEMENT_MAX_ATTEMPTS)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default time a job may stay Submitted / InProgress before it is reconciled
pub const DEFAULT_SUBMITTED_TIMEOUT_MS: u64 = 120_000;

/// Default width of the idempotency time bucket
pub const DEFAULT_FINGERPRINT_BUCKET_MS: u64 = 60_000;

/// Default maximum age of a signed swap request timestamp
pub const DEFAULT_MAX_SIGNATURE_AGE_MS: u64 = 300_000;

// Sweeper constants
/// Default interval between sweeps (can be overridden by SETTLEMENT_SWEEP_INTERVAL_MS)
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;

/// Default number of jobs examined per table and sweep
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

// Ledger adapter constants
/// Default Solana relay endpoint
pub const DEFAULT_SOLANA_RELAY_URL: &str = "http://localhost:8899";

/// Default IC ledger bridge endpoint
pub const DEFAULT_IC_LEDGER_URL: &str = "http://localhost:4943";

/// Default ledger request timeout in milliseconds
pub const DEFAULT_LEDGER_TIMEOUT_MS: u64 = 10_000;

/// A token the service settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
	pub symbol: String,
	pub chain: Chain,
	pub decimals: u8,
}

impl TokenConfig {
	fn new(symbol: &str, chain: Chain, decimals: u8) -> Self {
		Self {
			symbol: symbol.to_string(),
			chain,
			decimals,
		}
	}
}

pub fn default_tokens() -> Vec<TokenConfig> {
	vec![
		TokenConfig::new("ICP", Chain::Ic, 8),
		TokenConfig::new("ckUSDT", Chain::Ic, 6),
		TokenConfig::new("ksUSDT", Chain::Ic, 6),
		TokenConfig::new("SOL", Chain::Solana, 9),
		TokenConfig::new("USDC", Chain::Solana, 6),
	]
}

/// Settlement service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
	/// HTTP server bind address
	pub bind_addr: SocketAddr,
	/// Number of HTTP worker threads
	pub workers: usize,
	/// Directory holding the job log
	pub data_dir: PathBuf,
	/// Submission attempts per job before it fails
	pub max_attempts: u32,
	pub submitted_timeout_ms: u64,
	pub fingerprint_bucket_ms: u64,
	pub max_signature_age_ms: u64,
	/// Queue a refund transfer when an IC-paid swap fails
	pub refund_failed_swaps: bool,
	pub sweep_interval_ms: u64,
	pub sweep_batch_size: usize,
	pub solana_relay_url: String,
	pub ic_ledger_url: String,
	pub ledger_timeout_ms: u64,
	/// Hex-encoded ed25519 seed used to sign payouts; a key is generated
	/// when absent
	pub payout_signing_key: Option<String>,
	pub tokens: Vec<TokenConfig>,
}

impl Default for SettlementConfig {
	fn default() -> Self {
		Self {
			bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
			workers: DEFAULT_WORKERS,
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			submitted_timeout_ms: DEFAULT_SUBMITTED_TIMEOUT_MS,
			fingerprint_bucket_ms: DEFAULT_FINGERPRINT_BUCKET_MS,
			max_signature_age_ms: DEFAULT_MAX_SIGNATURE_AGE_MS,
			refund_failed_swaps: true,
			sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
			sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
			solana_relay_url: DEFAULT_SOLANA_RELAY_URL.to_string(),
			ic_ledger_url: DEFAULT_IC_LEDGER_URL.to_string(),
			ledger_timeout_ms: DEFAULT_LEDGER_TIMEOUT_MS,
			payout_signing_key: None,
			tokens: default_tokens(),
		}
	}
}

impl SettlementConfig {
	/// Load configuration from environment variables
	///
	/// Keys use the `SETTLEMENT_` prefix, e.g. `SETTLEMENT_MAX_ATTEMPTS=5`.
	pub fn from_env() -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(environment())
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(environment())
			.build()?;

		cfg.try_deserialize()
	}

	pub fn job_log_path(&self) -> PathBuf {
		self.data_dir.join(JOB_LOG_FILE)
	}

	pub fn ledger_timeout(&self) -> Duration {
		Duration::from_millis(self.ledger_timeout_ms)
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			max_attempts: self.max_attempts,
			submitted_timeout_ms: self.submitted_timeout_ms,
			fingerprint_bucket_ms: self.fingerprint_bucket_ms,
			refund_failed_swaps: self.refund_failed_swaps,
			sweep_batch_size: self.sweep_batch_size,
		}
	}

	pub fn sweeper_config(&self) -> SweeperConfig {
		SweeperConfig {
			interval: Duration::from_millis(self.sweep_interval_ms),
		}
	}
}

fn environment() -> config::Environment {
	config::Environment::with_prefix("SETTLEMENT")
		.prefix_separator("_")
		.separator("__")
		.try_parsing(true)
}
