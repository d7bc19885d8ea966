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

//! Ferry Settlement Service
//!
//! This crate settles cross-chain swaps between the Internet Computer and
//! Solana through a durable job queue. Every swap becomes a job that moves
//! through an explicit state machine, with bounded retries, idempotent
//! finalization and a write-ahead job log for crash recovery.
//!
//! Architecture:
//! - Job Store: per-key serialized table of jobs with optimistic concurrency
//! - Job Log: append-only persistence replayed on startup
//! - Settlement Engine: the state machine driving jobs across the rails
//! - Ledger Adapters: I/O boundary to the Solana relay and the IC ledger
//! - Sweeper: periodic driver that re-submits and reconciles stale jobs
//! - Query Surface and HTTP server: read access and the external API

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod notifications;
pub mod query;
pub mod recovery;
pub mod routes;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod validator;

pub use engine::{EngineConfig, SettlementEngine, SweepReport};
pub use error::SettlementError;
pub use journal::{FileJobLog, JobLog, LogEntry, LogRecord, MemoryJobLog};
pub use ledger::{
	IcLedgerAdapter, LedgerAdapter, LedgerError, LedgerErrorKind, LedgerOutcome, LedgerPayload,
	SolanaRelayAdapter, SubmitReceipt,
};
pub use notifications::NotificationBook;
pub use query::QuerySurface;
pub use recovery::{RecoveredState, RecoveryCoordinator};
pub use store::{JobRecord, JobStore, JobStores, StoreError};
pub use sweeper::{Sweeper, SweeperConfig};
pub use validator::{SwapValidator, ValidationError};
