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

use ferry_sdk::{signing::SigningError, types::JobId};
use thiserror::Error;

use crate::{ledger::LedgerError, store::StoreError, validator::ValidationError};

/// Errors surfaced by the settlement engine
#[derive(Debug, Error)]
pub enum SettlementError {
	#[error("Validation error: {0}")]
	Validation(#[from] ValidationError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("Job {id} cannot {action} while {status}")]
	InvalidTransition {
		id: JobId,
		status: String,
		action: &'static str,
	},
	#[error("Job {id} has used all {attempts} submission attempts")]
	AttemptsExhausted { id: JobId, attempts: u32 },
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	#[error("Signing error: {0}")]
	Signing(#[from] SigningError),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl SettlementError {
	pub(crate) fn invalid_transition(
		id: JobId,
		status: impl ToString,
		action: &'static str,
	) -> Self {
		Self::InvalidTransition {
			id,
			status: status.to_string(),
			action,
		}
	}

	/// Lost an optimistic-concurrency race; re-read and retry
	pub fn is_conflict(&self) -> bool {
		matches!(self, SettlementError::Store(StoreError::Conflict { .. }))
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, SettlementError::Store(StoreError::NotFound(_)))
	}
}
