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

//! Read-only views over the job tables

use ferry_sdk::types::{
	ANONYMOUS_PRINCIPAL, IcpTransferJob, JobId, SwapJob, TransactionNotification,
};

use crate::store::JobStores;

/// Largest page returned by the pending listings
pub const MAX_PAGE_SIZE: usize = 100;

/// Query surface
///
/// Every read is a snapshot of committed records. Nothing here mutates a
/// table or touches the job log.
#[derive(Clone)]
pub struct QuerySurface {
	stores: JobStores,
}

impl QuerySurface {
	pub fn new(stores: JobStores) -> Self {
		Self { stores }
	}

	pub fn get_swap_job(&self, id: JobId) -> Option<SwapJob> {
		self.stores.swaps.get(id).ok()
	}

	/// Open swap jobs, oldest first
	pub fn get_pending_swap_jobs(&self, after: Option<JobId>, limit: usize) -> Vec<SwapJob> {
		self.stores.swaps.list_pending(after, clamp_page(limit))
	}

	pub fn get_icp_job(&self, id: JobId) -> Option<IcpTransferJob> {
		self.stores.icp.get(id).ok()
	}

	/// Transfers sent by or paying out to `principal`
	///
	/// The anonymous principal is shared by every unauthenticated caller, so
	/// it owns nothing here.
	pub fn get_icp_jobs_for_caller(&self, principal: &str) -> Vec<IcpTransferJob> {
		if principal == ANONYMOUS_PRINCIPAL {
			return Vec::new();
		}
		self.stores.icp.list_by(|job| {
			job.to_principal == principal || job.from_principal.as_deref() == Some(principal)
		})
	}

	pub fn get_pending_icp_jobs(&self, after: Option<JobId>, limit: usize) -> Vec<IcpTransferJob> {
		self.stores.icp.list_pending(after, clamp_page(limit))
	}

	pub fn get_solana_notification(&self, signature: &str) -> Option<TransactionNotification> {
		self.stores.notifications.get(signature)
	}
}

fn clamp_page(limit: usize) -> usize {
	limit.clamp(1, MAX_PAGE_SIZE)
}
