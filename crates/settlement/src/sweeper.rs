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

use std::{sync::Arc, time::Duration};

use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::engine::SettlementEngine;

/// Sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
	/// Delay between two sweeps
	pub interval: Duration,
}

/// Background task driving [`SettlementEngine::sweep`] on an interval
///
/// A sweep in progress is allowed to finish before shutdown returns; ticks
/// missed while a sweep runs long are skipped rather than bunched up.
pub struct Sweeper {
	handle: JoinHandle<()>,
	shutdown: watch::Sender<bool>,
}

impl Sweeper {
	pub fn start(engine: Arc<SettlementEngine>, config: SweeperConfig) -> Self {
		let (shutdown, mut stop) = watch::channel(false);

		info!(
			target: "sweeper",
			interval_ms = config.interval.as_millis() as u64,
			"Starting sweeper"
		);

		let handle = tokio::spawn(async move {
			let mut ticker = time::interval(config.interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let report = engine.sweep().await;
						if report.errors > 0 {
							warn!(target: "sweeper", ?report, "Sweep finished with errors");
						}
					}
					changed = stop.changed() => {
						if changed.is_err() || *stop.borrow() {
							break;
						}
					}
				}
			}

			debug!(target: "sweeper", "Sweeper loop exited");
		});

		Self { handle, shutdown }
	}

	/// Stop the loop and wait for the current sweep to finish
	pub async fn shutdown(self) {
		let _ = self.shutdown.send(true);
		if let Err(e) = self.handle.await {
			warn!(target: "sweeper", error = %e, "Sweeper task ended abnormally");
		}
		info!(target: "sweeper", "Sweeper stopped");
	}
}
