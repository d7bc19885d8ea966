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

//! HTTP server for the settlement service

use std::{net::SocketAddr, sync::Arc};

use actix_web::{App, HttpServer, web};
use tracing::info;

use crate::{
	engine::SettlementEngine,
	handlers::{json_error_handler, query_error_handler},
	query::QuerySurface,
	routes::configure_routes,
};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<SettlementEngine>,
	pub query: QuerySurface,
}

impl AppState {
	pub fn new(engine: Arc<SettlementEngine>) -> Self {
		let query = QuerySurface::new(engine.stores().clone());
		Self { engine, query }
	}
}

/// Register state, extractor config and routes on an app
///
/// Shared by the server and the HTTP tests so both see the same surface.
pub fn configure_app(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
	move |cfg| {
		cfg.app_data(web::Data::new(state))
			.app_data(web::JsonConfig::default().error_handler(json_error_handler))
			.app_data(web::QueryConfig::default().error_handler(query_error_handler))
			.configure(configure_routes);
	}
}

/// Settlement HTTP server
pub struct SettlementServer {
	state: AppState,
	workers: usize,
}

impl SettlementServer {
	pub fn new(engine: Arc<SettlementEngine>, workers: usize) -> Self {
		Self {
			state: AppState::new(engine),
			workers: workers.max(1),
		}
	}

	/// Bind and serve until the server is stopped (Ctrl-C by default)
	pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
		let state = self.state;
		info!(target: "server", %addr, workers = self.workers, "Settlement API listening");

		HttpServer::new(move || App::new().configure(configure_app(state.clone())))
			.workers(self.workers)
			.bind(addr)?
			.run()
			.await
	}
}
