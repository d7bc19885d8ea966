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

//! Ferry SDK - shared types and client for the settlement job queue
//!
//! This crate provides the wire structures exchanged with the settlement
//! service, request fingerprinting, payout signing, and a typed HTTP client.
//!
//! The SDK is designed to be lightweight and embeddable:
//! - No background threads
//! - No runtime initialization
//! - No environment or configuration loading

pub mod client;
pub mod signing;
pub mod types;

pub use client::Client;
pub use signing::{
	PayoutMessage, PayoutSigner, SignedPayout, SigningError, is_payment_fingerprint,
	request_fingerprint, transfer_fingerprint,
};
pub use types::*;
