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

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{IcpTransferRequest, JobId, SwapArgs, TxId};

/// Error types for signing operations
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Invalid encoding: {0}")]
	Encoding(String),
	#[error("Signature verification failed")]
	Verification,
}

const SOLANA_PAYMENT_PREFIX: &str = "solana:";
const IC_PAYMENT_PREFIX: &str = "ic:";

/// Compute the idempotency fingerprint of a swap request
///
/// A paid swap is identified by its payment alone, since one payment can
/// fund at most one payout: the signature of a Solana payment, or the
/// ledger and block index of an IC payment. Every other request hashes the
/// caller and the economic fields together with a time bucket, so a client
/// retrying the same request within `bucket_ms` maps to the same job.
pub fn request_fingerprint(caller: &str, args: &SwapArgs, bucket_ms: u64, now_ms: u64) -> String {
	let pay_token = args.pay_token.to_ascii_lowercase();
	match &args.pay_tx_id {
		Some(TxId::TransactionId(signature)) => {
			return format!("{}{}", SOLANA_PAYMENT_PREFIX, signature);
		}
		// Block indices are per ledger, so the token scopes them
		Some(TxId::BlockIndex(index)) => {
			return format!("{}{}:{}", IC_PAYMENT_PREFIX, pay_token, index);
		}
		None => {}
	}

	let timestamp = args.timestamp.unwrap_or(now_ms);
	let bucket = timestamp / bucket_ms.max(1);
	let pay_amount = args.pay_amount.to_string();
	let receive_token = args.receive_token.to_ascii_lowercase();
	let receive_amount = args.receive_amount.map(|a| a.to_string()).unwrap_or_default();
	let bucket = bucket.to_string();
	let parts: [&str; 7] = [
		caller,
		&pay_token,
		&pay_amount,
		&receive_token,
		&receive_amount,
		args.receive_address.as_deref().unwrap_or_default(),
		&bucket,
	];

	let mut hasher = Sha256::new();
	for part in parts {
		hasher.update(part.as_bytes());
		hasher.update([0x1f]);
	}

	format!("swap:{}", hex::encode(hasher.finalize()))
}

/// Whether `fingerprint` names a payment rather than a request
///
/// A payment fingerprint stays reserved for good, even by a failed job, so a
/// payment funds at most one swap.
pub fn is_payment_fingerprint(fingerprint: &str) -> bool {
	fingerprint.starts_with(SOLANA_PAYMENT_PREFIX) || fingerprint.starts_with(IC_PAYMENT_PREFIX)
}

/// Compute the idempotency fingerprint of an ICP transfer request
///
/// A memo names the transfer explicitly, so it replaces the time bucket.
pub fn transfer_fingerprint(
	from: &str,
	request: &IcpTransferRequest,
	bucket_ms: u64,
	now_ms: u64,
) -> String {
	let scope = match &request.memo {
		Some(memo) => format!("memo:{}", memo),
		None => format!("bucket:{}", now_ms / bucket_ms.max(1)),
	};

	let token = request.token.to_ascii_lowercase();
	let amount = request.amount.to_string();
	let parts: [&str; 5] = [from, &request.to_principal, &token, &amount, &scope];

	let mut hasher = Sha256::new();
	for part in parts {
		hasher.update(part.as_bytes());
		hasher.update([0x1f]);
	}

	format!("icp:{}", hex::encode(hasher.finalize()))
}

/// Canonical payout message signed by the settlement service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMessage {
	/// Deterministic reference the relay deduplicates on
	pub reference: String,
	pub job_id: JobId,
	pub recipient: String,
	pub token: String,
	pub amount: u64,
	pub attempt: u32,
}

/// Payout message with its ed25519 signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayout {
	pub message: PayoutMessage,
	/// Hex-encoded verifying key
	pub signer: String,
	/// Hex-encoded signature, doubling as the transaction signature
	pub signature: String,
}

impl SignedPayout {
	/// Encode for transport as an opaque string
	pub fn encode(&self) -> Result<String, SigningError> {
		let bytes =
			serde_json::to_vec(self).map_err(|e| SigningError::Serialization(e.to_string()))?;
		Ok(hex::encode(bytes))
	}

	/// Decode a payout produced by [`SignedPayout::encode`]
	pub fn decode(encoded: &str) -> Result<Self, SigningError> {
		let bytes = hex::decode(encoded).map_err(|e| SigningError::Encoding(e.to_string()))?;
		serde_json::from_slice(&bytes).map_err(|e| SigningError::Encoding(e.to_string()))
	}

	/// Verify the signature against the embedded signer key
	pub fn verify(&self) -> Result<(), SigningError> {
		let key_bytes: [u8; 32] = hex::decode(&self.signer)
			.map_err(|e| SigningError::InvalidKey(e.to_string()))?
			.try_into()
			.map_err(|_| SigningError::InvalidKey("expected 32 bytes".to_string()))?;
		let key = VerifyingKey::from_bytes(&key_bytes)
			.map_err(|e| SigningError::InvalidKey(e.to_string()))?;

		let sig_bytes =
			hex::decode(&self.signature).map_err(|e| SigningError::Encoding(e.to_string()))?;
		let signature =
			Signature::from_slice(&sig_bytes).map_err(|e| SigningError::Encoding(e.to_string()))?;

		let payload = serde_json::to_vec(&self.message)
			.map_err(|e| SigningError::Serialization(e.to_string()))?;
		key.verify(&payload, &signature)
			.map_err(|_| SigningError::Verification)
	}
}

/// Signs payout messages with the service's ed25519 key
pub struct PayoutSigner {
	key: SigningKey,
}

impl PayoutSigner {
	/// Load a signer from a hex-encoded 32-byte seed
	pub fn from_seed_hex(seed: &str) -> Result<Self, SigningError> {
		let bytes: [u8; 32] = hex::decode(seed.trim())
			.map_err(|e| SigningError::InvalidKey(e.to_string()))?
			.try_into()
			.map_err(|_| SigningError::InvalidKey("seed must be 32 bytes".to_string()))?;
		Ok(Self {
			key: SigningKey::from_bytes(&bytes),
		})
	}

	/// Generate a fresh signer
	pub fn generate() -> Self {
		Self {
			key: SigningKey::generate(&mut OsRng),
		}
	}

	pub fn public_key_hex(&self) -> String {
		hex::encode(self.key.verifying_key().as_bytes())
	}

	pub fn sign(&self, message: PayoutMessage) -> Result<SignedPayout, SigningError> {
		let payload =
			serde_json::to_vec(&message).map_err(|e| SigningError::Serialization(e.to_string()))?;
		let signature = self.key.sign(&payload);

		Ok(SignedPayout {
			message,
			signer: self.public_key_hex(),
			signature: hex::encode(signature.to_bytes()),
		})
	}
}
