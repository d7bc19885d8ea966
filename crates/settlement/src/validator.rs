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

use std::collections::HashMap;

use ferry_sdk::types::{Chain, IcpTransferRequest, JobId, PaySide, SwapArgs, SwapIntent, TxId};
use thiserror::Error;

use crate::config::TokenConfig;

/// Error types for request validation
///
/// Raised before any job is created, so a rejected request never mutates
/// the store.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	#[error("Unknown token: {0}")]
	UnknownToken(String),
	#[error("Unsupported route: {pay} -> {receive}")]
	UnsupportedRoute { pay: String, receive: String },
	#[error("Missing field: {0}")]
	MissingField(&'static str),
	#[error("Invalid slippage {0}: must be between 0 and 100")]
	InvalidSlippage(f64),
	#[error("Signature timestamp {timestamp} is outside the accepted window (now {now})")]
	StaleSignature { timestamp: u64, now: u64 },
	#[error("Invalid payment: {0}")]
	InvalidPayment(String),
	#[error("No notification recorded for payment {0}")]
	UnknownPayment(String),
	#[error("Payment {0} is not confirmed on chain")]
	PaymentNotConfirmed(String),
	#[error("Payment {signature} already funded job {job_id}")]
	PaymentAlreadyUsed { signature: String, job_id: JobId },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}

/// Validates swap and transfer requests against the token registry
#[derive(Debug, Clone)]
pub struct SwapValidator {
	/// Registry keyed by lowercase symbol
	tokens: HashMap<String, TokenConfig>,
	max_signature_age_ms: u64,
}

impl SwapValidator {
	pub fn new(tokens: &[TokenConfig], max_signature_age_ms: u64) -> Self {
		Self {
			tokens: tokens
				.iter()
				.map(|t| (t.symbol.to_ascii_lowercase(), t.clone()))
				.collect(),
			max_signature_age_ms,
		}
	}

	/// Look up a token by symbol, ignoring case
	pub fn token(&self, symbol: &str) -> Result<&TokenConfig, ValidationError> {
		self.tokens
			.get(&symbol.to_ascii_lowercase())
			.ok_or_else(|| ValidationError::UnknownToken(symbol.to_string()))
	}

	/// Validate swap arguments and decode them into a payout intent
	///
	/// The receive side must be a Solana token: the swap queue settles by
	/// paying out on Solana. A Solana pay side is identified by the payment
	/// signature; whether that payment was actually observed is checked
	/// against the notification book by the engine.
	pub fn check_swap(
		&self,
		caller: &str,
		args: &SwapArgs,
		now_ms: u64,
	) -> Result<SwapIntent, ValidationError> {
		if args.pay_amount == 0 {
			return Err(ValidationError::InvalidAmount(
				"pay_amount must be greater than zero".to_string(),
			));
		}

		let pay = self.token(&args.pay_token)?;
		let receive = self.token(&args.receive_token)?;

		if pay.symbol == receive.symbol || receive.chain != Chain::Solana {
			return Err(ValidationError::UnsupportedRoute {
				pay: pay.symbol.clone(),
				receive: receive.symbol.clone(),
			});
		}

		let receive_amount = match args.receive_amount {
			Some(0) => {
				return Err(ValidationError::InvalidAmount(
					"receive_amount must be greater than zero".to_string(),
				));
			}
			Some(amount) => amount,
			None => return Err(ValidationError::MissingField("receive_amount")),
		};

		let receive_address = args
			.receive_address
			.as_deref()
			.map(str::trim)
			.filter(|a| !a.is_empty())
			.ok_or(ValidationError::MissingField("receive_address"))?;

		if let Some(slippage) = args.max_slippage
			&& !(0.0..=100.0).contains(&slippage)
		{
			return Err(ValidationError::InvalidSlippage(slippage));
		}

		if args.pay_signature.is_some() {
			let timestamp = args
				.timestamp
				.ok_or(ValidationError::MissingField("timestamp"))?;
			if timestamp.abs_diff(now_ms) > self.max_signature_age_ms {
				return Err(ValidationError::StaleSignature {
					timestamp,
					now: now_ms,
				});
			}
		}

		let pay_side = match (pay.chain, &args.pay_tx_id) {
			(Chain::Solana, Some(TxId::TransactionId(signature))) if !signature.is_empty() => {
				if args.pay_signature.is_none() {
					return Err(ValidationError::MissingField("pay_signature"));
				}
				PaySide::Solana {
					tx_signature: signature.clone(),
				}
			}
			(Chain::Solana, _) => {
				return Err(ValidationError::InvalidPayment(
					"Solana payments must reference a transaction signature".to_string(),
				));
			}
			(Chain::Ic, Some(TxId::TransactionId(_))) => {
				return Err(ValidationError::InvalidPayment(
					"IC payments are referenced by block index".to_string(),
				));
			}
			(Chain::Ic, Some(TxId::BlockIndex(index))) => PaySide::Ic {
				principal: caller.to_string(),
				block_index: Some(*index),
			},
			(Chain::Ic, None) => PaySide::Ic {
				principal: caller.to_string(),
				block_index: None,
			},
		};

		Ok(SwapIntent {
			payer: caller.to_string(),
			pay: pay_side,
			pay_token: pay.symbol.clone(),
			pay_amount: args.pay_amount,
			receive_token: receive.symbol.clone(),
			receive_amount,
			receive_address: receive_address.to_string(),
			max_slippage: args.max_slippage,
			referred_by: args.referred_by.clone(),
		})
	}

	/// Validate a transfer on the IC ledger
	pub fn check_transfer(&self, request: &IcpTransferRequest) -> Result<(), ValidationError> {
		if request.amount == 0 {
			return Err(ValidationError::InvalidAmount(
				"amount must be greater than zero".to_string(),
			));
		}
		if request.to_principal.trim().is_empty() {
			return Err(ValidationError::MissingField("to_principal"));
		}

		let token = self.token(&request.token)?;
		if token.chain != Chain::Ic {
			return Err(ValidationError::InvalidArgument(format!(
				"{} is not an IC token",
				token.symbol
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::default_tokens;

	const NOW: u64 = 1_700_000_000_000;

	fn validator() -> SwapValidator {
		SwapValidator::new(&default_tokens(), 300_000)
	}

	fn args() -> SwapArgs {
		SwapArgs {
			pay_token: "ksusdt".to_string(),
			pay_amount: 1000,
			receive_token: "sol".to_string(),
			receive_amount: Some(5),
			receive_address: Some("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".to_string()),
			..Default::default()
		}
	}

	#[test]
	fn test_ic_paid_swap_decodes_intent() {
		let intent = validator().check_swap("alice", &args(), NOW).unwrap();

		assert_eq!(intent.pay_token, "ksUSDT");
		assert_eq!(intent.receive_token, "SOL");
		assert_eq!(intent.receive_amount, 5);
		assert_eq!(
			intent.pay,
			PaySide::Ic {
				principal: "alice".to_string(),
				block_index: None
			}
		);
	}

	#[test]
	fn test_zero_amount_rejected() {
		let mut bad = args();
		bad.pay_amount = 0;
		assert!(matches!(
			validator().check_swap("alice", &bad, NOW),
			Err(ValidationError::InvalidAmount(_))
		));
	}

	#[test]
	fn test_missing_receive_address_rejected() {
		let mut bad = args();
		bad.receive_address = Some("   ".to_string());
		assert!(matches!(
			validator().check_swap("alice", &bad, NOW),
			Err(ValidationError::MissingField("receive_address"))
		));
	}

	#[test]
	fn test_payout_must_be_on_solana() {
		let mut bad = args();
		bad.receive_token = "ICP".to_string();
		assert!(matches!(
			validator().check_swap("alice", &bad, NOW),
			Err(ValidationError::UnsupportedRoute { .. })
		));
	}

	#[test]
	fn test_unknown_token_rejected() {
		let mut bad = args();
		bad.pay_token = "DOGE".to_string();
		assert!(matches!(
			validator().check_swap("alice", &bad, NOW),
			Err(ValidationError::UnknownToken(_))
		));
	}

	#[test]
	fn test_signature_requires_fresh_timestamp() {
		let mut signed = args();
		signed.pay_signature = Some("sig".to_string());
		assert!(matches!(
			validator().check_swap("alice", &signed, NOW),
			Err(ValidationError::MissingField("timestamp"))
		));

		signed.timestamp = Some(NOW - 600_000);
		assert!(matches!(
			validator().check_swap("alice", &signed, NOW),
			Err(ValidationError::StaleSignature { .. })
		));

		signed.timestamp = Some(NOW - 1_000);
		assert!(validator().check_swap("alice", &signed, NOW).is_ok());
	}

	#[test]
	fn test_solana_payment_needs_signature_reference() {
		let mut paid = args();
		paid.pay_token = "USDC".to_string();
		assert!(matches!(
			validator().check_swap("alice", &paid, NOW),
			Err(ValidationError::InvalidPayment(_))
		));

		paid.pay_tx_id = Some(TxId::TransactionId("5sig".to_string()));
		paid.pay_signature = Some("wallet-sig".to_string());
		paid.timestamp = Some(NOW);
		let intent = validator().check_swap("alice", &paid, NOW).unwrap();
		assert_eq!(
			intent.pay,
			PaySide::Solana {
				tx_signature: "5sig".to_string()
			}
		);
	}

	#[test]
	fn test_slippage_bounds() {
		let mut bad = args();
		bad.max_slippage = Some(150.0);
		assert!(matches!(
			validator().check_swap("alice", &bad, NOW),
			Err(ValidationError::InvalidSlippage(_))
		));
	}

	#[test]
	fn test_transfer_checks() {
		let validator = validator();
		let mut request = IcpTransferRequest {
			to_principal: "bob".to_string(),
			token: "icp".to_string(),
			amount: 10,
			memo: None,
		};
		assert!(validator.check_transfer(&request).is_ok());

		request.token = "SOL".to_string();
		assert!(validator.check_transfer(&request).is_err());

		request.token = "ICP".to_string();
		request.amount = 0;
		assert!(validator.check_transfer(&request).is_err());
	}
}
