#![allow(dead_code)]

use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use async_trait::async_trait;
use ferry_sdk::{
	PayoutSigner,
	types::{Chain, SwapArgs, TxId},
};
use ferry_settlement::{
	EngineConfig, JobStores, LedgerAdapter, LedgerError, LedgerOutcome, LedgerPayload,
	MemoryJobLog, SettlementEngine, SubmitReceipt, SwapValidator, config::default_tokens,
};

pub const PAYER: &str = "payer-principal";
pub const RECEIVER: &str = "5oNDL3swdJJF1g9DzJiZ4ynHXgszjAEpUkxVYejchzrY";

/// Ledger double with scripted answers
///
/// Scripted results are consumed in order; once a script runs dry the
/// fallback answer is used. Every call is counted.
pub struct MockLedger {
	chain: Chain,
	submits: Mutex<VecDeque<Result<SubmitReceipt, LedgerError>>>,
	polls: Mutex<VecDeque<Result<LedgerOutcome, LedgerError>>>,
	fallback_submit: Mutex<Result<SubmitReceipt, LedgerError>>,
	pub submit_calls: AtomicUsize,
	pub poll_calls: AtomicUsize,
	pub payloads: Mutex<Vec<LedgerPayload>>,
}

impl MockLedger {
	pub fn new(chain: Chain) -> Self {
		let fallback = Ok(SubmitReceipt {
			reference: String::new(),
			tx_id: None,
			block_index: match chain {
				Chain::Ic => Some(1),
				Chain::Solana => None,
			},
		});
		Self {
			chain,
			submits: Mutex::new(VecDeque::new()),
			polls: Mutex::new(VecDeque::new()),
			fallback_submit: Mutex::new(fallback),
			submit_calls: AtomicUsize::new(0),
			poll_calls: AtomicUsize::new(0),
			payloads: Mutex::new(Vec::new()),
		}
	}

	/// Answer every unscripted submit with `result`
	pub fn always_submit(&self, result: Result<SubmitReceipt, LedgerError>) {
		*self.fallback_submit.lock().unwrap() = result;
	}

	pub fn push_submit(&self, result: Result<SubmitReceipt, LedgerError>) {
		self.submits.lock().unwrap().push_back(result);
	}

	pub fn push_poll(&self, result: Result<LedgerOutcome, LedgerError>) {
		self.polls.lock().unwrap().push_back(result);
	}

	pub fn submits(&self) -> usize {
		self.submit_calls.load(Ordering::SeqCst)
	}

	pub fn polls(&self) -> usize {
		self.poll_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl LedgerAdapter for MockLedger {
	fn chain(&self) -> Chain {
		self.chain
	}

	async fn submit(&self, payload: &LedgerPayload) -> Result<SubmitReceipt, LedgerError> {
		self.submit_calls.fetch_add(1, Ordering::SeqCst);
		self.payloads.lock().unwrap().push(payload.clone());

		let scripted = self.submits.lock().unwrap().pop_front();
		let result = scripted.unwrap_or_else(|| self.fallback_submit.lock().unwrap().clone());
		result.map(|mut receipt| {
			receipt.reference = payload.reference().to_string();
			receipt
		})
	}

	async fn poll_status(&self, _reference: &str) -> Result<LedgerOutcome, LedgerError> {
		self.poll_calls.fetch_add(1, Ordering::SeqCst);
		self.polls
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(Ok(LedgerOutcome::NotFound))
	}
}

pub struct Harness {
	pub engine: Arc<SettlementEngine>,
	pub solana: Arc<MockLedger>,
	pub ic: Arc<MockLedger>,
	pub log: Arc<MemoryJobLog>,
}

impl Harness {
	pub fn new(config: EngineConfig) -> Self {
		let log = Arc::new(MemoryJobLog::new());
		let solana = Arc::new(MockLedger::new(Chain::Solana));
		let ic = Arc::new(MockLedger::new(Chain::Ic));
		let engine = build_engine(
			JobStores::new(log.clone()),
			solana.clone(),
			ic.clone(),
			config,
		);
		Self {
			engine,
			solana,
			ic,
			log,
		}
	}
}

/// Engine over existing stores, e.g. ones rebuilt from a log
pub fn build_engine(
	stores: JobStores,
	solana: Arc<dyn LedgerAdapter>,
	ic: Arc<dyn LedgerAdapter>,
	config: EngineConfig,
) -> Arc<SettlementEngine> {
	Arc::new(SettlementEngine::new(
		stores,
		solana,
		ic,
		PayoutSigner::generate(),
		SwapValidator::new(&default_tokens(), 300_000),
		config,
	))
}

/// Engine policy for tests: claims go stale immediately
pub fn test_config(max_attempts: u32) -> EngineConfig {
	EngineConfig {
		max_attempts,
		submitted_timeout_ms: 0,
		..EngineConfig::default()
	}
}

/// ksUSDT on the IC paid out as USDC on Solana
pub fn ic_swap_args(pay_amount: u64, block_index: Option<u64>) -> SwapArgs {
	SwapArgs {
		pay_token: "ksusdt".to_string(),
		pay_amount,
		pay_tx_id: block_index.map(TxId::BlockIndex),
		receive_token: "USDC".to_string(),
		receive_amount: Some(pay_amount - 1),
		receive_address: Some(RECEIVER.to_string()),
		// Pins the fingerprint bucket
		timestamp: Some(1_700_000_000_000),
		..SwapArgs::default()
	}
}

/// SOL paid on Solana, received as USDC
pub fn solana_swap_args(payment_signature: &str) -> SwapArgs {
	SwapArgs {
		pay_token: "SOL".to_string(),
		pay_amount: 2_000_000,
		pay_tx_id: Some(TxId::TransactionId(payment_signature.to_string())),
		receive_token: "USDC".to_string(),
		receive_amount: Some(300),
		receive_address: Some(RECEIVER.to_string()),
		pay_signature: Some("wallet-signature".to_string()),
		timestamp: Some(chrono::Utc::now().timestamp_millis() as u64),
		..SwapArgs::default()
	}
}
