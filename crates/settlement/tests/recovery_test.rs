mod common;

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use ferry_sdk::types::{
	Chain, IcpTransferStatus, SwapJobStatus, TransactionStatus, UpdateSolanaTransactionArgs,
};
use ferry_settlement::{
	EngineConfig, FileJobLog, JobLog, JobStores, LedgerError, LedgerOutcome, LogRecord,
	MemoryJobLog, RecoveryCoordinator, SettlementError, StoreError,
};

use common::{
	Harness, MockLedger, PAYER, build_engine, ic_swap_args, solana_swap_args, test_config,
};

fn temp_log_path() -> PathBuf {
	std::env::temp_dir()
		.join(format!("ferry-recovery-{}", uuid::Uuid::new_v4()))
		.join("jobs.log")
}

fn open_stores(path: &Path) -> (Arc<dyn JobLog>, JobStores) {
	let log: Arc<dyn JobLog> = Arc::new(FileJobLog::open(path).unwrap());
	let stores = JobStores::new(log.clone());
	(log, stores)
}

fn ledgers() -> (Arc<MockLedger>, Arc<MockLedger>) {
	(
		Arc::new(MockLedger::new(Chain::Solana)),
		Arc::new(MockLedger::new(Chain::Ic)),
	)
}

#[tokio::test]
async fn test_crash_recovery_from_file_log() {
	let path = temp_log_path();

	// Phase 1: run the service and leave jobs in every state
	let (confirmed, in_flight, failed, pending, transfer) = {
		let (_log, stores) = open_stores(&path);
		let (solana, ic) = ledgers();
		let engine = build_engine(stores, solana.clone(), ic, test_config(3));

		let confirmed = engine.swap(PAYER, ic_swap_args(100, Some(1))).unwrap().job_id;
		engine.mark_swap_job_submitted(confirmed, "0xsignedtx").unwrap();
		engine
			.finalize_swap_job(confirmed, "sig123", true, None)
			.unwrap();

		let in_flight = engine.swap(PAYER, ic_swap_args(200, Some(2))).unwrap().job_id;
		engine.process_swap_job(in_flight).await.unwrap();

		let failed = engine.swap(PAYER, ic_swap_args(300, Some(3))).unwrap().job_id;
		solana.push_submit(Err(LedgerError::permanent("rejected")));
		engine.process_swap_job(failed).await.unwrap();

		let pending = engine.swap(PAYER, ic_swap_args(400, None)).unwrap().job_id;

		engine
			.update_solana_transaction(UpdateSolanaTransactionArgs {
				signature: "incoming".to_string(),
				status: TransactionStatus::Confirmed,
				job_id: None,
				metadata: Some("deposit".to_string()),
				error_message: None,
			})
			.unwrap();

		let transfer = engine
			.stores()
			.icp
			.list_by(|j| j.from_principal.is_none())
			.remove(0)
			.id;

		(confirmed, in_flight, failed, pending, transfer)
	};

	// Phase 2: restart from the same file
	let (log, stores) = open_stores(&path);
	let state = RecoveryCoordinator::new(log).recover(&stores).unwrap();

	assert_eq!(state.swap_jobs, 4);
	assert_eq!(state.icp_jobs, 1);
	assert_eq!(state.notifications, 1);
	assert_eq!(state.in_flight_swaps, 1);
	assert_eq!(state.in_flight_transfers, 0);
	assert!(!state.is_clean_start());

	let swaps = &stores.swaps;
	let job = swaps.get(confirmed).unwrap();
	assert_eq!(job.status, SwapJobStatus::Confirmed);
	assert_eq!(job.solana_tx_signature_of_payout.as_deref(), Some("sig123"));
	assert_eq!(swaps.get(in_flight).unwrap().status, SwapJobStatus::Submitted);
	assert_eq!(swaps.get(failed).unwrap().status, SwapJobStatus::Failed);
	assert_eq!(swaps.get(pending).unwrap().status, SwapJobStatus::Pending);
	assert_eq!(
		stores.icp.get(transfer).unwrap().status,
		IcpTransferStatus::Pending
	);

	let (solana, ic) = ledgers();
	let engine = build_engine(stores, solana.clone(), ic, test_config(3));

	// Refund already queued before the crash
	assert_eq!(engine.ensure_refunds(), 0);

	// Reserved payments survive, including the failed swap's
	for (block_index, holder) in [(2, in_flight), (3, failed)] {
		let err = engine
			.swap(PAYER, ic_swap_args(100 * block_index, Some(block_index)))
			.unwrap_err();
		assert!(matches!(
			err,
			SettlementError::Store(StoreError::DuplicateRequest { existing, .. })
				if existing == holder
		));
	}
	let fresh = engine.swap(PAYER, ic_swap_args(300, Some(30))).unwrap().job_id;
	assert!(fresh > pending);

	// The in-flight payout is reconciled, not resubmitted
	solana.push_poll(Ok(LedgerOutcome::Confirmed {
		tx_id: Some("landed".to_string()),
		block_index: None,
	}));
	engine.reconcile_swap_job(in_flight).await.unwrap();
	assert_eq!(
		engine.stores().swaps.get(in_flight).unwrap().status,
		SwapJobStatus::Confirmed
	);
	assert_eq!(solana.submits(), 0);

	let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_missing_refund_queued_after_restart() {
	let path = temp_log_path();

	let failed = {
		let (_log, stores) = open_stores(&path);
		let (solana, ic) = ledgers();
		// Stands in for a crash between the failure and its refund
		let config = EngineConfig {
			refund_failed_swaps: false,
			..test_config(3)
		};
		let engine = build_engine(stores, solana.clone(), ic, config);

		let id = engine.swap(PAYER, ic_swap_args(500, Some(8))).unwrap().job_id;
		solana.push_submit(Err(LedgerError::permanent("rejected")));
		engine.process_swap_job(id).await.unwrap();
		assert!(engine.stores().icp.is_empty());
		id
	};

	let (log, stores) = open_stores(&path);
	RecoveryCoordinator::new(log).recover(&stores).unwrap();
	let (solana, ic) = ledgers();
	let engine = build_engine(stores, solana, ic, test_config(3));

	assert_eq!(engine.ensure_refunds(), 1);
	assert_eq!(engine.ensure_refunds(), 0);

	let refunds = engine.stores().icp.list_by(|j| j.from_principal.is_none());
	assert_eq!(refunds.len(), 1);
	assert_eq!(refunds[0].amount, 500);
	assert_eq!(refunds[0].request_fingerprint, format!("refund:swap:{}", failed));

	let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_unlogged_payment_consumption_restored() {
	let harness = Harness::new(test_config(3));
	let engine = &harness.engine;
	engine
		.update_solana_transaction(UpdateSolanaTransactionArgs {
			signature: "paysig".to_string(),
			status: TransactionStatus::Finalized,
			job_id: None,
			metadata: None,
			error_message: None,
		})
		.unwrap();
	let id = engine.swap(PAYER, solana_swap_args("paysig")).unwrap().job_id;

	// Replay a log that lost the consumption, as if the process died right
	// after the job was written
	let log = Arc::new(MemoryJobLog::new());
	for entry in harness.log.replay().unwrap() {
		let consumption = matches!(
			&entry.record,
			LogRecord::Notification(n) if n.consumed_by.is_some()
		);
		if !consumption {
			log.append(entry.record).unwrap();
		}
	}
	let stores = JobStores::new(log.clone());
	let state = RecoveryCoordinator::new(log).recover(&stores).unwrap();
	assert_eq!(state.reclaimed_payments, 1);
	assert_eq!(
		stores.notifications.get("paysig").unwrap().consumed_by,
		Some(id)
	);

	let (solana, ic) = ledgers();
	let engine = build_engine(stores, solana, ic, test_config(3));
	engine.cancel_swap_job(id, "user request").unwrap();
	assert!(engine.swap("someone-else", solana_swap_args("paysig")).is_err());
	assert_eq!(engine.stores().swaps.len(), 1);
}

#[test]
fn test_empty_file_log_is_clean_start() {
	let path = temp_log_path();
	let (log, stores) = open_stores(&path);
	let state = RecoveryCoordinator::new(log).recover(&stores).unwrap();

	assert!(state.is_clean_start());
	assert_eq!(state, Default::default());

	let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
