mod common;

use std::{
	sync::{Arc, Barrier},
	thread,
};

use ferry_sdk::types::SwapJobStatus;
use ferry_settlement::{SettlementError, StoreError};

use common::{Harness, PAYER, ic_swap_args, test_config};

const THREADS: usize = 8;

/// Run `f` on `THREADS` threads released at the same instant
fn race<T, F>(f: F) -> Vec<T>
where
	T: Send + 'static,
	F: Fn(usize) -> T + Send + Sync + 'static,
{
	let barrier = Arc::new(Barrier::new(THREADS));
	let f = Arc::new(f);
	let handles: Vec<_> = (0..THREADS)
		.map(|i| {
			let barrier = barrier.clone();
			let f = f.clone();
			thread::spawn(move || {
				barrier.wait();
				f(i)
			})
		})
		.collect();
	handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_concurrent_mark_submitted_single_winner() {
	let harness = Harness::new(test_config(3));
	let engine = harness.engine.clone();
	let id = engine.swap(PAYER, ic_swap_args(1000, None)).unwrap().job_id;

	let results = race(move |i| engine.mark_swap_job_submitted(id, &format!("0xsignedtx-{}", i)));

	let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
	assert_eq!(winners.len(), 1);
	for result in &results {
		if let Err(e) = result {
			assert!(
				e.is_conflict() || matches!(e, SettlementError::InvalidTransition { .. }),
				"unexpected error: {}",
				e
			);
		}
	}

	let job = harness.engine.stores().swaps.get(id).unwrap();
	assert_eq!(job.status, SwapJobStatus::Submitted);
	assert_eq!(job.attempts, 1);
	assert_eq!(&job.encoded_signed_solana_tx, &winners[0].encoded_signed_solana_tx);
}

#[test]
fn test_concurrent_finalize_is_idempotent() {
	let harness = Harness::new(test_config(3));
	let engine = harness.engine.clone();
	let id = engine.swap(PAYER, ic_swap_args(1000, None)).unwrap().job_id;
	engine.mark_swap_job_submitted(id, "0xsignedtx").unwrap();

	let log_before = harness.log.len();
	let results = race(move |_| engine.finalize_swap_job(id, "sig123", true, None));

	let records: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
	assert!(records.iter().all(|job| job == &records[0]));
	assert_eq!(records[0].status, SwapJobStatus::Confirmed);
	// Exactly one committed version
	assert_eq!(harness.log.len(), log_before + 1);
}

#[test]
fn test_concurrent_duplicate_swaps_create_one_job() {
	let harness = Harness::new(test_config(3));
	let engine = harness.engine.clone();

	let results = race(move |_| engine.swap(PAYER, ic_swap_args(1000, Some(3))));

	let created: Vec<_> = results
		.iter()
		.filter_map(|r| r.as_ref().ok())
		.map(|reply| reply.job_id)
		.collect();
	assert_eq!(created.len(), 1);
	for result in &results {
		if let Err(e) = result {
			assert!(
				matches!(
					e,
					SettlementError::Store(StoreError::DuplicateRequest { existing, .. })
						if *existing == created[0]
				),
				"unexpected error: {}",
				e
			);
		}
	}
	assert_eq!(harness.engine.stores().swaps.len(), 1);
}

#[test]
fn test_cancel_races_with_claim() {
	let harness = Harness::new(test_config(3));
	let engine = harness.engine.clone();
	let id = engine.swap(PAYER, ic_swap_args(1000, None)).unwrap().job_id;

	let results = race(move |i| {
		if i % 2 == 0 {
			engine.mark_swap_job_submitted(id, "0xsignedtx").map(|j| j.status)
		} else {
			engine.cancel_swap_job(id, "user request").map(|j| j.status)
		}
	});

	let wins: Vec<_> = results.into_iter().filter_map(Result::ok).collect();
	assert_eq!(wins.len(), 1);
	assert_eq!(harness.engine.stores().swaps.get(id).unwrap().status, wins[0]);
}
