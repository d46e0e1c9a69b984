//! Integration tests for the processing queue.
//!
//! Tests cover:
//! - Admission, duplicate rejection and capacity
//! - Promotion and the single running slot
//! - Timeout recovery
//! - Grace window and retention purge
//! - Status views and wait estimates
//! - Concurrent promotion

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use taxaformer_core::queue::{
    format_wait, Estimator, JobState, ProcessingQueue, QueueConfig, QueueError, QueueStatusView,
};

fn queue_with_capacity(max_queue_size: usize) -> ProcessingQueue {
    ProcessingQueue::new(QueueConfig {
        max_queue_size,
        ..QueueConfig::default()
    })
}

// ============================================================================
// Admission Tests
// ============================================================================

#[test]
fn test_capacity_scenario() {
    let queue = queue_with_capacity(2);
    let now = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 100, now).unwrap();
    let promoted = queue.try_promote_next_at(now).unwrap();
    assert_eq!(promoted.id, a.id);
    assert_eq!(promoted.state, JobState::Running);

    let b = queue.admit_at("B", "b.fasta", 100, now).unwrap();
    let c = queue.admit_at("C", "c.fasta", 100, now).unwrap();
    assert_eq!(queue.position_of(b.id), 1);
    assert_eq!(queue.position_of(c.id), 2);

    let err = queue.admit_at("D", "d.fasta", 100, now).unwrap_err();
    assert!(matches!(err, QueueError::QueueFull { capacity: 2, .. }));
    assert!(queue.find_active_job("D").is_none());
}

#[test]
fn test_duplicate_admission_never_creates_second_job() {
    let queue = ProcessingQueue::default();
    let now = Utc::now();

    let first = queue.admit_at("A", "a.fasta", 10, now).unwrap();
    for _ in 0..3 {
        let err = queue.admit_at("A", "again.fasta", 10, now).unwrap_err();
        assert_eq!(err, QueueError::DuplicateActiveJob { job_id: first.id });
    }
    assert_eq!(queue.queue_len(), 1);

    queue.try_promote_next_at(now).unwrap();
    let err = queue.admit_at("A", "again.fasta", 10, now).unwrap_err();
    assert_eq!(err, QueueError::DuplicateActiveJob { job_id: first.id });
    assert_eq!(queue.queue_len(), 0);
}

#[test]
fn test_duplicate_checked_before_capacity() {
    let queue = queue_with_capacity(1);
    let now = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 10, now).unwrap();
    let err = queue.admit_at("A", "a.fasta", 10, now).unwrap_err();
    assert_eq!(err, QueueError::DuplicateActiveJob { job_id: a.id });
}

#[test]
fn test_queue_full_reports_wait() {
    let queue = queue_with_capacity(1);
    let now = Utc::now();

    queue.admit_at("A", "a.fasta", 0, now).unwrap();
    match queue.admit_at("B", "b.fasta", 0, now) {
        Err(QueueError::QueueFull {
            estimated_wait_secs,
            ..
        }) => assert_eq!(estimated_wait_secs, 30),
        other => panic!("expected QueueFull, got {other:?}"),
    }
}

// ============================================================================
// Promotion Tests
// ============================================================================

#[test]
fn test_at_most_one_running() {
    let queue = ProcessingQueue::default();
    let now = Utc::now();

    for caller in ["A", "B", "C", "D"] {
        queue.admit_at(caller, "x.fasta", 10, now).unwrap();
        queue.try_promote_next_at(now);
    }

    assert!(queue.try_promote_next_at(now).is_none());
    let running = queue.current_job().unwrap();
    assert_eq!(running.caller, "A");
    assert_eq!(running.state, JobState::Running);
    assert_eq!(queue.queue_len(), 3);
}

#[test]
fn test_positions_contiguous_after_promotion() {
    let queue = ProcessingQueue::default();
    let now = Utc::now();

    let ids: Vec<_> = ["A", "B", "C", "D"]
        .iter()
        .map(|caller| queue.admit_at(caller, "x.fasta", 10, now).unwrap().id)
        .collect();
    queue.try_promote_next_at(now).unwrap();

    assert_eq!(queue.position_of(ids[0]), 0);
    assert_eq!(queue.position_of(ids[1]), 1);
    assert_eq!(queue.position_of(ids[2]), 2);
    assert_eq!(queue.position_of(ids[3]), 3);

    queue.withdraw(ids[2]).unwrap();
    assert_eq!(queue.position_of(ids[1]), 1);
    assert_eq!(queue.position_of(ids[3]), 2);
}

#[test]
fn test_lone_caller_queued_then_processing() {
    let queue = ProcessingQueue::default();
    let now = Utc::now();

    let job = queue.admit_at("A", "a.fasta", 10, now).unwrap();
    match queue.status_for_at("A", now) {
        QueueStatusView::Queued {
            job_id, position, ..
        } => {
            assert_eq!(job_id, job.id);
            assert_eq!(position, 1);
        }
        other => panic!("expected queued, got {other:?}"),
    }

    queue.try_promote_next_at(now).unwrap();
    match queue.status_for_at("A", now) {
        QueueStatusView::Processing {
            job_id, progress, ..
        } => {
            assert_eq!(job_id, job.id);
            assert_eq!(progress, 0);
        }
        other => panic!("expected processing, got {other:?}"),
    }
}

#[test]
fn test_timeout_force_fails_and_promotes_in_same_call() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    queue.report_progress(a.id, 40).unwrap();
    let b = queue.admit_at("B", "b.fasta", 10, start).unwrap();

    // Exactly at the timeout the job is still within budget.
    let at_limit = start + Duration::seconds(300);
    assert!(queue.try_promote_next_at(at_limit).is_none());

    let later = start + Duration::seconds(301);
    let promoted = queue.try_promote_next_at(later).unwrap();
    assert_eq!(promoted.id, b.id);

    match queue.status_for_at("A", later) {
        QueueStatusView::Failed {
            job_id, progress, ..
        } => {
            assert_eq!(job_id, a.id);
            assert_eq!(progress, 40);
        }
        other => panic!("expected failed, got {other:?}"),
    }

    // The evicted job can no longer report.
    assert_eq!(
        queue.complete_at(a.id, true, later),
        Err(QueueError::StaleUpdate { job_id: a.id })
    );
}

#[test]
fn test_timeout_with_empty_queue_frees_slot() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    queue.admit_at("A", "a.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();

    let later = start + Duration::seconds(400);
    assert!(queue.try_promote_next_at(later).is_none());
    assert!(queue.find_active_job("A").is_none());
    assert!(queue.admit_at("A", "retry.fasta", 10, later).is_ok());
}

#[test]
fn test_concurrent_promotion_single_winner() {
    let queue = Arc::new(ProcessingQueue::default());
    for i in 0..5 {
        queue.admit(&format!("caller-{i}"), "x.fasta", 10).unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let queue = queue.clone();
            std::thread::spawn(move || queue.try_promote_next())
        })
        .collect();

    let winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(queue.queue_len(), 4);
}

// ============================================================================
// Executor Report Tests
// ============================================================================

#[test]
fn test_progress_is_clamped_and_overwritable() {
    let queue = ProcessingQueue::default();
    let job = queue.admit("A", "a.fasta", 10).unwrap();
    queue.try_promote_next().unwrap();

    assert_eq!(queue.report_progress(job.id, 150).unwrap(), 100);
    assert_eq!(queue.report_progress(job.id, -5).unwrap(), 0);
    assert_eq!(queue.report_progress(job.id, 42).unwrap(), 42);
    assert_eq!(queue.report_progress(job.id, 10).unwrap(), 10);
}

#[test]
fn test_reports_for_queued_job_are_stale() {
    let queue = ProcessingQueue::default();
    let a = queue.admit("A", "a.fasta", 10).unwrap();
    let b = queue.admit("B", "b.fasta", 10).unwrap();
    queue.try_promote_next().unwrap();

    assert_eq!(
        queue.report_progress(b.id, 10),
        Err(QueueError::StaleUpdate { job_id: b.id })
    );
    assert_eq!(
        queue.complete(b.id, true),
        Err(QueueError::StaleUpdate { job_id: b.id })
    );
    assert_eq!(queue.current_job().unwrap().id, a.id);
}

#[test]
fn test_failure_resets_progress() {
    let queue = ProcessingQueue::default();
    let job = queue.admit("A", "a.fasta", 10).unwrap();
    queue.try_promote_next().unwrap();
    queue.report_progress(job.id, 80).unwrap();

    let failed = queue.complete(job.id, false).unwrap();
    assert_eq!(failed.state, JobState::Failed);
    assert_eq!(failed.progress_percent, 0);
    assert!(failed.completed_at.is_some());
}

// ============================================================================
// Grace Window and Retention Tests
// ============================================================================

#[test]
fn test_completed_visible_until_grace_elapses() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    let job = queue.admit_at("A", "a.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    let done = start + Duration::seconds(5);
    queue.complete_at(job.id, true, done).unwrap();

    match queue.status_for_at("A", done + Duration::seconds(29)) {
        QueueStatusView::Completed { progress, .. } => assert_eq!(progress, 100),
        other => panic!("expected completed, got {other:?}"),
    }

    let after = done + Duration::seconds(30);
    assert!(matches!(
        queue.status_for_at("A", after),
        QueueStatusView::NoJob { .. }
    ));
    assert!(queue.current_job().is_none());
}

#[test]
fn test_slot_released_without_polling() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    queue.complete_at(a.id, true, start).unwrap();

    let b = queue.admit_at("B", "b.fasta", 10, start).unwrap();
    let later = start + Duration::seconds(31);
    assert_eq!(queue.try_promote_next_at(later).unwrap().id, b.id);
}

#[test]
fn test_finished_job_does_not_block_next() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 10, start).unwrap();
    let b = queue.admit_at("B", "b.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    queue.complete_at(a.id, true, start).unwrap();

    let promoted = queue.try_promote_next_at(start).unwrap();
    assert_eq!(promoted.id, b.id);

    // A still sees its outcome while B runs.
    assert!(matches!(
        queue.status_for_at("A", start),
        QueueStatusView::Completed { .. }
    ));
}

#[test]
fn test_abandoned_queued_job_purged() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    let running = queue.admit_at("A", "a.fasta", 10, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    let stale = queue.admit_at("B", "b.fasta", 10, start).unwrap();

    let later = start + Duration::seconds(3601);
    let report = queue.sweep_at(later);
    assert_eq!(report.purged, vec![stale.id]);

    assert!(queue.find_active_job("B").is_none());
    assert_eq!(queue.position_of(stale.id), 0);
    assert!(matches!(
        queue.status_for_at("B", later),
        QueueStatusView::NoJob { .. }
    ));

    // The running job is never removed by age.
    assert_eq!(queue.current_job().unwrap().id, running.id);
    assert_eq!(queue.current_job().unwrap().state, JobState::Running);
}

#[test]
fn test_oversized_windows_saturate() {
    let queue = ProcessingQueue::new(QueueConfig {
        job_timeout_secs: u64::MAX,
        completion_grace_secs: u64::MAX,
        retention_window_secs: u64::MAX,
        ..QueueConfig::default()
    });
    let now = Utc::now();

    let a = queue.admit_at("A", "a.fasta", 10, now).unwrap();
    assert!(queue.sweep_at(now).is_empty());
    assert!(matches!(
        queue.status_for_at("A", now),
        QueueStatusView::Queued { position: 1, .. }
    ));

    queue.try_promote_next_at(now).unwrap();
    queue.admit_at("B", "b.fasta", 10, now).unwrap();

    // A year later the running job is still inside its timeout.
    let later = now + Duration::days(365);
    assert!(queue.try_promote_next_at(later).is_none());
    assert_eq!(queue.current_job().unwrap().id, a.id);
    assert_eq!(queue.current_job().unwrap().state, JobState::Running);
    assert_eq!(queue.queue_len(), 1);
}

// ============================================================================
// Estimate Tests
// ============================================================================

#[test]
fn test_estimator_scenario() {
    let estimator = Estimator::default();
    assert_eq!(estimator.estimate(1024), 30);
    assert_eq!(estimator.estimate(1024 + 100 * 1024), 31);
    assert_eq!(estimator.estimate(0), 30);
}

#[test]
fn test_queued_wait_includes_running_remaining() {
    let queue = ProcessingQueue::default();
    let start = Utc::now();

    queue.admit_at("A", "a.fasta", 0, start).unwrap();
    queue.try_promote_next_at(start).unwrap();
    queue.admit_at("B", "b.fasta", 0, start).unwrap();
    queue.admit_at("C", "c.fasta", 0, start).unwrap();

    let now = start + Duration::seconds(10);
    match queue.status_for_at("C", now) {
        QueueStatusView::Queued {
            position,
            queue_length,
            estimated_wait,
            message,
            ..
        } => {
            assert_eq!(position, 2);
            assert_eq!(queue_length, 2);
            // 20s left on A plus 30s for B.
            assert_eq!(estimated_wait, 50);
            assert_eq!(message, "Your file is #2 in queue. Estimated wait: 0m 50s");
        }
        other => panic!("expected queued, got {other:?}"),
    }

    let stats = queue.stats_at(now);
    assert_eq!(stats.queue_length, 2);
    assert!(stats.currently_processing);
    assert_eq!(stats.current_job.unwrap().elapsed_secs, 10);
    assert_eq!(stats.estimated_wait_for_new_job, 80);
}

#[test]
fn test_format_wait() {
    assert_eq!(format_wait(0), "0m 0s");
    assert_eq!(format_wait(95), "1m 35s");
}
