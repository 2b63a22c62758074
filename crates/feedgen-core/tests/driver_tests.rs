use std::time::Duration;

use feedgen_client::mock::{ScriptedService, Step};
use feedgen_common::FeedgenError;
use feedgen_core::{run, DriverParams};

fn params(target: u64, batch_size: u64) -> DriverParams {
    DriverParams { target, batch_size, delay: Duration::ZERO }
}

async fn drive(service: &ScriptedService, p: DriverParams) -> (feedgen_core::RunSummary, String) {
    let mut out = Vec::new();
    let summary = run(service, &p, &mut out).await.expect("initial progress");
    (summary, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn fills_to_target_in_fixed_batches() {
    let svc = ScriptedService::starting_at(0);
    let (summary, out) = drive(&svc, params(1000, 10)).await;

    let requests = svc.generate_requests().await;
    assert_eq!(requests.len(), 100);
    assert!(requests.iter().all(|&n| n == 10));
    assert!(summary.completed());
    assert_eq!(summary.batches, 100);
    assert_eq!(summary.final_progress.unwrap(), 1000);
    assert_eq!(svc.progress_calls().await, 2);
    assert!(out.contains("Current progress: 0/1000"));
    assert!(out.contains("Batch 100 - generating 10 feedbacks..."));
    assert!(out.contains("All done!"));
    assert!(out.trim_end().ends_with("Final count: 1000/1000"));
}

#[tokio::test]
async fn target_already_met_issues_no_batches() {
    let svc = ScriptedService::starting_at(1000);
    let (summary, out) = drive(&svc, params(1000, 10)).await;

    assert!(svc.generate_requests().await.is_empty());
    assert_eq!(summary.batches, 0);
    assert!(summary.completed());
    assert!(out.contains("All done!"));
    assert!(out.contains("Final count: 1000/1000"));
}

#[tokio::test]
async fn overshoot_counts_as_met() {
    let svc = ScriptedService::starting_at(1200);
    let (summary, _) = drive(&svc, params(1000, 10)).await;
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.final_progress.unwrap(), 1200);
}

#[tokio::test]
async fn rejection_stops_the_loop_but_final_progress_is_read() {
    let svc = ScriptedService::starting_at(0)
        .then(Step::Fulfil)
        .then(Step::Fulfil)
        .then(Step::Reject("rate limited".into()));
    let (summary, out) = drive(&svc, params(1000, 10)).await;

    assert_eq!(svc.generate_requests().await, vec![10, 10, 10]);
    assert!(out.contains("Error: rate limited"));
    assert!(out.contains("Stopped after batch 3."));
    assert!(!out.contains("All done!"));
    assert!(out.contains("Final count: 20/1000"));
    assert_eq!(svc.progress_calls().await, 2);
    assert!(matches!(summary.aborted, Some(FeedgenError::Application(ref m)) if m == "rate limited"));
    assert!(!summary.completed());
}

#[tokio::test]
async fn transport_and_format_failures_short_circuit() {
    for step in [Step::Unreachable("connection reset".into()), Step::Garbled] {
        let svc = ScriptedService::starting_at(0).then(Step::Fulfil).then(step);
        let (summary, out) = drive(&svc, params(100, 10)).await;

        assert_eq!(svc.generate_requests().await.len(), 2);
        assert!(out.contains("Request failed: "));
        assert_eq!(svc.progress_calls().await, 2);
        assert_eq!(summary.final_progress.unwrap(), 10);
        assert!(summary.aborted.is_some());
    }
}

#[tokio::test]
async fn last_batch_is_trimmed_to_what_remains() {
    let svc = ScriptedService::starting_at(3);
    let (summary, _) = drive(&svc, params(25, 10)).await;
    assert_eq!(svc.generate_requests().await, vec![10, 10, 2]);
    assert_eq!(summary.final_progress.unwrap(), 25);
}

#[tokio::test]
async fn remaining_follows_the_server_total() {
    // The service under-delivers on the first call and over-delivers on the second.
    let svc = ScriptedService::starting_at(0).then(Step::Partial(4)).then(Step::Partial(15));
    let (summary, out) = drive(&svc, params(30, 10)).await;

    assert_eq!(svc.generate_requests().await, vec![10, 10, 10, 1]);
    assert!(out.contains("Generated 4 feedbacks"));
    assert!(out.contains("Total: 19/30"));
    assert_eq!(summary.final_progress.unwrap(), 30);
}

#[tokio::test]
async fn batch_count_is_bounded_when_totals_advance() {
    for (target, batch) in [(1u64, 1u64), (7, 3), (99, 10), (100, 10), (101, 10), (5, 50)] {
        let svc = ScriptedService::starting_at(0);
        let (summary, _) = drive(&svc, params(target, batch)).await;
        let requests = svc.generate_requests().await;
        assert!(requests.len() as u64 <= target.div_ceil(batch));
        assert!(requests.iter().all(|&n| n > 0 && n <= batch));
        assert_eq!(summary.final_progress.unwrap(), target);
    }
}

#[tokio::test]
async fn initial_progress_failure_aborts_silently() {
    let svc = ScriptedService::starting_at(0).progress_fails_from(0);
    let mut out = Vec::new();
    let err = run(&svc, &params(10, 5), &mut out).await.unwrap_err();

    assert!(matches!(err, FeedgenError::Transport(_)));
    assert!(out.is_empty());
    assert!(svc.generate_requests().await.is_empty());
}

#[tokio::test]
async fn final_progress_failure_is_reported() {
    let svc = ScriptedService::starting_at(0).progress_fails_from(1);
    let (summary, out) = drive(&svc, params(20, 10)).await;

    assert!(summary.aborted.is_none());
    assert!(summary.final_progress.is_err());
    assert!(!summary.completed());
    assert!(out.contains("Final count unavailable: "));
    assert_eq!(svc.count().await, 20);
}

#[tokio::test(start_paused = true)]
async fn waits_between_batches_but_not_after_the_last() {
    let svc = ScriptedService::starting_at(0);
    let p = DriverParams { target: 30, batch_size: 10, delay: Duration::from_secs(2) };
    let started = tokio::time::Instant::now();
    let mut out = Vec::new();
    run(&svc, &p, &mut out).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}
