//! Latency through netem, live updates and stop confirmation.

use std::time::Duration;

use nettwist::{BackendKind, Params, Slug};

use crate::common::Harness;

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[tokio::test]
async fn test_live_latency_update() {
    let h = Harness::new();
    h.control
        .start(Params::latency(ms(100), Duration::ZERO), "lo")
        .await
        .unwrap();
    assert_eq!(h.runner.netem("lo").unwrap(), ["delay", "100000us"]);

    h.control
        .set_parameters(Params::latency(ms(250), Duration::ZERO))
        .await
        .unwrap();

    let status = h.control.status(BackendKind::Latency).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.param_i64("latency_ms"), Some(250));
    assert_eq!(h.runner.netem("lo").unwrap(), ["delay", "250000us"]);

    // Updated in place, never removed.
    let dels = h
        .runner
        .calls()
        .iter()
        .filter(|args| args.get(1).is_some_and(|op| op == "del"))
        .count();
    assert_eq!(dels, 0);
}

#[tokio::test]
async fn test_round_trip() {
    let h = Harness::new();
    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.control.start(Params::bandwidth(100), "lo").await.unwrap();
    h.control
        .start(Params::latency(ms(100), ms(50)), "lo")
        .await
        .unwrap();

    let statuses = h.control.all_statuses().await;
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s.ready));
    assert!(statuses.iter().all(|s| s.network_interface_name == "lo"));
    assert_eq!(statuses[0].param_i64("packet_loss_rate"), Some(10));
    assert_eq!(statuses[1].param_i64("limit"), Some(100));
    assert_eq!(statuses[2].param_i64("latency_ms"), Some(100));
    assert_eq!(statuses[2].param_i64("jitter_ms"), Some(50));
    assert_eq!(
        h.runner.netem("lo").unwrap(),
        ["delay", "100000us", "50000us"]
    );
}

#[tokio::test]
async fn test_leftover_qdisc_is_replaced() {
    let h = Harness::new();
    h.control
        .start(Params::latency(ms(10), Duration::ZERO), "lo")
        .await
        .unwrap();

    // A second control plane (e.g. after a crash) finds the old qdisc.
    let other = nettwist::ControlPlane::with_parts(
        nettwist::Config::default(),
        nettwist::testing::MockLoader::new(),
        std::sync::Arc::new(h.runner.clone()),
    );
    other
        .start(Params::latency(ms(30), Duration::ZERO), "lo")
        .await
        .unwrap();
    assert_eq!(h.runner.netem("lo").unwrap(), ["delay", "30000us"]);
}

#[tokio::test]
async fn test_missing_tc_fails_start() {
    let h = Harness::new();
    h.runner.missing(true);

    let err = h
        .control
        .start(Params::latency(ms(10), Duration::ZERO), "lo")
        .await
        .unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceStartFailed);
    assert!(err.is_not_found());
    assert!(!h.control.status(BackendKind::Latency).await.unwrap().ready);
}

#[tokio::test]
async fn test_failed_add_leaves_no_qdisc() {
    let h = Harness::new();
    h.runner.fail_add(true);

    let err = h
        .control
        .start(Params::latency(ms(10), Duration::ZERO), "lo")
        .await
        .unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceStartFailed);
    assert!(h.runner.netem("lo").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_times_out_after_full_window() {
    let h = Harness::new();
    h.control
        .start(Params::latency(ms(100), Duration::ZERO), "lo")
        .await
        .unwrap();
    h.runner.stuck(true);

    let started = tokio::time::Instant::now();
    let err = h.control.stop(BackendKind::Latency).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, nettwist::Error::StopTimeout { .. }));
    assert_eq!(err.slug(), Slug::ServiceStopFailed);
    assert!(elapsed >= Duration::from_secs(5), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5100), "gave up after {elapsed:?}");
    assert!(h.control.status(BackendKind::Latency).await.unwrap().ready);

    h.runner.stuck(false);
    h.control.stop(BackendKind::Latency).await.unwrap();
    assert!(h.runner.netem("lo").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hung_tc_stop_times_out_at_window() {
    let h = Harness::new();
    h.control
        .start(Params::latency(ms(100), Duration::ZERO), "lo")
        .await
        .unwrap();
    h.runner.hang(true);

    let started = tokio::time::Instant::now();
    let err = h.control.stop(BackendKind::Latency).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, nettwist::Error::StopTimeout { .. }));
    assert!(elapsed >= Duration::from_secs(5), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5100), "gave up after {elapsed:?}");
    assert!(h.control.status(BackendKind::Latency).await.unwrap().ready);

    h.runner.hang(false);
    h.control.stop(BackendKind::Latency).await.unwrap();
    assert!(h.runner.netem("lo").is_none());
}

#[tokio::test]
async fn test_failed_change_is_set_param_failed() {
    let h = Harness::new();
    h.control
        .start(Params::latency(ms(100), Duration::ZERO), "lo")
        .await
        .unwrap();
    h.runner.fail_change(true);

    let err = h
        .control
        .set_parameters(Params::latency(ms(250), Duration::ZERO))
        .await
        .unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceSetParamFailed);

    let status = h.control.status(BackendKind::Latency).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.param_i64("latency_ms"), Some(100));
    assert_eq!(h.runner.netem("lo").unwrap(), ["delay", "100000us"]);
}

#[tokio::test]
async fn test_deactivate_error_is_stop_failed() {
    let h = Harness::fast();
    h.control
        .start(Params::latency(ms(100), Duration::ZERO), "lo")
        .await
        .unwrap();
    h.runner.missing(true);

    let err = h.control.stop(BackendKind::Latency).await.unwrap_err();
    assert!(matches!(err, nettwist::Error::StopFailed { .. }));
    assert_eq!(err.slug(), Slug::ServiceStopFailed);
    assert!(h.control.status(BackendKind::Latency).await.unwrap().ready);
}
