//! Packet loss and bandwidth sharing one XDP attachment.

use std::time::Duration;

use nettwist::xdp::Table;
use nettwist::{BackendKind, Params, Slug};

use crate::common::{Harness, lo_index};

#[tokio::test]
async fn test_stopping_one_kernel_backend_keeps_the_other() {
    let h = Harness::new();
    let lo = lo_index();

    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.control.start(Params::bandwidth(100), "lo").await.unwrap();
    assert_eq!(h.loader.attach_count(), 1);
    assert_eq!(h.control.xdp().refs(lo), 2);

    h.control.stop(BackendKind::PacketLoss).await.unwrap();

    assert!(h.control.status(BackendKind::Bandwidth).await.unwrap().ready);
    assert!(!h.control.status(BackendKind::PacketLoss).await.unwrap().ready);
    assert_eq!(h.loader.table(lo, Table::BandwidthLimit), Some(100));
    assert_eq!(h.loader.table(lo, Table::PacketLossRate), Some(0));
    assert!(h.loader.is_attached(lo));
    assert_eq!(h.loader.detach_count(), 0);

    h.control.stop(BackendKind::Bandwidth).await.unwrap();
    assert!(!h.loader.is_attached(lo));
    assert_eq!(h.loader.detach_count(), 1);
    assert_eq!(h.control.xdp().refs(lo), 0);
}

#[tokio::test]
async fn test_restart_reattaches() {
    let h = Harness::new();
    let lo = lo_index();

    for _ in 0..3 {
        h.control.start(Params::bandwidth(100), "lo").await.unwrap();
        h.control.stop(BackendKind::Bandwidth).await.unwrap();
    }
    assert_eq!(h.loader.attach_count(), 3);
    assert_eq!(h.loader.detach_count(), 3);
    assert_eq!(h.control.xdp().refs(lo), 0);
}

#[tokio::test]
async fn test_live_packet_loss_update() {
    let h = Harness::new();
    let lo = lo_index();

    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.control
        .set_parameters(Params::packet_loss(35))
        .await
        .unwrap();
    assert_eq!(h.loader.table(lo, Table::PacketLossRate), Some(35));

    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.param_i64("packet_loss_rate"), Some(35));
}

#[tokio::test]
async fn test_failed_table_push_is_set_param_failed() {
    let h = Harness::new();
    let lo = lo_index();

    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.loader.fail_writes(true);

    let err = h
        .control
        .set_parameters(Params::packet_loss(35))
        .await
        .unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceSetParamFailed);
    assert!(err.is_set_param_failed());

    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.param_i64("packet_loss_rate"), Some(10));
    assert_eq!(h.loader.table(lo, Table::PacketLossRate), Some(10));
}

#[tokio::test]
async fn test_concurrent_starts_share_one_attachment() {
    let h = Harness::new();
    let (pl, bw) = tokio::join!(
        h.control.start(Params::packet_loss(5), "lo"),
        h.control.start(Params::bandwidth(1000), "lo"),
    );
    pl.unwrap();
    bw.unwrap();
    assert_eq!(h.loader.attach_count(), 1);
    assert_eq!(h.control.xdp().refs(lo_index()), 2);

    h.control.shutdown_all().await.unwrap();
    assert_eq!(h.loader.detach_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_table_times_out_and_retry_succeeds() {
    let h = Harness::new();
    let lo = lo_index();
    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.control.start(Params::bandwidth(100), "lo").await.unwrap();
    h.loader.stuck(true);

    let started = tokio::time::Instant::now();
    let err = h.control.stop(BackendKind::PacketLoss).await.unwrap_err();
    let elapsed = started.elapsed();
    assert!(err.is_stop_failed());
    assert!(elapsed >= Duration::from_secs(5), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5100), "gave up after {elapsed:?}");
    assert!(h.control.status(BackendKind::PacketLoss).await.unwrap().ready);
    assert_eq!(h.control.xdp().refs(lo), 1);

    // The reference is already gone, the retry only clears the table.
    h.loader.stuck(false);
    h.control.stop(BackendKind::PacketLoss).await.unwrap();
    assert!(!h.control.status(BackendKind::PacketLoss).await.unwrap().ready);
    assert_eq!(h.loader.table(lo, Table::PacketLossRate), Some(0));
    assert_eq!(h.control.xdp().refs(lo), 1);
    assert_eq!(h.loader.detach_count(), 0);
}
