//! Service lifecycle through the control plane facade.

use nettwist::{BackendKind, Params, Slug};

use crate::common::{Harness, lo_index};

#[tokio::test]
async fn test_status_slugs_follow_lifecycle() {
    let h = Harness::new();

    let err = h.control.status(BackendKind::PacketLoss).await.unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceNotInitialized);

    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert_eq!(status.slug(), Slug::ServiceReady);

    h.control.stop(BackendKind::PacketLoss).await.unwrap();
    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert_eq!(status.slug(), Slug::ServiceNotReady);
}

#[tokio::test]
async fn test_start_on_ready_is_rejected() {
    let h = Harness::new();
    h.control.start(Params::bandwidth(100), "lo").await.unwrap();

    let err = h
        .control
        .start(Params::bandwidth(100), "lo")
        .await
        .unwrap_err();
    assert!(err.is_already_started());
    assert!(h.control.status(BackendKind::Bandwidth).await.unwrap().ready);
    assert_eq!(h.loader.attach_count(), 1);
    assert_eq!(h.control.xdp().refs(lo_index()), 1);
}

#[tokio::test]
async fn test_stop_when_not_running() {
    let h = Harness::new();
    let err = h.control.stop(BackendKind::Latency).await.unwrap_err();
    assert!(err.is_not_initialized());

    h.control
        .start(Params::latency(std::time::Duration::from_millis(10), Default::default()), "lo")
        .await
        .unwrap();
    h.control.stop(BackendKind::Latency).await.unwrap();

    let err = h.control.stop(BackendKind::Latency).await.unwrap_err();
    assert!(err.is_not_started());
    assert_eq!(err.slug(), Slug::ServiceNotStarted);
}

#[tokio::test]
async fn test_failed_write_leaves_count_balanced() {
    let h = Harness::new();
    h.loader.fail_writes(true);

    let err = h.control.start(Params::packet_loss(10), "lo").await.unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceStartFailed);
    assert_eq!(h.loader.attach_count(), 1);
    assert_eq!(h.loader.detach_count(), 1);
    assert_eq!(h.control.xdp().refs(lo_index()), 0);

    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert!(!status.ready);

    // The service survives the failure and can be started once the kernel cooperates.
    h.loader.fail_writes(false);
    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    assert_eq!(h.control.xdp().refs(lo_index()), 1);
}

#[tokio::test]
async fn test_failed_attach() {
    let h = Harness::new();
    h.loader.fail_attach(true);

    let err = h.control.start(Params::bandwidth(1), "lo").await.unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceStartFailed);
    assert!(err.to_string().contains("activate"));
    assert_eq!(h.control.xdp().refs(lo_index()), 0);
}

#[tokio::test]
async fn test_unknown_interface_touches_no_kernel_state() {
    let h = Harness::new();

    for params in [
        Params::packet_loss(10),
        Params::bandwidth(100),
        Params::latency(std::time::Duration::from_millis(100), Default::default()),
    ] {
        let err = h.control.start(params, "nettwist-nope0").await.unwrap_err();
        assert_eq!(err.slug(), Slug::ServiceStartFailed);
        assert!(err.is_not_found());
    }

    assert_eq!(h.loader.attach_count(), 0);
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_set_parameters_requires_service() {
    let h = Harness::new();
    let err = h
        .control
        .set_parameters(Params::packet_loss(20))
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());

    h.control.start(Params::packet_loss(10), "lo").await.unwrap();
    h.control.stop(BackendKind::PacketLoss).await.unwrap();

    // Allowed while stopped, no kernel write.
    h.control.set_parameters(Params::packet_loss(20)).await.unwrap();
    let status = h.control.status(BackendKind::PacketLoss).await.unwrap();
    assert_eq!(status.param_i64("packet_loss_rate"), Some(20));
    assert!(!status.ready);

    let err = h
        .control
        .set_parameters(Params::packet_loss(-1))
        .await
        .unwrap_err();
    assert_eq!(err.slug(), Slug::ServiceSetParamFailed);
}
