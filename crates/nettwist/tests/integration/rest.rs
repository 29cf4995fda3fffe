//! REST server and SDK client over a local socket.

use std::net::SocketAddr;

use nettwist::client::Client;
use nettwist::request::{
    BandwidthStartRequest, LatencyParamsRequest, LatencyStartRequest, PacketLossStartRequest,
};
use nettwist::{BackendKind, Slug};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::common::Harness;

struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<nettwist::Result<()>>,
}

impl Server {
    async fn start(h: &Harness) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(nettwist::api::serve(h.control.clone(), listener, async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    fn client(&self) -> Client {
        Client::new(format!("http://{}", self.addr))
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn pl(rate: i32) -> PacketLossStartRequest {
    PacketLossStartRequest {
        network_interface: "lo".into(),
        packet_loss_rate: rate,
    }
}

#[tokio::test]
async fn test_sdk_round_trip() {
    let h = Harness::new();
    let server = Server::start(&h).await;
    let client = server.client();

    let err = client.packetloss_status().await.unwrap_err();
    assert!(err.is_service_not_initialized());

    client.packetloss_start(&pl(10)).await.unwrap();
    client
        .bandwidth_start(&BandwidthStartRequest {
            network_interface: "lo".into(),
            limit: 100,
        })
        .await
        .unwrap();
    client
        .latency_start(&LatencyStartRequest {
            network_interface: "lo".into(),
            latency_ms: 100,
            jitter_ms: 50,
        })
        .await
        .unwrap();

    let msg = client.latency_status().await.unwrap();
    assert_eq!(msg.slug, Slug::ServiceReady);

    let statuses = client.all_services_status().await.unwrap();
    let names: Vec<_> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["packetloss", "bandwidth", "latency"]);
    assert_eq!(statuses[0].param_i64("packet_loss_rate"), Some(10));
    assert_eq!(statuses[1].param_i64("limit"), Some(100));
    assert_eq!(statuses[2].param_i64("jitter_ms"), Some(50));

    client.packetloss_stop().await.unwrap();
    let msg = client.packetloss_status().await.unwrap();
    assert_eq!(msg.slug, Slug::ServiceNotReady);
    assert!(client.bandwidth_status().await.unwrap().slug == Slug::ServiceReady);

    server.stop().await;
    h.control.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn test_sdk_error_slugs() {
    let h = Harness::new();
    let server = Server::start(&h).await;
    let client = server.client();

    client.packetloss_start(&pl(10)).await.unwrap();
    let err = client.packetloss_start(&pl(20)).await.unwrap_err();
    assert!(err.is_service_already_started());

    let err = client.bandwidth_stop().await.unwrap_err();
    assert!(err.is_service_not_initialized());

    client.packetloss_stop().await.unwrap();
    let err = client.packetloss_stop().await.unwrap_err();
    assert!(err.is_service_not_started());

    let err = client.packetloss_start(&pl(300)).await.unwrap_err();
    assert!(err.is_service_set_param_failed());

    let err = client
        .latency_start(&LatencyStartRequest {
            network_interface: "nettwist-nope0".into(),
            latency_ms: 10,
            jitter_ms: 0,
        })
        .await
        .unwrap_err();
    assert!(err.is_service_start_failed());

    server.stop().await;
}

#[tokio::test]
async fn test_live_params_over_rest() {
    let h = Harness::new();
    let server = Server::start(&h).await;
    let client = server.client();

    client
        .latency_start(&LatencyStartRequest {
            network_interface: "lo".into(),
            latency_ms: 100,
            jitter_ms: 0,
        })
        .await
        .unwrap();
    client
        .latency_set_params(&LatencyParamsRequest {
            latency_ms: 250,
            jitter_ms: 0,
        })
        .await
        .unwrap();

    let status = h.control.status(BackendKind::Latency).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.param_i64("latency_ms"), Some(250));

    h.runner.fail_change(true);
    let err = client
        .latency_set_params(&LatencyParamsRequest {
            latency_ms: 300,
            jitter_ms: 0,
        })
        .await
        .unwrap_err();
    assert!(err.is_service_set_param_failed());
    assert!(!err.is_service_start_failed());

    server.stop().await;
}

#[tokio::test]
async fn test_status_codes_and_cors() {
    let h = Harness::new();
    let server = Server::start(&h).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(server.url("/api/v1/packetloss/start"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "*"
    );
    let msg: nettwist::MetaMessage = resp.json().await.unwrap();
    assert_eq!(msg.slug, Slug::JsonDecodeFailed);
    assert!(msg.is_error());

    let resp = http
        .get(server.url("/api/v1/latency/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let msg: nettwist::MetaMessage = resp.json().await.unwrap();
    assert_eq!(msg.slug, Slug::ServiceNotInitialized);

    let resp = http
        .request(reqwest::Method::OPTIONS, server.url("/api/v1/latency/start"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(
        resp.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("POST")
    );

    let routes = server.client().routes().await.unwrap();
    assert_eq!(routes, nettwist::api::routes());

    server.stop().await;
}
