//! REST server.
//!
//! Routes (all under [`API_PREFIX`]):
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | POST | `/{kind}/start` | start request for the kind |
//! | POST | `/{kind}/stop` | none |
//! | GET | `/{kind}/status` | none |
//! | POST | `/{kind}/params` | parameters for the kind |
//! | GET | `/services/status` | none |
//!
//! where `{kind}` is `packetloss`, `bandwidth` or `latency`. `GET /` lists
//! every route.

mod cors;
mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{any, get, post};
use tokio::net::TcpListener;

use crate::backend::BackendKind;
use crate::control::ControlPlane;
use crate::request::{
    API_PREFIX, BandwidthParamsRequest, BandwidthStartRequest, LatencyParamsRequest,
    LatencyStartRequest, PacketLossParamsRequest, PacketLossStartRequest,
};
use crate::{Error, Result};

pub use handlers::status_code;

type AppState = Arc<ControlPlane>;

/// Every route the server answers, in registration order.
pub fn routes() -> Vec<String> {
    let mut routes = vec!["/".to_string()];
    for kind in BackendKind::ALL {
        for action in ["start", "stop", "status", "params"] {
            routes.push(format!("{API_PREFIX}/{kind}/{action}"));
        }
    }
    routes.push(format!("{API_PREFIX}/services/status"));
    routes
}

/// Build the router for `control`.
pub fn router(control: Arc<ControlPlane>) -> Result<Router> {
    let origin = &control.config().server.origin_allowed;
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| Error::Config(format!("origin_allowed {origin:?}: {e}")))?;

    let mut router = Router::new()
        .route("/", any(handlers::index))
        .route(
            &format!("{API_PREFIX}/packetloss/start"),
            post(handlers::start::<PacketLossStartRequest>),
        )
        .route(
            &format!("{API_PREFIX}/bandwidth/start"),
            post(handlers::start::<BandwidthStartRequest>),
        )
        .route(
            &format!("{API_PREFIX}/latency/start"),
            post(handlers::start::<LatencyStartRequest>),
        )
        .route(
            &format!("{API_PREFIX}/packetloss/params"),
            post(handlers::set_parameters::<PacketLossParamsRequest>),
        )
        .route(
            &format!("{API_PREFIX}/bandwidth/params"),
            post(handlers::set_parameters::<BandwidthParamsRequest>),
        )
        .route(
            &format!("{API_PREFIX}/latency/params"),
            post(handlers::set_parameters::<LatencyParamsRequest>),
        )
        .route(
            &format!("{API_PREFIX}/services/status"),
            get(handlers::all_statuses),
        );

    for kind in BackendKind::ALL {
        router = router
            .route(
                &format!("{API_PREFIX}/{kind}/stop"),
                post(move |state: State<AppState>| handlers::stop(state, kind)),
            )
            .route(
                &format!("{API_PREFIX}/{kind}/status"),
                get(move |state: State<AppState>| handlers::status(state, kind)),
            );
    }

    Ok(router
        .layer(axum::middleware::from_fn_with_state(origin, cors::cors))
        .with_state(control))
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    control: Arc<ControlPlane>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(control)?;
    tracing::info!(addr = %listener.local_addr()?, "serving REST API");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
