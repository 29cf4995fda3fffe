use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use super::AppState;
use crate::Error;
use crate::backend::{BackendKind, Params};
use crate::message::{MetaMessage, Slug};
use crate::request::StartRequest;
use crate::status::ServiceStatus;

/// HTTP status code for a failed operation.
///
/// Not-initialized is reported with 200 and an error-typed message body.
pub fn status_code(err: &Error) -> StatusCode {
    match err.slug() {
        Slug::ServiceNotInitialized => StatusCode::OK,
        Slug::ServiceAlreadyStarted
        | Slug::ServiceNotStarted
        | Slug::ServiceSetParamFailed
        | Slug::JsonDecodeFailed => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(super) struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::DecodeFailed(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = status_code(&self.0);
        if code.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (code, Json(MetaMessage::from(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub(super) async fn index() -> Json<Vec<String>> {
    Json(super::routes())
}

pub(super) async fn start<R>(
    State(control): State<AppState>,
    body: std::result::Result<Json<R>, JsonRejection>,
) -> ApiResult<MetaMessage>
where
    R: StartRequest + DeserializeOwned + Send + 'static,
{
    let Json(req) = body?;
    control.start(req.params(), req.interface()).await?;
    Ok(Json(MetaMessage::info(Slug::ServiceReady, "Service started")))
}

pub(super) async fn stop(State(control): State<AppState>, kind: BackendKind) -> ApiResult<MetaMessage> {
    control.stop(kind).await?;
    Ok(Json(MetaMessage::info(Slug::ServiceNotReady, "Service stopped")))
}

pub(super) async fn status(State(control): State<AppState>, kind: BackendKind) -> ApiResult<MetaMessage> {
    let status = control.status(kind).await?;
    Ok(Json(MetaMessage::info(status.slug(), "Service status")))
}

pub(super) async fn set_parameters<R>(
    State(control): State<AppState>,
    body: std::result::Result<Json<R>, JsonRejection>,
) -> ApiResult<MetaMessage>
where
    R: Into<Params> + DeserializeOwned + Send + 'static,
{
    let Json(req) = body?;
    let params: Params = req.into();
    control.set_parameters(params).await?;
    let status = control.status(params.kind()).await?;
    Ok(Json(MetaMessage::info(
        status.slug(),
        "Service parameters updated",
    )))
}

pub(super) async fn all_statuses(State(control): State<AppState>) -> Json<Vec<ServiceStatus>> {
    Json(control.all_statuses().await)
}
