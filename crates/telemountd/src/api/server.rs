//! Plugin protocol routes.
//!
//! Every route answers HTTP 200; failures travel in the `Err` field.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use telemount::{Registry, UnmountOutcome};
use tower_http::trace::TraceLayer;

use super::protocol::{
    ActivateResponse, CapabilitiesResponse, ConsumerRequest, CreateRequest, ErrResponse,
    GetResponse, ListResponse, MountpointResponse, NameRequest,
};

/// Router serving the volume plugin protocol on top of `registry`.
pub fn app(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse {
        implements: vec!["VolumeDriver"],
    })
}

async fn create(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<CreateRequest>,
) -> Json<ErrResponse> {
    let opts = req.opts.unwrap_or_default();
    Json(registry.create_volume(&req.name, &opts).await.into())
}

async fn remove(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<NameRequest>,
) -> Json<ErrResponse> {
    Json(registry.remove_volume(&req.name).await.into())
}

async fn mount(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<ConsumerRequest>,
) -> Json<MountpointResponse> {
    Json(registry.mount_volume(&req.name, &req.id).await.into())
}

async fn unmount(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<ConsumerRequest>,
) -> Json<ErrResponse> {
    // A failed detach is already logged; the container did release the volume.
    let result = registry
        .unmount_volume(&req.name, &req.id)
        .await
        .map(|outcome: UnmountOutcome| {
            tracing::debug!(volume = %req.name, ?outcome, "Unmounted");
        });
    Json(result.into())
}

async fn path(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<NameRequest>,
) -> Json<MountpointResponse> {
    Json(registry.path_of(&req.name).await.into())
}

async fn get(
    State(registry): State<Arc<Registry>>,
    Json(req): Json<NameRequest>,
) -> Json<GetResponse> {
    Json(registry.describe(&req.name).await.into())
}

async fn list(State(registry): State<Arc<Registry>>) -> Json<ListResponse> {
    Json(ListResponse {
        volumes: registry.list_all().await,
        err: String::new(),
    })
}

async fn capabilities(State(registry): State<Arc<Registry>>) -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        capabilities: registry.capabilities(),
    })
}
