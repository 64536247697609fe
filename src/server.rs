//! HTTP surface of the bridge
//!
//! - `GET /` liveness text
//! - `GET /datasets` configured dataset descriptors
//! - `GET /datasets/:dataset` one descriptor
//! - `GET /datasets/:dataset/changes?since=<token>` one page of changes as GeoJSON

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{Config, Dataset, DatasetKind};
use crate::error::{FetchError, ServiceError};
use crate::fetch::ChangeSource;
use crate::geojson::{to_feature_collections, to_features, FeatureCollection, FeatureItem};
use crate::parser::parse;

/// Shared, read-only state of the service
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn ChangeSource>,
}

/// Body of a successful changes request
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChangesOutput {
    Features(Vec<FeatureItem>),
    FeatureCollections(Vec<FeatureCollection>),
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    pub since: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/datasets", get(list_datasets))
        .route("/datasets/:dataset", get(get_dataset))
        .route("/datasets/:dataset/changes", get(get_changes))
        .with_state(state)
}

/// Bind `addr` and serve until the listener fails
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), ServiceError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Fetch, parse and project one page of changes for `dataset`
///
/// Blocks on the upstream connection; run it off the async executor.
pub fn changes(
    source: &dyn ChangeSource,
    dataset: &Dataset,
    since: Option<&str>,
) -> Result<ChangesOutput, ServiceError> {
    let stream = source.changes(&dataset.remote_name, since)?;
    let collection = parse(stream)?;
    info!(
        dataset = %dataset.name,
        entities = collection.entities.len(),
        continuation = collection.continuation.is_some(),
        "parsed changes"
    );

    match dataset.projection() {
        DatasetKind::Features => Ok(ChangesOutput::Features(to_features(
            &collection,
            dataset.strip_property_urls,
        ))),
        DatasetKind::FeatureCollections => Ok(ChangesOutput::FeatureCollections(
            to_feature_collections(&collection),
        )),
        DatasetKind::Unsupported => Err(ServiceError::UnsupportedType(dataset.kind.clone())),
    }
}

async fn liveness() -> &'static str {
    "Running"
}

async fn list_datasets(State(state): State<AppState>) -> Json<Vec<Dataset>> {
    Json(state.config.datasets.clone())
}

async fn get_dataset(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.config.dataset(&name) {
        Some(dataset) => Json(dataset.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_changes(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<ChangesOutput>, ServiceError> {
    let dataset = state
        .config
        .dataset(&name)
        .cloned()
        .ok_or(ServiceError::UnknownDataset(name))?;

    let source = Arc::clone(&state.source);
    let output = tokio::task::spawn_blocking(move || {
        changes(source.as_ref(), &dataset, query.since.as_deref())
    })
    .await
    .map_err(|e| ServiceError::Task(e.to_string()))??;

    Ok(Json(output))
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::UnknownDataset(_) => StatusCode::NOT_FOUND.into_response(),
            ServiceError::UnsupportedType(kind) => {
                warn!(kind = %kind, "changes requested for unsupported dataset type");
                StatusCode::BAD_REQUEST.into_response()
            }
            ServiceError::Fetch(FetchError::Status(code)) => {
                warn!(status = code, "datahub rejected changes request");
                StatusCode::from_u16(code)
                    .unwrap_or(StatusCode::BAD_GATEWAY)
                    .into_response()
            }
            other => {
                error!(error = %other, "changes request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ChangeStream;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const CHANGES: &str = r#"[
        {"id": "@context", "namespaces": {"_": "http://data.example.org/", "geo": "http://data.mimiro.io/models/flatgeo/"}},
        {"id": "p1", "recorded": 3, "props": {"geo:coordinates": [10.7, 59.9], "name": "pole"}, "refs": {"geo:geotype": "geo:Point"}},
        {"id": "@continuation", "token": "page-2"}
    ]"#;

    /// Serves a canned body and records what was asked for
    struct FakeSource {
        body: &'static str,
        status: Option<u16>,
        requests: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeSource {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                status: None,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChangeSource for FakeSource {
        fn changes(&self, remote_name: &str, since: Option<&str>) -> Result<ChangeStream, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push((remote_name.to_string(), since.map(String::from)));
            match self.status {
                Some(code) => Err(FetchError::Status(code)),
                None => Ok(Box::new(Cursor::new(self.body.as_bytes()))),
            }
        }
    }

    fn state(source: Arc<FakeSource>) -> AppState {
        let config = Config::from_json(
            r#"{"uda": "http://datahub.local", "datasets": [
                {"name": "poles", "type": "features", "remoteName": "sdi.Poles", "stripPropertyUrls": true},
                {"name": "areas", "type": "featureCollections", "remoteName": "sdi.Areas"},
                {"name": "tiles", "type": "tiles", "remoteName": "sdi.Tiles"}
            ]}"#,
        )
        .unwrap();
        AppState {
            config: Arc::new(config),
            source,
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_liveness() {
        let (status, body) = get(state(Arc::new(FakeSource::new(CHANGES))), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Running");
    }

    #[tokio::test]
    async fn test_list_and_get_datasets() {
        let st = state(Arc::new(FakeSource::new(CHANGES)));

        let (status, body) = get(st.clone(), "/datasets").await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 3);
        assert_eq!(list[0]["remoteName"], "sdi.Poles");

        let (status, body) = get(st.clone(), "/datasets/areas").await;
        assert_eq!(status, StatusCode::OK);
        let ds: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            ds,
            json!({"name": "areas", "type": "featureCollections", "remoteName": "sdi.Areas", "stripPropertyUrls": false})
        );

        let (status, body) = get(st, "/datasets/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_changes_as_features() {
        let source = Arc::new(FakeSource::new(CHANGES));
        let (status, body) = get(state(source.clone()), "/datasets/poles/changes?since=abc").await;
        assert_eq!(status, StatusCode::OK);

        let output: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            output,
            json!([
                {"id": "@context"},
                {
                    "id": "http://data.example.org/p1",
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [10.7, 59.9]},
                    "properties": {"coordinates": [10.7, 59.9], "name": "pole"},
                    "isDeleted": false
                },
                {"id": "@continuation", "token": "page-2"}
            ])
        );
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![("sdi.Poles".to_string(), Some("abc".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_changes_without_since() {
        let source = Arc::new(FakeSource::new(CHANGES));
        let (status, _) = get(state(source.clone()), "/datasets/poles/changes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.requests.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn test_changes_unknown_dataset() {
        let source = Arc::new(FakeSource::new(CHANGES));
        let (status, body) = get(state(source.clone()), "/datasets/nope/changes").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
        assert!(source.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changes_feature_collections_are_empty() {
        let (status, body) = get(
            state(Arc::new(FakeSource::new(CHANGES))),
            "/datasets/areas/changes",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn test_changes_unsupported_type() {
        let (status, body) = get(
            state(Arc::new(FakeSource::new(CHANGES))),
            "/datasets/tiles/changes",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_changes_upstream_status_propagated() {
        let mut source = FakeSource::new(CHANGES);
        source.status = Some(503);
        let (status, body) = get(state(Arc::new(source)), "/datasets/poles/changes").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_changes_parse_failure() {
        let source = Arc::new(FakeSource::new(r#"[{"id": "p1"}]"#));
        let (status, body) = get(state(source), "/datasets/poles/changes").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("parsing error:"), "{text}");
        assert!(text.contains("first entity in array must be a context"), "{text}");
    }
}
