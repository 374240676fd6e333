//! Ponto is a workforce time-tracking service.

#![forbid(unsafe_code)]
pub mod config;
mod crypto;
mod database;
pub mod error;
mod middleware;
mod point;
mod report;
mod router;
mod setor;
mod storage;
pub mod telemetry;
mod token;
mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    state: Option<&AppState>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let token = match state {
        Some(state) => format!(
            "Bearer {}",
            state
                .token
                .create("user-ana", "ana", middleware::ADMIN_ROLE)
                .expect("cannot create JWT")
        ),
        None => String::default(),
    };

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, token)
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State backed by `pool`, storing photos in a temporary directory.
#[cfg(test)]
pub fn test_state(pool: sqlx::PgPool) -> (AppState, tempfile::TempDir) {
    let uploads = tempfile::tempdir().expect("cannot create upload directory");
    let pwd = crypto::PasswordManager::new(Some(config::Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .expect("invalid argon2 parameters");

    let mut config = config::Configuration::default();
    config.uploads.directory = uploads.path().to_path_buf();

    let state = AppState {
        config: Arc::new(config),
        db: database::Database::from_pool(pool),
        blobs: Arc::new(storage::LocalBlobStore::new(uploads.path())),
        pwd: Arc::new(pwd),
        token: token::TokenManager::new("test-secret", None),
        metrics: None,
    };

    (state, uploads)
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub blobs: Arc<dyn storage::BlobStore>,
    pub pwd: Arc<crypto::PasswordManager>,
    pub token: token::TokenManager,
    pub metrics: Option<PrometheusHandle>,
}

fn cors(config: &config::Cors) -> CorsLayer {
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .vary([header::AUTHORIZATION]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let layers = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(cors(&state.config.cors));

    let authenticated = Router::new()
        .nest("/points", router::points::router())
        .nest("/reports", router::reports::router())
        .nest("/users", router::users::router())
        .nest("/setores", router::setores::router())
        .nest_service("/uploads", ServeDir::new(&state.config.uploads.directory))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    Router::new()
        // `GET /status` goes to `status`.
        .route("/status", get(router::status::status))
        // `GET /metrics` goes to `metrics`.
        .route("/metrics", get(router::status::metrics))
        // `POST /login` goes to `login`.
        .route("/login", post(router::login::handler))
        .merge(authenticated)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.uploads.max_size))
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(layers)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                config
                    .username
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                config
                    .password
                    .as_deref()
                    .unwrap_or(database::DEFAULT_CREDENTIALS),
                config
                    .database
                    .as_deref()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
                config.operation_timeout(),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            return Err("missing postgres configuration".into());
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    // handle jwt.
    let Some(token) = config.token.as_ref().filter(|t| !t.secret.is_empty()) else {
        tracing::error!("missing `token` entry on `config.yaml` file or `JWT_SECRET` variable");
        return Err("missing token secret".into());
    };
    let token = token::TokenManager::new(&token.secret, token.expiration);

    let pwd = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);

    tokio::fs::create_dir_all(&config.uploads.directory).await?;
    let blobs: Arc<dyn storage::BlobStore> =
        Arc::new(storage::LocalBlobStore::new(&config.uploads.directory));

    Ok(AppState {
        config,
        db,
        blobs,
        pwd,
        token,
        metrics,
    })
}
