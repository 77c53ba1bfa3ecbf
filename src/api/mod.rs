use crate::{
    api::handlers::{auth::AuthConfig, health, not_found, root},
    google::{GoogleConfig, GoogleOAuth},
    session::{
        Authenticator, Authorizer, IdentityRepo, OwnershipRepo, ResetTokenRepo, SessionManager,
        SessionRepo, TokenIssuer,
    },
    store::{HealthCheck, PgStore},
    students::StudentRepo,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
pub mod response;

pub use openapi::openapi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything a request handler needs, shared behind an `Arc`.
pub struct AppState {
    pub sessions: SessionManager,
    pub authenticator: Authenticator,
    pub authorizer: Authorizer,
    pub students: Arc<dyn StudentRepo>,
    pub health: Arc<dyn HealthCheck>,
    pub google: Option<GoogleOAuth>,
    pub config: AuthConfig,
}

impl AppState {
    /// Wire every component to a single store.
    ///
    /// # Errors
    /// Returns an error if the token lifetimes are invalid.
    pub fn from_store<S>(store: Arc<S>, config: AuthConfig, google: Option<GoogleOAuth>) -> Result<Self>
    where
        S: IdentityRepo
            + SessionRepo
            + ResetTokenRepo
            + OwnershipRepo
            + StudentRepo
            + HealthCheck
            + 'static,
    {
        let issuer = TokenIssuer::new(
            config.access_token_ttl_seconds(),
            config.refresh_token_ttl_seconds(),
        )?;
        let mut sessions = SessionManager::new(store.clone(), store.clone(), store.clone(), issuer)
            .with_reset_ttl_seconds(config.reset_token_ttl_seconds())?
            .with_frontend_base_url(config.frontend_base_url());
        if let Some(provider) = &google {
            sessions = sessions.with_provider(Arc::new(provider.clone()));
        }

        Ok(Self {
            sessions,
            authenticator: Authenticator::new(store.clone(), store.clone()),
            authorizer: Authorizer::new(store.clone()),
            students: store.clone(),
            health: store,
            google,
            config,
        })
    }
}

/// Assemble the HTTP application: documented routes, docs UI, fallback and middleware.
///
/// # Errors
/// Returns an error if the frontend base URL is not a valid origin.
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let frontend_origin = frontend_origin(state.config.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // `/` and preflight-only `OPTIONS /health` stay out of the OpenAPI document.
    let (router, openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", openapi))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors)
                .layer(Extension(state)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    google_config: Option<GoogleConfig>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let google = google_config.map(GoogleOAuth::new).transpose()?;
    if google.is_none() {
        info!("Google OAuth not configured; federated login disabled");
    }

    let state = AppState::from_store(Arc::new(PgStore::new(pool)), auth_config, google)?;
    let app = app(Arc::new(state))?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
