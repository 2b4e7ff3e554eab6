use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::auth::SessionStore;
use super::images::ImageStore;
use super::record_routes::record_routes;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub records: Option<usize>,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_handle: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        records: state.record_store.get_records_count().ok(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginBody>) -> Response {
    debug!("login() called with {:?}", body);
    if !state.authenticator.authenticate(&body.user_handle) {
        warn!("Rejected login for handle {:?}", body.user_handle);
        return StatusCode::FORBIDDEN.into_response();
    }

    let token = state.sessions.open();
    info!("Logged in {}", body.user_handle.trim());
    let cookie = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, token.0.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.sessions.ttl().as_secs() as i64))
        .build();

    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(LoginSuccessResponse { token: token.0 }),
    )
        .into_response()
}

async fn logout(State(sessions): State<GuardedSessionStore>, session: Session) -> Response {
    sessions.close(&session.token);
    let cookie = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
        .same_site(SameSite::Lax)
        .build();

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
    )
        .into_response()
}

impl ServerState {
    fn new(
        config: ServerConfig,
        record_store: GuardedRecordStore,
        authenticator: GuardedAuthenticator,
        image_store: ImageStore,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            record_store,
            authenticator,
            sessions: Arc::new(SessionStore::default()),
            image_store: Arc::new(image_store),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    record_store: GuardedRecordStore,
    authenticator: GuardedAuthenticator,
) -> Result<Router> {
    let image_store = ImageStore::new(&config.images_dir)?;
    let state = ServerState::new(config.clone(), record_store, authenticator, image_store);

    let auth_routes: Router<ServerState> = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout));

    let v1_routes: Router = Router::new()
        .nest("/auth", auth_routes)
        .merge(record_routes())
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    record_store: GuardedRecordStore,
    authenticator: GuardedAuthenticator,
    config: ServerConfig,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, record_store, authenticator)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::SqliteRecordStore;
    use crate::server::auth::SESSION_TTL;
    use crate::server::{RequestsLoggingLevel, SingleUserAuthenticator};
    use axum::{body::Body, http::Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const HANDLE: &str = "collector";

    fn test_app() -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let record_store =
            Arc::new(SqliteRecordStore::new(temp_dir.path().join("records.db")).unwrap());
        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            images_dir: temp_dir.path().join("images"),
            ..Default::default()
        };
        let app = make_app(
            config,
            record_store,
            Arc::new(SingleUserAuthenticator::new(HANDLE)),
        )
        .unwrap();
        (app, temp_dir)
    }

    fn login_request(handle: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"user_handle\":\"{}\"}}", handle)))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3 * 3600 + 4 * 60 + 5)),
            "2d 03:04:05"
        );
    }

    #[tokio::test]
    async fn responds_forbidden_on_protected_routes() {
        let (app, _temp_dir) = test_app();

        let protected_routes = vec![
            ("GET", "/v1/records"),
            ("POST", "/v1/records"),
            ("GET", "/v1/records/1"),
            ("PUT", "/v1/records/1"),
            ("DELETE", "/v1/records/1"),
            ("GET", "/v1/choices/genre"),
            ("GET", "/v1/months"),
            ("GET", "/v1/images/cover.jpg"),
            ("GET", "/v1/auth/logout"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let request = Request::builder()
                .method(method)
                .uri(route)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::FORBIDDEN,
                "{} {}",
                method,
                route
            );
        }
    }

    #[tokio::test]
    async fn login_rejects_unknown_handle() {
        let (app, _temp_dir) = test_app();

        let response = app.oneshot(login_request("intruder")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let (app, _temp_dir) = test_app();

        let response = app.oneshot(login_request(HANDLE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains(&format!("Max-Age={}", SESSION_TTL.as_secs())));

        let body = body_json(response).await;
        assert_eq!(body["token"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn authorization_header_opens_protected_routes() {
        let (app, _temp_dir) = test_app();

        let response = app.clone().oneshot(login_request(HANDLE)).await.unwrap();
        let token = body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri("/v1/months")
            .header("Authorization", token)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let (app, _temp_dir) = test_app();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["records"], 0);
        assert!(body["session_token"].is_null());
    }
}
