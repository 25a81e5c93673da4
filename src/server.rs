pub mod auth;
pub mod errors;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::registry::Registry;
use auth::TokenAuthenticator;
use handlers::{events, health::health_check, revocations, trusted_cas};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub auth: Arc<TokenAuthenticator>,
}

impl AppState {
    pub fn new(registry: Registry, auth: TokenAuthenticator) -> Self {
        Self {
            registry: Arc::new(registry),
            auth: Arc::new(auth),
        }
    }
}

/// Builds the HTTP API around the registry.
pub fn router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_check))
        .route("/owner", get(trusted_cas::get_owner))
        .route(
            "/trusted-cas",
            get(trusted_cas::list_trusted_cas).post(trusted_cas::add_trusted_ca),
        )
        .route("/trusted-cas/{identity}", get(trusted_cas::trust_status))
        .route("/revocations", post(revocations::revoke_certificate))
        .route("/revocations/{serial}", get(revocations::revocation_details))
        .route(
            "/revocations/{serial}/status",
            get(revocations::revocation_status),
        )
        .route("/events", get(events::list_events))
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    /// Binds the listener. Use port 0 to let the OS pick a free port.
    pub async fn new(state: AppState, config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .wrap_err_with(|| format!("Binding TCP listener on {addr}"))?;

        Ok(Self {
            router: router(state),
            listener,
        })
    }

    /// The port the server is bound to.
    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("Getting local address")?
            .port())
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.listener.local_addr().context("Getting local address")?;
        tracing::info!("Server listening on http://{addr}");
        axum::serve(self.listener, self.router)
            .await
            .context("Running server")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Identity, MemoryStore, SerialNumber};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let owner = Identity::new("owner").unwrap();
        let registry = Registry::open(owner.clone(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        let mut auth = TokenAuthenticator::default();
        auth.insert(owner, "owner-token").unwrap();
        auth.insert(Identity::new("ca-1").unwrap(), "ca-token").unwrap();
        router(AppState::new(registry, auth))
    }

    fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_revocation_flow() {
        let router = test_router().await;
        let serial = SerialNumber::digest("123456");

        let (status, body) = send(
            &router,
            post_json(
                "/trusted-cas",
                Some("owner-token"),
                serde_json::json!({ "identity": "ca-1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["added"], true);

        let (status, body) = send(
            &router,
            post_json(
                "/revocations",
                Some("ca-token"),
                serde_json::json!({
                    "serialNumber": serial.to_string(),
                    "issuerId": "TrustedCA-1",
                    "timestamp": 1_700_000_000u64,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sequence"], 0);
        assert_eq!(body["event"]["serialNumber"], serial.to_string());

        let request = Request::get(format!("/revocations/{serial}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["issuerId"], "TrustedCA-1");
        assert_eq!(body["timestamp"], 1_700_000_000u64);
    }

    #[tokio::test]
    async fn test_mutations_require_a_known_token() {
        let router = test_router().await;

        let request = post_json("/trusted-cas", None, serde_json::json!({ "identity": "x" }));
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let request = post_json(
            "/trusted-cas",
            Some("wrong-token"),
            serde_json::json!({ "identity": "x" }),
        );
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_serial_is_rejected() {
        let router = test_router().await;
        let request = Request::get("/revocations/0x1234/status")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_unknown_serial_is_not_found() {
        let router = test_router().await;
        let serial = SerialNumber::digest("missing");

        let request = Request::get(format!("/revocations/{serial}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let request = Request::get(format!("/revocations/{serial}/status"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["revoked"], false);
    }

    #[tokio::test]
    async fn test_invalid_bodies_use_the_error_envelope() {
        let router = test_router().await;
        let serial = SerialNumber::digest("123456").to_string();

        let bodies = [
            serde_json::json!({ "serialNumber": serial, "timestamp": 1 }),
            serde_json::json!({ "serialNumber": serial, "issuerId": "CA", "timestamp": -1 }),
        ];
        for body in bodies {
            let (status, body) = send(&router, post_json("/revocations", Some("ca-token"), body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "INVALID_REQUEST");
        }

        let request = Request::post("/trusted-cas")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer owner-token")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_malformed_event_query_is_rejected() {
        let router = test_router().await;
        let request = Request::get("/events?from=abc").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_bearer_scheme_is_case_insensitive() {
        let router = test_router().await;
        let request = Request::post("/trusted-cas")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "bearer owner-token")
            .body(Body::from(serde_json::json!({ "identity": "ca-1" }).to_string()))
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["added"], true);
    }
}
