use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::RegistryConfig;
use crate::registry::RegistryService;

pub mod error;
pub mod executions;
pub mod openapi;
pub mod permissions;
pub mod sessions;
pub mod tools;

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Server {
    pub async fn start(config: &RegistryConfig, registry: RegistryService) -> Result<Self, String> {
        let state = Arc::new(ServerState {
            registry,
            max_page_size: config.max_page_size,
        });
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let app = Router::new()
            .route("/health", get(health))
            .route("/openapi.json", get(openapi_spec))
            .route(
                "/api/v1/tools",
                get(tools::list_tools).post(tools::register_tool),
            )
            .route("/api/v1/tools/:name", get(tools::get_tool_versions))
            .route(
                "/api/v1/tools/:name/execute",
                post(executions::execute_tool),
            )
            .route(
                "/api/v1/tools/:name/history",
                get(executions::execution_history),
            )
            .route(
                "/api/v1/tools/:name/:version",
                get(tools::get_tool)
                    .put(tools::update_tool)
                    .delete(tools::delete_tool),
            )
            .route(
                "/api/v1/tools/:name/:version/permissions",
                get(permissions::list_permissions).post(permissions::grant_permission),
            )
            .route("/api/v1/sessions", post(sessions::open_session))
            .route(
                "/api/v1/sessions/:session_id/close",
                post(sessions::close_session),
            )
            .with_state(state)
            .layer(cors);
        #[cfg(feature = "swagger-ui")]
        let app = app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        );

        let listener = TcpListener::bind(&config.bind)
            .await
            .map_err(|error| error.to_string())?;
        let addr = listener.local_addr().map_err(|error| error.to_string())?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        tracing::info!(%addr, "registry server listening");

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}

pub(crate) struct ServerState {
    pub(crate) registry: RegistryService,
    pub(crate) max_page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::AcknowledgingRunner;
    use crate::store::SqliteStore;
    use tempfile::tempdir;

    async fn start_test_server(dir: &tempfile::TempDir) -> Server {
        let store = SqliteStore::open(dir.path().join("registry.db")).expect("open store");
        let registry = RegistryService::new(Arc::new(store), Arc::new(AcknowledgingRunner));
        let config = RegistryConfig {
            bind: "127.0.0.1:0".to_string(),
            ..RegistryConfig::default()
        };
        Server::start(&config, registry).await.expect("start")
    }

    #[tokio::test]
    async fn start_binds_random_port() {
        let dir = tempdir().expect("tempdir");
        let mut server = start_test_server(&dir).await;
        assert_ne!(server.addr().port(), 0);
        server.shutdown().expect("shutdown");
    }

    #[tokio::test]
    async fn shutdown_twice_is_ok() {
        let dir = tempdir().expect("tempdir");
        let mut server = start_test_server(&dir).await;
        server.shutdown().expect("first shutdown");
        server.shutdown().expect("second shutdown is a no-op");
    }
}
