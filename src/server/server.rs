//! HTTP server with axum router and graceful shutdown.

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{
    discard_execution, execution_events, get_execution, halt_execution, list_commands,
    list_executions, list_logs, log_events, log_size, run_command, terminate_execution, AppState,
};
use crate::config::ServerSettings;

/// HTTP front end over the execution and log services.
pub struct ApiServer {
    settings: ServerSettings,
    state: AppState,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a server with default settings.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            settings: ServerSettings::default(),
            state,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let execution = "/api/executions/:command_id/:start_time";
        let router = Router::new()
            .route("/api/commands", get(list_commands))
            .route("/api/commands/:id/run", post(run_command))
            .route("/api/executions", get(list_executions))
            .route(execution, get(get_execution).delete(discard_execution))
            .route(&format!("{execution}/terminate"), post(terminate_execution))
            .route(&format!("{execution}/halt"), post(halt_execution))
            .route(&format!("{execution}/events"), get(execution_events))
            .route("/api/logs", get(list_logs))
            .route("/api/logs/size", get(log_size))
            .route("/api/logs/events", get(log_events))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.settings.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address and serve until the cancel token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ServerError> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener, then shut down gracefully once
    /// the cancel token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let cancel = self.cancel.clone();
        let app = self.build_router();

        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "Server listening");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Server shutting down gracefully");
            })
            .await
            .map_err(ServerError::Serve)
    }
}
