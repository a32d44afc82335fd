use crate::{
    app::AppContext, config::Config, health, http::RouteModule, middleware::MakeRequestUuid,
    webhooks::WebhookModule,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Main application structure for identity-sync
pub struct App {
    router: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Creates an App serving the health endpoint and the webhook endpoint at
    /// `config.webhook.path`
    pub fn new(config: Config, context: AppContext) -> Self {
        let webhook = WebhookModule::new(config.webhook.path.clone());
        let router = Router::<AppContext>::new().route("/health", get(health::health_handler));

        Self {
            router,
            config,
            context,
        }
        .register_module(webhook)
    }

    /// Register a route module with the application
    ///
    /// Note: The module's router will inherit the AppContext state from the parent router.
    /// Handlers should use `State<AppContext>` to access the application context.
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.router = module.register(self.router);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the router with middleware and state applied
    ///
    /// Tests drive this router with `tower::ServiceExt::oneshot` instead of
    /// binding a socket.
    pub fn into_router(self) -> Router {
        let app = self.with_middleware();
        app.router.with_state(app.context)
    }

    /// Apply middleware stack and prepare for serving
    fn with_middleware(mut self) -> Self {
        let mut router = self.router;

        // Middleware order (from inner to outer):
        // 1. Body size limit - reject large bodies before buffering them
        router = router.layer(DefaultBodyLimit::max(self.config.server.max_body_size));

        // 2. Request ID - add request IDs for tracing
        router = router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        // 3. Trace layer - HTTP tracing
        router = router.layer(TraceLayer::new_for_http());

        self.router = router;
        self
    }

    /// Start the application server
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be bound.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let webhook_path = self.config.webhook.path.clone();

        let router = self.into_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Webhook endpoint available at http://{}{}", addr, webhook_path);
        tracing::info!("Health check available at http://{}/health", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give connections a grace period to close
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
