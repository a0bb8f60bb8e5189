//! Serve command - bind the dispatcher to an HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use demlayer::layer::{LayerContext, LayerRegistry};
use demlayer::service::Dispatcher;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub listen: Option<SocketAddr>,
    /// Serve what is cached without starting the builders
    pub no_build: bool,
}

/// Run the serve command until Ctrl+C.
pub async fn run(runner: &CliRunner, args: ServeArgs) -> Result<(), CliError> {
    runner.log_startup("serve");
    let config = runner.config();

    let mut context = LayerContext::new();
    if !args.no_build {
        context = context.with_runtime(Handle::current());
    }
    let registry = Arc::new(LayerRegistry::build(&config.layers, &context)?);

    let capabilities = match &config.server.capabilities {
        Some(path) => Some(std::fs::read(path).map_err(|error| CliError::FileRead {
            path: path.clone(),
            error,
        })?),
        None => None,
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), capabilities));

    let addr = args.listen.unwrap_or(config.server.listen);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|error| CliError::Bind { addr, error })?;

    println!("demlayer v{}", demlayer::VERSION);
    println!("Listening on http://{}/", addr);
    for name in registry.names() {
        println!("  layer: {}", name);
    }
    println!("Press Ctrl+C to stop.");
    info!(%addr, layers = registry.len(), builders = registry.active_builders(), "Serving");

    let result = axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registry.shutdown().await;
    info!("Server stopped");
    result.map_err(CliError::Serve)
}

fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(handle))
        .route("/wms", get(handle))
        .with_state(dispatcher)
}

/// Runs the CPU-bound dispatcher off the async workers.
async fn handle(
    State(dispatcher): State<Arc<Dispatcher>>,
    Query(args): Query<Vec<(String, String)>>,
) -> Response {
    match tokio::task::spawn_blocking(move || dispatcher.handle_request(&args)).await {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, response.content_type)],
                response.body,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Request task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "InternalError").into_response()
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            println!();
            println!("Shutting down...");
            info!("Shutdown requested");
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl+C; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
