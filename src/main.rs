use std::{path::PathBuf, sync::Arc};

use axum::Router;
use clap::Parser;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod backend;
mod config;
mod middleware;
mod routes;
mod session;
mod sharing;
mod tenant;

#[cfg(test)]
mod tests;

use backend::{HttpSecurityBackend, SecurityBackend};
use session::{SessionCodec, SessionGateway};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::PorticoConfig>,
    pub backend: Arc<dyn SecurityBackend>,
    pub codec: Arc<SessionCodec>,
}

impl AppState {
    pub fn new(config: config::PorticoConfig) -> Result<Self, backend::BackendError> {
        let secret = match &config.auth.session.secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "no session secret configured; generating an ephemeral one, \
                     sessions will not survive a restart"
                );
                generate_secret()
            }
        };

        let backend = HttpSecurityBackend::new(&config.backend)?;
        Ok(Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
            codec: Arc::new(SessionCodec::new(&secret)),
        })
    }

    /// Build the per-request session façade around this request's cookies.
    pub fn session_gateway(&self, cookies: Cookies) -> SessionGateway {
        SessionGateway::new(
            self.codec.clone(),
            self.backend.clone(),
            Arc::new(self.config.auth.clone()),
            cookies,
        )
    }
}

fn generate_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn build_app(config: &config::PorticoConfig, state: AppState) -> Router {
    let routed = routes::routes()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::tenancy_preprocessor,
        ))
        .with_state(state);

    let app = if config.server.base_path.is_empty() {
        routed
    } else {
        Router::new().nest(&config.server.base_path, routed)
    };

    // CookieManagerLayer must sit outside everything that reads or writes
    // cookies, including the tenancy preprocessor.
    app.layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
}

#[derive(Parser, Debug)]
#[command(version, about = "Portico dashboard session proxy", long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "portico.toml")]
    config: PathBuf,
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match config::PorticoConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load config from {}: {error}", args.config.display());
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    let state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("Failed to initialize application state: {error}");
            std::process::exit(1);
        }
    };

    let app = build_app(&config, state);
    let addr = std::net::SocketAddr::new(config.server.host, config.server.port);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("Failed to bind {addr}: {error}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, engine = %config.backend.url, "portico listening");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "server exited with error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
