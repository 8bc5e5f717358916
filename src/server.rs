use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::Context;
use axum::{middleware, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    decompression::RequestDecompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use crate::{
    error::ErrorVerbosity,
    middleware::{
        catch_panic::handle_panic,
        fallback::{method_not_allowed, not_found},
        trace_exchange::trace_exchange,
    },
    route::books,
    state::ApiState,
    store::BookStore,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_address")]
    socket_address: SocketAddr,
    #[serde(default)]
    error_verbosity: ErrorVerbosity,
    /// The JSON file holding the whole collection.
    #[serde(default = "default_data_file")]
    data_file: PathBuf,
    /// Refuse to start if the data file exists but cannot be read or parsed.
    #[serde(default)]
    strict_startup: bool,
    /// Answer mutating requests with `500` if the data file could not be written.
    #[serde(default)]
    fail_on_write_error: bool,
}

fn default_socket_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 3000)
}

fn default_data_file() -> PathBuf {
    PathBuf::from("books.json")
}

impl ServerConfig {
    pub fn new(socket_address: SocketAddr, error_verbosity: ErrorVerbosity, data_file: PathBuf) -> Self {
        Self {
            socket_address,
            error_verbosity,
            data_file,
            strict_startup: false,
            fail_on_write_error: false,
        }
    }

    pub fn with_strict_startup(mut self, strict_startup: bool) -> Self {
        self.strict_startup = strict_startup;
        self
    }

    pub fn with_fail_on_write_error(mut self, fail_on_write_error: bool) -> Self {
        self.fail_on_write_error = fail_on_write_error;
        self
    }

    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Opens the books file and builds the shared state.
    ///
    /// A file that exists but cannot be read or parsed is fatal with `strict_startup`.
    /// Otherwise it is served as an empty collection and replaced by the first mutation.
    async fn state(&self) -> anyhow::Result<ApiState> {
        let store = BookStore::new(&self.config.data_file);

        match store.check_startup().await {
            Ok(count) => {
                tracing::info!(path = %store.path().display(), count, "Books file loaded");
            }
            Err(err) if self.config.strict_startup => {
                return Err(err).context("Books file is unreadable and strict startup is enabled");
            }
            Err(err) => {
                let err = anyhow::Error::from(err);
                tracing::warn!(
                    err = %format!("{err:#}"),
                    "Books file is unreadable, serving an empty collection. The next change will overwrite it"
                );
            }
        }

        Ok(ApiState::new(
            self.config.error_verbosity,
            store,
            self.config.fail_on_write_error,
        ))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let state = self.state().await?;
        let app = app(state);

        tracing::info!(addr = %self.config.socket_address, "Starting server");

        let listener = TcpListener::bind(&self.config.socket_address)
            .await
            .context("Bind failed")?;

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

        Ok(())
    }
}

pub(crate) fn app(state: ApiState) -> Router {
    app_with_routes(books::app::app(), state)
}

/// Wraps `routes` in the fallback, middleware and tower layers every route is served with.
pub(crate) fn app_with_routes(routes: Router<ApiState>, state: ApiState) -> Router {
    Router::new()
        .merge(routes)
        .fallback(not_found::<ApiState>)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            method_not_allowed::<ApiState>,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), trace_exchange))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                        .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                        .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
                )
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");

        tracing::info!("CTRL+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;

        tracing::info!("SIGTERM received");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
