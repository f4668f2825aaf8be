//! ImposterServer struct and main run loop.

use super::client::LinkClient;
use super::handler::{handle_request, HandlerState};
use super::network::create_listener;
use super::tls::create_tls_acceptor;
use crate::config::Config;
use crate::router::Router;
use crate::store::{RecordKey, RecordStore};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use imposter_expr::{Resources, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_STRING_LENGTH};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 8080;

/// Process-level options, normally taken from the `start` command line.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    /// How long in-flight connections may run after shutdown starts.
    pub graceful_timeout: Duration,
    /// Enables the recording store when set.
    pub record: Option<RecordKey>,
    pub cors: bool,
    pub link_timeout: Duration,
    pub max_file_size: u64,
    /// Longest string `rnd_string` may generate.
    pub max_string_length: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tls_cert_file: None,
            tls_key_file: None,
            graceful_timeout: Duration::from_secs(15),
            record: None,
            cors: false,
            link_timeout: Duration::from_secs(30),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

/// The mock server: compiled rules plus listener settings.
pub struct ImposterServer {
    state: Arc<HandlerState>,
    tls_acceptor: Option<TlsAcceptor>,
    port: u16,
    graceful_timeout: Duration,
}

impl ImposterServer {
    /// Compile `config` and prepare the listener settings.
    ///
    /// Must be called from within a tokio runtime (the `link` client keeps a
    /// handle to it).
    pub fn new(config: &Config, options: ServerOptions) -> Result<Self, anyhow::Error> {
        let tls_acceptor = match (&options.tls_cert_file, &options.tls_key_file) {
            (Some(cert), Some(key)) => Some(create_tls_acceptor(cert, key)?),
            (None, None) => None,
            _ => anyhow::bail!(
                "TLS requires both a certificate file and a private key file"
            ),
        };

        let fetcher = LinkClient::new(options.link_timeout)?;
        let resources = Resources::new(Arc::new(fetcher))
            .with_max_file_size(options.max_file_size)
            .with_max_string_length(options.max_string_length);
        let router = Router::new(config, Arc::new(resources))
            .map_err(|e| anyhow::anyhow!("could not load configuration: {e}"))?;

        Ok(Self {
            state: Arc::new(HandlerState {
                router: Arc::new(router),
                store: options.record.map(RecordStore::new),
                cors: options.cors,
            }),
            tls_acceptor,
            port: options.port,
            graceful_timeout: options.graceful_timeout,
        })
    }

    /// Bind the configured port and serve until Ctrl-C.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = create_listener(addr)
            .map_err(|e| anyhow::anyhow!("could not listen on {addr}: {e}"))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then drain connections.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), anyhow::Error> {
        let scheme = if self.tls_acceptor.is_some() {
            "https"
        } else {
            "http"
        };
        info!(
            "Imposter listening on {}://{}",
            scheme,
            listener.local_addr()?
        );
        info!("Loaded {} rules", self.state.router.len());
        if self.state.store.is_some() {
            info!("Recording of PUT requests enabled");
        }
        if self.state.cors {
            info!("CORS enabled");
        }

        let tracker = TaskTracker::new();
        let token = CancellationToken::new();
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };

            let state = Arc::clone(&self.state);
            let tls_acceptor = self.tls_acceptor.clone();
            let token = token.clone();

            tracker.spawn(async move {
                match tls_acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            serve_connection(tls_stream, state, token, remote_addr).await
                        }
                        Err(err) => {
                            warn!("TLS handshake failed from {}: {}", remote_addr, err);
                        }
                    },
                    None => serve_connection(stream, state, token, remote_addr).await,
                }
            });
        }

        info!("Imposter is shutting down...");
        tracker.close();
        token.cancel();
        if tokio::time::timeout(self.graceful_timeout, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Graceful timeout of {:?} elapsed with {} connection(s) still open",
                self.graceful_timeout,
                tracker.len()
            );
        }
        Ok(())
    }
}

async fn serve_connection<S>(
    stream: S,
    state: Arc<HandlerState>,
    token: CancellationToken,
    remote_addr: SocketAddr,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(&state, req).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = token.cancelled() => {
            // Finish the in-flight request, then close.
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        debug!("Error serving connection from {}: {}", remote_addr, err);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
