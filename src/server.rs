use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{FrameCodec, DEFAULT_MAX_FRAME_SIZE};
use crate::command::{Command, Executable};
use crate::connection::Connection;
use crate::frame::Frame;
use crate::schema;
use crate::store::{Store, DEFAULT_DB_PATH};
use crate::Error;

pub const SERVER_NAME: &str = "STOMP_PYTHON_SQL_SERVER";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7778;
const DEFAULT_BACKLOG: u32 = 5;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub backlog: u32,
    pub max_frame_size: usize,
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            backlog: DEFAULT_BACKLOG,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Initializes the store, binds the listener and serves until Ctrl+C. The tracing subscriber is
/// installed by the binary.
pub async fn run(config: ServerConfig) -> Result<(), Error> {
    let store = Store::new(config.db_path.clone());
    let path = config.db_path.clone();
    // Nothing is accepted against a store whose tables may be missing.
    tokio::task::spawn_blocking(move || schema::init(&path)).await??;

    let listener = bind(&config).await?;

    serve(listener, store, config.max_frame_size, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down server...");
    })
    .await
}

/// Binds with `SO_REUSEADDR` and the configured backlog.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, Error> {
    let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await?
        .next()
        .ok_or_else(|| format!("could not resolve {}:{}", config.host, config.port))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    Ok(socket.listen(config.backlog)?)
}

/// Accepts connections until `shutdown` resolves, spawning one task per connection. Handlers
/// still running at that point are left alone.
#[instrument(name = "listener", skip_all, fields(server = SERVER_NAME))]
pub async fn serve(
    listener: TcpListener,
    store: Store,
    max_frame_size: usize,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    info!("Server started on {}", listener.local_addr()?);
    info!("Waiting for connections...");

    tokio::pin!(shutdown);

    loop {
        let (socket, client_address) = tokio::select! {
            res = listener.accept() => match res {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let store = store.clone();
        info!("Client connected from {:?}", client_address);

        tokio::spawn(async move {
            let codec = FrameCodec::with_max_frame_size(max_frame_size);
            if let Err(e) = handle_connection(socket, client_address, store, codec).await {
                error!("Error handling client {}: {}", client_address, e);
            }
        });
    }

    // Dropping the listener releases the port.
    drop(listener);
    Ok(())
}

#[instrument(
    name = "connection",
    skip(stream, store, codec),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    codec: FrameCodec,
) -> Result<(), Error> {
    let mut conn = Connection::with_codec(stream, client_address, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    // The connection is dropped, and the socket closed, whichever way this returns.
    let res = process(&mut conn, store).await;

    if let Err(e) = conn.close().await {
        debug!("Failed to shut down connection: {}", e);
    }
    info!("Client {} disconnected", client_address);

    res
}

async fn process(conn: &mut Connection, store: Store) -> Result<(), Error> {
    while let Some(frame) = conn.read_frame().await? {
        // An empty command ends the session just like a disconnect.
        if frame.is_empty() {
            debug!("Received empty frame, closing");
            break;
        }

        let cmd = Command::from(frame);
        info!("Received: {}", cmd);

        let store = store.clone();
        let reply = tokio::task::spawn_blocking(move || cmd.exec(store)).await?;
        debug!("Sending response to client: {}", reply);

        conn.write_frame(Frame::from(reply.to_string())).await?;
    }

    Ok(())
}
