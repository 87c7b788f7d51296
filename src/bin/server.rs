use clap::Parser;
use sqlrelay::server::{self, ServerConfig, DEFAULT_PORT};
use sqlrelay::Error;
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    /// The port to listen on
    port: Option<String>,
}

impl Args {
    // A bad port is not fatal, the server falls back to the default one.
    fn port(&self) -> u16 {
        let Some(raw) = self.port.as_deref().map(str::trim) else {
            return DEFAULT_PORT;
        };

        raw.parse().unwrap_or_else(|_| {
            warn!("Invalid port '{}', falling back to default {}", raw, DEFAULT_PORT);
            DEFAULT_PORT
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    server::run(ServerConfig::with_port(args.port())).await
}
