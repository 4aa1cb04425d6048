use anyhow::Result;
use clap::Parser;
use sse_http_server::{HttpServer, TickHandler};
use sse_session::SessionOptions;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sse-http-server")]
#[command(about = "HTTP Server streaming Server-Sent Events")]
struct Args {
    /// Server bind address
    #[arg(short, long, default_value = "0.0.0.0:8081")]
    addr: String,

    /// Reconnection delay announced to clients, in milliseconds
    #[arg(long)]
    retry: Option<u64>,

    /// Milliseconds between tick events
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Seconds between keep-alive comments
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: u64,

    /// End each connection after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Extra response header, as NAME=VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Ignore the Last-Event-ID header sent by reconnecting clients
    #[arg(long, default_value = "false")]
    ignore_client_event_id: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing with stderr output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = args.addr.parse()?;

    let mut options = SessionOptions::new().trust_client_event_id(!args.ignore_client_event_id);
    if let Some(retry) = args.retry {
        options = options.retry(retry);
    }
    for (name, value) in args.headers {
        options = options.header(name, value);
    }

    let mut handler = TickHandler::new(
        Duration::from_millis(args.interval_ms),
        Duration::from_secs(args.heartbeat_secs),
    );
    if let Some(max_ticks) = args.max_ticks {
        handler = handler.with_max_ticks(max_ticks);
    }

    // Create and run the server
    let server = HttpServer::new(addr, handler, options);

    server.run().await
}
