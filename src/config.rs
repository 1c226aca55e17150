use std::path::PathBuf;

use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "translate-gateway")]
#[command(about = "Demo HTTP gateway for sentence-level Chinese->Korean translation")]
pub struct Args {
    // Address to bind the server on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    // TLS private key (PEM). Must be paired with --ssl-certfile
    #[arg(long)]
    pub ssl_keyfile: Option<PathBuf>,

    // TLS certificate chain (PEM)
    #[arg(long)]
    pub ssl_certfile: Option<PathBuf>,

    // CA bundle used to verify client certificates
    #[arg(long)]
    pub ssl_ca_certs: Option<PathBuf>,

    // Reject clients that do not present a certificate
    #[arg(long, default_value_t = false)]
    pub require_client_cert: bool,

    // Mount all routes under this prefix when behind a path-routing proxy
    #[arg(long)]
    pub root_path: Option<String>,

    // Log filter, e.g. "debug" or "translate_gateway=debug,info"
    #[arg(long, default_value = "debug")]
    pub log_level: String,

    #[command(flatten)]
    pub engine: EngineArgs,
}

// Engine-specific arguments, merged into the server's CLI.
#[derive(clap::Args, Debug, Clone)]
pub struct EngineArgs {
    // Inference engine base URL
    #[arg(long, default_value = "http://127.0.0.1:8100")]
    pub engine_url: String,

    // Connect timeout towards the engine, in seconds
    #[arg(long, default_value_t = 5)]
    pub engine_connect_timeout: u64,
}
