//! rgoose tap
//!
//! - `decode <file>`: walk hex-encoded frames from a file and print them
//! - `listen`: decode R-GOOSE datagrams from UDP, with optional ops endpoints

use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use rgoose_core::error::{Result, RgooseError};
use rgoose_core::protocol::Framing;
use rgoose_tap::{app_state::AppState, config, input, pipeline, render, router, transport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode hex frames, one per line
    Decode {
        /// Input file
        file: String,
        #[arg(long, value_enum, default_value_t = FramingArg::Auto)]
        framing: FramingArg,
        #[arg(long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
    },
    /// Listen for R-GOOSE datagrams on tap.listen_udp
    Listen,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FramingArg {
    Auto,
    Goose,
    Rgoose,
    Cltp,
}

impl FramingArg {
    fn framing(self) -> Option<Framing> {
        match self {
            FramingArg::Auto => None,
            FramingArg::Goose => Some(Framing::Goose),
            FramingArg::Rgoose => Some(Framing::Rgoose),
            FramingArg::Cltp => Some(Framing::Cltp),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "rgoose-tap failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => config::schema::TapConfig::default(),
    };
    let state = AppState::new(cfg);

    match args.command {
        Commands::Decode { file, framing, format } => decode_file(&state, &file, framing, format),
        Commands::Listen => listen(state).await,
    }
}

fn decode_file(state: &AppState, path: &str, framing: FramingArg, format: FormatArg) -> Result<()> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| RgooseError::BadRequest(format!("read {path} failed: {e}")))?;
    let frames = input::parse_hex_lines(&src)?;
    tracing::info!(path, frames = frames.len(), "decoding hex frames");

    let mut stdout = std::io::stdout().lock();
    for frame in frames {
        let source = format!("{path}:{}", frame.line);
        let d = match pipeline::process(state, framing.framing(), &frame.bytes) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(%source, error = %e, "frame skipped");
                continue;
            }
        };
        let out = match format {
            FormatArg::Text => format!("{source}\n{}", render::text(&d, frame.bytes.len())),
            FormatArg::Json => format!("{}\n", render::json_line(&source, frame.bytes.len(), &d)?),
        };
        stdout
            .write_all(out.as_bytes())
            .map_err(|e| RgooseError::Internal(format!("stdout write failed: {e}")))?;
    }
    Ok(())
}

async fn listen(state: AppState) -> Result<()> {
    if let Some(listen) = &state.cfg().ops.listen {
        let addr: SocketAddr = listen
            .parse()
            .map_err(|e| RgooseError::BadRequest(format!("ops.listen: {e}")))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RgooseError::Internal(format!("bind {addr} failed: {e}")))?;
        let app = router::build_router(state.clone());
        tracing::info!(%addr, "ops endpoints listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "ops server failed");
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl_c handler failed");
        }
    };
    transport::udp::serve_udp(state, shutdown).await
}
