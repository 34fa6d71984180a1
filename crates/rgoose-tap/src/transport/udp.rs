//! UDP receive loop (R-GOOSE, bare or inside CLTP).
//!
//! Every datagram is decoded inline on the receive task: walking a frame is
//! bounded by its length and never blocks.

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use rgoose_core::error::{Result, RgooseError};
use rgoose_core::protocol::Dissection;

use crate::app_state::AppState;
use crate::config::OutputFormat;
use crate::{pipeline, render};

/// Bind `tap.listen_udp` and serve until `shutdown` resolves.
pub async fn serve_udp(state: AppState, shutdown: impl Future<Output = ()>) -> Result<()> {
    let addr: SocketAddr = state
        .cfg()
        .tap
        .listen_udp
        .parse()
        .map_err(|e| RgooseError::BadRequest(format!("tap.listen_udp: {e}")))?;
    let sock = UdpSocket::bind(addr)
        .await
        .map_err(|e| RgooseError::Internal(format!("bind {addr} failed: {e}")))?;
    serve_socket(state, sock, shutdown).await
}

/// Serve on an already bound socket until `shutdown` resolves.
pub async fn serve_socket(
    state: AppState,
    sock: UdpSocket,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let local = sock
        .local_addr()
        .map_err(|e| RgooseError::Internal(format!("local_addr failed: {e}")))?;
    let max = state.cfg().tap.max_datagram_bytes;
    // one spare byte to detect oversized datagrams
    let mut buf = vec![0u8; max + 1];

    info!(%local, max_datagram_bytes = max, "listening for R-GOOSE datagrams");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("udp listener shutting down");
                state.metrics().set_draining();
                return Ok(());
            }
            res = sock.recv_from(&mut buf) => {
                let (n, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "udp recv failed");
                        continue;
                    }
                };
                if n > max {
                    state.metrics().rejected.inc(&[("reason", "too_large")]);
                    debug!(%peer, "datagram exceeds tap.max_datagram_bytes");
                    continue;
                }
                let Some(frame) = buf.get(..n) else { continue };
                match pipeline::process(&state, None, frame) {
                    Ok(d) => emit(&state, &peer.to_string(), n, &d),
                    Err(e) => debug!(%peer, error = %e, "datagram ignored"),
                }
            }
        }
    }
}

fn emit(state: &AppState, source: &str, len: usize, d: &Dissection) {
    let line = match state.cfg().tap.output {
        OutputFormat::Quiet => return,
        OutputFormat::Text => render::text(d, len),
        OutputFormat::Json => match render::json_line(source, len, d) {
            Ok(mut l) => {
                l.push('\n');
                l
            }
            Err(e) => {
                warn!(error = %e, "render failed");
                return;
            }
        },
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(line.as_bytes()) {
        warn!(error = %e, "stdout write failed");
    }
}
