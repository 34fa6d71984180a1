//! Shared application state for the tap.
//!
//! Holds the validated config, the PDU decoder and walk options derived from
//! it, and the metrics registry. Cloning is cheap (`Arc` inside).

use std::sync::Arc;

use rgoose_core::protocol::{BerGooseDecoder, WalkOptions};

use crate::config::TapConfig;
use crate::obs::metrics::TapMetrics;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<TapMetrics>,
}

struct AppStateInner {
    cfg: TapConfig,
    decoder: BerGooseDecoder,
    opts: WalkOptions,
}

impl AppState {
    pub fn new(cfg: TapConfig) -> Self {
        let decoder = BerGooseDecoder::new(cfg.walker.max_ber_depth);
        let opts = cfg.walker.options();
        Self {
            inner: Arc::new(AppStateInner { cfg, decoder, opts }),
            metrics: Arc::new(TapMetrics::default()),
        }
    }

    pub fn cfg(&self) -> &TapConfig {
        &self.inner.cfg
    }

    pub fn decoder(&self) -> &BerGooseDecoder {
        &self.inner.decoder
    }

    pub fn walk_options(&self) -> &WalkOptions {
        &self.inner.opts
    }

    pub fn metrics(&self) -> &TapMetrics {
        &self.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }
}
