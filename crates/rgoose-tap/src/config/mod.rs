//! Tap config loader (strict parsing).

pub mod schema;

use std::fs;

use rgoose_core::error::{Result, RgooseError};

pub use schema::{OpsSection, OutputFormat, TapConfig, TapSection, WalkerSection};

pub fn load_from_file(path: &str) -> Result<TapConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RgooseError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<TapConfig> {
    let cfg: TapConfig = serde_yaml::from_str(s)
        .map_err(|e| RgooseError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
