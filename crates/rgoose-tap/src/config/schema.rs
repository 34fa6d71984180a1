use std::net::SocketAddr;

use serde::Deserialize;

use rgoose_core::error::{Result, RgooseError};
use rgoose_core::protocol::{LengthChecks, WalkOptions};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    pub version: u32,

    #[serde(default)]
    pub walker: WalkerSection,

    #[serde(default)]
    pub tap: TapSection,

    #[serde(default)]
    pub ops: OpsSection,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            version: 1,
            walker: WalkerSection::default(),
            tap: TapSection::default(),
            ops: OpsSection::default(),
        }
    }
}

impl TapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RgooseError::UnsupportedVersion);
        }

        self.walker.validate()?;
        self.tap.validate()?;
        self.ops.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkerSection {
    #[serde(default)]
    pub length_checks: LengthChecks,

    #[serde(default = "default_max_ber_depth")]
    pub max_ber_depth: u8,
}

impl Default for WalkerSection {
    fn default() -> Self {
        Self {
            length_checks: LengthChecks::default(),
            max_ber_depth: default_max_ber_depth(),
        }
    }
}

impl WalkerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.max_ber_depth) {
            return Err(RgooseError::BadRequest(
                "walker.max_ber_depth must be between 1 and 64".into(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> WalkOptions {
        WalkOptions {
            length_checks: self.length_checks,
        }
    }
}

fn default_max_ber_depth() -> u8 {
    rgoose_core::protocol::pdu::DEFAULT_MAX_DEPTH
}

/// How decoded frames are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Quiet,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapSection {
    #[serde(default = "default_listen_udp")]
    pub listen_udp: String,

    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,

    #[serde(default)]
    pub output: OutputFormat,
}

impl Default for TapSection {
    fn default() -> Self {
        Self {
            listen_udp: default_listen_udp(),
            max_datagram_bytes: default_max_datagram_bytes(),
            output: OutputFormat::default(),
        }
    }
}

impl TapSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_udp.parse::<SocketAddr>().map_err(|e| {
            RgooseError::BadRequest(format!("tap.listen_udp must be a valid SocketAddr: {e}"))
        })?;
        // smallest R-GOOSE SPDU up to the largest UDP payload
        if !(27..=65507).contains(&self.max_datagram_bytes) {
            return Err(RgooseError::BadRequest(
                "tap.max_datagram_bytes must be between 27 and 65507".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen_udp() -> String {
    "0.0.0.0:102".into()
}
fn default_max_datagram_bytes() -> usize {
    1500
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    /// `/healthz`, `/readyz`, `/metrics`; disabled when absent.
    #[serde(default)]
    pub listen: Option<String>,
}

impl OpsSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(listen) = &self.listen {
            listen.parse::<SocketAddr>().map_err(|e| {
                RgooseError::BadRequest(format!("ops.listen must be a valid SocketAddr: {e}"))
            })?;
        }
        Ok(())
    }
}
