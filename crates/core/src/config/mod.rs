//! Sender configuration.
//!
//! Every field has a default, so an empty TOML document is a valid configuration.
//!
//! ```toml
//! packet_timeout_ms = 30000
//! max_slippage = 0.01
//!
//! [congestion]
//! initial_window = 1000
//!
//! [probe]
//! timeout_ms = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::congestion::AimdConfig;
use crate::crypto::CipherMode;
use crate::probe::ProbeConfig;
use crate::util::Ratio;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Lifetime of each prepare.
    pub packet_timeout_ms: u64,
    /// Give up on the whole payment after this long.
    pub payment_timeout_ms: Option<u64>,
    /// Fraction of the probed rate the sender is willing to lose, in `[0, 1)`.
    pub max_slippage: f64,
    /// Fail fast if the path cannot offer at least this rate.
    pub min_exchange_rate: Option<f64>,
    pub max_transient_failures: u32,
    pub min_packet_interval_ms: u64,
    /// How long the run loop sleeps when nothing can be sent and nothing is in flight.
    pub wait_poll_interval_ms: u64,
    pub min_packet_amount: u64,
    pub cipher_mode: CipherMode,
    pub congestion: AimdConfig,
    pub probe: ProbeConfig,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            packet_timeout_ms: 30_000,
            payment_timeout_ms: None,
            max_slippage: 0.01,
            min_exchange_rate: None,
            max_transient_failures: 10,
            min_packet_interval_ms: 0,
            wait_poll_interval_ms: 5,
            min_packet_amount: 1,
            cipher_mode: CipherMode::default(),
            congestion: AimdConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl SenderConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("invalid sender configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sender configuration {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..1.0).contains(&self.max_slippage) {
            anyhow::bail!("max_slippage must be in [0, 1), got {}", self.max_slippage);
        }
        if let Some(rate) = self.min_exchange_rate {
            if Ratio::from_f64(rate).is_none() {
                anyhow::bail!("min_exchange_rate must be a finite non-negative number, got {rate}");
            }
        }
        if self.packet_timeout_ms == 0 {
            anyhow::bail!("packet_timeout_ms must be positive");
        }
        if self.max_transient_failures == 0 {
            anyhow::bail!("max_transient_failures must be positive");
        }
        if self.congestion.initial_window == 0 {
            anyhow::bail!("congestion.initial_window must be positive");
        }
        if self.congestion.decrease_factor < 2 {
            anyhow::bail!(
                "congestion.decrease_factor must be at least 2, got {}",
                self.congestion.decrease_factor
            );
        }
        if self.probe.enabled && self.probe.amounts.is_empty() {
            anyhow::bail!("probe.amounts must not be empty when probing is enabled");
        }
        Ok(())
    }

    pub fn packet_timeout(&self) -> Duration {
        Duration::from_millis(self.packet_timeout_ms)
    }

    pub fn payment_timeout(&self) -> Option<Duration> {
        self.payment_timeout_ms.map(Duration::from_millis)
    }

    pub fn min_packet_interval(&self) -> Duration {
        Duration::from_millis(self.min_packet_interval_ms)
    }

    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }

    pub fn min_exchange_rate(&self) -> Option<Ratio> {
        self.min_exchange_rate.and_then(Ratio::from_f64)
    }
}
