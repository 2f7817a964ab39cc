//! Panel configuration.
//!
//! Values come from a TOML file with per-field defaults; the binary layers
//! CLI overrides on top. The display revision is kept as the raw configured
//! string and resolved exactly once at startup, before any hardware I/O, so
//! a typo fails the process instead of a half-initialized screen.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::display::Orientation;
use crate::error::{PanelError, Result};
use crate::geometry::Rgb;
use crate::layout::Assets;

/// Closed set of supported display variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRevision {
    /// Turing Smart Screen 3.5" / UsbPCMonitor.
    RevA,
    /// XuanFang 3.5" (incl. flagship).
    RevB,
    /// Turing Smart Screen 5".
    RevC,
    /// Kipye Qiye Smart Display 3.5".
    RevD,
    /// No hardware; operations are recorded in memory.
    Simulated,
}

impl DisplayRevision {
    /// Parse the configured revision string. Unknown values are fatal.
    pub fn resolve(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(DisplayRevision::RevA),
            "B" => Ok(DisplayRevision::RevB),
            "C" => Ok(DisplayRevision::RevC),
            "D" => Ok(DisplayRevision::RevD),
            "SIMU" | "SIMULATED" => Ok(DisplayRevision::Simulated),
            other => Err(PanelError::Config(format!(
                "unknown display revision `{other}` (expected A, B, C, D or SIMU)"
            ))),
        }
    }

    pub(crate) fn wire_code(&self) -> u8 {
        match self {
            DisplayRevision::RevA => 0x41,
            DisplayRevision::RevB => 0x42,
            DisplayRevision::RevC => 0x43,
            DisplayRevision::RevD => 0x44,
            DisplayRevision::Simulated => 0x00,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Base URL of the cluster API, e.g. `https://pve.example.com:8006`.
    pub api_url: String,
    /// API token in `user@realm!name=uuid` form. Sent as-is in the
    /// `Authorization` header; omit for anonymous endpoints.
    pub api_token: Option<String>,
    /// Display revision letter, or `SIMU` for the recording sink.
    pub revision: String,
    /// Byte channel the display is reachable over.
    pub channel: PathBuf,
    /// Panel dimensions in portrait orientation (width <= height).
    pub width: u16,
    pub height: u16,
    pub orientation: Orientation,
    /// Brightness percentage. Revision A panels run hot above 50.
    pub brightness: u8,
    pub backplate: Rgb,
    pub background: PathBuf,
    pub header_font: PathBuf,
    pub header_font_size: u16,
    pub row_font: PathBuf,
    pub row_font_size: u16,
    /// Fixed residual delay between iterations, in seconds.
    pub interval_secs: u64,
    /// How often metric snapshots are written to the log. Zero disables.
    pub metrics_interval_secs: u64,
    /// Structured log destination; stderr when unset.
    pub log_file: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://localhost:8006".to_string(),
            api_token: None,
            revision: "SIMU".to_string(),
            channel: PathBuf::from("/dev/ttyACM0"),
            width: 320,
            height: 480,
            orientation: Orientation::Landscape,
            brightness: 10,
            backplate: Rgb::BLACK,
            background: PathBuf::from("res/backgrounds/bg4.png"),
            header_font: PathBuf::from("res/fonts/geforce/GeForce-Bold.ttf"),
            header_font_size: 20,
            row_font: PathBuf::from("res/fonts/geforce/GeForce-Light.ttf"),
            row_font_size: 24,
            interval_secs: 5,
            metrics_interval_secs: 60,
            log_file: None,
        }
    }
}

impl PanelConfig {
    /// Load a config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PanelConfig = toml::from_str(&raw)
            .map_err(|err| PanelError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width > self.height {
            return Err(PanelError::Config(format!(
                "dimensions must be given for portrait orientation (width {} > height {})",
                self.width, self.height
            )));
        }
        if self.brightness > 100 {
            return Err(PanelError::Config(format!(
                "brightness {} out of range 0-100",
                self.brightness
            )));
        }
        Ok(())
    }

    /// Resolve the configured revision string into the closed variant set.
    pub fn resolved_revision(&self) -> Result<DisplayRevision> {
        DisplayRevision::resolve(&self.revision)
    }

    /// Static assets referenced by every composed frame.
    pub fn assets(&self) -> Assets {
        Assets {
            background: self.background.clone(),
            header_font: self.header_font.clone(),
            header_font_size: self.header_font_size,
            row_font: self.row_font.clone(),
            row_font_size: self.row_font_size,
        }
    }
}
