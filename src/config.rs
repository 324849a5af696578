// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::{FacingMode, FrameSize};
use crate::constants::{encoding, resolution, timing};
use crate::errors::{AppError, AppResult};
use crate::i18n::Locale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory under the user config dir holding our settings
const CONFIG_DIR_NAME: &str = "facecam";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language of the loading and error copy; unset follows the desktop
    pub locale: Option<Locale>,
    /// Ideal width for the first request
    pub ideal_width: u32,
    /// Ideal height for the first request
    pub ideal_height: u32,
    /// Preferred camera direction for the first request
    pub facing: FacingMode,
    /// Pause before the fallback request, in milliseconds
    pub retry_grace_ms: u64,
    /// Flash duration before the frame grab, in milliseconds
    pub capture_settle_ms: u64,
    /// JPEG quality factor (0.0 - 1.0)
    pub jpeg_quality: f32,
    /// Pin every request to one V4L2 device node
    pub device_path: Option<String>,
    /// Where the CLI writes captured images (default: pictures dir)
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: None,
            ideal_width: resolution::IDEAL_WIDTH,
            ideal_height: resolution::IDEAL_HEIGHT,
            facing: FacingMode::User,
            retry_grace_ms: timing::RETRY_GRACE_DELAY.as_millis() as u64,
            capture_settle_ms: timing::CAPTURE_SETTLE_DELAY.as_millis() as u64,
            jpeg_quality: encoding::JPEG_QUALITY,
            device_path: None,
            output_dir: None,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location; defaults if there is none
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no config directory on this system".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject values no session could run with
    pub fn validate(&self) -> AppResult<()> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(AppError::Config(format!(
                "ideal resolution must be non-zero, got {}x{}",
                self.ideal_width, self.ideal_height
            )));
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(AppError::Config(format!(
                "jpeg_quality must be in (0, 1], got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn ideal_size(&self) -> FrameSize {
        FrameSize::new(self.ideal_width, self.ideal_height)
    }

    pub fn retry_grace_delay(&self) -> Duration {
        Duration::from_millis(self.retry_grace_ms)
    }

    pub fn capture_settle_delay(&self) -> Duration {
        Duration::from_millis(self.capture_settle_ms)
    }
}
