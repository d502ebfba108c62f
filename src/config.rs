//! Configuration types and validation
//! Author: kartik4091
//! Created: 2026-03-02

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, MIN_KEY_BITS};
use crate::signing::key_source::{DEFAULT_PRIVATE_KEY_FILE, DEFAULT_PUBLIC_KEY_FILE};

/// Upload ceiling enforced before hashing
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub keys: KeyConfig,
    pub qr: QrConfig,
    pub upload: UploadConfig,
    pub store: StoreConfig,
}

/// Where signing keys live and how new ones are made
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub key_size: u32,
    pub generate_if_missing: bool,
}

/// QR image placement on the first page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Raster size of the embedded image
    pub size_px: u32,
    /// Drawn size on the page, in points
    pub display_size_pt: u32,
    /// Distance from the bottom-right page corner, in points
    pub margin_pt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

// Defaults
impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key_path: DEFAULT_PRIVATE_KEY_FILE.into(),
            public_key_path: DEFAULT_PUBLIC_KEY_FILE.into(),
            key_size: MIN_KEY_BITS,
            generate_if_missing: false,
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size_px: 256,
            display_size_pt: 96,
            margin_pt: 24,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_bytes: DEFAULT_MAX_UPLOAD_BYTES }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: "docseal-records.json".into() }
    }
}

impl SealConfig {
    /// Loads YAML or JSON depending on the file extension, then validates
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SealConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config format {:?} for {}",
                    other,
                    path.display()
                )))
            }
        };
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.key_size < MIN_KEY_BITS {
            return Err(Error::UndersizedKey {
                bits: self.keys.key_size,
                minimum: MIN_KEY_BITS,
            });
        }
        if !(21..=2048).contains(&self.qr.size_px) {
            return Err(Error::Config(format!(
                "qr.size_px must be between 21 and 2048, got {}",
                self.qr.size_px
            )));
        }
        if self.qr.display_size_pt == 0 {
            return Err(Error::Config("qr.display_size_pt must be positive".into()));
        }
        if self.upload.max_bytes == 0 {
            return Err(Error::Config("upload.max_bytes must be positive".into()));
        }
        Ok(())
    }
}
