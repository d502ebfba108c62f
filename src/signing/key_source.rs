//! Key material resolution
//! Author: kartik4091
//! Created: 2026-03-03
//!
//! Key PEMs can arrive through several channels. Each channel is a named
//! provider; providers are tried in order and the first one that yields a
//! private key wins. Resolution is a function of an explicit
//! [`KeySourceConfig`], so nothing reads the process environment behind the
//! caller's back.

use std::collections::HashMap;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, info};

use crate::config::KeyConfig;
use crate::error::{Error, Result};

pub const ENV_PRIVATE_KEY: &str = "DOCSEAL_PRIVATE_KEY";
pub const ENV_PUBLIC_KEY: &str = "DOCSEAL_PUBLIC_KEY";
pub const LEGACY_ENV_PRIVATE_KEY: &str = "RSA_PRIVATE_KEY";
pub const LEGACY_ENV_PUBLIC_KEY: &str = "RSA_PUBLIC_KEY";
pub const ENV_PRIVATE_KEY_FILE: &str = "DOCSEAL_PRIVATE_KEY_FILE";
pub const ENV_PUBLIC_KEY_FILE: &str = "DOCSEAL_PUBLIC_KEY_FILE";

pub const DEFAULT_PRIVATE_KEY_FILE: &str = "keys/private.pem";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "keys/public.pem";
pub const SECRET_PRIVATE_KEY_FILE: &str = "/run/secrets/docseal_private_key";
pub const SECRET_PUBLIC_KEY_FILE: &str = "/run/secrets/docseal_public_key";

/// Where the active key pair lives, which decides whether it can be rotated
/// in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    /// PEM held in an environment variable; only the operator can replace it
    Environment { variable: String },
    /// PEM files on disk
    Files(KeyFiles),
    /// Handed to the store directly by the caller
    Supplied,
}

/// A private/public PEM file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl KeyFiles {
    pub fn new(private_path: impl Into<PathBuf>, public_path: impl Into<PathBuf>) -> Self {
        Self {
            private_path: private_path.into(),
            public_path: public_path.into(),
        }
    }
}

/// PEM text as found by a provider
#[derive(Clone)]
pub struct KeyMaterial {
    pub source: String,
    pub origin: KeyOrigin,
    pub private_pem: String,
    pub public_pem: Option<String>,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("source", &self.source)
            .field("origin", &self.origin)
            .field("has_public", &self.public_pem.is_some())
            .finish()
    }
}

/// One place key material may come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyProvider {
    /// PEM (raw or base64-wrapped) held directly in environment variables
    EnvPem {
        name: &'static str,
        private_var: String,
        public_var: String,
    },
    /// Environment variables naming PEM files
    EnvPath {
        private_var: String,
        public_var: String,
    },
    /// PEM files at fixed paths
    Files {
        name: &'static str,
        private_path: PathBuf,
        public_path: PathBuf,
    },
}

impl KeyProvider {
    pub fn name(&self) -> String {
        match self {
            KeyProvider::EnvPem { name, .. } => (*name).to_string(),
            KeyProvider::EnvPath { .. } => "key-file-env".to_string(),
            KeyProvider::Files { name, private_path, .. } => {
                format!("{} ({})", name, private_path.display())
            }
        }
    }

    fn fetch(&self, env: &HashMap<String, String>) -> Result<Option<KeyMaterial>> {
        match self {
            KeyProvider::EnvPem { private_var, public_var, .. } => {
                let Some(private) = non_empty(env.get(private_var)) else {
                    return Ok(None);
                };
                let public = non_empty(env.get(public_var)).map(|v| unwrap_pem(v)).transpose()?;
                Ok(Some(KeyMaterial {
                    source: self.name(),
                    origin: KeyOrigin::Environment { variable: private_var.clone() },
                    private_pem: unwrap_pem(private)?,
                    public_pem: public,
                }))
            }
            KeyProvider::EnvPath { private_var, public_var } => {
                let Some(private_path) = non_empty(env.get(private_var)) else {
                    return Ok(None);
                };
                let private_path = PathBuf::from(private_path);
                // without a public path the public half is derived on load,
                // so a rotation may write it anywhere beside the private key
                let public_path = non_empty(env.get(public_var))
                    .map(PathBuf::from)
                    .unwrap_or_else(|| private_path.with_extension("pub.pem"));
                read_files(
                    format!("{} ({})", self.name(), private_path.display()),
                    &KeyFiles::new(private_path, public_path),
                    true,
                )
            }
            KeyProvider::Files { private_path, public_path, .. } => read_files(
                self.name(),
                &KeyFiles::new(private_path.clone(), public_path.clone()),
                false,
            ),
        }
    }
}

/// Explicit inputs for key resolution
#[derive(Debug, Clone, Default)]
pub struct KeySourceConfig {
    /// Snapshot of the relevant environment variables
    pub env: HashMap<String, String>,
    /// Paths from the configuration file, tried after the env providers
    pub configured_private: Option<PathBuf>,
    pub configured_public: Option<PathBuf>,
    /// Conventional fallback locations, tried last
    pub default_files: Option<KeyFiles>,
    pub secret_files: Option<KeyFiles>,
}

impl KeySourceConfig {
    /// Captures the key-related environment variables and configured paths
    pub fn from_env(keys: &KeyConfig) -> Self {
        let env = [
            ENV_PRIVATE_KEY,
            ENV_PUBLIC_KEY,
            LEGACY_ENV_PRIVATE_KEY,
            LEGACY_ENV_PUBLIC_KEY,
            ENV_PRIVATE_KEY_FILE,
            ENV_PUBLIC_KEY_FILE,
        ]
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
        .collect();

        Self {
            env,
            configured_private: Some(keys.private_key_path.clone()),
            configured_public: Some(keys.public_key_path.clone()),
            default_files: Some(KeyFiles::new(DEFAULT_PRIVATE_KEY_FILE, DEFAULT_PUBLIC_KEY_FILE)),
            secret_files: Some(KeyFiles::new(SECRET_PRIVATE_KEY_FILE, SECRET_PUBLIC_KEY_FILE)),
        }
    }

    /// Providers in priority order
    pub fn providers(&self) -> Vec<KeyProvider> {
        let mut providers = vec![
            KeyProvider::EnvPem {
                name: "env",
                private_var: ENV_PRIVATE_KEY.into(),
                public_var: ENV_PUBLIC_KEY.into(),
            },
            KeyProvider::EnvPem {
                name: "legacy-env",
                private_var: LEGACY_ENV_PRIVATE_KEY.into(),
                public_var: LEGACY_ENV_PUBLIC_KEY.into(),
            },
            KeyProvider::EnvPath {
                private_var: ENV_PRIVATE_KEY_FILE.into(),
                public_var: ENV_PUBLIC_KEY_FILE.into(),
            },
        ];

        if let Some(private_path) = &self.configured_private {
            let public_path = self
                .configured_public
                .clone()
                .unwrap_or_else(|| private_path.with_extension("pub.pem"));
            providers.push(KeyProvider::Files {
                name: "configured-files",
                private_path: private_path.clone(),
                public_path,
            });
        }

        for (name, files) in [("default-files", &self.default_files), ("secret-files", &self.secret_files)] {
            if let Some(files) = files {
                providers.push(KeyProvider::Files {
                    name,
                    private_path: files.private_path.clone(),
                    public_path: files.public_path.clone(),
                });
            }
        }

        providers
    }

    /// Returns material from the first provider that has any
    pub fn resolve(&self) -> Result<KeyMaterial> {
        let providers = self.providers();
        for provider in &providers {
            if let Some(material) = provider.fetch(&self.env)? {
                info!("Loaded key material from {}", material.source);
                return Ok(material);
            }
            debug!("No key material from {}", provider.name());
        }

        let tried: Vec<String> = providers.iter().map(KeyProvider::name).collect();
        Err(Error::KeyNotFound(tried.join(", ")))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Accepts PEM text directly or base64 of PEM text
pub fn unwrap_pem(value: &str) -> Result<String> {
    let value = value.trim();
    if value.contains("-----BEGIN") {
        // env files often carry literal "\n" sequences
        return Ok(value.replace("\\n", "\n"));
    }

    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = BASE64
        .decode(compact.as_bytes())
        .map_err(|_| Error::KeyFormat("value is neither PEM nor base64-wrapped PEM".into()))?;
    let text = String::from_utf8(decoded)
        .map_err(|_| Error::KeyFormat("base64-wrapped key is not UTF-8 PEM".into()))?;

    if !text.contains("-----BEGIN") {
        return Err(Error::KeyFormat("base64-wrapped value does not contain a PEM block".into()));
    }
    Ok(text)
}

/// A missing private file means "not this provider". A path the operator
/// named explicitly must exist.
fn read_files(source: String, files: &KeyFiles, required: bool) -> Result<Option<KeyMaterial>> {
    let private_path = files.private_path.as_path();
    if !private_path.is_file() {
        if required {
            return Err(Error::KeyNotFound(format!(
                "private key file {} does not exist",
                private_path.display()
            )));
        }
        return Ok(None);
    }

    let private_pem = unwrap_pem(&std::fs::read_to_string(private_path)?)?;
    let public_pem = if files.public_path.is_file() {
        Some(unwrap_pem(&std::fs::read_to_string(&files.public_path)?)?)
    } else {
        None
    };

    Ok(Some(KeyMaterial {
        source,
        origin: KeyOrigin::Files(files.clone()),
        private_pem,
        public_pem,
    }))
}
