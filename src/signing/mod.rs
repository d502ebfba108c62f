//! Signing subsystem
//! RSA key lifecycle, key source resolution and digest signatures
//! Author: kartik4091
//! Created: 2026-03-03

pub mod key_management;
pub mod key_source;
pub mod signer;

pub use key_management::{KeyPair, KeyStore};
pub use key_source::{KeyFiles, KeyMaterial, KeyOrigin, KeyProvider, KeySourceConfig};
pub use signer::{sign, verify, Signature};
