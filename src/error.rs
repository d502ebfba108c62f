//! Error types and handling for the docseal library
//! Author: kartik4091
//! Created: 2026-03-02

use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Custom result type for signing and verification operations
pub type Result<T> = StdResult<T, Error>;

/// Smallest RSA modulus accepted anywhere in the crate
pub const MIN_KEY_BITS: u32 = 2048;

/// Core error type for signing and verification operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Malformed verification payload: {0}")]
    MalformedPayload(String),

    #[error("Verification payload too large: {size} bytes (budget {budget})")]
    PayloadTooLarge { size: usize, budget: usize },

    #[error("Key pair failed validation: {0}")]
    KeyValidationFailed(String),

    #[error("RSA key too small: {bits} bits (minimum {minimum})")]
    UndersizedKey { bits: u32, minimum: u32 },

    #[error("Key rotation not possible: {0}")]
    RotationUnavailable(String),

    #[error("No key material found (tried: {0})")]
    KeyNotFound(String),

    #[error("Unsupported key encoding: {0}")]
    KeyFormat(String),

    #[error("Uploaded content could not be verified: {0}")]
    ClassificationInput(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("QR encoding error: {0}")]
    Qr(String),

    #[error("Document record not found: {0}")]
    RecordNotFound(String),

    #[error("Document record already exists: {0}")]
    DuplicateRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Message safe to show an end user. Never carries key material or
    /// library internals; those stay in the `Display` output for logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::MalformedPayload(_) | Error::PayloadTooLarge { .. } => {
                "Could not verify: the verification code is unreadable"
            }
            Error::ClassificationInput(_) | Error::InvalidUpload(_) => {
                "Could not verify: the uploaded file is not a readable PDF"
            }
            Error::RecordNotFound(_) => "Could not verify: unknown document",
            _ => "Could not verify the document",
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Pdf(err.to_string())
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Error::Qr(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
