//! Main Library File for docseal
//! Seals PDF documents with an RSA signature carried in an embedded QR
//! code, and classifies re-submitted copies as valid, modified or invalid.

// Configuration and Core Pipeline
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

// Hashing and signatures
pub mod hash_utils;
pub mod signing;

// Verification payload and QR rendering
pub mod qr;

// PDF handling and persistence
pub mod pdf_document;
pub mod storage;

// Verdicts
pub mod verification;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for crate consumers
pub use config::SealConfig;
pub use error::{Error, Result};
pub use hash_utils::{digest, ContentHash};
pub use pipeline::{SealPipeline, SignedDocument};
pub use qr::VerificationPayload;
pub use signing::{KeyPair, KeySourceConfig, KeyStore, Signature};
pub use storage::{DocumentRecord, DocumentStore, InMemoryDocumentStore, JsonFileStore};
pub use verification::{VerificationDetails, VerificationOutcome, VerificationStatus};
