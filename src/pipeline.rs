//! Document sealing pipeline
//! Author: kartik4091
//! Created: 2026-03-07
//!
//! Sealing: validate → hash → sign → encode payload → render QR → stamp →
//! persist. Verification: validate → fetch record → classify.
//!
//! The stamp is appended after the signed bytes. A sealed copy is checked
//! against its signed prefix only when re-stamping that prefix reproduces
//! the copy exactly; any other difference classifies the whole file.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::SealConfig,
    error::{Error, Result},
    hash_utils::digest,
    pdf_document::{extract_seal, stamp_pdf, validate_upload, EmbeddedSeal},
    qr::{render_qr, VerificationPayload},
    signing::{KeyStore, Signature},
    storage::{DocumentRecord, DocumentStore},
    verification::{classify, VerificationOutcome},
};

/// Result of sealing one document
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub record: DocumentRecord,
    pub payload: VerificationPayload,
    /// The submitted PDF with the QR code embedded
    pub stamped_pdf: Vec<u8>,
}

pub struct SealPipeline {
    config: SealConfig,
    keys: Arc<KeyStore>,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for SealPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealPipeline")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl SealPipeline {
    pub fn new(config: SealConfig, keys: Arc<KeyStore>, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, keys, store }
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Signs `bytes`, embeds the verification QR code and stores the record
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn sign_document(&self, bytes: &[u8], filename: Option<&str>) -> Result<SignedDocument> {
        validate_upload(bytes, self.config.upload.max_bytes)?;

        let pair = self.keys.current();
        let hash = digest(bytes);
        let signature = crate::signing::sign(&hash, pair.private_key())?;
        let created_at = Utc::now();

        let payload = VerificationPayload {
            document_id: Uuid::new_v4(),
            hash,
            signature: signature.clone(),
            timestamp: created_at.timestamp(),
        };
        let stamped_pdf = self.stamp(bytes, &payload)?;

        let record = DocumentRecord {
            id: payload.document_id,
            filename: filename.map(str::to_string),
            content_hash: hash.to_hex(),
            signature: signature.to_base64(),
            key_id: pair.key_id().to_string(),
            created_at,
        };
        self.store.insert(record.clone()).await?;

        info!(
            document_id = %record.id,
            hash = %record.content_hash,
            key_id = %record.key_id,
            "🔏 Document sealed"
        );
        Ok(SignedDocument { record, payload, stamped_pdf })
    }

    /// Classifies `bytes` against the stored record for `id`
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn verify_document(&self, id: Uuid, bytes: &[u8]) -> Result<VerificationOutcome> {
        self.check_fresh_upload(bytes)?;
        let record = self.fetch(id).await?;
        let outcome = self.classify_record(&record, self.content_for(id, bytes))?;
        audit(id, &outcome);
        Ok(outcome)
    }

    /// Classifies `bytes` using a scanned or transported payload. An
    /// undecodable payload is an `Invalid` verdict, never `Modified`.
    #[instrument(skip(self, encoded, bytes), fields(size = bytes.len()))]
    pub async fn verify_with_payload(&self, encoded: &[u8], bytes: &[u8]) -> Result<VerificationOutcome> {
        self.check_fresh_upload(bytes)?;

        let payload = match crate::qr::decode(encoded) {
            Ok(payload) => payload,
            Err(Error::MalformedPayload(reason)) => {
                warn!("Unreadable verification payload: {}", reason);
                return Ok(VerificationOutcome::unreadable_payload());
            }
            Err(e) => return Err(e),
        };
        let content = self.content_for(payload.document_id, bytes);
        self.verify_payload(&payload, content).await
    }

    /// Verifies a sealed PDF using the payload embedded in it. A PDF with
    /// no embedded code is a `ClassificationInput` error.
    pub async fn verify_stamped(&self, bytes: &[u8]) -> Result<VerificationOutcome> {
        self.check_fresh_upload(bytes)?;

        let seal = match extract_seal(bytes) {
            Ok(Some(seal)) => seal,
            Ok(None) => {
                return Err(Error::ClassificationInput("no verification code embedded".into()))
            }
            Err(Error::MalformedPayload(reason)) => {
                warn!("Unreadable embedded payload: {}", reason);
                return Ok(VerificationOutcome::unreadable_payload());
            }
            Err(Error::Pdf(reason)) => return Err(Error::ClassificationInput(reason)),
            Err(e) => return Err(e),
        };
        self.verify_payload(&seal.payload, self.signed_content(bytes, &seal)).await
    }

    /// `content` is what the record's hash is compared with
    async fn verify_payload(&self, payload: &VerificationPayload, content: &[u8]) -> Result<VerificationOutcome> {
        let record = self.fetch(payload.document_id).await?;

        let qr_valid = payload.hash.to_hex() == record.content_hash.to_ascii_lowercase()
            && Signature::from_base64(&record.signature)
                .map(|sig| sig == payload.signature)
                .unwrap_or(false);

        let outcome = self.classify_record(&record, content)?.with_qr_check(qr_valid);
        audit(record.id, &outcome);
        Ok(outcome)
    }

    fn classify_record(&self, record: &DocumentRecord, bytes: &[u8]) -> Result<VerificationOutcome> {
        let pair = self.keys.current();
        if pair.key_id() != record.key_id {
            warn!(
                record_key = %record.key_id,
                active_key = %pair.key_id(),
                "Record was sealed under a different key"
            );
        }
        classify(record.stored_signature(), bytes, pair.public_key())
    }

    fn stamp(&self, bytes: &[u8], payload: &VerificationPayload) -> Result<Vec<u8>> {
        let image = render_qr(&payload.encode()?, self.config.qr.size_px)?;
        stamp_pdf(bytes, &image, payload, &self.config.qr)
    }

    /// The bytes to hash for document `id`: the signed prefix when `bytes`
    /// carries this document's own seal, otherwise `bytes` unchanged
    fn content_for<'a>(&self, id: Uuid, bytes: &'a [u8]) -> &'a [u8] {
        match extract_seal(bytes) {
            Ok(Some(seal)) if seal.payload.document_id == id => self.signed_content(bytes, &seal),
            _ => bytes,
        }
    }

    /// The signed prefix if `bytes` is exactly that prefix stamped with
    /// `seal`. Edits anywhere, including after the stamp, yield all of
    /// `bytes`.
    fn signed_content<'a>(&self, bytes: &'a [u8], seal: &EmbeddedSeal) -> &'a [u8] {
        let Some(prefix) = seal.signed_prefix(bytes) else {
            return bytes;
        };
        match self.stamp(prefix, &seal.payload) {
            Ok(restamped) if restamped == bytes => prefix,
            Ok(_) => {
                warn!(
                    document_id = %seal.payload.document_id,
                    signed_length = seal.signed_length,
                    "Sealed copy differs from its re-stamped original"
                );
                bytes
            }
            Err(e) => {
                warn!("Signed prefix cannot be re-stamped: {}", e);
                bytes
            }
        }
    }

    fn check_fresh_upload(&self, bytes: &[u8]) -> Result<()> {
        validate_upload(bytes, self.config.upload.max_bytes).map_err(|e| match e {
            Error::InvalidUpload(reason) => Error::ClassificationInput(reason),
            other => other,
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<DocumentRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }
}

fn audit(id: Uuid, outcome: &VerificationOutcome) {
    info!(
        document_id = %id,
        status = %outcome.status,
        qr_valid = outcome.details.qr_valid,
        hash_matches = outcome.details.hash_matches,
        signature_valid = outcome.details.signature_valid,
        "Verification completed"
    );
}
