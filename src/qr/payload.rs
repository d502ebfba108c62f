//! Verification payload codec
//! Author: kartik4091
//! Created: 2026-03-04
//!
//! Binary layout, all integers big-endian:
//!
//! ```text
//! version (1) | document id (16) | timestamp i64 (8) | hash (32) | sig len u16 (2) | signature
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hash_utils::{ContentHash, HASH_LEN};
use crate::signing::Signature;

pub const PAYLOAD_VERSION: u8 = 1;

/// Upper bound on an encoded payload. Keeps the code at QR version 20 or
/// below at error-correction level M, which still resolves at 256 px.
pub const PAYLOAD_BYTE_BUDGET: usize = 640;

const HEADER_LEN: usize = 1 + 16 + 8 + HASH_LEN + 2;

/// What the QR code on a sealed document carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    pub document_id: Uuid,
    pub hash: ContentHash,
    pub signature: Signature,
    pub timestamp: i64,
}

impl VerificationPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(BASE64.encode(encode(self)?))
    }

    pub fn from_base64(value: &str) -> Result<Self> {
        let raw = BASE64
            .decode(value.trim())
            .map_err(|e| Error::MalformedPayload(format!("payload is not base64: {}", e)))?;
        decode(&raw)
    }
}

pub fn encode(payload: &VerificationPayload) -> Result<Vec<u8>> {
    let sig = payload.signature.as_bytes();
    let size = HEADER_LEN + sig.len();
    if size > PAYLOAD_BYTE_BUDGET {
        return Err(Error::PayloadTooLarge { size, budget: PAYLOAD_BYTE_BUDGET });
    }
    if sig.is_empty() {
        return Err(Error::MalformedPayload("signature is empty".into()));
    }

    let mut out = Vec::with_capacity(size);
    out.push(PAYLOAD_VERSION);
    out.extend_from_slice(payload.document_id.as_bytes());
    out.extend_from_slice(&payload.timestamp.to_be_bytes());
    out.extend_from_slice(payload.hash.as_bytes());
    // size is bounded by the budget, so the length fits in u16
    out.extend_from_slice(&(sig.len() as u16).to_be_bytes());
    out.extend_from_slice(sig);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<VerificationPayload> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::MalformedPayload(format!(
            "payload is {} bytes, header alone is {}",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let mut cursor = Cursor { bytes, pos: 0 };

    let version = cursor.take(1)?[0];
    if version != PAYLOAD_VERSION {
        return Err(Error::MalformedPayload(format!("unknown payload version {}", version)));
    }

    let document_id = Uuid::from_slice(cursor.take(16)?)
        .map_err(|e| Error::MalformedPayload(e.to_string()))?;
    let timestamp = i64::from_be_bytes(cursor.array::<8>()?);
    let hash = ContentHash::from_slice(cursor.take(HASH_LEN)?)?;
    let sig_len = u16::from_be_bytes(cursor.array::<2>()?) as usize;

    if sig_len == 0 {
        return Err(Error::MalformedPayload("signature is empty".into()));
    }
    let signature = Signature::from_bytes(cursor.take(sig_len)?.to_vec());

    if cursor.remaining() != 0 {
        return Err(Error::MalformedPayload(format!(
            "{} trailing bytes after signature",
            cursor.remaining()
        )));
    }

    Ok(VerificationPayload { document_id, hash, signature, timestamp })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(Error::MalformedPayload(format!(
                "payload truncated at byte {} (need {} more)",
                self.bytes.len(),
                end - self.bytes.len()
            )));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}
