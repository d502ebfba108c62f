//! Verification classifier
//! Author: kartik4091
//! Created: 2026-03-05
//!
//! Three terminal verdicts, decided in a fixed order:
//!
//! 1. the stored signature must verify against the stored hash, otherwise
//!    the record itself is not trustworthy and the verdict is `Invalid`
//!    whatever was uploaded;
//! 2. with an authentic record, the uploaded bytes either hash to the stored
//!    value (`Valid`) or they do not (`Modified`).

use std::fmt;

use openssl::pkey::{HasPublic, PKeyRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::hash_utils::{digest, ContentHash};
use crate::signing::{signer, Signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Valid,
    Modified,
    Invalid,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Modified => "modified",
            VerificationStatus::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    pub qr_valid: bool,
    pub hash_matches: bool,
    pub signature_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub message: String,
    pub details: VerificationDetails,
}

const MSG_VALID: &str = "Document is authentic and unmodified";
const MSG_MODIFIED: &str =
    "Signature is authentic, but the uploaded content differs from the signed document";
const MSG_INVALID: &str = "Signature is incorrect or the document record has been tampered with";
const MSG_QR_MISMATCH: &str = "Verification code does not belong to this document record";
const MSG_QR_UNREADABLE: &str = "Verification code is unreadable or malformed";

impl VerificationOutcome {
    fn from_checks(signature_valid: bool, hash_matches: bool) -> Self {
        let (status, message) = match (signature_valid, hash_matches) {
            (false, _) => (VerificationStatus::Invalid, MSG_INVALID),
            (true, true) => (VerificationStatus::Valid, MSG_VALID),
            (true, false) => (VerificationStatus::Modified, MSG_MODIFIED),
        };
        Self {
            status,
            message: message.to_string(),
            details: VerificationDetails {
                qr_valid: signature_valid,
                hash_matches,
                signature_valid,
            },
        }
    }

    /// Verdict for a verification code that could not be decoded
    pub fn unreadable_payload() -> Self {
        Self {
            status: VerificationStatus::Invalid,
            message: MSG_QR_UNREADABLE.to_string(),
            details: VerificationDetails {
                qr_valid: false,
                hash_matches: false,
                signature_valid: false,
            },
        }
    }

    /// Folds in whether a scanned payload agrees with the stored record.
    /// A disagreeing payload makes the verdict `Invalid`.
    pub fn with_qr_check(mut self, qr_valid: bool) -> Self {
        self.details.qr_valid = qr_valid && self.details.signature_valid;
        if !qr_valid {
            self.status = VerificationStatus::Invalid;
            self.message = MSG_QR_MISMATCH.to_string();
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}

/// Hash and signature as persisted for a document
#[derive(Debug, Clone, Copy)]
pub struct StoredSignature<'a> {
    pub content_hash: &'a str,
    pub signature: &'a str,
}

/// Classifies `fresh_bytes` against a stored record.
///
/// Unparseable stored values count as a failed signature check. Empty
/// input is rejected before any check runs, since that is not a verdict.
pub fn classify<T: HasPublic>(
    stored: StoredSignature<'_>,
    fresh_bytes: &[u8],
    public_key: &PKeyRef<T>,
) -> Result<VerificationOutcome> {
    if fresh_bytes.is_empty() {
        return Err(Error::ClassificationInput("uploaded content is empty".into()));
    }

    let fresh_hash = digest(fresh_bytes);
    let stored_hash = ContentHash::from_hex(stored.content_hash).ok();
    let stored_sig = Signature::from_base64(stored.signature).ok();

    let signature_valid = match (&stored_hash, &stored_sig) {
        (Some(hash), Some(sig)) => signer::verify(hash, sig, public_key)?,
        _ => {
            debug!("stored hash or signature does not parse");
            false
        }
    };

    let hash_matches = stored_hash
        .map(|hash| hash.matches(&fresh_hash))
        .unwrap_or(false);

    Ok(VerificationOutcome::from_checks(signature_valid, hash_matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{other_key_pair, test_key_pair};

    const ORIGINAL: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF";
    const EDITED: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog /Edited true >> endobj\n%%EOF";

    fn signed_record() -> (String, String) {
        let hash = digest(ORIGINAL);
        let sig = signer::sign(&hash, test_key_pair().private_key()).unwrap();
        (hash.to_hex(), sig.to_base64())
    }

    fn run(hash: &str, sig: &str, fresh: &[u8]) -> VerificationOutcome {
        classify(
            StoredSignature { content_hash: hash, signature: sig },
            fresh,
            test_key_pair().public_key(),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_when_hash_and_signature_match() {
        let (hash, sig) = signed_record();
        let outcome = run(&hash, &sig, ORIGINAL);

        assert_eq!(outcome.status, VerificationStatus::Valid);
        assert_eq!(
            outcome.details,
            VerificationDetails { qr_valid: true, hash_matches: true, signature_valid: true }
        );
    }

    #[test]
    fn test_modified_when_upload_differs() {
        let (hash, sig) = signed_record();
        let outcome = run(&hash, &sig, EDITED);

        assert_eq!(outcome.status, VerificationStatus::Modified);
        assert!(outcome.details.signature_valid);
        assert!(!outcome.details.hash_matches);
    }

    #[test]
    fn test_invalid_with_garbage_signature() {
        let (hash, _) = signed_record();
        let garbage = Signature::from_bytes(vec![0x42; 256]).to_base64();

        for fresh in [ORIGINAL, EDITED] {
            let outcome = run(&hash, &garbage, fresh);
            assert_eq!(outcome.status, VerificationStatus::Invalid);
            assert!(!outcome.details.signature_valid);
        }
    }

    #[test]
    fn test_invalid_with_tampered_stored_hash() {
        let (_, sig) = signed_record();
        let tampered = digest(EDITED).to_hex();

        // even an upload matching the tampered hash is invalid
        for fresh in [ORIGINAL, EDITED] {
            let outcome = run(&tampered, &sig, fresh);
            assert_eq!(outcome.status, VerificationStatus::Invalid);
        }
        assert!(run(&tampered, &sig, EDITED).details.hash_matches);
    }

    #[test]
    fn test_invalid_when_signed_by_another_key() {
        let hash = digest(ORIGINAL);
        let sig = signer::sign(&hash, other_key_pair().private_key()).unwrap();
        let outcome = run(&hash.to_hex(), &sig.to_base64(), ORIGINAL);
        assert_eq!(outcome.status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_unparseable_record_is_invalid() {
        let (hash, sig) = signed_record();
        assert_eq!(run("zz-not-hex", &sig, ORIGINAL).status, VerificationStatus::Invalid);
        assert_eq!(run(&hash, "!!not base64!!", ORIGINAL).status, VerificationStatus::Invalid);
    }

    #[test]
    fn test_empty_upload_is_an_error_not_a_verdict() {
        let (hash, sig) = signed_record();
        let result = classify(
            StoredSignature { content_hash: &hash, signature: &sig },
            b"",
            test_key_pair().public_key(),
        );
        assert!(matches!(result, Err(Error::ClassificationInput(_))));
    }

    #[test]
    fn test_qr_mismatch_downgrades_to_invalid() {
        let (hash, sig) = signed_record();
        let outcome = run(&hash, &sig, ORIGINAL).with_qr_check(false);
        assert_eq!(outcome.status, VerificationStatus::Invalid);
        assert!(!outcome.details.qr_valid);
        assert!(outcome.details.signature_valid);

        let kept = run(&hash, &sig, EDITED).with_qr_check(true);
        assert_eq!(kept.status, VerificationStatus::Modified);
    }

    #[test]
    fn test_json_shape() {
        let (hash, sig) = signed_record();
        let json = serde_json::to_value(run(&hash, &sig, EDITED)).unwrap();
        assert_eq!(json["status"], "modified");
        assert_eq!(json["details"]["qrValid"], true);
        assert_eq!(json["details"]["hashMatches"], false);
        assert_eq!(json["details"]["signatureValid"], true);
        assert!(json["message"].is_string());
    }
}
