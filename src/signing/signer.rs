//! RSA-SHA256 signing over content digests
//! Author: kartik4091
//! Created: 2026-03-03

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use openssl::md::Md;
use openssl::pkey::{HasPrivate, HasPublic, Id, PKeyRef};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, MIN_KEY_BITS};
use crate::hash_utils::ContentHash;

/// Raw PKCS#1 v1.5 signature bytes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(value: &str) -> Result<Self> {
        BASE64
            .decode(value.trim())
            .map(Self)
            .map_err(|e| Error::MalformedPayload(format!("signature is not base64: {}", e)))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

impl TryFrom<String> for Signature {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_base64(&value)
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_base64()
    }
}

/// Rejects anything that is not an RSA key of at least `MIN_KEY_BITS`
pub fn check_rsa_key<T: HasPublic>(key: &PKeyRef<T>) -> Result<()> {
    if key.id() != Id::RSA {
        return Err(Error::KeyFormat(format!("expected an RSA key, got {:?}", key.id())));
    }
    let bits = key.bits();
    if bits < MIN_KEY_BITS {
        return Err(Error::UndersizedKey { bits, minimum: MIN_KEY_BITS });
    }
    Ok(())
}

/// Signs a digest with PKCS#1 v1.5 padding and a SHA-256 DigestInfo.
/// The digest is signed as-is; it is not hashed a second time.
pub fn sign<T: HasPrivate>(hash: &ContentHash, private_key: &PKeyRef<T>) -> Result<Signature> {
    check_rsa_key(private_key)?;

    let mut ctx = PkeyCtx::new(private_key)?;
    ctx.sign_init()?;
    ctx.set_rsa_padding(Padding::PKCS1)?;
    ctx.set_signature_md(Md::sha256())?;

    let mut out = Vec::new();
    ctx.sign_to_vec(hash.as_bytes(), &mut out)?;
    Ok(Signature(out))
}

/// Returns whether `signature` is a valid signature of `hash`.
///
/// A wrong, truncated or garbage signature is `Ok(false)`. Only an unusable
/// key is an error.
pub fn verify<T: HasPublic>(
    hash: &ContentHash,
    signature: &Signature,
    public_key: &PKeyRef<T>,
) -> Result<bool> {
    check_rsa_key(public_key)?;

    if signature.is_empty() {
        return Ok(false);
    }

    let mut ctx = PkeyCtx::new(public_key)?;
    ctx.verify_init()?;
    ctx.set_rsa_padding(Padding::PKCS1)?;
    ctx.set_signature_md(Md::sha256())?;

    match ctx.verify(hash.as_bytes(), signature.as_bytes()) {
        Ok(valid) => Ok(valid),
        Err(e) => {
            debug!("signature rejected: {}", e);
            Ok(false)
        }
    }
}
