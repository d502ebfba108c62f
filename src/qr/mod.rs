//! QR payload encoding and rendering

pub mod payload;
pub mod render;

pub use payload::{decode, encode, VerificationPayload, PAYLOAD_BYTE_BUDGET};
pub use render::{render_qr, QrImage, QR_EC_LEVEL};
