//! Document verification
//! Author: kartik4091
//! Created: 2026-03-05

pub mod classifier;

pub use classifier::{
    classify, StoredSignature, VerificationDetails, VerificationOutcome, VerificationStatus,
};
