//! Signing and encryption primitives.

mod crypter;
mod signer;

pub use crypter::{AesGcmCrypter, Crypter};
pub use signer::{HmacSigner, HmacSignerSettings, Signer};

use subtle::ConstantTimeEq;

/// Compares two secrets without leaking the position of the first difference.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
