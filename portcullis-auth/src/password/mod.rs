//! Password hashing and password-based providers.

mod hasher;
mod provider;

pub use hasher::{LegacySha256Hasher, PasswordAuthHasher, PasswordHasher, PasswordHasherRegistry};
pub use provider::{
    BasicAuthProvider, Credentials, CredentialsProvider, PasswordProvider, PasswordState,
};
