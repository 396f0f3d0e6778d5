//! Credential cryptography: token signing and password hashing.

pub mod jwt;
pub mod password;
