//! Authentication: users, credentials, and refresh sessions.
//!
//! `SessionManager` owns the session store exclusively. Access tokens are
//! verified statelessly; refresh tokens must also have a live mapping.

pub mod credentials;
pub mod repository;
pub mod session;
