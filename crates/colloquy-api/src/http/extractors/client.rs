//! Client address and user agent, recorded on session records.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use colloquy_types::auth::ClientInfo;

/// [`ClientInfo`] taken from `X-Forwarded-For` / `X-Real-IP` and `User-Agent`.
pub struct Client(pub ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .unwrap_or("unknown")
            .to_string();
        let user_agent = header("user-agent").unwrap_or("unknown").to_string();

        Ok(Client(ClientInfo { ip, user_agent }))
    }
}
