//! Visitor tokens
//!
//! The tracking token behind the `cookieCheck` signal. A token is
//! `base64url(uuid || HMAC-SHA256(secret, uuid))`; only tokens signed with
//! the server secret are accepted, anything else gets a fresh visitor.

use kernel::id::VisitorId;

const ID_LEN: usize = 16;
const TAG_LEN: usize = 32;

/// Sign a visitor id into a cookie-safe token
pub fn sign_visitor_token(visitor_id: &VisitorId, secret: &[u8; 32]) -> String {
    let id_bytes = visitor_id.as_bytes();
    let tag = platform::crypto::hmac_sha256(secret, id_bytes);
    let mut token = Vec::with_capacity(ID_LEN + TAG_LEN);
    token.extend_from_slice(id_bytes);
    token.extend_from_slice(&tag);
    platform::crypto::to_base64url(&token)
}

/// Recover the visitor id from a token signed with `secret`
pub fn verify_visitor_token(token: &str, secret: &[u8; 32]) -> Option<VisitorId> {
    let bytes = platform::crypto::from_base64url(token).ok()?;
    if bytes.len() != ID_LEN + TAG_LEN {
        return None;
    }
    let (id_bytes, tag) = bytes.split_at(ID_LEN);
    if !platform::crypto::verify_hmac_sha256(secret, id_bytes, tag) {
        return None;
    }
    let id: [u8; ID_LEN] = id_bytes.try_into().ok()?;
    Some(VisitorId::from_bytes(id))
}

/// Visitor identity for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
    pub id: VisitorId,
    /// Signed token to send back; `Some` only for newly issued visitors
    pub issued_token: Option<String>,
}

impl Visitor {
    /// Accept a presented token or issue a new visitor
    pub fn resolve(presented: Option<&str>, secret: &[u8; 32]) -> Self {
        if let Some(id) = presented.and_then(|t| verify_visitor_token(t, secret)) {
            return Self {
                id,
                issued_token: None,
            };
        }

        let id = VisitorId::new();
        tracing::debug!(visitor_id = %id, "Issued visitor token");
        Self {
            id,
            issued_token: Some(sign_visitor_token(&id, secret)),
        }
    }

    /// Value used as the token signal
    pub fn signal(&self) -> String {
        self.id.to_string()
    }
}
