//! Rendering token bundles for the terminal

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};
use token_store_core::TokenInfo;

/// Characters of a secret shown before the ellipsis
const VISIBLE_PREFIX: usize = 6;

/// Shorten a secret to a recognizable prefix
fn mask(secret: &str) -> String {
    match secret.char_indices().nth(VISIBLE_PREFIX) {
        Some((idx, _)) => format!("{}...", &secret[..idx]),
        None => "***".to_string(),
    }
}

/// JSON view of a bundle; secrets are masked unless `reveal` is set
pub fn token_view(token: &TokenInfo, reveal: bool) -> Value {
    let secret = |value: &str| {
        if reveal {
            value.to_string()
        } else {
            mask(value)
        }
    };

    let mut view = Map::new();
    view.insert("accessToken".into(), json!(secret(token.access_token())));
    if let Some(refresh) = token.refresh_token() {
        view.insert("refreshToken".into(), json!(secret(refresh)));
    }
    if let Some(expires_at) = token.expires_at() {
        view.insert(
            "expiresAt".into(),
            json!(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        view.insert("expired".into(), json!(token.is_expired()));
    }
    if let Some(token_type) = token.token_type() {
        view.insert("tokenType".into(), json!(token_type));
    }
    if let Some(scope) = token.scope() {
        view.insert("scope".into(), json!(scope));
    }
    Value::Object(view)
}
