//! Request signing
//!
//! Every upstream call carries four top-level fields:
//!
//! ```json
//! {"user_id": "...", "params": "<json text>", "ts": 1700000000, "sign": "<md5 hex>"}
//! ```
//!
//! `sign` is the lowercase hex MD5 of
//! `secret + "params" + params + "ts" + ts + "user_id" + user_id`, computed over
//! the exact `params` text that is sent. Upstream verifies against that text,
//! so the parameters are encoded once and never re-serialized.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sponsorsync_core::{Error, Result};

/// Signed request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub user_id: String,
    /// JSON text of the operation parameters
    pub params: String,
    /// Epoch seconds
    pub ts: i64,
    /// Lowercase hex MD5, 32 characters
    pub sign: String,
}

/// Compute the request signature
pub fn sign(secret: &str, params: &str, ts: i64, user_id: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"params");
    hasher.update(params.as_bytes());
    hasher.update(b"ts");
    hasher.update(ts.to_string().as_bytes());
    hasher.update(b"user_id");
    hasher.update(user_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Encode `params` and sign them with the current time
pub fn build_signed_request<P>(params: &P, user_id: &str, secret: &str) -> Result<SignedRequest>
where
    P: Serialize + ?Sized,
{
    build_signed_request_at(params, user_id, secret, chrono::Utc::now().timestamp())
}

/// Encode `params` and sign them with an explicit timestamp
pub fn build_signed_request_at<P>(
    params: &P,
    user_id: &str,
    secret: &str,
    ts: i64,
) -> Result<SignedRequest>
where
    P: Serialize + ?Sized,
{
    let params = serde_json::to_string(params).map_err(Error::serialization)?;
    let sign = sign(secret, &params, ts, user_id);

    Ok(SignedRequest {
        user_id: user_id.to_string(),
        params,
        ts,
        sign,
    })
}

/// Parameter set for operations that take none; encodes as `{}`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoParams {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_known_vector() {
        assert_eq!(
            sign("secret", "{}", 1700000000, "uid"),
            "16ebba6174dda3f4db6b8bdcacd9d654"
        );
    }

    #[test]
    fn test_sign_is_lowercase_hex() {
        let digest = sign("", "", 0, "");
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_sign_depends_on_every_input() {
        let base = sign("secret", "{}", 1700000000, "uid");
        assert_ne!(base, sign("secret2", "{}", 1700000000, "uid"));
        assert_ne!(base, sign("secret", "{ }", 1700000000, "uid"));
        assert_ne!(base, sign("secret", "{}", 1700000001, "uid"));
        assert_ne!(base, sign("secret", "{}", 1700000000, "uid2"));
    }

    #[test]
    fn test_build_signed_request_at() {
        #[derive(Serialize)]
        struct Page {
            page: usize,
            per_page: usize,
        }

        let request =
            build_signed_request_at(&Page { page: 1, per_page: 100 }, "abc123", "tok", 1700000000)
                .unwrap();

        assert_eq!(request.params, r#"{"page":1,"per_page":100}"#);
        assert_eq!(request.sign, "436aefa974adf1b10eed9a924405fcbb");
        assert_eq!(request.user_id, "abc123");
        assert_eq!(request.ts, 1700000000);
    }

    #[test]
    fn test_no_params_encode_as_empty_object() {
        let request = build_signed_request_at(&NoParams {}, "uid", "secret", 1700000000).unwrap();
        assert_eq!(request.params, "{}");
        assert_eq!(request.sign, "16ebba6174dda3f4db6b8bdcacd9d654");
    }

    #[test]
    fn test_params_travel_as_text() {
        let request = build_signed_request_at(&json!({}), "uid", "secret", 1).unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert!(body["params"].is_string());
        assert!(body["ts"].is_i64());
        assert_eq!(body.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_build_signed_request_uses_current_time() {
        let before = chrono::Utc::now().timestamp();
        let request = build_signed_request(&NoParams {}, "uid", "secret").unwrap();
        let after = chrono::Utc::now().timestamp();

        assert!(request.ts >= before && request.ts <= after);
        assert_eq!(request.sign, sign("secret", "{}", request.ts, "uid"));
    }
}
