//! RTSP Digest authentication (RFC 2617 §3.2.2, without `qop`).
//!
//! Cameras answer the first unauthenticated request with
//!
//! ```text
//! WWW-Authenticate: Digest realm="IP Camera", nonce="a1b2c3"
//! ```
//!
//! and every later request carries
//!
//! ```text
//! response = MD5( MD5(user:realm:pass) : nonce : MD5(method:uri) )
//! ```

use crate::error::{BridgeError, ParseErrorKind, Result};

use super::Method;

/// Username and password for the camera.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Realm and nonce taken from a `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
}

impl DigestChallenge {
    /// Parse the value of a `WWW-Authenticate` header.
    ///
    /// Only `realm` and `nonce` are read; other parameters (`stale`,
    /// `algorithm`, ...) are ignored. Fails for non-Digest schemes or when
    /// either parameter is missing.
    pub fn parse(header: &str) -> Result<Self> {
        let invalid = || BridgeError::Parse {
            kind: ParseErrorKind::InvalidChallenge,
        };

        let params = header.trim().strip_prefix("Digest").ok_or_else(invalid)?;

        let mut realm = None;
        let mut nonce = None;
        for item in params.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "realm" => realm = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                _ => {}
            }
        }

        match (realm, nonce) {
            (Some(realm), Some(nonce)) => Ok(Self { realm, nonce }),
            _ => Err(invalid()),
        }
    }

    /// Compute the hex digest response for one request.
    pub fn response(&self, credentials: &Credentials, method: Method, uri: &str) -> String {
        let ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        let ha2 = md5_hex(&format!("{}:{}", method.as_str(), uri));
        md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
    }

    /// Full `Authorization` header value for one request.
    pub fn authorization(&self, credentials: &Credentials, method: Method, uri: &str) -> String {
        format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            credentials.username,
            self.realm,
            self.nonce,
            uri,
            self.response(credentials, method, uri)
        )
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (DigestChallenge, Credentials) {
        (
            DigestChallenge {
                realm: "X".to_string(),
                nonce: "Y".to_string(),
            },
            Credentials::new("test", "pass123"),
        )
    }

    #[test]
    fn response_matches_known_digest() {
        let (challenge, creds) = fixture();
        // MD5(MD5("test:X:pass123") ":Y:" MD5("SETUP:rtsp://host/track1"))
        assert_eq!(
            challenge.response(&creds, Method::Setup, "rtsp://host/track1"),
            "8a773df1ecf58b98e3ce96edabcd825a"
        );
    }

    #[test]
    fn authorization_header_layout() {
        let (challenge, creds) = fixture();
        let header = challenge.authorization(&creds, Method::Setup, "rtsp://host/track1");
        assert_eq!(
            header,
            "Digest username=\"test\", realm=\"X\", nonce=\"Y\", \
             uri=\"rtsp://host/track1\", response=\"8a773df1ecf58b98e3ce96edabcd825a\""
        );
    }

    #[test]
    fn parse_challenge() {
        let c = DigestChallenge::parse(
            "Digest realm=\"BC Streaming Media\", nonce=\"0c5a7a1f\", stale=\"FALSE\"",
        )
        .unwrap();
        assert_eq!(c.realm, "BC Streaming Media");
        assert_eq!(c.nonce, "0c5a7a1f");
    }

    #[test]
    fn parse_rejects_basic_and_incomplete() {
        assert!(DigestChallenge::parse("Basic realm=\"cam\"").is_err());
        assert!(DigestChallenge::parse("Digest realm=\"cam\"").is_err());
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
