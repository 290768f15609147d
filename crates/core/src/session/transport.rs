use crate::error::{BridgeError, Result};

/// Lowest server port accepted from a SETUP response.
pub const MIN_SERVER_PORT: u32 = 1024;

/// Parsed RTSP `Transport` header (RFC 2326 §12.39).
///
/// ## Wire format example
///
/// ```text
/// Client → Camera:
///   Transport: RTP/AVP;unicast;client_port=49154-49155
///
/// Camera → Client:
///   Transport: RTP/AVP;unicast;client_port=49154-49155;server_port=6970-6971;ssrc=1F2E3D4C
/// ```
///
/// Only `RTP/AVP;unicast` over UDP is used for the backchannel; interleaved
/// TCP and multicast are never requested.
#[derive(Debug, Clone)]
pub struct TransportHeader {
    /// Semicolon-separated parameters, `name[=value]`, in header order.
    params: Vec<(String, Option<String>)>,
}

impl TransportHeader {
    /// Value sent in SETUP for a client RTP port (RTCP is `port + 1`).
    pub fn client_request(client_port: u16) -> String {
        format!(
            "RTP/AVP;unicast;client_port={}-{}",
            client_port,
            client_port.wrapping_add(1)
        )
    }

    /// Split a header value into its parameters.
    ///
    /// ## Examples
    ///
    /// ```
    /// use backchannel::session::transport::TransportHeader;
    ///
    /// let th = TransportHeader::parse("RTP/AVP;unicast;client_port=8000-8001");
    /// assert_eq!(th.client_port(), Some((8000, 8001)));
    /// assert!(th.server_port().is_err());
    /// ```
    pub fn parse(header: &str) -> Self {
        let params = header
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((name, value)) => (name.trim().to_string(), Some(value.trim().to_string())),
                None => (part.to_string(), None),
            })
            .collect();
        Self { params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_deref())
    }

    /// `client_port=RTP-RTCP` pair, if present and well-formed.
    pub fn client_port(&self) -> Option<(u16, u16)> {
        let (rtp, rtcp) = self.param("client_port")?.split_once('-')?;
        Some((rtp.trim().parse().ok()?, rtcp.trim().parse().ok()?))
    }

    /// First value of `server_port=`, validated to 1024–65535.
    pub fn server_port(&self) -> Result<u16> {
        let ports = self
            .param("server_port")
            .ok_or(BridgeError::MissingHeader("server_port in Transport"))?;
        let first = ports.split('-').next().unwrap_or("").trim();
        let port: u32 = first
            .parse()
            .map_err(|_| BridgeError::InvalidServerPort(ports.to_string()))?;
        if !(MIN_SERVER_PORT..=u16::MAX as u32).contains(&port) {
            return Err(BridgeError::InvalidServerPort(port.to_string()));
        }
        Ok(port as u16)
    }
}

/// Parsed `Session` header (RFC 2326 §12.37): `<id>[;timeout=<secs>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    pub id: String,
    /// Server-side timeout. Informational only; keepalives run on their own
    /// configured interval.
    pub timeout_secs: Option<u64>,
}

impl SessionHeader {
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let id = parts.next()?.trim();
        if id.is_empty() {
            return None;
        }
        let timeout_secs = parts
            .filter_map(|p| p.trim().strip_prefix("timeout="))
            .find_map(|t| t.trim().parse().ok());
        Some(Self {
            id: id.to_string(),
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_request_format() {
        assert_eq!(
            TransportHeader::client_request(49154),
            "RTP/AVP;unicast;client_port=49154-49155"
        );
    }

    #[test]
    fn server_port_takes_first_value() {
        let th = TransportHeader::parse(
            "RTP/AVP;unicast;client_port=49154-49155;server_port=6970-6971;ssrc=1234",
        );
        assert_eq!(th.server_port().unwrap(), 6970);
        assert_eq!(th.client_port(), Some((49154, 49155)));
        assert_eq!(th.param("ssrc"), Some("1234"));
    }

    #[test]
    fn server_port_single_value() {
        let th = TransportHeader::parse("RTP/AVP;unicast;server_port=5000");
        assert_eq!(th.server_port().unwrap(), 5000);
    }

    #[test]
    fn server_port_out_of_range() {
        let low = TransportHeader::parse("RTP/AVP;server_port=80-81");
        assert!(matches!(
            low.server_port(),
            Err(BridgeError::InvalidServerPort(_))
        ));
        let high = TransportHeader::parse("RTP/AVP;server_port=70000-70001");
        assert!(matches!(
            high.server_port(),
            Err(BridgeError::InvalidServerPort(_))
        ));
        let junk = TransportHeader::parse("RTP/AVP;server_port=abc");
        assert!(matches!(
            junk.server_port(),
            Err(BridgeError::InvalidServerPort(_))
        ));
    }

    #[test]
    fn server_port_missing() {
        let th = TransportHeader::parse("RTP/AVP;unicast;client_port=49154-49155");
        assert!(matches!(th.server_port(), Err(BridgeError::MissingHeader(_))));
    }

    #[test]
    fn session_header_with_timeout() {
        let s = SessionHeader::parse("12345678;timeout=60").unwrap();
        assert_eq!(s.id, "12345678");
        assert_eq!(s.timeout_secs, Some(60));
    }

    #[test]
    fn session_header_plain_and_empty() {
        assert_eq!(
            SessionHeader::parse("ABCDEF").unwrap(),
            SessionHeader {
                id: "ABCDEF".to_string(),
                timeout_secs: None
            }
        );
        assert!(SessionHeader::parse("").is_none());
        assert_eq!(SessionHeader::parse("X;timeout=soon").unwrap().timeout_secs, None);
    }
}
