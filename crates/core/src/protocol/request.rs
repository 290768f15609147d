use std::fmt;

/// RTSP methods the backchannel client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    GetParameter,
    Teardown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::GetParameter => "GET_PARAMETER",
            Self::Teardown => "TEARDOWN",
        }
    }

    /// Whether requests of this method carry the `Session` header once one is known.
    ///
    /// OPTIONS and DESCRIBE precede SETUP and are sent without it.
    pub fn carries_session(&self) -> bool {
        !matches!(self, Self::Options | Self::Describe)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RTSP request (RFC 2326 §6).
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// ```
///
/// Built with [`new`](Self::new) and [`add_header`](Self::add_header), then
/// [`serialize`](Self::serialize)d onto the control connection. Header lookup
/// is case-insensitive per RFC 2326 §4.2.
#[derive(Debug)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, SETUP, PLAY, etc.).
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:554/stream/trackID=3`).
    pub uri: String,
    /// Protocol version (always `RTSP/1.0` when built here).
    pub version: String,
    /// Headers as ordered (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        RtspRequest {
            method: method.as_str().to_string(),
            uri: uri.to_string(),
            version: "RTSP/1.0".to_string(),
            headers: Vec::new(),
        }
    }

    /// Append a header, replacing any existing header of the same name.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to the RTSP text wire format, terminated by a blank line.
    pub fn serialize(&self) -> String {
        let mut request = format!("{} {} {}\r\n", self.method, self.uri, self.version);
        for (name, value) in &self.headers {
            request.push_str(&format!("{}: {}\r\n", name, value));
        }
        request.push_str("\r\n");
        request
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the CSeq header value (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_setup_request() {
        let req = RtspRequest::new(Method::Setup, "rtsp://cam/trackID=3")
            .add_header("CSeq", "4")
            .add_header("Transport", "RTP/AVP;unicast;client_port=49154-49155");
        let s = req.serialize();
        assert!(s.starts_with("SETUP rtsp://cam/trackID=3 RTSP/1.0\r\n"));
        assert!(s.contains("CSeq: 4\r\n"));
        assert!(s.contains("Transport: RTP/AVP;unicast;client_port=49154-49155\r\n"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn add_header_replaces_existing() {
        let req = RtspRequest::new(Method::Options, "rtsp://cam/")
            .add_header("CSeq", "1")
            .add_header("cseq", "2");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.cseq(), Some("2"));
    }

    #[test]
    fn session_only_after_describe() {
        assert!(!Method::Options.carries_session());
        assert!(!Method::Describe.carries_session());
        assert!(Method::Setup.carries_session());
        assert!(Method::Teardown.carries_session());
    }
}
