use crate::error::{BridgeError, ParseErrorKind};

/// An RTSP response (RFC 2326 §7).
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 2\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Responses are only ever [`parse`](Self::parse)d from what the camera sent.
#[must_use]
#[derive(Debug)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    /// Parse a response: status line, headers up to the first blank line,
    /// then everything after it as the body.
    ///
    /// Header lines without a colon are skipped rather than rejected; cameras
    /// are not always tidy and only a few headers matter here.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let (head, body) = match header_end(raw.as_bytes()) {
            Some((head_len, total)) => (&raw[..head_len], &raw[total..]),
            None => (raw, ""),
        };

        let mut lines = head.lines();
        let status_line = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or(BridgeError::Parse {
                kind: ParseErrorKind::EmptyMessage,
            })?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("RTSP/") {
            return Err(BridgeError::Parse {
                kind: ParseErrorKind::InvalidStatusLine,
            });
        }
        let status_code: u16 = parts
            .next()
            .and_then(|code| code.trim().parse().ok())
            .ok_or(BridgeError::Parse {
                kind: ParseErrorKind::InvalidStatusLine,
            })?;
        let status_text = parts.next().unwrap_or("").trim().to_string();

        let headers = lines
            .filter_map(|line| {
                let colon_pos = line.find(':')?;
                Some((
                    line[..colon_pos].trim().to_string(),
                    line[colon_pos + 1..].trim().to_string(),
                ))
            })
            .collect();

        Ok(RtspResponse {
            status_code,
            status_text,
            headers,
            body: (!body.is_empty()).then(|| body.to_string()),
        })
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body text, or the empty string when there is none.
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Locate the blank line ending a header block, accepting CRLF or bare LF
/// line endings, whichever comes first.
///
/// Returns the header length (without the blank line) and the offset where
/// the body starts.
pub(crate) fn header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, pos + 4));
    let lf = buf
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2));
    match (crlf, lf) {
        (Some(crlf), Some(lf)) => Some(if lf.0 < crlf.0 { lf } else { crlf }),
        (crlf, lf) => crlf.or(lf),
    }
}
