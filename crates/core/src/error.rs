//! Error types for the backchannel bridge.

use std::fmt;

/// Errors that can occur while negotiating or driving the backchannel.
///
/// Variants group into four classes (see [`ErrorClass`]):
///
/// - **Protocol**: [`Status`](Self::Status), [`Parse`](Self::Parse),
///   [`NoBackchannelTrack`](Self::NoBackchannelTrack),
///   [`MissingHeader`](Self::MissingHeader),
///   [`InvalidServerPort`](Self::InvalidServerPort),
///   [`InvalidUrl`](Self::InvalidUrl).
/// - **Connectivity**: [`Io`](Self::Io), [`Connect`](Self::Connect),
///   [`Bind`](Self::Bind),
///   [`BackchannelUnavailable`](Self::BackchannelUnavailable),
///   [`Disconnected`](Self::Disconnected).
/// - **Timeout**: [`Timeout`](Self::Timeout).
/// - **Format**: [`PayloadLength`](Self::PayloadLength), [`Filter`](Self::Filter).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP connection to the camera could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The camera answered a request with a non-2xx status.
    #[error("{method} failed with status {status}")]
    Status { method: String, status: u16 },

    /// Failed to parse an RTSP response or header.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// DESCRIBE returned an SDP without a sendonly PCMU/PCMA audio track.
    #[error("no backchannel track found in SDP")]
    NoBackchannelTrack,

    /// SETUP response lacked a required header or parameter.
    #[error("SETUP response missing {0}")]
    MissingHeader(&'static str),

    /// `server_port` in the SETUP response is unparsable or outside 1024–65535.
    #[error("invalid server port: {0}")]
    InvalidServerPort(String),

    /// The backchannel UDP socket could not be bound to the client port.
    #[error("failed to bind backchannel socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// No negotiated backchannel socket is available (never set up, or invalidated).
    #[error("backchannel not configured")]
    BackchannelUnavailable,

    /// A bounded wait elapsed.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// An encoder produced a payload that is not exactly one RTP frame.
    #[error("encoded payload is {0} bytes, expected 160")]
    PayloadLength(usize),

    /// The camera URL could not be parsed or has no host.
    #[error("invalid RTSP URL: {0}")]
    InvalidUrl(String),

    /// The external filter process failed to run or exited unsuccessfully.
    #[error("external filter failed: {0}")]
    Filter(String),

    /// [`AudioBridge::cleanup`](crate::AudioBridge::cleanup) was called; the bridge
    /// cannot be restarted.
    #[error("bridge permanently disconnected")]
    Disconnected,
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Protocol,
    Connectivity,
    Timeout,
    Format,
}

impl BridgeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Status { .. }
            | Self::Parse { .. }
            | Self::NoBackchannelTrack
            | Self::MissingHeader(_)
            | Self::InvalidServerPort(_)
            | Self::InvalidUrl(_) => ErrorClass::Protocol,
            Self::Io(e) if is_timeout(e) => ErrorClass::Timeout,
            Self::Io(_)
            | Self::Connect { .. }
            | Self::Bind { .. }
            | Self::BackchannelUnavailable
            | Self::Disconnected => ErrorClass::Connectivity,
            Self::Timeout(_) => ErrorClass::Timeout,
            Self::PayloadLength(_) | Self::Filter(_) => ErrorClass::Format,
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no status line).
    EmptyMessage,
    /// Status line did not have the expected `RTSP/1.0 Code Reason` format.
    InvalidStatusLine,
    /// `WWW-Authenticate` was not a Digest challenge with realm and nonce.
    InvalidChallenge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidChallenge => write!(f, "invalid digest challenge"),
        }
    }
}

/// Convenience alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;
