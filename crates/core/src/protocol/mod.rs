//! RTSP client-side protocol pieces (RFC 2326).
//!
//! This module handles the text-based RTSP signaling used to negotiate the
//! backchannel: building requests, parsing responses, answering digest
//! challenges, and picking the backchannel track out of the SDP.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! ```text
//! DESCRIBE rtsp://camera/h264Preview_01_main RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Require: www.onvif.org/ver20/backchannel\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! ## Methods used
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability discovery, first contact |
//! | DESCRIBE | §10.2 | Retrieve SDP with the backchannel track |
//! | SETUP | §10.4 | Negotiate backchannel UDP ports |
//! | PLAY | §10.5 | Open the backchannel |
//! | GET_PARAMETER | §10.8 | Keepalive |
//! | TEARDOWN | §10.7 | Destroy session |

pub mod auth;
pub mod request;
pub mod response;
pub mod sdp;

pub use auth::{Credentials, DigestChallenge};
pub use request::{Method, RtspRequest};
pub use response::RtspResponse;

/// Client identification sent in every request's `User-Agent` header.
pub const USER_AGENT: &str = "doorbell-backchannel/0.1";

/// ONVIF feature tag that makes cameras expose the sendonly audio track.
pub const BACKCHANNEL_REQUIRE: &str = "www.onvif.org/ver20/backchannel";
