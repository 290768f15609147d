//! Network transport for RTSP signaling and RTP backchannel delivery.
//!
//! RTSP uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling over one
//!   persistent connection to the camera, opened on first use.
//!
//! - **UDP** ([`udp`]): carries outbound RTP audio. The socket is bound to
//!   the `client_port` announced in SETUP so the camera sees packets coming
//!   from the port it agreed to.

pub mod tcp;
pub mod udp;

pub use tcp::TcpConnection;
pub use udp::UdpTransport;
