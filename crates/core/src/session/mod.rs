//! RTSP backchannel session (RFC 2326 §3, §12.37).
//!
//! One [`RtspSession`] exists per bridge. It negotiates the backchannel with
//! the camera, keeps it alive, and tears it down. Negotiation walks a fixed
//! sequence of requests:
//!
//! ```text
//! Idle
//!   OPTIONS rtsp://host:port/        -> OptionsOk
//!   DESCRIBE <url>                   -> Described
//!   (pick sendonly G.711 track)      -> TrackFound
//!   SETUP <content-base><control>    -> SetupOk
//!   PLAY <content-base>, bind UDP    -> Playing
//! TEARDOWN                           -> TornDown
//! ```
//!
//! Any failure aborts the walk; the backchannel handle is only published once
//! every step has succeeded.
//!
//! ## Shared state
//!
//! The keepalive and egress workers share the session through an `Arc`.
//! Request/response state (CSeq, digest challenge, session id, the TCP
//! stream) lives in one [`ControlChannel`] behind a `Mutex`, so requests never
//! interleave on the wire. The UDP handle sits behind an `RwLock` and is
//! cloned out for each send.

pub mod control;
pub mod transport;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use url::Url;

use crate::config::SessionConfig;
use crate::error::{BridgeError, Result};
use crate::media::g711::G711;
use crate::protocol::auth::Credentials;
use crate::protocol::{Method, RtspResponse, sdp};
use crate::transport::UdpTransport;
pub use control::ControlChannel;
pub use transport::{SessionHeader, TransportHeader};

/// Port used when the camera URL does not name one (RFC 2326 §3.2).
pub const DEFAULT_RTSP_PORT: u16 = 554;

/// Backchannel negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OptionsOk,
    Described,
    TrackFound,
    SetupOk,
    /// Negotiation complete; the backchannel socket is bound.
    Playing,
    TornDown,
}

/// A negotiated backchannel: where to send RTP and how to label it.
#[derive(Clone)]
pub struct Backchannel {
    pub transport: UdpTransport,
    pub client_port: u16,
    pub server_port: u16,
    pub payload_type: u8,
    pub codec: G711,
}

impl std::fmt::Debug for Backchannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backchannel")
            .field("remote", &self.transport.remote())
            .field("client_port", &self.client_port)
            .field("server_port", &self.server_port)
            .field("payload_type", &self.payload_type)
            .field("codec", &self.codec)
            .finish()
    }
}

/// RTSP session with one camera.
pub struct RtspSession {
    url: String,
    host: String,
    port: u16,
    config: SessionConfig,
    control: Mutex<ControlChannel>,
    state: RwLock<NegotiationState>,
    backchannel: RwLock<Option<Backchannel>>,
    last_keepalive: Mutex<Option<Instant>>,
}

impl RtspSession {
    /// Create a session for `url` (e.g. `rtsp://192.168.1.20:554/h264Preview_01_main`).
    ///
    /// No connection is made until the first request.
    pub fn new(url: &str, credentials: Credentials, config: SessionConfig) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::InvalidUrl(format!("{url}: missing host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_RTSP_PORT);

        Ok(Self {
            url: url.to_string(),
            control: Mutex::new(ControlChannel::new(&host, port, credentials, &config)),
            host,
            port,
            config,
            state: RwLock::new(NegotiationState::Idle),
            backchannel: RwLock::new(None),
            last_keepalive: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.read()
    }

    /// Session id from SETUP, while one is held.
    pub fn session_id(&self) -> Option<String> {
        self.control.lock().session_id().map(str::to_string)
    }

    /// Current CSeq (last value sent).
    pub fn cseq(&self) -> u32 {
        self.control.lock().cseq()
    }

    /// The live backchannel, if negotiated and not invalidated.
    pub fn backchannel(&self) -> Option<Backchannel> {
        self.backchannel.read().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.backchannel.read().is_some()
    }

    fn set_state(&self, state: NegotiationState) {
        let mut current = self.state.write();
        tracing::debug!(old_state = ?*current, new_state = ?state, "negotiation state transition");
        *current = state;
    }

    /// Send an arbitrary request on the control channel.
    ///
    /// Non-2xx responses are returned, not raised.
    pub fn send_request(
        &self,
        method: Method,
        uri: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<RtspResponse> {
        self.control
            .lock()
            .send(method, uri.unwrap_or(&self.url), headers)
    }

    /// Run OPTIONS → DESCRIBE → SETUP → PLAY and bind the backchannel socket.
    ///
    /// A session left over from an earlier negotiation is torn down first.
    pub fn negotiate(&self) -> Result<Backchannel> {
        let mut control = self.control.lock();

        if !matches!(
            self.state(),
            NegotiationState::Idle | NegotiationState::TornDown
        ) {
            tracing::info!(state = ?self.state(), "tearing down previous session before negotiating");
            self.teardown_locked(&mut control);
        }
        self.set_state(NegotiationState::Idle);

        tracing::info!(url = %self.url, "setting up backchannel audio");
        match self.run_negotiation(&mut control) {
            Ok(backchannel) => {
                self.install_backchannel(backchannel.clone());
                tracing::info!(
                    server_port = backchannel.server_port,
                    payload_type = backchannel.payload_type,
                    "backchannel configured"
                );
                Ok(backchannel)
            }
            Err(e) => {
                tracing::error!(error = %e, state = ?self.state(), "failed to set up backchannel");
                Err(e)
            }
        }
    }

    /// Publish a bound backchannel and start the keepalive clock.
    pub(crate) fn install_backchannel(&self, backchannel: Backchannel) {
        *self.backchannel.write() = Some(backchannel);
        *self.last_keepalive.lock() = Some(Instant::now());
        self.set_state(NegotiationState::Playing);
    }

    fn run_negotiation(&self, control: &mut ControlChannel) -> Result<Backchannel> {
        let root = format!("rtsp://{}:{}/", self.host, self.port);
        let resp = control.send(Method::Options, &root, &[])?;
        require_success(Method::Options, &resp)?;
        self.set_state(NegotiationState::OptionsOk);

        let resp = control.send(
            Method::Describe,
            &self.url,
            &[("Accept", "application/sdp")],
        )?;
        require_success(Method::Describe, &resp)?;
        self.set_state(NegotiationState::Described);

        let track = sdp::find_backchannel(resp.body_text()).ok_or(BridgeError::NoBackchannelTrack)?;
        self.set_state(NegotiationState::TrackFound);

        let mut content_base = resp
            .get_header("Content-Base")
            .unwrap_or(&self.url)
            .to_string();
        if !content_base.ends_with('/') {
            content_base.push('/');
        }
        let setup_url = if track.control.starts_with("rtsp://") {
            track.control.clone()
        } else {
            format!("{}{}", content_base, track.control)
        };

        tracing::info!(%setup_url, "setting up backchannel track");
        let client_port = self.config.client_port;
        let transport = TransportHeader::client_request(client_port);
        let resp = control.send(Method::Setup, &setup_url, &[("Transport", &transport)])?;
        require_success(Method::Setup, &resp)?;

        let server_port = resp
            .get_header("Transport")
            .filter(|t| !t.is_empty())
            .map(TransportHeader::parse)
            .ok_or(BridgeError::MissingHeader("Transport header"))?
            .server_port()?;
        tracing::info!(server_port, "backchannel server port");

        let session = resp
            .get_header("Session")
            .and_then(SessionHeader::parse)
            .ok_or(BridgeError::MissingHeader("Session header"))?;
        tracing::info!(session_id = %session.id, "established session");
        if let Some(timeout) = session.timeout_secs {
            tracing::info!(timeout, "server session timeout (seconds)");
        }
        control.set_session_id(session.id);
        self.set_state(NegotiationState::SetupOk);

        let resp = control.send(Method::Play, &content_base, &[("Range", "npt=0.000-")])?;
        require_success(Method::Play, &resp)?;

        let remote = self.resolve(server_port)?;
        let transport = UdpTransport::bind(client_port, remote, self.config.udp_read_timeout())?;
        tracing::info!(client_port, %remote, "backchannel socket bound");

        Ok(Backchannel {
            transport,
            client_port,
            server_port,
            payload_type: track.payload_type,
            codec: if track.is_pcma() { G711::Alaw } else { G711::Ulaw },
        })
    }

    fn resolve(&self, port: u16) -> Result<SocketAddr> {
        let mut fallback = None;
        for addr in (self.host.as_str(), port).to_socket_addrs()? {
            if addr.is_ipv4() {
                return Ok(addr);
            }
            fallback.get_or_insert(addr);
        }
        fallback.ok_or_else(|| BridgeError::InvalidUrl(format!("cannot resolve {}", self.host)))
    }

    /// Whether at least `keepalive_interval` has passed since the last
    /// successful keepalive (or negotiation).
    pub fn keepalive_due(&self) -> bool {
        match *self.last_keepalive.lock() {
            Some(last) => last.elapsed() >= self.config.keepalive_interval(),
            None => true,
        }
    }

    /// Send GET_PARAMETER if one is due. Returns whether a request was sent.
    pub fn send_keepalive(&self) -> Result<bool> {
        if !self.keepalive_due() {
            return Ok(false);
        }
        self.probe()?;
        Ok(true)
    }

    /// Send GET_PARAMETER now, regardless of the interval.
    pub fn probe(&self) -> Result<()> {
        let resp = self.control.lock().send(Method::GetParameter, &self.url, &[])?;
        if !resp.is_success() {
            tracing::warn!(status = resp.status_code, "keepalive failed");
            return Err(status_error(Method::GetParameter, &resp));
        }
        *self.last_keepalive.lock() = Some(Instant::now());
        tracing::debug!("keepalive sent");
        Ok(())
    }

    /// Send one datagram on the backchannel. Fails fast when there is none.
    pub fn send_rtp(&self, packet: &[u8]) -> Result<usize> {
        let transport = self
            .backchannel
            .read()
            .as_ref()
            .map(|b| b.transport.clone())
            .ok_or(BridgeError::BackchannelUnavailable)?;
        transport.send(packet)
    }

    /// Drop the backchannel handle; sends fail until the next negotiation.
    pub fn invalidate_backchannel(&self) {
        if self.backchannel.write().take().is_some() {
            tracing::warn!("backchannel socket invalidated, re-negotiation required");
        }
    }

    /// Best-effort TEARDOWN, then close both sockets and reset negotiated state.
    ///
    /// Idempotent; errors are logged, never returned.
    pub fn teardown(&self) {
        let mut control = self.control.lock();
        self.teardown_locked(&mut control);
    }

    fn teardown_locked(&self, control: &mut ControlChannel) {
        if control.session_id().is_some() {
            match control.send(Method::Teardown, &self.url, &[]) {
                Ok(resp) if !resp.is_success() => {
                    tracing::warn!(status = resp.status_code, "TEARDOWN rejected")
                }
                Ok(_) => tracing::debug!("TEARDOWN acknowledged"),
                Err(e) => tracing::warn!(error = %e, "error sending TEARDOWN"),
            }
        }

        control.reset();
        self.backchannel.write().take();
        *self.last_keepalive.lock() = None;
        self.set_state(NegotiationState::TornDown);
        tracing::info!("RTSP session cleaned up");
    }
}

fn status_error(method: Method, resp: &RtspResponse) -> BridgeError {
    BridgeError::Status {
        method: method.as_str().to_string(),
        status: resp.status_code,
    }
}

fn require_success(method: Method, resp: &RtspResponse) -> Result<()> {
    if resp.is_success() {
        tracing::debug!(%method, "request successful");
        Ok(())
    } else {
        Err(status_error(method, resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(url: &str) -> Result<RtspSession> {
        RtspSession::new(
            url,
            Credentials::new("admin", "secret"),
            SessionConfig::default(),
        )
    }

    #[test]
    fn parses_host_and_port() {
        let s = session("rtsp://192.168.1.20:8554/h264Preview_01_main").unwrap();
        assert_eq!(s.host(), "192.168.1.20");
        assert_eq!(s.port(), 8554);
        assert_eq!(s.state(), NegotiationState::Idle);
        assert!(!s.is_configured());
    }

    #[test]
    fn default_port() {
        let s = session("rtsp://doorbell.local/stream").unwrap();
        assert_eq!(s.port(), DEFAULT_RTSP_PORT);
    }

    #[test]
    fn rejects_url_without_host() {
        assert!(matches!(
            session("not a url"),
            Err(BridgeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn send_without_backchannel_fails_fast() {
        let s = session("rtsp://127.0.0.1:9/stream").unwrap();
        assert!(matches!(
            s.send_rtp(&[0u8; 172]),
            Err(BridgeError::BackchannelUnavailable)
        ));
    }

    #[test]
    fn teardown_without_session_is_idempotent() {
        let s = session("rtsp://127.0.0.1:9/stream").unwrap();
        s.teardown();
        s.teardown();
        assert_eq!(s.state(), NegotiationState::TornDown);
        assert_eq!(s.cseq(), 0);
        assert!(s.session_id().is_none());
    }

    #[test]
    fn keepalive_due_before_first_negotiation() {
        let s = session("rtsp://127.0.0.1:9/stream").unwrap();
        assert!(s.keepalive_due());
    }
}
