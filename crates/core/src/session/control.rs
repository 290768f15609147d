use crate::config::SessionConfig;
use crate::error::Result;
use crate::protocol::auth::Credentials;
use crate::protocol::{BACKCHANNEL_REQUIRE, DigestChallenge, Method, RtspRequest, RtspResponse};
use crate::transport::TcpConnection;

/// Request/response exchange with the camera over one TCP connection.
///
/// Owns everything that must stay consistent between consecutive requests:
/// the CSeq counter, the digest challenge, and the session id. The owner
/// keeps it behind a lock so two workers never interleave requests.
pub struct ControlChannel {
    conn: TcpConnection,
    credentials: Credentials,
    user_agent: String,
    cseq: u32,
    challenge: Option<DigestChallenge>,
    session_id: Option<String>,
}

impl ControlChannel {
    pub fn new(host: &str, port: u16, credentials: Credentials, config: &SessionConfig) -> Self {
        Self {
            conn: TcpConnection::new(
                host,
                port,
                config.connect_timeout(),
                config.read_timeout(),
                config.max_response_bytes,
            ),
            credentials,
            user_agent: config.user_agent.clone(),
            cseq: 0,
            challenge: None,
            session_id: None,
        }
    }

    /// Send a request and return the camera's response, whatever its status.
    ///
    /// The first 401 carrying a Digest challenge while no challenge is known
    /// is answered once: the realm and nonce are stored and the same request
    /// is re-issued with an `Authorization` header.
    pub fn send(
        &mut self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> Result<RtspResponse> {
        let response = self.send_once(method, uri, headers)?;

        if response.status_code == 401 && self.challenge.is_none() {
            match response
                .get_header("WWW-Authenticate")
                .map(DigestChallenge::parse)
            {
                Some(Ok(challenge)) => {
                    tracing::debug!(realm = %challenge.realm, %method, "answering digest challenge");
                    self.challenge = Some(challenge);
                    return self.send_once(method, uri, headers);
                }
                Some(Err(e)) => tracing::warn!(error = %e, %method, "unusable auth challenge"),
                None => tracing::warn!(%method, "401 without WWW-Authenticate"),
            }
        }

        Ok(response)
    }

    fn send_once(
        &mut self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> Result<RtspResponse> {
        self.cseq += 1;

        let mut request = RtspRequest::new(method, uri);
        for (name, value) in headers {
            request = request.add_header(name, value);
        }
        request = request
            .add_header("CSeq", &self.cseq.to_string())
            .add_header("User-Agent", &self.user_agent)
            .add_header("Require", BACKCHANNEL_REQUIRE);

        if method.carries_session()
            && let Some(id) = &self.session_id
        {
            request = request.add_header("Session", id);
        }
        if let Some(challenge) = &self.challenge {
            let authorization = challenge.authorization(&self.credentials, method, uri);
            request = request.add_header("Authorization", &authorization);
        }

        tracing::debug!(%method, uri, cseq = self.cseq, "request");

        let raw = self.conn.exchange(request.serialize().as_bytes())?;
        let response = RtspResponse::parse(&raw)?;

        tracing::debug!(%method, status = response.status_code, "response");
        Ok(response)
    }

    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, id: String) {
        self.session_id = Some(id);
    }

    pub fn is_authenticated(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    /// Close the connection and forget per-connection state.
    ///
    /// CSeq restarts at 1 only because the TCP connection it numbered is gone;
    /// the counter is never reset while a connection stays open.
    pub fn reset(&mut self) {
        self.conn.close();
        self.cseq = 0;
        self.challenge = None;
        self.session_id = None;
    }
}
