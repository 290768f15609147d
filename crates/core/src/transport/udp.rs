use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{BridgeError, Result};

/// UDP transport for outbound backchannel RTP.
///
/// Bound to the negotiated client port with `SO_REUSEADDR` so quick
/// re-negotiation after a teardown does not trip over the old socket.
/// Cloning shares the same OS socket.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl UdpTransport {
    /// Bind `0.0.0.0:<local_port>` and target `remote` for sends.
    pub fn bind(local_port: u16, remote: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let bind_err = |source| BridgeError::Bind {
            port: local_port,
            source,
        };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, local_port);
        socket.bind(&local.into()).map_err(bind_err)?;
        socket.set_read_timeout(Some(read_timeout)).map_err(bind_err)?;

        let socket: UdpSocket = socket.into();
        tracing::debug!(local_port, %remote, "backchannel socket bound");

        Ok(Self {
            socket: Arc::new(socket),
            remote,
        })
    }

    /// Send one datagram to the camera's server port.
    pub fn send(&self, payload: &[u8]) -> Result<usize> {
        Ok(self.socket.send_to(payload, self.remote)?)
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
