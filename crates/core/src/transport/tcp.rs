use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::protocol::response::header_end;

/// Lazily connected RTSP control connection.
///
/// The TCP stream is opened by the first [`exchange`](Self::exchange) and kept
/// until [`close`](Self::close). One request is in flight at a time; callers
/// serialise access.
pub struct TcpConnection {
    host: String,
    port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
    max_response_bytes: usize,
    stream: Option<TcpStream>,
}

impl TcpConnection {
    pub fn new(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
        max_response_bytes: usize,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout,
            io_timeout,
            max_response_bytes,
            stream: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write one request and read back one response.
    ///
    /// On any I/O failure the stream is dropped so the next call reconnects.
    pub fn exchange(&mut self, request: &[u8]) -> Result<String> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.connect()?,
        };

        let result = stream
            .write_all(request)
            .map_err(BridgeError::from)
            .and_then(|()| read_response(&mut stream, self.max_response_bytes));

        if result.is_ok() {
            self.stream = Some(stream);
        }
        result
    }

    /// Drop the TCP stream. Idempotent.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            tracing::debug!(host = %self.host, port = self.port, "control connection closed");
        }
    }

    fn connect(&self) -> Result<TcpStream> {
        let addr_text = format!("{}:{}", self.host, self.port);
        let addrs: Vec<SocketAddr> = addr_text
            .to_socket_addrs()
            .map_err(|source| BridgeError::Connect {
                addr: addr_text.clone(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.io_timeout))?;
                    stream.set_write_timeout(Some(self.io_timeout))?;
                    stream.set_nodelay(true)?;
                    tracing::info!(%addr, "control connection established");
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(BridgeError::Connect {
            addr: addr_text,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }),
        })
    }
}

/// Read one RTSP response: headers through the blank line, then
/// `Content-Length` bytes of body. Stops early at EOF or at `max_bytes`.
fn read_response(stream: &mut impl Read, max_bytes: usize) -> Result<String> {
    let mut buf: Vec<u8> = Vec::with_capacity(max_bytes.min(4096));
    let mut chunk = [0u8; 2048];

    loop {
        if let Some(total) = complete_length(&buf)
            && buf.len() >= total
        {
            buf.truncate(total);
            break;
        }
        if buf.len() >= max_bytes {
            tracing::warn!(max_bytes, "RTSP response exceeds buffer, truncating");
            buf.truncate(max_bytes);
            break;
        }

        let want = chunk.len().min(max_bytes - buf.len());
        let n = stream.read(&mut chunk[..want])?;
        if n == 0 {
            if buf.is_empty() {
                return Err(BridgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "control connection closed by camera",
                )));
            }
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Total message length once the header block is complete.
fn complete_length(buf: &[u8]) -> Option<usize> {
    let (head_len, body_start) = header_end(buf)?;
    let head = String::from_utf8_lossy(&buf[..head_len]);
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(body_start + content_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_header_only_response() {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\nRTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n";
        let text = read_response(&mut Cursor::new(&raw[..]), 4096).unwrap();
        assert_eq!(text, "RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n");
    }

    #[test]
    fn reads_body_by_content_length() {
        let raw = b"RTSP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nv=0\r\nextra";
        let text = read_response(&mut Cursor::new(&raw[..]), 4096).unwrap();
        assert!(text.ends_with("\r\n\r\nv=0\r\n"));
    }

    #[test]
    fn reads_bare_lf_response_without_waiting() {
        let raw = b"RTSP/1.0 200 OK\nCSeq: 4\nContent-Length: 3\n\nv=0RTSP/1.0 200 OK\n";
        let text = read_response(&mut Cursor::new(&raw[..]), 4096).unwrap();
        assert_eq!(text, "RTSP/1.0 200 OK\nCSeq: 4\nContent-Length: 3\n\nv=0");
    }

    #[test]
    fn caps_at_max_bytes() {
        let raw = b"RTSP/1.0 200 OK\r\nContent-Length: 1000\r\n\r\nabcdef";
        let text = read_response(&mut Cursor::new(&raw[..]), 20).unwrap();
        assert_eq!(text.len(), 20);
    }

    #[test]
    fn eof_before_anything_is_an_error() {
        assert!(read_response(&mut Cursor::new(&b""[..]), 4096).is_err());
    }
}
