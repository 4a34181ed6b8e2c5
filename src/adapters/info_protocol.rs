//! Aerospike wire framing and the info protocol
//!
//! Every message starts with an 8-byte header: protocol version (2), message
//! type, then a 48-bit big-endian body length. Info requests carry
//! newline-terminated command names; replies carry `name\tvalue` lines.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::domain::ports::InfoSession;
use crate::error::{Error, Result};

pub const PROTO_VERSION: u8 = 2;
pub const INFO_MESSAGE: u8 = 1;
pub const AS_MESSAGE: u8 = 3;

const HEADER_LEN: usize = 8;
const MAX_BODY_LEN: usize = 128 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

/// Prefix `body` with a protocol header.
pub fn encode_frame(msg_type: u8, body: &[u8]) -> Bytes {
    let header = ((PROTO_VERSION as u64) << 56) | ((msg_type as u64) << 48) | body.len() as u64;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u64(header);
    buf.put_slice(body);
    buf.freeze()
}

/// Split a protocol header into message type and body length.
pub fn decode_header(header: [u8; HEADER_LEN]) -> Result<(u8, usize)> {
    let version = header[0];
    if version != PROTO_VERSION {
        return Err(Error::Protocol(format!(
            "unsupported protocol version {}",
            version
        )));
    }

    let raw = u64::from_be_bytes(header);
    let len = (raw & 0x0000_FFFF_FFFF_FFFF) as usize;
    if len > MAX_BODY_LEN {
        return Err(Error::Protocol(format!("frame of {} bytes exceeds limit", len)));
    }
    Ok((header[1], len))
}

/// Write one complete frame.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and return its body, checking the message type.
pub async fn read_frame<R>(reader: &mut R, expected_type: u8) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let (msg_type, len) = decode_header(header)?;
    if msg_type != expected_type {
        return Err(Error::Protocol(format!(
            "expected message type {}, got {}",
            expected_type, msg_type
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}

// =============================================================================
// Info Commands
// =============================================================================

/// Build an info request frame for `keys`.
pub fn encode_info_request(keys: &[&str]) -> Bytes {
    let mut body = String::new();
    for key in keys {
        body.push_str(key);
        body.push('\n');
    }
    encode_frame(INFO_MESSAGE, body.as_bytes())
}

/// Parse an info reply body into `name → value`.
pub fn parse_info_response(body: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(body)
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('\t') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

// =============================================================================
// Connection
// =============================================================================

/// A TCP connection speaking the info protocol to one node.
pub struct InfoConnection {
    stream: TcpStream,
    address: String,
    timeout: Duration,
}

impl InfoConnection {
    /// Connect to `address` (`host:port`).
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("connect to {}", address),
            })?
            .map_err(|e| Error::connection(address, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::connection(address, e))?;

        Ok(Self {
            stream,
            address: address.to_string(),
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a frame and read back one reply body of `reply_type`.
    pub async fn call(&mut self, frame: &[u8], reply_type: u8) -> Result<Bytes> {
        let address = self.address.clone();
        let stream = &mut self.stream;
        let exchange = async move {
            write_frame(stream, frame).await?;
            read_frame(stream, reply_type).await
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("request to {}", address),
            })?
            .map_err(|e| match e {
                Error::Io(io) => Error::connection(address, io),
                other => other,
            })
    }

    /// Send info commands and return the parsed reply.
    pub async fn info(&mut self, keys: &[&str]) -> Result<HashMap<String, String>> {
        trace!(address = %self.address, ?keys, "Info request");
        let body = self.call(&encode_info_request(keys), INFO_MESSAGE).await?;
        Ok(parse_info_response(&body))
    }

    /// Send one info command and return its value.
    pub async fn info_one(&mut self, key: &str) -> Result<String> {
        self.info(&[key]).await?.remove(key).ok_or_else(|| {
            Error::Protocol(format!("{} did not answer info key '{}'", self.address, key))
        })
    }
}

impl std::fmt::Debug for InfoConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoConnection")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl InfoSession for InfoConnection {
    async fn request_info(&mut self, keys: &[&str]) -> Result<HashMap<String, String>> {
        self.info(keys).await
    }
}

// =============================================================================
// Peer Lists
// =============================================================================

/// A peer as advertised by `peers-clear-std`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub node_id: String,
    /// Reachable `host:port` addresses, in advertised order
    pub addresses: Vec<String>,
}

/// Parse a `peers-clear-std` reply.
///
/// Format: `<generation>,<default port>,[[<id>,<tls name>,[<addr>,...]],...]`.
/// Addresses without a port get the default port.
pub fn parse_peers(raw: &str) -> Result<Vec<Peer>> {
    let parts = split_top_level(raw.trim());
    if parts.len() != 3 {
        return Err(Error::parse("peers", format!("unexpected layout '{}'", raw)));
    }

    let default_port: u16 = parts[1]
        .parse()
        .map_err(|_| Error::parse("peers", format!("bad default port '{}'", parts[1])))?;

    let list = strip_brackets(parts[2])?;
    if list.is_empty() {
        return Ok(Vec::new());
    }

    split_top_level(list)
        .into_iter()
        .map(|entry| {
            let fields = split_top_level(strip_brackets(entry)?);
            if fields.len() != 3 {
                return Err(Error::parse("peers", format!("bad peer entry '{}'", entry)));
            }
            let addresses = split_top_level(strip_brackets(fields[2])?)
                .into_iter()
                .filter(|a| !a.is_empty())
                .map(|a| with_default_port(a, default_port))
                .collect();
            Ok(Peer {
                node_id: fields[0].to_string(),
                addresses,
            })
        })
        .collect()
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn strip_brackets(s: &str) -> Result<&str> {
    s.strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::parse("peers", format!("expected bracketed list, got '{}'", s)))
}

fn with_default_port(addr: &str, default_port: u16) -> String {
    if addr.starts_with('[') {
        // Bracketed IPv6, optionally followed by :port
        if addr.contains("]:") {
            addr.to_string()
        } else {
            format!("{}:{}", addr, default_port)
        }
    } else {
        match addr.matches(':').count() {
            0 => format!("{}:{}", addr, default_port),
            1 => addr.to_string(),
            _ => format!("[{}]:{}", addr, default_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_frame_header_layout() {
        let frame = encode_frame(INFO_MESSAGE, b"sets\n");
        assert_eq!(&frame[..8], &[2, 1, 0, 0, 0, 0, 0, 5]);
        assert_eq!(&frame[8..], b"sets\n");
    }

    #[test]
    fn test_decode_header_rejects_bad_version() {
        let err = decode_header([3, 1, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_matches!(err, Error::Protocol(_));
    }

    #[test]
    fn test_decode_header_rejects_oversized_body() {
        let err = decode_header([2, 1, 0, 0, 0x10, 0, 0, 0]).unwrap_err();
        assert_matches!(err, Error::Protocol(_));
    }

    #[test]
    fn test_info_request_terminates_each_name() {
        let frame = encode_info_request(&["node", "peers-clear-std"]);
        assert_eq!(&frame[8..], b"node\npeers-clear-std\n");
    }

    #[test]
    fn test_parse_info_response() {
        let reply = parse_info_response(
            b"sets\tns=persisted:set=lru:objects=10;\nnode\tBB9020011AC4202\nempty\n",
        );
        assert_eq!(reply["sets"], "ns=persisted:set=lru:objects=10;");
        assert_eq!(reply["node"], "BB9020011AC4202");
        assert_eq!(reply["empty"], "");
    }

    #[tokio::test]
    async fn test_read_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let reply = encode_frame(INFO_MESSAGE, b"node\tA1\n");
        write_frame(&mut server, &reply).await.unwrap();

        let body = read_frame(&mut client, INFO_MESSAGE).await.unwrap();
        assert_eq!(parse_info_response(&body)["node"], "A1");
    }

    #[tokio::test]
    async fn test_read_frame_rejects_unexpected_type() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_frame(&mut server, &encode_frame(AS_MESSAGE, b"x"))
            .await
            .unwrap();

        let err = read_frame(&mut client, INFO_MESSAGE).await.unwrap_err();
        assert_matches!(err, Error::Protocol(_));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(256);
        server.write_all(&[2, 1, 0, 0, 0, 0, 0, 9, b'n']).await.unwrap();
        drop(server);

        let err = read_frame(&mut client, INFO_MESSAGE).await.unwrap_err();
        assert_matches!(err, Error::Io(_));
    }

    #[test]
    fn test_parse_peers() {
        let peers = parse_peers(
            "12,3000,[[BB9030011AC4202,,[172.17.0.3]],[BB9040011AC4202,,[172.17.0.4:3100,10.0.0.4]]]",
        )
        .unwrap();

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].node_id, "BB9030011AC4202");
        assert_eq!(peers[0].addresses, vec!["172.17.0.3:3000"]);
        assert_eq!(
            peers[1].addresses,
            vec!["172.17.0.4:3100", "10.0.0.4:3000"]
        );
    }

    #[test]
    fn test_parse_peers_ipv6() {
        let peers = parse_peers("1,3000,[[A1,,[[2001:db8::1]:3001,2001:db8::2]]]").unwrap();
        assert_eq!(
            peers[0].addresses,
            vec!["[2001:db8::1]:3001", "[2001:db8::2]:3000"]
        );
    }

    #[test]
    fn test_parse_peers_empty_cluster() {
        assert!(parse_peers("4,3000,[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_peers_rejects_garbage() {
        assert_matches!(parse_peers("nonsense"), Err(Error::Parse { .. }));
        assert_matches!(parse_peers("1,notaport,[]"), Err(Error::Parse { .. }));
    }
}
