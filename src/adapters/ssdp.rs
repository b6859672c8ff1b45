//! SSDP discovery responder.
//!
//! Joins 239.255.255.250:1900 and answers matching `M-SEARCH` requests
//! with a unicast `HTTP/1.1 200 OK` so ground software can find the node
//! without knowing its address:
//!
//! ```text
//!   M-SEARCH * HTTP/1.1            HTTP/1.1 200 OK
//!   HOST: 239.255.255.250:1900     EXT:
//!   MAN: "ssdp:discover"     ──▶   SERVER: ESP32/1.0 UPnP/1.0
//!   MX: 2                          ST: urn:qretprop:espdevice:1
//!   ST: urn:qretprop:espdevice:1
//!   USER-AGENT: QRET/1.0
//! ```
//!
//! Everything else on the group is ignored.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::collections::BTreeMap;
use std::net::UdpSocket;

use async_io_mini::Async;
use log::{debug, info, warn};

use crate::error::CommsError;
use crate::pins::{SSDP_GROUP, SSDP_PORT};

pub const SEARCH_TARGET: &str = "urn:qretprop:espdevice:1";
pub const USER_AGENT: &str = "QRET/1.0";

pub const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
EXT:\r\n\
SERVER: ESP32/1.0 UPnP/1.0\r\n\
ST: urn:qretprop:espdevice:1\r\n\
\r\n";

/// Parsed SSDP request: method plus headers keyed by lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpRequest<'a> {
    pub method: &'a str,
    headers: BTreeMap<String, &'a str>,
}

impl<'a> SsdpRequest<'a> {
    /// `None` unless the first line is `<METHOD> <URI> <VERSION>`.
    /// Header lines without a colon are skipped; a blank line ends them.
    pub fn parse(message: &'a str) -> Option<Self> {
        let mut lines = message.split("\r\n");
        let mut request_line = lines.next()?.splitn(3, ' ');
        let method = request_line.next()?;
        request_line.next()?;
        request_line.next()?;

        let mut headers = BTreeMap::new();
        for line in lines.take_while(|l| !l.is_empty()) {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim());
            }
        }
        Some(Self { method, headers })
    }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(&name.to_ascii_lowercase()).copied()
    }

    /// A discovery search aimed at this kind of node.
    pub fn is_node_search(&self) -> bool {
        self.method == "M-SEARCH"
            && self.header("man") == Some("\"ssdp:discover\"")
            && self.header("mx") == Some("2")
            && self.header("st") == Some(SEARCH_TARGET)
            && self.header("user-agent") == Some(USER_AGENT)
    }
}

/// Reply to send for a datagram, if any.
pub fn respond_to(datagram: &[u8]) -> Option<&'static str> {
    let message = core::str::from_utf8(datagram).ok()?;
    SsdpRequest::parse(message)
        .filter(SsdpRequest::is_node_search)
        .map(|_| RESPONSE)
}

/// UDP socket bound to the SSDP port and joined to the multicast group.
pub fn bind() -> Result<Async<UdpSocket>, CommsError> {
    let err = |e: std::io::Error| CommsError::Socket(e.kind());
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT)).map_err(err)?;
    let [a, b, c, d] = SSDP_GROUP;
    socket
        .join_multicast_v4(&Ipv4Addr::new(a, b, c, d), &Ipv4Addr::UNSPECIFIED)
        .map_err(err)?;
    info!("SSDP listening on {a}.{b}.{c}.{d}:{SSDP_PORT}");
    Async::new(socket).map_err(err)
}

/// Answer searches forever.  Socket errors are logged and skipped.
pub async fn serve(socket: Async<UdpSocket>) {
    let mut buf = [0u8; 1024];
    loop {
        let (n, from): (usize, SocketAddr) = match socket.read_with(|s| s.recv_from(&mut buf)).await {
            Ok(received) => received,
            Err(e) => {
                warn!("SSDP receive failed: {e}");
                continue;
            }
        };
        let Some(reply) = respond_to(&buf[..n]) else {
            debug!("SSDP: ignored {n} bytes from {from}");
            continue;
        };
        info!("SSDP: discovery request from {from}");
        if let Err(e) = socket.write_with(|s| s.send_to(reply.as_bytes(), from)).await {
            warn!("SSDP reply to {from} failed: {e}");
        }
    }
}
