//! TCP transport over the `async-io-mini` reactor.
//!
//! Implements [`Listener`] / [`Link`] for the control channel (port
//! [`TCP_PORT`](crate::pins::TCP_PORT)).  The same code runs on lwIP
//! sockets on the device and on the host's network stack.

use core::net::SocketAddr;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};

use async_io_mini::Async;
use log::{debug, info};

use crate::error::CommsError;
use crate::rpc::transport::{Link, Listener};

pub struct TcpServer {
    listener: Async<TcpListener>,
}

impl TcpServer {
    pub fn bind(addr: SocketAddr) -> Result<Self, CommsError> {
        let listener = TcpListener::bind(addr).map_err(|e| CommsError::Socket(e.kind()))?;
        let listener = Async::new(listener).map_err(|e| CommsError::Socket(e.kind()))?;
        info!("TCP server listening on {addr}");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CommsError> {
        self.listener
            .get_ref()
            .local_addr()
            .map_err(|e| CommsError::Socket(e.kind()))
    }
}

impl Listener for TcpServer {
    type Link = TcpLink;

    async fn accept(&mut self) -> Result<(TcpLink, SocketAddr), CommsError> {
        let (stream, remote) = self
            .listener
            .read_with(TcpListener::accept)
            .await
            .map_err(|e| CommsError::AcceptFailed(e.kind()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| CommsError::Socket(e.kind()))?;
        let stream = Async::new(stream).map_err(|e| CommsError::Socket(e.kind()))?;
        Ok((TcpLink { stream }, remote))
    }
}

pub struct TcpLink {
    stream: Async<TcpStream>,
}

fn socket_error(e: &io::Error) -> CommsError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => CommsError::PeerClosed,
        kind => CommsError::Socket(kind),
    }
}

impl Link for TcpLink {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, CommsError> {
        self.stream
            .read_with(|s| {
                let mut s = s;
                s.read(buf)
            })
            .await
            .map_err(|e| socket_error(&e))
    }

    async fn write_all(&self, mut data: &[u8]) -> Result<(), CommsError> {
        while !data.is_empty() {
            let n = self
                .stream
                .write_with(|s| {
                    let mut s = s;
                    s.write(data)
                })
                .await
                .map_err(|e| socket_error(&e))?;
            if n == 0 {
                return Err(CommsError::PeerClosed);
            }
            data = &data[n..];
        }
        Ok(())
    }

    fn close(&self) {
        if let Err(e) = self.stream.get_ref().shutdown(Shutdown::Both) {
            debug!("TCP shutdown: {e}");
        }
    }
}
