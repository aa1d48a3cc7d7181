//! Ephemeral port reservation
//!
//! A socket is bound to `(local address, 0)` and held open, never listened
//! on or read from, so the kernel reserves the port for the lifetime of the
//! connection.

use packetimpact_core::{Error, Result};
use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// Holds an ephemeral port on a local address
#[derive(Debug)]
pub struct PortPicker {
    socket: Option<Socket>,
    local_addr: SocketAddr,
}

impl PortPicker {
    /// Reserve a TCP port on `ip`
    pub fn stream(ip: IpAddr) -> Result<Self> {
        Self::bind(ip, Type::STREAM)
    }

    /// Reserve a UDP port on `ip`
    pub fn datagram(ip: IpAddr) -> Result<Self> {
        Self::bind(ip, Type::DGRAM)
    }

    fn bind(ip: IpAddr, ty: Type) -> Result<Self> {
        let addr = SocketAddr::new(ip, 0);
        let socket = Socket::new(Domain::for_address(addr), ty, None)
            .map_err(|e| Error::setup(format!("can't create socket to reserve a port: {}", e)))?;
        socket
            .bind(&addr.into())
            .map_err(|e| Error::setup(format!("can't bind {}: {}", addr, e)))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| Error::setup(format!("can't read bound address: {}", e)))?
            .as_socket()
            .ok_or_else(|| Error::setup("bound address is not an IP socket address"))?;

        debug!("Reserved port {}", local_addr);
        Ok(Self {
            socket: Some(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Release the port
    pub fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Released port {}", self.local_addr);
        }
        Ok(())
    }
}
