use r2000_data::HandleType;
use std::io::{self, ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Result of one read attempt on a data socket.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Data(usize),
    /// The read timed out or returned nothing. Try again.
    Idle,
    /// The remote end closed the stream.
    Closed,
}

/// A socket delivering the scanner's binary scan data.
pub(crate) trait ByteSource: Send {
    fn kind(&self) -> HandleType;

    fn local_port(&self) -> u16;

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Handle that unblocks a pending `receive` from another thread.
    fn shutdown_handle(&self) -> io::Result<ShutdownHandle>;
}

pub(crate) enum ShutdownHandle {
    Tcp(TcpStream),
    /// UDP reads are only bounded by the read timeout.
    Timeout,
}

impl ShutdownHandle {
    pub(crate) fn shutdown(&self) {
        if let ShutdownHandle::Tcp(stream) = self {
            // the stream may already be closed by the remote
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn idle_on_timeout(e: io::Error) -> io::Result<ReadOutcome> {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            Ok(ReadOutcome::Idle)
        }
        _ => Err(e),
    }
}

pub(crate) struct TcpSource {
    stream: TcpStream,
    local_port: u16,
}

impl TcpSource {
    pub(crate) fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> io::Result<TcpSource> {
        let mut last_error = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(read_timeout))?;
                    let local_port = stream.local_addr()?.port();
                    return Ok(TcpSource { stream, local_port });
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("{}:{} resolves to no address", host, port),
            )
        }))
    }
}

impl ByteSource for TcpSource {
    fn kind(&self) -> HandleType {
        HandleType::Tcp
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.stream.read(buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) => idle_on_timeout(e),
        }
    }

    fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle::Tcp(self.stream.try_clone()?))
    }
}

pub(crate) struct UdpSource {
    socket: UdpSocket,
    local_port: u16,
}

impl UdpSource {
    /// Binds on all interfaces. Port 0 picks an ephemeral port.
    pub(crate) fn bind(port: u16, read_timeout: Duration) -> io::Result<UdpSource> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(read_timeout))?;
        let local_port = socket.local_addr()?.port();
        Ok(UdpSource { socket, local_port })
    }
}

impl ByteSource for UdpSource {
    fn kind(&self) -> HandleType {
        HandleType::Udp
    }

    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.socket.recv(buf) {
            Ok(0) => Ok(ReadOutcome::Idle),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) => idle_on_timeout(e),
        }
    }

    fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle::Timeout)
    }
}
