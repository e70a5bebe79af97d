//! Reference [`SideChannelTransport`] backed by a POSIX socket pair or
//! Unix domain socket, polled through `mio`. This instantiates — but does
//! not replace — the external transport collaborator; callers remain free
//! to implement [`SideChannelTransport`] themselves against a different
//! concrete transport.

use std::io::{self, ErrorKind, Read, Write};

use mio::event::Source;
use mio::{Interest, Registry, Token};
use mio::net::UnixStream;

use crate::side_channel::codec::{encode_frame, FrameDecoder};
use crate::side_channel::transport::{SideChannelTransport, TransportError};
use crate::side_channel::ControlMessage;

/// A connected pair of `mio`-pollable Unix-domain-socket side channels, as
/// produced by [`pair`]: one end for the server's [`crate::receiver::Receiver`],
/// one for the client peer process to hand its own transport handle to.
pub struct PosixSideChannel {
    stream: UnixStream,
    decoder: FrameDecoder,
    write_buffer: Vec<u8>,
}

impl PosixSideChannel {
    fn new(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            write_buffer: Vec::new(),
        })
    }

    /// Drains the pending write buffer, tolerating partial writes across
    /// `WouldBlock`.
    fn flush_writes(&mut self) -> Result<(), TransportError> {
        while !self.write_buffer.is_empty() {
            match self.stream.write(&self.write_buffer) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => {
                    self.write_buffer.drain(0..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        Ok(())
    }
}

/// Creates a connected pair of reference side channels backed by a
/// `socketpair(2)` Unix domain socket, one for the server side and one to
/// be transferred to the client peer process.
pub fn pair() -> io::Result<(PosixSideChannel, PosixSideChannel)> {
    let (a, b) = socketpair::socketpair_stream()?;
    a.set_nonblocking(true)?;
    b.set_nonblocking(true)?;
    Ok((
        PosixSideChannel::new(UnixStream::from_std(a))?,
        PosixSideChannel::new(UnixStream::from_std(b))?,
    ))
}

impl SideChannelTransport for PosixSideChannel {
    fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        let frame = encode_frame(message)?;
        self.write_buffer.extend_from_slice(&frame);
        self.flush_writes()
    }

    fn try_recv(&mut self) -> Result<Vec<ControlMessage>, TransportError> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => self.decoder.feed(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(TransportError::PeerCrashed(e.to_string()))
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        self.decoder.drain_messages()
    }
}

impl Source for PosixSideChannel {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.stream.register(registry, token, interests)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.stream.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.stream.deregister(registry)
    }
}

/// A listening endpoint for the domain-socket variant of the side-channel
/// transport, for deployments that prefer an accepted Unix domain socket
/// over a pre-forked `socketpair`.
pub struct PosixSideChannelAcceptor {
    listener: mio::net::UnixListener,
}

impl PosixSideChannelAcceptor {
    pub fn bind(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        let _ = std::fs::remove_file(path.as_ref());
        let socket = socket2::Socket::new(socket2::Domain::UNIX, socket2::Type::STREAM, None)?;
        socket.set_nonblocking(true)?;
        let addr = socket2::SockAddr::unix(path.as_ref())?;
        socket.bind(&addr)?;
        socket.listen(128)?;
        use std::os::unix::io::{FromRawFd, IntoRawFd};
        let listener =
            unsafe { std::os::unix::net::UnixListener::from_raw_fd(socket.into_raw_fd()) };
        Ok(Self {
            listener: mio::net::UnixListener::from_std(listener),
        })
    }

    /// Accepts one pending connection, if any, without blocking.
    pub fn try_accept(&self) -> io::Result<Option<PosixSideChannel>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => Ok(Some(PosixSideChannel::new(stream)?)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Source for PosixSideChannelAcceptor {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.listener.register(registry, token, interests)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.listener.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.listener.deregister(registry)
    }
}
