use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use hyper_util::client::legacy::connect::{Connected, Connection};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream forwarded through an SSH session.
///
/// Reads, writes and shutdown go straight to the wrapped channel stream.
/// SSH channels have no notion of deadlines, so the deadline setters accept
/// any value and do nothing.
#[derive(Debug)]
pub struct TunneledStream<S> {
    inner: S,
    network: String,
    remote_addr: String,
}

impl<S> TunneledStream<S> {
    pub fn new(inner: S, network: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        Self {
            inner,
            network: network.into(),
            remote_addr: remote_addr.into(),
        }
    }

    /// Network name the stream was dialed with (`tcp`, `unix`, ...).
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Address the stream was dialed to, as seen from the SSH server.
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn set_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    pub fn set_read_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    pub fn set_write_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Ok(())
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TunneledStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TunneledStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S> Connection for TunneledStream<S> {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}
