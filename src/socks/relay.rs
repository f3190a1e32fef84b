//! Bidirectional relay pump
//!
//! Steady-state byte shuttling between the client and the destination
//! once the handshake is done. Each direction owns one fixed-capacity
//! buffer and advances independently: a side is read only while its
//! buffer has free space, written only while the buffer holds bytes, so
//! a slow consumer mechanically suspends reads from its producer instead
//! of growing memory. End-of-stream on one side drains that direction's
//! buffer and then shuts down the peer's write half; the opposite
//! direction keeps running until it reaches end-of-stream itself.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

/// Fixed-capacity staging buffer for one relay direction.
#[derive(Debug)]
struct CopyBuffer {
    buf: Box<[u8]>,
    pos: usize,
    cap: usize,
    read_done: bool,
    amt: u64,
}

impl CopyBuffer {
    fn new(capacity: usize) -> Self {
        CopyBuffer {
            buf: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            cap: 0,
            read_done: false,
            amt: 0,
        }
    }

    fn poll_copy<R, W>(
        &mut self,
        cx: &mut Context<'_>,
        mut reader: Pin<&mut R>,
        mut writer: Pin<&mut W>,
    ) -> Poll<io::Result<u64>>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            // Refill only once the buffer is fully drained; a full buffer
            // means the consumer is behind and reads stay suspended.
            if self.pos == self.cap && !self.read_done {
                let mut buf = ReadBuf::new(&mut self.buf);
                ready!(reader.as_mut().poll_read(cx, &mut buf))?;
                let n = buf.filled().len();
                if n == 0 {
                    self.read_done = true;
                } else {
                    self.pos = 0;
                    self.cap = n;
                }
            }

            while self.pos < self.cap {
                let n = ready!(writer.as_mut().poll_write(cx, &self.buf[self.pos..self.cap]))?;
                if n == 0 {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write zero bytes into writer",
                    )));
                }
                self.pos += n;
                self.amt += n as u64;
            }

            if self.pos == self.cap && self.read_done {
                ready!(writer.as_mut().poll_flush(cx))?;
                return Poll::Ready(Ok(self.amt));
            }
        }
    }
}

/// Progress of one relay direction.
#[derive(Debug)]
enum TransferState {
    /// Copying bytes; end-of-stream not yet drained.
    Running(CopyBuffer),
    /// Source finished and buffer drained; propagating the close to the
    /// peer's write half.
    ShuttingDown(u64),
    /// Direction fully closed; total bytes moved.
    Done(u64),
}

fn transfer_one_direction<R, W>(
    cx: &mut Context<'_>,
    state: &mut TransferState,
    reader: &mut R,
    writer: &mut W,
) -> Poll<io::Result<u64>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            TransferState::Running(buf) => {
                let amt = ready!(buf.poll_copy(cx, Pin::new(reader), Pin::new(writer)))?;
                *state = TransferState::ShuttingDown(amt);
            }
            TransferState::ShuttingDown(amt) => {
                ready!(Pin::new(&mut *writer).poll_shutdown(cx))?;
                *state = TransferState::Done(*amt);
            }
            TransferState::Done(amt) => return Poll::Ready(Ok(*amt)),
        }
    }
}

struct Relay<'a, A: ?Sized, B: ?Sized> {
    a: &'a mut A,
    b: &'a mut B,
    a_to_b: TransferState,
    b_to_a: TransferState,
}

impl<A, B> Future for Relay<'_, A, B>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    type Output = io::Result<(u64, u64)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = &mut *self;

        let a_to_b = transfer_one_direction(cx, &mut me.a_to_b, me.a, me.b)?;
        let b_to_a = transfer_one_direction(cx, &mut me.b_to_a, me.b, me.a)?;

        // The session only closes once both directions are done.
        match (a_to_b, b_to_a) {
            (Poll::Ready(a_to_b), Poll::Ready(b_to_a)) => Poll::Ready(Ok((a_to_b, b_to_a))),
            _ => Poll::Pending,
        }
    }
}

/// Copy bytes both ways between `a` and `b` until both directions reach
/// end-of-stream, with `capacity`-sized buffers per direction.
///
/// `leftover` is delivered to `b` before anything read from `a`, in
/// `capacity`-sized slices so the per-direction bound holds even when
/// the leftover is larger than one buffer. Returns the totals moved
/// a→b (leftover included) and b→a.
pub async fn relay<A, B>(
    a: &mut A,
    b: &mut B,
    capacity: usize,
    leftover: &[u8],
) -> io::Result<(u64, u64)>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    for chunk in leftover.chunks(capacity) {
        b.write_all(chunk).await?;
    }

    let (a_to_b, b_to_a) = Relay {
        a,
        b,
        a_to_b: TransferState::Running(CopyBuffer::new(capacity)),
        b_to_a: TransferState::Running(CopyBuffer::new(capacity)),
    }
    .await?;

    Ok((a_to_b + leftover.len() as u64, b_to_a))
}
