//! Framed transport over an async byte stream.
//!
//! A [`FrameTransport`] wraps any `AsyncRead` + `AsyncWrite` pair, typically
//! the piped stdio of a spawned device simulator. A background task owns the
//! read half: it decodes frames off the stream and pushes them into a
//! bounded channel, so callers receive whole frames with a timeout instead
//! of juggling partial reads. The write half sits behind a mutex so frames
//! from concurrent callers never interleave on the wire.
//!
//! The reader task stops on EOF, on the first malformed frame, or when
//! [`FrameTransport::shutdown`] is called. There is no resynchronization: a
//! corrupt stream ends the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use smota_protocol::framing::{crc16, Frame, FrameCodec, FrameHeader, FRAME_CRC_SIZE, FRAME_HEADER_SIZE};
use smota_protocol::{ProtocolError, Result};

/// Capacity of the inbound frame channel.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// A frame-oriented transport over an async byte stream.
pub struct FrameTransport {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    frames: mpsc::Receiver<Frame>,
    shutdown: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
    codec: FrameCodec,
}

impl FrameTransport {
    /// Creates a transport and spawns the background reader task.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader_task = tokio::spawn(read_loop(reader, tx, Arc::clone(&shutdown)));

        Self {
            writer: Mutex::new(Box::new(writer)),
            frames: rx,
            shutdown,
            reader_task,
            codec: FrameCodec::new(),
        }
    }

    /// Encodes and sends one frame.
    pub async fn send(&self, command: u8, payload: &[u8], seq: u16) -> Result<()> {
        let bytes = self.codec.encode(command, payload, seq)?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;

        tracing::debug!(
            "TX cmd=0x{:02X} seq={} len={}",
            command,
            seq,
            payload.len()
        );
        Ok(())
    }

    /// Receives the next inbound frame, waiting at most `timeout`.
    ///
    /// Returns `None` both on timeout and when the reader task has stopped
    /// (EOF, malformed stream, or shutdown) and the channel has drained.
    pub async fn recv(&mut self, timeout: Duration) -> Option<Frame> {
        match tokio::time::timeout(timeout, self.frames.recv()).await {
            Ok(frame) => frame,
            Err(_) => None,
        }
    }

    /// Asks the reader task to stop.
    ///
    /// The task notices the flag at the next frame boundary; closing the
    /// underlying stream (e.g. killing a simulator subprocess) unblocks a
    /// reader parked mid-read.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// True once the background reader task has exited.
    pub fn reader_finished(&self) -> bool {
        self.reader_task.is_finished()
    }
}

impl Drop for FrameTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Reads frames off the stream until EOF, a decode error, or shutdown.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Frame>, shutdown: Arc<AtomicBool>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::debug!("Reader task stopping (shutdown requested)");
            return;
        }

        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("Reader task stopping (stream closed)");
                return;
            }
            Err(e) => {
                tracing::warn!("Reader task stopping (malformed stream): {}", e);
                return;
            }
        };

        tracing::debug!(
            "RX cmd=0x{:02X} seq={} len={}",
            frame.cmd,
            frame.seq,
            frame.payload.len()
        );

        if tx.send(frame).await.is_err() {
            // Receiver dropped, nobody is listening anymore.
            return;
        }
    }
}

/// Reads exactly one frame: fixed header, then payload and CRC trailer.
async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::parse(&header_bytes)?;

    let mut rest = vec![0u8; header.length as usize + FRAME_CRC_SIZE];
    reader.read_exact(&mut rest).await?;
    let (payload, trailer) = rest.split_at(header.length as usize);

    let mut covered = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    covered.extend_from_slice(&header_bytes);
    covered.extend_from_slice(payload);
    let expected = crc16(&covered);
    let got = u16::from_le_bytes([trailer[0], trailer[1]]);
    if got != expected {
        return Err(ProtocolError::ChecksumMismatch { expected, got });
    }

    Ok(Frame {
        cmd: header.cmd,
        seq: header.seq,
        payload: payload.to_vec(),
    })
}
