//! Handshake session driving one request/response exchange.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use smota_protocol::{cmd, HandshakeRequest, HandshakeResponse, ProtocolError};

use crate::transport::FrameTransport;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no handshake in flight, send a request first")]
    NotAwaiting,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Lifecycle of a handshake exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No request sent yet, or the previous exchange concluded.
    Idle,
    /// A request is on the wire, waiting for the device reply.
    AwaitingResponse,
    /// The device replied with this error code (0 = accepted).
    Handshaken(u32),
    /// The deadline passed with no matching reply.
    TimedOut,
}

/// Drives handshake exchanges over a [`FrameTransport`].
///
/// The session owns the outbound sequence counter; it increments after
/// every send and wraps at 65536. Each exchange is a fresh request: there
/// are no automatic retries after a timeout or a rejection.
pub struct HandshakeSession {
    transport: FrameTransport,
    seq: u16,
    state: SessionState,
}

impl HandshakeSession {
    /// Creates a session over the given transport.
    pub fn new(transport: FrameTransport) -> Self {
        Self {
            transport,
            seq: 0,
            state: SessionState::Idle,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Next sequence number to be used.
    pub fn seq(&self) -> u16 {
        self.seq
    }

    /// Sends a handshake request and moves to `AwaitingResponse`.
    pub async fn send_handshake(&mut self, request: &HandshakeRequest) -> Result<(), SessionError> {
        let payload = request.encode();
        self.transport
            .send(cmd::HANDSHAKE, &payload, self.seq)
            .await?;

        tracing::info!(
            "Handshake sent: project={} version={} seq={}",
            request.project_id_str(),
            request.version,
            self.seq
        );

        self.seq = self.seq.wrapping_add(1);
        self.state = SessionState::AwaitingResponse;
        Ok(())
    }

    /// Waits for the handshake response within a single deadline.
    ///
    /// Frames that are not a handshake response are discarded; the deadline
    /// does not reset when one arrives. Returns `Ok(None)` on timeout and
    /// leaves the session in `TimedOut`; a parsed reply lands the session in
    /// `Handshaken(code)` whether or not the device accepted.
    pub async fn await_response(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<HandshakeResponse>, SessionError> {
        if self.state != SessionState::AwaitingResponse {
            return Err(SessionError::NotAwaiting);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.state = SessionState::TimedOut;
                return Ok(None);
            }

            let frame = match self.transport.recv(remaining).await {
                Some(frame) => frame,
                None => {
                    self.state = SessionState::TimedOut;
                    return Ok(None);
                }
            };

            if frame.cmd != cmd::HANDSHAKE_RESP {
                tracing::debug!(
                    "Discarding unexpected frame cmd=0x{:02X} seq={}",
                    frame.cmd,
                    frame.seq
                );
                continue;
            }

            let response = HandshakeResponse::decode(&frame.payload)?;
            self.state = SessionState::Handshaken(response.error_code);
            return Ok(Some(response));
        }
    }

    /// Shuts down the underlying transport.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smota_protocol::framing::{FrameCodec, FrameHeader, FRAME_CRC_SIZE, FRAME_HEADER_SIZE};
    use smota_protocol::FirmwareVersion;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn request() -> HandshakeRequest {
        HandshakeRequest::new(
            FirmwareVersion::new(1, 0, 0),
            "TEST_PROJECT_123",
            5000,
            30000,
            60000,
            300_000,
        )
        .unwrap()
    }

    /// Reads one frame off a raw stream, returning (cmd, seq, payload).
    async fn read_raw_frame<R: tokio::io::AsyncRead + Unpin>(
        reader: &mut R,
    ) -> (u8, u16, Vec<u8>) {
        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut header_bytes).await.unwrap();
        let header = FrameHeader::parse(&header_bytes).unwrap();

        let mut rest = vec![0u8; header.length as usize + FRAME_CRC_SIZE];
        reader.read_exact(&mut rest).await.unwrap();
        rest.truncate(header.length as usize);

        (header.cmd, header.seq, rest)
    }

    fn session_with_peer() -> (HandshakeSession, tokio::io::DuplexStream) {
        let (host_side, device_side) = tokio::io::duplex(4096);
        let (read, write) = tokio::io::split(host_side);
        let session = HandshakeSession::new(FrameTransport::new(read, write));
        (session, device_side)
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let (session, _peer) = session_with_peer();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.seq(), 0);
    }

    #[tokio::test]
    async fn test_await_without_send_is_an_error() {
        let (mut session, _peer) = session_with_peer();
        let result = session.await_response(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(SessionError::NotAwaiting)));
    }

    #[tokio::test]
    async fn test_send_increments_seq_and_transitions() {
        let (mut session, mut peer) = session_with_peer();

        session.send_handshake(&request()).await.unwrap();
        assert_eq!(session.state(), SessionState::AwaitingResponse);
        assert_eq!(session.seq(), 1);

        let (cmd_byte, seq, payload) = read_raw_frame(&mut peer).await;
        assert_eq!(cmd_byte, cmd::HANDSHAKE);
        assert_eq!(seq, 0);
        assert_eq!(payload.len(), smota_protocol::handshake::REQUEST_SIZE);
    }

    #[tokio::test]
    async fn test_successful_handshake() {
        let (mut session, mut peer) = session_with_peer();

        session.send_handshake(&request()).await.unwrap();

        let device = tokio::spawn(async move {
            let (_, seq, _) = read_raw_frame(&mut peer).await;
            let reply = HandshakeResponse {
                error_code: 0,
                details: None,
            };
            let bytes = FrameCodec::new()
                .encode(cmd::HANDSHAKE_RESP, &reply.encode(), seq)
                .unwrap();
            peer.write_all(&bytes).await.unwrap();
            peer
        });

        let response = session
            .await_response(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_success());
        assert_eq!(session.state(), SessionState::Handshaken(0));

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_device_rejection_is_still_handshaken() {
        let (mut session, mut peer) = session_with_peer();

        session.send_handshake(&request()).await.unwrap();

        let code = smota_protocol::error_bits::INSTALL_LOW_BATTERY;
        let device = tokio::spawn(async move {
            let (_, seq, _) = read_raw_frame(&mut peer).await;
            let reply = HandshakeResponse {
                error_code: code,
                details: None,
            };
            let bytes = FrameCodec::new()
                .encode(cmd::HANDSHAKE_RESP, &reply.encode(), seq)
                .unwrap();
            peer.write_all(&bytes).await.unwrap();
            peer
        });

        let response = session
            .await_response(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(session.state(), SessionState::Handshaken(code));

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_lands_in_timed_out() {
        let (mut session, _peer) = session_with_peer();

        session.send_handshake(&request()).await.unwrap();
        let response = session
            .await_response(Duration::from_millis(50))
            .await
            .unwrap();
        assert!(response.is_none());
        assert_eq!(session.state(), SessionState::TimedOut);
    }

    #[tokio::test]
    async fn test_unrelated_frames_are_discarded() {
        let (mut session, mut peer) = session_with_peer();

        session.send_handshake(&request()).await.unwrap();

        let device = tokio::spawn(async move {
            let (_, seq, _) = read_raw_frame(&mut peer).await;
            let codec = FrameCodec::new();

            // Noise first, then the real response.
            let noise = codec.encode(cmd::DATA_BLOCK, b"junk", seq).unwrap();
            peer.write_all(&noise).await.unwrap();

            let reply = HandshakeResponse {
                error_code: 0,
                details: None,
            };
            let bytes = codec
                .encode(cmd::HANDSHAKE_RESP, &reply.encode(), seq)
                .unwrap();
            peer.write_all(&bytes).await.unwrap();
            peer
        });

        let response = session
            .await_response(Duration::from_secs(1))
            .await
            .unwrap();
        assert!(response.is_some());
        assert_eq!(session.state(), SessionState::Handshaken(0));

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_seq_wraps_at_u16_max() {
        let (mut session, mut peer) = session_with_peer();
        session.seq = u16::MAX;

        session.send_handshake(&request()).await.unwrap();
        assert_eq!(session.seq(), 0);

        let (_, seq, _) = read_raw_frame(&mut peer).await;
        assert_eq!(seq, u16::MAX);
    }
}
