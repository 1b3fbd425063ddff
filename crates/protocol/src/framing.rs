//! Frame codec for the smOTA control-plane wire format.
//!
//! # Frame Format
//!
//! Every frame is a fixed 12-byte header, a variable payload, and a 2-byte
//! CRC-16 trailer. Multi-byte fields are little-endian:
//!
//! - 5 bytes: SOF literal `"smOTA"`
//! - 1 byte: protocol version (currently `0x00`)
//! - 1 byte: fragmentation control
//! - 2 bytes: sequence number, host-assigned, wraps modulo 65536
//! - 1 byte: command code
//! - 2 bytes: payload length
//! - N bytes: command-specific payload
//! - 2 bytes: CRC-16/CCITT over header and payload
//!
//! The header's `length` field always equals the number of payload bytes;
//! a decoder consumes exactly `12 + length + 2` bytes per frame.

use std::io::Read;

use crate::error::{ProtocolError, Result};

/// SOF literal marking the start of every frame.
pub const SOF: [u8; 5] = *b"smOTA";

/// Protocol version carried in the `ver` header field.
pub const PROTOCOL_VERSION: u8 = 0x00;

/// Frame header size: 5 (SOF) + 1 (ver) + 1 (frag) + 2 (seq) + 1 (cmd) + 2 (length).
pub const FRAME_HEADER_SIZE: usize = 12;

/// Size of the CRC-16 trailer following the payload.
pub const FRAME_CRC_SIZE: usize = 2;

/// Maximum payload length encodable in the 16-bit length field.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Command codes of the smOTA control plane.
///
/// Only the handshake pair is driven by this crate's session layer; the
/// remaining codes belong to the firmware transfer flow and are defined for
/// dispatch and diagnostics.
pub mod cmd {
    /// Handshake request (host -> device).
    pub const HANDSHAKE: u8 = 0x01;
    /// Firmware header info (host -> device).
    pub const HEADER_INFO: u8 = 0x02;
    /// Firmware data block (host -> device).
    pub const DATA_BLOCK: u8 = 0x03;
    /// Data transfer complete (host -> device).
    pub const DATA_COMPLETE: u8 = 0x04;
    /// Trigger installation (host -> device).
    pub const INSTALL: u8 = 0x05;
    /// Post-install activation check (host -> device).
    pub const ACTIVATE_CHECK: u8 = 0x06;

    /// Bit set in the command code of every device response.
    pub const RESPONSE_FLAG: u8 = 0x80;

    /// Handshake response (device -> host).
    pub const HANDSHAKE_RESP: u8 = HANDSHAKE | RESPONSE_FLAG;

    /// Returns the response command code paired with a request code.
    #[inline]
    pub fn response_for(request: u8) -> u8 {
        request | RESPONSE_FLAG
    }

    /// Returns true if the code carries the response flag.
    #[inline]
    pub fn is_response(code: u8) -> bool {
        code & RESPONSE_FLAG != 0
    }
}

/// Bit masks of the fragmentation control field.
///
/// Fragmentation is declared by the wire format but not exercised by the
/// handshake flow; frames are emitted with `frag = 0`.
pub mod frag {
    /// Fragmentation enabled.
    pub const EN_MASK: u8 = 0x80;
    /// More fragments follow.
    pub const MORE_MASK: u8 = 0x40;
    /// Total fragment count.
    pub const TOTAL_MASK: u8 = 0x3F;
}

/// CRC-16/CCITT, polynomial 0x1021, initial value 0xFFFF.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version.
    pub ver: u8,
    /// Fragmentation control field.
    pub frag: u8,
    /// Sequence number.
    pub seq: u16,
    /// Command code.
    pub cmd: u8,
    /// Declared payload length in bytes.
    pub length: u16,
}

impl FrameHeader {
    /// Parses the fixed 12-byte header, validating the SOF literal and the
    /// protocol version.
    pub fn parse(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self> {
        if bytes[0..5] != SOF {
            let mut got = [0u8; 5];
            got.copy_from_slice(&bytes[0..5]);
            return Err(ProtocolError::InvalidSof { got });
        }

        let ver = bytes[5];
        if ver != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion { got: ver });
        }

        Ok(Self {
            ver,
            frag: bytes[6],
            seq: u16::from_le_bytes([bytes[7], bytes[8]]),
            cmd: bytes[9],
            length: u16::from_le_bytes([bytes[10], bytes[11]]),
        })
    }
}

/// A decoded frame: command, sequence number and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code.
    pub cmd: u8,
    /// Sequence number assigned by the sender.
    pub seq: u16,
    /// Command-specific payload bytes.
    pub payload: Vec<u8>,
}

/// Encoder and decoder for smOTA frames.
///
/// The codec is stateless; sequence numbers belong to the session that owns
/// the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self
    }

    /// Encode a frame into bytes, CRC-16 trailer included.
    ///
    /// Fails with [`ProtocolError::PayloadTooLarge`] when the payload does
    /// not fit the 16-bit length field.
    pub fn encode(&self, command: u8, payload: &[u8], seq: u16) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut output = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_CRC_SIZE);
        output.extend_from_slice(&SOF);
        output.push(PROTOCOL_VERSION);
        output.push(0x00); // frag
        output.extend_from_slice(&seq.to_le_bytes());
        output.push(command);
        output.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        output.extend_from_slice(payload);

        let crc = crc16(&output);
        output.extend_from_slice(&crc.to_le_bytes());

        Ok(output)
    }

    /// Decode a single frame from a byte source.
    ///
    /// Reads exactly the header, validates the SOF, then reads exactly
    /// `length` payload bytes plus the CRC trailer. An invalid SOF fails
    /// before any payload byte is consumed. The source controls blocking
    /// semantics; this call never waits beyond what `read` does.
    pub fn decode<R: Read>(&self, source: &mut R) -> Result<Frame> {
        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        let got = read_full(source, &mut header_bytes)?;
        if got < FRAME_HEADER_SIZE {
            return Err(ProtocolError::TruncatedFrame {
                needed: FRAME_HEADER_SIZE,
                got,
            });
        }

        let header = FrameHeader::parse(&header_bytes)?;

        let needed = header.length as usize + FRAME_CRC_SIZE;
        let mut rest = vec![0u8; needed];
        let got = read_full(source, &mut rest)?;
        if got < needed {
            return Err(ProtocolError::TruncatedPayload { needed, got });
        }

        let (payload, trailer) = rest.split_at(header.length as usize);
        let frame_crc = u16::from_le_bytes([trailer[0], trailer[1]]);
        let mut covered = header_bytes.to_vec();
        covered.extend_from_slice(payload);
        let calc_crc = crc16(&covered);
        if calc_crc != frame_crc {
            return Err(ProtocolError::ChecksumMismatch {
                expected: calc_crc,
                got: frame_crc,
            });
        }

        Ok(Frame {
            cmd: header.cmd,
            seq: header.seq,
            payload: payload.to_vec(),
        })
    }
}

/// Reads until `buf` is full or the source reports end-of-stream.
///
/// Returns the number of bytes actually read.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
