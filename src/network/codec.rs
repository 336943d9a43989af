//! Binary codec for commands and wire packets.
//!
//! Command entries are serialized with bincode using one fixed configuration so
//! every peer produces byte-identical payloads. Packets themselves use a
//! hand-laid header so the two tic fields are exactly one byte each:
//!
//! ```text
//! byte 0      byte 1     bytes 2..
//! ┌──────────┬──────────┬────────────────────────────────────┐
//! │ start lo │ num_tics │ num_tics * ticdup command entries │
//! └──────────┴──────────┴────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use lockstep_tics::network::codec::{decode_packet, encode_packet};
//! use lockstep_tics::TicPacket;
//!
//! let packet = TicPacket { start_tic_low: 250, num_tics: 2, bytes: vec![1, 2] };
//! let wire = encode_packet(&packet);
//! assert_eq!(wire, vec![250, 2, 1, 2]);
//! assert_eq!(decode_packet(&wire).expect("valid header"), packet);
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::network::messages::TicPacket;

/// Size of the packet header: start tic low byte plus tic count.
pub const PACKET_HEADER_LEN: usize = 2;

// Fixed-size integers keep command entries the same size on every peer.
fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// What the codec was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding a command entry.
    EncodeCommand,
    /// Decoding the command entries of a packet.
    DecodeCommands,
    /// Parsing a packet header.
    DecodePacket,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeCommand => write!(f, "encoding command"),
            Self::DecodeCommands => write!(f, "decoding packet commands"),
            Self::DecodePacket => write!(f, "decoding packet"),
        }
    }
}

/// Errors that can occur during encoding or decoding.
///
/// Bincode errors are opaque, so their message is kept as a `String`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    EncodeError {
        /// The underlying error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The decoding operation failed.
    DecodeError {
        /// The underlying error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The provided buffer was too small.
    BufferTooSmall {
        /// The required buffer size (0 if unknown).
        required: usize,
        /// The actual buffer size provided.
        provided: usize,
    },
}

impl CodecError {
    /// Creates a new encode error with the given message and operation.
    pub fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    /// Creates a new decode error with the given message and operation.
    pub fn decode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::DecodeError {
            message: message.into(),
            operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
            Self::DecodeError { message, operation } => {
                write!(f, "decoding failed while {operation}: {message}")
            },
            Self::BufferTooSmall { required, provided } => {
                if *required > 0 {
                    write!(
                        f,
                        "buffer too small: needed {required} bytes, but only {provided} provided"
                    )
                } else {
                    write!(f, "buffer too small: only {provided} bytes provided")
                }
            },
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Appends one command entry to `buffer`.
///
/// Returns the number of bytes appended. On error `buffer` may hold a partial entry.
///
/// # Examples
///
/// ```
/// use lockstep_tics::network::codec::encode_command;
///
/// let mut buffer = Vec::new();
/// encode_command(&42u32, &mut buffer).expect("encoding should succeed");
/// encode_command(&7u32, &mut buffer).expect("encoding should succeed");
/// assert_eq!(buffer.len(), 8);
/// ```
///
/// # Errors
///
/// Returns [`CodecError::EncodeError`] if the command's `Serialize` impl fails.
pub fn encode_command<C: Serialize>(command: &C, buffer: &mut Vec<u8>) -> CodecResult<usize> {
    let start_len = buffer.len();
    bincode::serde::encode_into_std_write(command, buffer, config())
        .map(|_| buffer.len() - start_len)
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::EncodeCommand))
}

/// Decodes one command entry from the front of `bytes`.
///
/// Returns the command and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`CodecError::DecodeError`] if `bytes` does not start with a valid entry.
pub fn decode_command<C: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(C, usize)> {
    bincode::serde::decode_from_slice(bytes, config())
        .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::DecodeCommands))
}

/// Lays a packet out on the wire: two header bytes followed by the payload.
#[must_use]
pub fn encode_packet(packet: &TicPacket) -> Vec<u8> {
    let mut wire = Vec::with_capacity(PACKET_HEADER_LEN + packet.bytes.len());
    wire.push(packet.start_tic_low);
    wire.push(packet.num_tics);
    wire.extend_from_slice(&packet.bytes);
    wire
}

/// Writes a packet into an existing buffer without allocating.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if the packet does not fit.
pub fn encode_packet_into(packet: &TicPacket, buffer: &mut [u8]) -> CodecResult<usize> {
    let len = PACKET_HEADER_LEN + packet.bytes.len();
    let Some(target) = buffer.get_mut(..len) else {
        return Err(CodecError::BufferTooSmall {
            required: len,
            provided: buffer.len(),
        });
    };
    target[0] = packet.start_tic_low;
    target[1] = packet.num_tics;
    target[PACKET_HEADER_LEN..].copy_from_slice(&packet.bytes);
    Ok(len)
}

/// Parses a packet from its wire form.
///
/// Only the header is validated; payload entries are decoded on demand with
/// [`TicPacket::commands`].
///
/// # Errors
///
/// Returns [`CodecError::DecodeError`] if fewer than two bytes are given.
pub fn decode_packet(wire: &[u8]) -> CodecResult<TicPacket> {
    match wire {
        [start_tic_low, num_tics, payload @ ..] => Ok(TicPacket {
            start_tic_low: *start_tic_low,
            num_tics: *num_tics,
            bytes: payload.to_vec(),
        }),
        _ => Err(CodecError::decode(
            format!(
                "packet of {} bytes is shorter than the {} byte header",
                wire.len(),
                PACKET_HEADER_LEN
            ),
            CodecOperation::DecodePacket,
        )),
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_int_command_size() {
        let mut buffer = Vec::new();
        assert_eq!(encode_command(&0u32, &mut buffer).unwrap(), 4);
        assert_eq!(encode_command(&u32::MAX, &mut buffer).unwrap(), 4);
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_decode_reports_bytes_read() {
        let mut bytes = Vec::new();
        encode_command(&5u16, &mut bytes).unwrap();
        bytes.extend_from_slice(&[9, 9]);
        let (value, read): (u16, _) = decode_command(&bytes).unwrap();
        assert_eq!(value, 5);
        assert_eq!(read, 2);
    }

    #[test]
    fn test_decode_invalid_data() {
        let result: CodecResult<(u64, _)> = decode_command(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            result,
            Err(CodecError::DecodeError {
                operation: CodecOperation::DecodeCommands,
                ..
            })
        ));
    }

    #[test]
    fn test_unserializable_command_is_an_encode_error() {
        struct Unencodable;

        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not on the wire"))
            }
        }

        let mut buffer = Vec::new();
        let err = encode_command(&Unencodable, &mut buffer).unwrap_err();
        assert!(matches!(
            err,
            CodecError::EncodeError {
                operation: CodecOperation::EncodeCommand,
                ..
            }
        ));
        assert!(err.to_string().starts_with("encoding failed while encoding command"));
    }

    #[test]
    fn test_packet_header_layout() {
        let packet = TicPacket {
            start_tic_low: 0x7f,
            num_tics: 3,
            bytes: vec![0xaa, 0xbb],
        };
        assert_eq!(encode_packet(&packet), vec![0x7f, 3, 0xaa, 0xbb]);
    }

    #[test]
    fn test_packet_into_buffer() {
        let packet = TicPacket {
            start_tic_low: 1,
            num_tics: 1,
            bytes: vec![5, 6, 7],
        };
        let mut buffer = [0u8; 8];
        let len = encode_packet_into(&packet, &mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[1, 1, 5, 6, 7]);
        assert_eq!(decode_packet(&buffer[..len]).unwrap(), packet);
    }

    #[test]
    fn test_packet_into_small_buffer() {
        let packet = TicPacket {
            start_tic_low: 1,
            num_tics: 1,
            bytes: vec![5, 6, 7],
        };
        let mut buffer = [0u8; 4];
        assert_eq!(
            encode_packet_into(&packet, &mut buffer),
            Err(CodecError::BufferTooSmall {
                required: 5,
                provided: 4
            })
        );
    }

    #[test]
    fn test_short_packet_rejected() {
        assert!(decode_packet(&[]).is_err());
        assert!(decode_packet(&[1]).is_err());
        let empty = decode_packet(&[1, 0]).unwrap();
        assert_eq!(empty, TicPacket::header_only(1, 0));
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::decode("eof", CodecOperation::DecodePacket);
        assert_eq!(err.to_string(), "decoding failed while decoding packet: eof");

        let err = CodecError::BufferTooSmall {
            required: 0,
            provided: 10,
        };
        assert_eq!(err.to_string(), "buffer too small: only 10 bytes provided");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        #[derive(Serialize)]
        struct Cmd {
            forward: i8,
            angle: i16,
            buttons: u8,
        }
        let cmd = Cmd {
            forward: -3,
            angle: 1024,
            buttons: 0b101,
        };
        let mut first = Vec::new();
        let mut second = Vec::new();
        encode_command(&cmd, &mut first).unwrap();
        encode_command(&cmd, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
