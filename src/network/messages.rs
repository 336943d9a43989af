use serde::de::DeserializeOwned;
use smallvec::SmallVec;

use crate::network::codec::{self, CodecError, CodecOperation, CodecResult};

/// One outbound window of locally produced commands.
///
/// Only the low byte of the first tic is sent; the receiver rebuilds the rest
/// with [`expand_tic`](crate::expand_tic). The payload holds
/// `num_tics * ticdup` command entries encoded with [`codec::encode_command`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TicPacket {
    /// `start_tic & 0xff`.
    pub start_tic_low: u8,
    /// Number of tics in the window.
    pub num_tics: u8,
    /// Serialized command entries.
    pub bytes: Vec<u8>,
}

impl TicPacket {
    /// A packet with no payload. Ingest only looks at the header.
    #[must_use]
    pub fn header_only(start_tic_low: u8, num_tics: u8) -> Self {
        Self {
            start_tic_low,
            num_tics,
            bytes: Vec::new(),
        }
    }

    /// Decodes the payload into `num_tics * ticdup` commands.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if an entry fails to decode or bytes are left over.
    pub fn commands<C: DeserializeOwned>(&self, ticdup: i32) -> CodecResult<SmallVec<[C; 8]>> {
        let expected = usize::from(self.num_tics) * ticdup.max(1) as usize;
        let mut commands = SmallVec::with_capacity(expected);
        let mut offset = 0;
        for _ in 0..expected {
            let remaining = self.bytes.get(offset..).unwrap_or(&[]);
            let (command, read) = codec::decode_command::<C>(remaining)?;
            commands.push(command);
            offset += read;
        }
        if offset != self.bytes.len() {
            return Err(CodecError::decode(
                format!(
                    "{} trailing bytes after {} command entries",
                    self.bytes.len() - offset,
                    expected
                ),
                CodecOperation::DecodeCommands,
            ));
        }
        Ok(commands)
    }
}

impl std::fmt::Debug for TicPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            start_tic_low,
            num_tics,
            bytes,
        } = self;

        f.debug_struct("TicPacket")
            .field("start_tic_low", start_tic_low)
            .field("num_tics", num_tics)
            .field("bytes", &BytesDebug(bytes))
            .finish()
    }
}

struct BytesDebug<'a>(&'a [u8]);

impl std::fmt::Debug for BytesDebug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0x")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
