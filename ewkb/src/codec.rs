//! Core codec traits and the shared session state of the incremental codec.

use crate::{Config, Decoder, Encoder, Error, Geometry};
use bytes::{Buf, BytesMut};

/// Outcome of a single [Decoder::try_read] or [Encoder::try_write] call.
#[derive(Clone, Debug, PartialEq)]
pub enum Step<T> {
    /// The codec needs more input bytes (decode) or more output space (encode).
    ///
    /// All progress made so far is retained. No partial field was consumed or written.
    Suspended,
    /// The session finished.
    Done(T),
}

impl<T> Step<T> {
    /// Returns true if the session finished.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Returns the finished value, if any.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Suspended => None,
        }
    }
}

/// Lifecycle of a codec session.
///
/// `Idle` is left by `prepare`. `Done` and `Failed` are terminal until the next `prepare`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum State {
    #[default]
    Idle,
    Active,
    Done,
    Failed,
}

impl State {
    /// Returns an error unless a session is in progress.
    pub(crate) fn ensure_active(self) -> Result<(), Error> {
        match self {
            Self::Active => Ok(()),
            Self::Idle => Err(Error::InvalidState("session not prepared")),
            Self::Done => Err(Error::InvalidState("session already finished")),
            Self::Failed => Err(Error::InvalidState("session failed")),
        }
    }
}

/// Trait for types whose encoded length can be computed without encoding them.
pub trait EncodeSize {
    /// Returns the encoded length of this value.
    ///
    /// This method MUST return the exact number of bytes that will be written when encoding.
    fn encode_size(&self) -> usize;
}

/// Trait for types that can be encoded to a buffer in one call.
pub trait Encode: EncodeSize {
    /// Encodes a value to a `BytesMut` buffer.
    ///
    /// Panics if an array holds more than `u32::MAX` elements or if the number of bytes written
    /// does not match [EncodeSize::encode_size].
    fn encode(&self) -> BytesMut;
}

impl Encode for Geometry {
    fn encode(&self) -> BytesMut {
        let len = self.encode_size();
        let mut buffer = BytesMut::with_capacity(len);
        let mut encoder = Encoder::new();
        encoder.prepare(self);

        // `BytesMut` grows on demand, so the encoder never runs out of space.
        match encoder.try_write(&mut buffer) {
            Ok(Step::Done(())) => {}
            Ok(Step::Suspended) => panic!("encoder suspended on a growable buffer"),
            Err(err) => panic!("encoder failed: {err}"),
        }
        assert_eq!(buffer.len(), len, "encode_size() did not match bytes written");
        buffer
    }
}

/// Trait for types that can be decoded from a complete buffer, ensuring the entire buffer is
/// consumed.
pub trait Decode: Sized {
    /// Decodes a value using the provided limits.
    fn decode_cfg(buf: impl Buf, cfg: &Config) -> Result<Self, Error>;

    /// Decodes a value using the default [Config].
    fn decode(buf: impl Buf) -> Result<Self, Error> {
        Self::decode_cfg(buf, &Config::default())
    }
}

impl Decode for Geometry {
    fn decode_cfg(mut buf: impl Buf, cfg: &Config) -> Result<Self, Error> {
        let mut decoder = Decoder::with_config(*cfg);
        decoder.prepare(None);
        match decoder.try_read(&mut buf)? {
            Step::Done(geometry) => {
                let remaining = buf.remaining();
                if remaining > 0 {
                    return Err(Error::ExtraData(remaining));
                }
                Ok(geometry)
            }
            Step::Suspended => Err(Error::EndOfBuffer),
        }
    }
}
