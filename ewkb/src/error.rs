//! Error types for EWKB codec operations

use thiserror::Error;

/// Error type for EWKB codec operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("unknown geometry type: {0:#010x}")]
    UnknownGeometryType(u32), // raw type id
    #[error("invalid byte order marker: {0}")]
    InvalidByteOrder(u8),
    #[error("value is not a geometry")]
    TypeMismatch,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("length exceeded: {0} > {1}")]
    LengthExceeded(usize, usize), // found, max
    #[error("depth exceeded: {0}")]
    DepthExceeded(usize), // max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UnknownGeometryType(0x2000_0000).to_string(),
            "unknown geometry type: 0x20000000"
        );
        assert_eq!(
            Error::LengthExceeded(10, 4).to_string(),
            "length exceeded: 10 > 4"
        );
        assert_eq!(
            Error::InvalidState("session not prepared").to_string(),
            "invalid state: session not prepared"
        );
    }
}
