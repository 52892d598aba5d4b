//! Limits applied while decoding untrusted input.

/// Bounds enforced by the [crate::Decoder].
///
/// Every count prefix on the wire causes an allocation of exactly that many elements, and every
/// nested collection adds a frame to the decoder's stack. Both are attacker controlled, so both
/// are capped.
///
/// # Examples
///
/// ```
/// use commonware_ewkb::{Config, Decoder};
///
/// // Accept at most 1024 elements per array and 8 levels of nested collections
/// let cfg = Config {
///     max_items: 1024,
///     max_depth: 8,
/// };
/// let decoder = Decoder::with_config(cfg);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// The maximum value accepted for any count prefix (points, rings, polygons, or
    /// sub-geometries).
    pub max_items: usize,

    /// The maximum number of geometry collections that may be open at once.
    pub max_depth: usize,
}

impl Config {
    /// A configuration that accepts any count and any nesting depth.
    ///
    /// Only use this for input from a trusted source.
    pub const fn unbounded() -> Self {
        Self {
            max_items: usize::MAX,
            max_depth: usize::MAX,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items: 1 << 24,
            max_depth: 256,
        }
    }
}
