//! Encode and decode PostGIS geometries in EWKB.
//!
//! # Overview
//!
//! EWKB ("extended well-known binary") is the binary representation PostGIS uses for `geometry`
//! values on the wire. This crate converts between EWKB and an in-memory [Geometry] tree
//! incrementally: the [Decoder] accepts input in arbitrarily small pieces and the [Encoder] writes
//! into arbitrarily small output buffers, suspending between fields and resuming exactly where it
//! stopped. This makes both suitable for driving directly from a network protocol's read and write
//! buffers without first materializing the whole value.
//!
//! # Supported Geometries
//!
//! All seven OGC kinds, with 2D coordinates:
//! - `Point`, `LineString`, `Polygon`
//! - `MultiPoint`, `MultiLineString`, `MultiPolygon`
//! - `GeometryCollection`, nested to any depth allowed by [Config::max_depth]
//!
//! Only the outermost node of an encoded value carries a spatial reference identifier (SRID).
//! Z and M modifiers are recognized in headers but their ordinates are not supported.
//!
//! # Safety
//!
//! Decoding untrusted input is bounded by [Config]: counts read from the wire are checked against
//! [Config::max_items] before any allocation, and collection nesting is checked against
//! [Config::max_depth]. Decoding, encoding, comparing, hashing, and dropping never recurse on
//! nesting. The derived `Clone` and `Debug` of [Geometry] do, so avoid them on values decoded with
//! [Config::unbounded].
//!
//! # Example
//!
//! ```
//! use commonware_ewkb::{Decode, Encode, EncodeSize, Geometry, LineString};
//!
//! let geometry = Geometry::collection([
//!     Geometry::point(1.0, 2500.0),
//!     Geometry::multi_line_string([LineString::new([(1.0, 1.0), (1.0, 2500.0)])]),
//! ])
//! .with_srid(3942);
//!
//! let encoded = geometry.encode();
//! assert_eq!(encoded.len(), geometry.encode_size());
//!
//! let decoded = Geometry::decode(encoded).unwrap();
//! assert_eq!(decoded, geometry);
//! assert_eq!(decoded.srid(), 3942);
//! ```

pub mod codec;
pub use codec::{Decode, Encode, EncodeSize, Step};
pub mod config;
pub use config::Config;
pub mod decoder;
pub use decoder::Decoder;
pub mod encoder;
pub use encoder::Encoder;
pub mod error;
pub use error::Error;
pub mod geometry;
pub use geometry::{Coord, Geometry, LineString, Polygon, Shape};
pub mod header;
pub use header::{ByteOrder, GeometryType, Header};
