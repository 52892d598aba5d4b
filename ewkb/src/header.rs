//! Per-node EWKB header: byte order marker, geometry type code, and modifier bits.
//!
//! Every node on the wire starts with `[order: u8][type id: u32]`. The low 3 bits of the type id
//! identify the geometry kind and the high bits carry PostGIS modifiers. Only the outermost node
//! may set [HAS_SRID], in which case a `u32` spatial reference follows the header.
//!
//! [HAS_M] and [HAS_Z] are recognized but coordinates are always read and written as 2D pairs.
//! Input that actually carries Z or M ordinates will be misinterpreted.

use crate::{Coord, Error};
use bytes::{Buf, BufMut};
use std::fmt;

/// Set in the type id when a spatial reference follows the header.
pub const HAS_SRID: u32 = 0x2000_0000;

/// Set in the type id when coordinates carry an M ordinate (unsupported).
pub const HAS_M: u32 = 0x4000_0000;

/// Set in the type id when coordinates carry a Z ordinate (unsupported).
pub const HAS_Z: u32 = 0x8000_0000;

/// Bits of the type id that select the [GeometryType].
const TYPE_MASK: u32 = 0x7;

/// Size of the byte order marker plus the type id.
pub const HEADER_SIZE: usize = 5;

/// Size of the spatial reference that follows an outermost header.
pub const SRID_SIZE: usize = 4;

/// Size of a count prefix (points, rings, polygons, or sub-geometries).
pub const COUNT_SIZE: usize = 4;

/// Size of a 2D coordinate pair.
pub const COORD_SIZE: usize = 16;

/// The kind of a geometry, as stored in the low bits of the wire type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    /// Extracts the geometry kind from a raw type id, ignoring modifier bits.
    pub fn from_type_id(type_id: u32) -> Result<Self, Error> {
        match type_id & TYPE_MASK {
            1 => Ok(Self::Point),
            2 => Ok(Self::LineString),
            3 => Ok(Self::Polygon),
            4 => Ok(Self::MultiPoint),
            5 => Ok(Self::MultiLineString),
            6 => Ok(Self::MultiPolygon),
            7 => Ok(Self::GeometryCollection),
            _ => Err(Error::UnknownGeometryType(type_id)),
        }
    }

    /// Returns the wire code of this kind (without modifiers).
    pub const fn type_id(self) -> u32 {
        self as u32
    }

    /// Returns the OGC name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of the multi-byte fields of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// XDR
    Big,
    /// NDR (the only order this crate writes)
    #[default]
    Little,
}

impl ByteOrder {
    /// Parses a byte order marker (`0` = big-endian, `1` = little-endian).
    pub fn from_marker(marker: u8) -> Result<Self, Error> {
        match marker {
            0 => Ok(Self::Big),
            1 => Ok(Self::Little),
            _ => Err(Error::InvalidByteOrder(marker)),
        }
    }

    /// Returns the marker byte for this order.
    pub const fn marker(self) -> u8 {
        match self {
            Self::Big => 0,
            Self::Little => 1,
        }
    }

    #[inline]
    pub(crate) fn get_u32(self, buf: &mut impl Buf) -> u32 {
        match self {
            Self::Big => buf.get_u32(),
            Self::Little => buf.get_u32_le(),
        }
    }

    #[inline]
    pub(crate) fn get_f64(self, buf: &mut impl Buf) -> f64 {
        match self {
            Self::Big => buf.get_f64(),
            Self::Little => buf.get_f64_le(),
        }
    }

    /// Reads a coordinate pair. The caller must ensure [COORD_SIZE] bytes are available.
    #[inline]
    pub(crate) fn get_coord(self, buf: &mut impl Buf) -> Coord {
        let x = self.get_f64(buf);
        let y = self.get_f64(buf);
        Coord { x, y }
    }
}

/// A parsed node header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Byte order of every multi-byte field of the node.
    pub order: ByteOrder,

    /// Kind of the node.
    pub geometry_type: GeometryType,

    /// The raw type id, including modifier bits.
    pub type_id: u32,
}

impl Header {
    /// Reads a header. The caller must ensure [HEADER_SIZE] bytes are available.
    pub(crate) fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let order = ByteOrder::from_marker(buf.get_u8())?;
        let type_id = order.get_u32(buf);
        let geometry_type = GeometryType::from_type_id(type_id)?;
        Ok(Self {
            order,
            geometry_type,
            type_id,
        })
    }

    /// Returns true if a spatial reference follows this header.
    pub fn has_srid(&self) -> bool {
        self.type_id & HAS_SRID != 0
    }

    /// Returns true if the node claims an M ordinate.
    pub fn has_m(&self) -> bool {
        self.type_id & HAS_M != 0
    }

    /// Returns true if the node claims a Z ordinate.
    pub fn has_z(&self) -> bool {
        self.type_id & HAS_Z != 0
    }
}

/// Reads the header that precedes each element of a multi-geometry and returns the byte order of
/// that element. The type id is skipped: only the container's kind determines the element kind.
///
/// The caller must ensure [HEADER_SIZE] bytes are available.
pub(crate) fn read_sub_header(buf: &mut impl Buf) -> Result<ByteOrder, Error> {
    let order = ByteOrder::from_marker(buf.get_u8())?;
    buf.advance(HEADER_SIZE - 1);
    Ok(order)
}

/// Writes a little-endian header. The caller must ensure [HEADER_SIZE] bytes of space.
#[inline]
pub(crate) fn put_header(buf: &mut impl BufMut, geometry_type: GeometryType, modifiers: u32) {
    buf.put_u8(ByteOrder::Little.marker());
    buf.put_u32_le(geometry_type.type_id() | modifiers);
}

/// Writes a little-endian coordinate pair. The caller must ensure [COORD_SIZE] bytes of space.
#[inline]
pub(crate) fn put_coord(buf: &mut impl BufMut, coord: &Coord) {
    buf.put_f64_le(coord.x);
    buf.put_f64_le(coord.y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_type_codes() {
        let all = [
            GeometryType::Point,
            GeometryType::LineString,
            GeometryType::Polygon,
            GeometryType::MultiPoint,
            GeometryType::MultiLineString,
            GeometryType::MultiPolygon,
            GeometryType::GeometryCollection,
        ];
        for (code, kind) in (1u32..).zip(all) {
            assert_eq!(kind.type_id(), code);
            assert_eq!(GeometryType::from_type_id(code).unwrap(), kind);
            assert_eq!(GeometryType::from_type_id(code | HAS_SRID).unwrap(), kind);
            assert_eq!(
                GeometryType::from_type_id(code | HAS_Z | HAS_M).unwrap(),
                kind
            );
        }
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            GeometryType::from_type_id(0),
            Err(Error::UnknownGeometryType(0))
        ));
        assert!(matches!(
            GeometryType::from_type_id(HAS_SRID | 8),
            Err(Error::UnknownGeometryType(0x2000_0008))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(GeometryType::MultiPolygon.to_string(), "MultiPolygon");
        assert_eq!(
            GeometryType::GeometryCollection.to_string(),
            "GeometryCollection"
        );
    }

    #[test]
    fn test_byte_order() {
        assert_eq!(ByteOrder::from_marker(0).unwrap(), ByteOrder::Big);
        assert_eq!(ByteOrder::from_marker(1).unwrap(), ByteOrder::Little);
        assert!(matches!(
            ByteOrder::from_marker(2),
            Err(Error::InvalidByteOrder(2))
        ));

        let mut little = Bytes::from_static(&[0x66, 0x0F, 0x00, 0x00]);
        assert_eq!(ByteOrder::Little.get_u32(&mut little), 3942);
        let mut big = Bytes::from_static(&[0x00, 0x00, 0x0F, 0x66]);
        assert_eq!(ByteOrder::Big.get_u32(&mut big), 3942);
    }

    #[test]
    fn test_read_header() {
        let mut buf = Bytes::from_static(&[0x01, 0x03, 0x00, 0x00, 0x20]);
        let header = Header::read(&mut buf).unwrap();
        assert_eq!(header.order, ByteOrder::Little);
        assert_eq!(header.geometry_type, GeometryType::Polygon);
        assert!(header.has_srid());
        assert!(!header.has_m());
        assert!(!header.has_z());
        assert_eq!(buf.remaining(), 0);

        let mut buf = Bytes::from_static(&[0x00, 0xC0, 0x00, 0x00, 0x01]);
        let header = Header::read(&mut buf).unwrap();
        assert_eq!(header.order, ByteOrder::Big);
        assert_eq!(header.geometry_type, GeometryType::Point);
        assert!(!header.has_srid());
        assert!(header.has_m());
        assert!(header.has_z());
    }

    #[test]
    fn test_put_header() {
        let mut buf = Vec::new();
        put_header(&mut buf, GeometryType::Point, HAS_SRID);
        assert_eq!(buf, [0x01, 0x01, 0x00, 0x00, 0x20]);
    }

    #[test]
    fn test_sub_header() {
        // Type id is not validated, only the marker
        let mut buf = Bytes::from_static(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xAA]);
        assert_eq!(read_sub_header(&mut buf).unwrap(), ByteOrder::Big);
        assert_eq!(buf.remaining(), 1);

        let mut buf = Bytes::from_static(&[0x07, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(
            read_sub_header(&mut buf),
            Err(Error::InvalidByteOrder(7))
        ));
    }
}
