//! Incremental EWKB encoder.
//!
//! The encoder writes a [Geometry] into any [BufMut] and suspends whenever the next field does not
//! fit in the remaining capacity of the sink. Every field is written whole or not at all, so after
//! a suspension the caller flushes the sink and calls [Encoder::try_write] again.
//!
//! Output is always little-endian. Only the outermost node carries the spatial reference. The
//! element headers of MultiPoint (header and coordinates), MultiLineString and MultiPolygon
//! (header and first count) are written as single units.

use crate::{
    codec::State,
    header::{put_coord, put_header, COORD_SIZE, COUNT_SIZE, HAS_SRID, HEADER_SIZE, SRID_SIZE},
    Coord, EncodeSize, Error, Geometry, GeometryType, Shape, Step,
};
use bytes::BufMut;
use std::any::Any;
use tracing::{debug, trace};

/// Progress through a count-prefixed array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Slot {
    /// The count has not been written.
    #[default]
    Pending,
    /// The count was written. Holds the index of the next element.
    At(usize),
}

/// An open geometry collection.
#[derive(Debug)]
struct Frame<'a> {
    children: &'a [Geometry],
    next: usize,
}

/// Converts an array length to its count prefix, failing if it does not fit in a `u32`.
fn wire_count(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::LengthExceeded(len, u32::MAX as usize))
}

/// Writes a count prefix unless it was already written, returning the index of the next element.
fn put_count(buf: &mut impl BufMut, slot: &mut Slot, len: usize) -> Result<Option<usize>, Error> {
    match *slot {
        Slot::At(next) => Ok(Some(next)),
        Slot::Pending => {
            let count = wire_count(len)?;
            if buf.remaining_mut() < COUNT_SIZE {
                return Ok(None);
            }
            buf.put_u32_le(count);
            *slot = Slot::At(0);
            Ok(Some(0))
        }
    }
}

/// Writes a count-prefixed point array. Returns true once every point is written.
fn put_points(buf: &mut impl BufMut, slot: &mut Slot, points: &[Coord]) -> Result<bool, Error> {
    let Some(mut next) = put_count(buf, slot, points.len())? else {
        return Ok(false);
    };
    while next < points.len() {
        if buf.remaining_mut() < COORD_SIZE {
            break;
        }
        put_coord(buf, &points[next]);
        next += 1;
    }
    *slot = Slot::At(next);
    Ok(next == points.len())
}

/// Writes a count-prefixed ring array. `points` tracks the ring in progress and is left
/// [Slot::Pending] after each completed ring.
fn put_rings(
    buf: &mut impl BufMut,
    rings: &mut Slot,
    points: &mut Slot,
    ring: &[Vec<Coord>],
) -> Result<bool, Error> {
    let Some(mut next) = put_count(buf, rings, ring.len())? else {
        return Ok(false);
    };
    while next < ring.len() {
        if !put_points(buf, points, &ring[next])? {
            return Ok(false);
        }
        *points = Slot::Pending;
        next += 1;
        *rings = Slot::At(next);
    }
    Ok(true)
}

/// Incremental encoder writing one borrowed [Geometry] per session.
///
/// # Example
///
/// ```
/// use commonware_ewkb::{Encoder, Geometry, Step};
///
/// let point = Geometry::point(1.0, 2500.0).with_srid(3942);
/// let mut encoder = Encoder::new();
/// encoder.prepare(&point);
///
/// // Drain through a small fixed-size sink
/// let mut out = Vec::new();
/// loop {
///     let mut chunk = [0u8; 24];
///     let mut sink = &mut chunk[..];
///     let step = encoder.try_write(&mut sink).unwrap();
///     let written = 24 - sink.len();
///     out.extend_from_slice(&chunk[..written]);
///     if step.is_done() {
///         break;
///     }
/// }
/// assert_eq!(out.len(), Encoder::declared_length(&point));
/// assert_eq!(&out[..9], &[0x01, 0x01, 0x00, 0x00, 0x20, 0x66, 0x0F, 0x00, 0x00]);
/// ```
#[derive(Debug, Default)]
pub struct Encoder<'a> {
    state: State,

    /// Node currently being written.
    node: Option<&'a Geometry>,
    header_written: bool,
    srid_pending: bool,

    /// Elements of a multi-geometry.
    elements: Slot,
    /// Rings of the polygon (or MultiPolygon element) in progress.
    rings: Slot,
    /// Points of the line or ring in progress.
    points: Slot,

    /// One frame per open geometry collection, innermost last.
    frames: Vec<Frame<'a>>,
}

impl<'a> Encoder<'a> {
    /// Creates an idle encoder. Call [Encoder::prepare] to start a session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the exact number of bytes a session writes for `geometry`.
    pub fn declared_length(geometry: &Geometry) -> usize {
        geometry.encode_size()
    }

    /// Like [Encoder::declared_length], for an untyped value.
    pub fn declared_length_any(value: &dyn Any) -> Result<usize, Error> {
        value
            .downcast_ref::<Geometry>()
            .map(Self::declared_length)
            .ok_or(Error::TypeMismatch)
    }

    /// Resets all session state to write `geometry`.
    pub fn prepare(&mut self, geometry: &'a Geometry) {
        self.state = State::Active;
        self.node = Some(geometry);
        self.frames.clear();
        self.reset_node();
    }

    /// Resets all session state to write an untyped value.
    ///
    /// Fails with [Error::TypeMismatch] if `value` is not a [Geometry], leaving the encoder
    /// unusable until the next successful `prepare`.
    pub fn prepare_any(&mut self, value: &'a dyn Any) -> Result<(), Error> {
        match value.downcast_ref::<Geometry>() {
            Some(geometry) => {
                self.prepare(geometry);
                Ok(())
            }
            None => {
                self.state = State::Failed;
                self.node = None;
                self.frames.clear();
                Err(Error::TypeMismatch)
            }
        }
    }

    /// Returns true if the current session wrote its geometry.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Writes as many whole fields into `buf` as fit.
    ///
    /// Returns [Step::Suspended] when `buf` has no room for the next field and [Step::Done] once
    /// the whole geometry has been written.
    ///
    /// Fails with [Error::LengthExceeded] if an array holds more than `u32::MAX` elements, after
    /// which the session is unusable until the next `prepare`.
    pub fn try_write(&mut self, buf: &mut impl BufMut) -> Result<Step<()>, Error> {
        self.state.ensure_active()?;
        match self.advance(buf) {
            Ok(true) => {
                self.state = State::Done;
                return Ok(Step::Done(()));
            }
            Ok(false) => {}
            Err(err) => {
                debug!(?err, depth = self.frames.len(), "encoder failed");
                self.state = State::Failed;
                return Err(err);
            }
        }
        trace!(
            remaining = buf.remaining_mut(),
            depth = self.frames.len(),
            "encoder suspended"
        );
        Ok(Step::Suspended)
    }

    fn advance(&mut self, buf: &mut impl BufMut) -> Result<bool, Error> {
        while let Some(node) = self.node {
            if !self.header_written {
                if buf.remaining_mut() < HEADER_SIZE {
                    return Ok(false);
                }
                let tagged = self.frames.is_empty() && node.srid() != 0;
                let modifiers = if tagged { HAS_SRID } else { 0 };
                put_header(buf, node.geometry_type(), modifiers);
                self.header_written = true;
                self.srid_pending = tagged;
            }
            if self.srid_pending {
                if buf.remaining_mut() < SRID_SIZE {
                    return Ok(false);
                }
                buf.put_u32_le(node.srid());
                self.srid_pending = false;
            }

            match node.shape() {
                Shape::Point(coord) => {
                    if buf.remaining_mut() < COORD_SIZE {
                        return Ok(false);
                    }
                    put_coord(buf, coord);
                }
                Shape::LineString(line) => {
                    if !put_points(buf, &mut self.points, line.points())? {
                        return Ok(false);
                    }
                }
                Shape::Polygon(polygon) => {
                    if !put_rings(buf, &mut self.rings, &mut self.points, polygon.rings())? {
                        return Ok(false);
                    }
                }
                Shape::MultiPoint(points) => {
                    let Some(mut next) = put_count(buf, &mut self.elements, points.len())? else {
                        return Ok(false);
                    };
                    while next < points.len() {
                        if buf.remaining_mut() < HEADER_SIZE + COORD_SIZE {
                            self.elements = Slot::At(next);
                            return Ok(false);
                        }
                        put_header(buf, GeometryType::Point, 0);
                        put_coord(buf, &points[next]);
                        next += 1;
                    }
                }
                Shape::MultiLineString(lines) => {
                    let Some(mut next) = put_count(buf, &mut self.elements, lines.len())? else {
                        return Ok(false);
                    };
                    while next < lines.len() {
                        let line = &lines[next];
                        if self.points == Slot::Pending {
                            let count = wire_count(line.len())?;
                            if buf.remaining_mut() < HEADER_SIZE + COUNT_SIZE {
                                return Ok(false);
                            }
                            put_header(buf, GeometryType::LineString, 0);
                            buf.put_u32_le(count);
                            self.points = Slot::At(0);
                        }
                        if !put_points(buf, &mut self.points, line.points())? {
                            return Ok(false);
                        }
                        self.points = Slot::Pending;
                        next += 1;
                        self.elements = Slot::At(next);
                    }
                }
                Shape::MultiPolygon(polygons) => {
                    let Some(mut next) = put_count(buf, &mut self.elements, polygons.len())? else {
                        return Ok(false);
                    };
                    while next < polygons.len() {
                        let polygon = &polygons[next];
                        if self.rings == Slot::Pending {
                            let count = wire_count(polygon.ring_count())?;
                            if buf.remaining_mut() < HEADER_SIZE + COUNT_SIZE {
                                return Ok(false);
                            }
                            put_header(buf, GeometryType::Polygon, 0);
                            buf.put_u32_le(count);
                            self.rings = Slot::At(0);
                        }
                        if !put_rings(buf, &mut self.rings, &mut self.points, polygon.rings())? {
                            return Ok(false);
                        }
                        self.rings = Slot::Pending;
                        next += 1;
                        self.elements = Slot::At(next);
                    }
                }
                Shape::GeometryCollection(children) => {
                    let count = wire_count(children.len())?;
                    if buf.remaining_mut() < COUNT_SIZE {
                        return Ok(false);
                    }
                    buf.put_u32_le(count);
                    if !children.is_empty() {
                        self.frames.push(Frame { children, next: 0 });
                        trace!(
                            count = children.len(),
                            depth = self.frames.len(),
                            "entered collection"
                        );
                    }
                }
            }
            self.next_node();
        }
        Ok(true)
    }

    /// Moves to the next unwritten node, closing every exhausted collection.
    fn next_node(&mut self) {
        self.reset_node();
        self.node = None;
        while let Some(frame) = self.frames.last_mut() {
            let children: &'a [Geometry] = frame.children;
            if frame.next < children.len() {
                self.node = Some(&children[frame.next]);
                frame.next += 1;
                return;
            }
            self.frames.pop();
            trace!(depth = self.frames.len(), "left collection");
        }
    }

    fn reset_node(&mut self) {
        self.header_written = false;
        self.srid_pending = false;
        self.elements = Slot::Pending;
        self.rings = Slot::Pending;
        self.points = Slot::Pending;
    }
}
