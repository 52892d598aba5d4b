//! Incremental EWKB decoder.
//!
//! The decoder consumes bytes from any [Buf] and suspends whenever the next field does not fit in
//! the bytes currently available. Fields are read all-or-nothing: a suspended call never consumes
//! part of a field, so the caller can append more bytes to the same buffer and call
//! [Decoder::try_read] again.
//!
//! # State
//!
//! Everything needed to resume lives in the decoder rather than on the call stack:
//! - whether the header of the current node has been read,
//! - whether the session's spatial reference has been resolved (only the outermost node carries
//!   one on the wire),
//! - a cursor per array of the current node, which is allocated once with the exact count read
//!   from the wire and then filled in place,
//! - a stack of frames, one per open geometry collection.
//!
//! Native stack usage is constant regardless of how deeply collections are nested.

use crate::{
    codec::State,
    header::{read_sub_header, ByteOrder, Header, COORD_SIZE, COUNT_SIZE, HEADER_SIZE, SRID_SIZE},
    Config, Coord, Error, Geometry, GeometryType, LineString, Polygon, Shape, Step,
};
use bytes::Buf;
use tracing::{debug, trace};

/// Progress through an array whose length is prefixed on the wire.
#[derive(Debug)]
enum Cursor<T> {
    /// The count prefix has not been read yet.
    Unsized,
    /// The count prefix was read. `items.len()` is the index of the next element.
    Sized { items: Vec<T>, len: usize },
}

impl<T> Default for Cursor<T> {
    fn default() -> Self {
        Self::Unsized
    }
}

impl<T> Cursor<T> {
    fn sized(len: usize) -> Self {
        Self::Sized {
            items: Vec::with_capacity(len),
            len,
        }
    }

    fn is_sized(&self) -> bool {
        matches!(self, Self::Sized { .. })
    }

    fn is_complete(&self) -> bool {
        match self {
            Self::Unsized => false,
            Self::Sized { items, len } => items.len() == *len,
        }
    }

    fn push(&mut self, item: T) {
        if let Self::Sized { items, .. } = self {
            debug_assert!(items.len() < items.capacity());
            items.push(item);
        }
    }

    /// Returns the filled array and resets the cursor to [Cursor::Unsized].
    fn take(&mut self) -> Vec<T> {
        match std::mem::take(self) {
            Self::Unsized => Vec::new(),
            Self::Sized { items, .. } => items,
        }
    }

    /// Reads elements of `width` bytes until the array is full or the buffer runs short.
    ///
    /// Returns true once every element has been read. Must only be called on a sized cursor.
    fn fill<B: Buf>(
        &mut self,
        buf: &mut B,
        width: usize,
        mut read: impl FnMut(&mut B) -> Result<T, Error>,
    ) -> Result<bool, Error> {
        let Self::Sized { items, len } = self else {
            return Ok(false);
        };
        while items.len() < *len {
            if buf.remaining() < width {
                return Ok(false);
            }
            items.push(read(buf)?);
        }
        Ok(true)
    }
}

/// Progress through the rings of one polygon.
#[derive(Debug, Default)]
struct Rings {
    rings: Cursor<Vec<Coord>>,
    points: Cursor<Coord>,
}

impl Rings {
    /// Reads rings until the polygon is complete or the buffer runs short. The ring count must
    /// already have been read.
    fn fill(&mut self, order: ByteOrder, buf: &mut impl Buf, cfg: &Config) -> Result<bool, Error> {
        while !self.rings.is_complete() {
            if !self.points.is_sized() {
                if buf.remaining() < COUNT_SIZE {
                    return Ok(false);
                }
                self.points = Cursor::sized(read_count(order, buf, cfg)?);
            }
            if !self
                .points
                .fill(buf, COORD_SIZE, |buf| Ok(order.get_coord(buf)))?
            {
                return Ok(false);
            }
            let ring = self.points.take();
            self.rings.push(ring);
        }
        Ok(true)
    }
}

/// Progress through the body of the current node.
#[derive(Debug, Default)]
enum Body {
    #[default]
    Point,
    LineString(Cursor<Coord>),
    Polygon(Rings),
    MultiPoint(Cursor<Coord>),
    MultiLineString {
        lines: Cursor<LineString>,
        points: Cursor<Coord>,
        order: ByteOrder,
    },
    MultiPolygon {
        polygons: Cursor<Polygon>,
        rings: Rings,
        order: ByteOrder,
    },
    GeometryCollection,
}

impl Body {
    fn new(geometry_type: GeometryType) -> Self {
        match geometry_type {
            GeometryType::Point => Self::Point,
            GeometryType::LineString => Self::LineString(Cursor::Unsized),
            GeometryType::Polygon => Self::Polygon(Rings::default()),
            GeometryType::MultiPoint => Self::MultiPoint(Cursor::Unsized),
            GeometryType::MultiLineString => Self::MultiLineString {
                lines: Cursor::Unsized,
                points: Cursor::Unsized,
                order: ByteOrder::default(),
            },
            GeometryType::MultiPolygon => Self::MultiPolygon {
                polygons: Cursor::Unsized,
                rings: Rings::default(),
                order: ByteOrder::default(),
            },
            GeometryType::GeometryCollection => Self::GeometryCollection,
        }
    }
}

/// Reads a count prefix, rejecting counts above [Config::max_items]. The caller must ensure
/// [COUNT_SIZE] bytes are available.
fn read_count(order: ByteOrder, buf: &mut impl Buf, cfg: &Config) -> Result<usize, Error> {
    let count = order.get_u32(buf) as usize;
    if count > cfg.max_items {
        debug!(count, max = cfg.max_items, "count exceeds limit");
        return Err(Error::LengthExceeded(count, cfg.max_items));
    }
    Ok(count)
}

/// Incremental decoder producing one [Geometry] per session.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use commonware_ewkb::{Decoder, Encode, Geometry, Step};
///
/// let encoded = Geometry::point(1.0, 2500.0).encode();
///
/// let mut decoder = Decoder::new();
/// decoder.prepare(None);
///
/// // Feed the bytes one at a time, as if each arrived in its own network read
/// let mut pending = BytesMut::new();
/// let mut decoded = None;
/// for byte in encoded.iter() {
///     pending.extend_from_slice(&[*byte]);
///     if let Step::Done(geometry) = decoder.try_read(&mut pending).unwrap() {
///         decoded = Some(geometry);
///     }
/// }
/// assert_eq!(decoded, Some(Geometry::point(1.0, 2500.0)));
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    cfg: Config,
    state: State,

    /// Tag given to `prepare`, used when the outermost header carries none.
    default_srid: u32,
    /// Spatial reference of the session, once resolved from the outermost node.
    srid: Option<u32>,

    /// Header of the current node, if it has been read.
    header: Option<Header>,
    /// Body progress of the current node.
    body: Body,

    /// One frame per open geometry collection, innermost last.
    frames: Vec<Cursor<Geometry>>,
}

impl Decoder {
    /// Creates a decoder with the default [Config].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with the given limits.
    pub fn with_config(cfg: Config) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    /// Resets all session state for a fresh top-level decode.
    ///
    /// `srid` is the spatial reference assigned to the result when the outermost header does not
    /// carry one (`None` means unknown, i.e. 0). A spatial reference present on the wire always
    /// takes precedence.
    pub fn prepare(&mut self, srid: Option<u32>) {
        self.state = State::Active;
        self.default_srid = srid.unwrap_or(0);
        self.srid = None;
        self.header = None;
        self.body = Body::default();
        self.frames.clear();
    }

    /// Returns true if the current session produced its geometry.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Consumes as many whole fields from `buf` as possible.
    ///
    /// Returns [Step::Suspended] when more bytes are needed and [Step::Done] once the outermost
    /// geometry is complete. Any error ends the session: the next call fails with
    /// [Error::InvalidState] until [Decoder::prepare] is called again.
    pub fn try_read(&mut self, buf: &mut impl Buf) -> Result<Step<Geometry>, Error> {
        self.state.ensure_active()?;
        match self.advance(buf) {
            Ok(Some(geometry)) => {
                self.state = State::Done;
                Ok(Step::Done(geometry))
            }
            Ok(None) => {
                trace!(
                    remaining = buf.remaining(),
                    depth = self.frames.len(),
                    "decoder suspended"
                );
                Ok(Step::Suspended)
            }
            Err(err) => {
                debug!(?err, depth = self.frames.len(), "decode failed");
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn advance(&mut self, buf: &mut impl Buf) -> Result<Option<Geometry>, Error> {
        loop {
            let header = match self.header {
                Some(header) => header,
                None => {
                    if buf.remaining() < HEADER_SIZE {
                        return Ok(None);
                    }
                    let header = Header::read(buf)?;
                    self.body = Body::new(header.geometry_type);
                    self.header = Some(header);
                    header
                }
            };

            // Only the outermost node can carry a spatial reference
            if self.srid.is_none() {
                if header.has_srid() {
                    if buf.remaining() < SRID_SIZE {
                        return Ok(None);
                    }
                    self.srid = Some(header.order.get_u32(buf));
                } else {
                    self.srid = Some(self.default_srid);
                }
            }

            let order = header.order;
            let shape = match &mut self.body {
                Body::Point => {
                    if buf.remaining() < COORD_SIZE {
                        return Ok(None);
                    }
                    Shape::Point(order.get_coord(buf))
                }
                Body::LineString(points) => {
                    if !points.is_sized() {
                        if buf.remaining() < COUNT_SIZE {
                            return Ok(None);
                        }
                        *points = Cursor::sized(read_count(order, buf, &self.cfg)?);
                    }
                    if !points.fill(buf, COORD_SIZE, |buf| Ok(order.get_coord(buf)))? {
                        return Ok(None);
                    }
                    Shape::LineString(LineString::from(points.take()))
                }
                Body::Polygon(rings) => {
                    if !rings.rings.is_sized() {
                        if buf.remaining() < COUNT_SIZE {
                            return Ok(None);
                        }
                        rings.rings = Cursor::sized(read_count(order, buf, &self.cfg)?);
                    }
                    if !rings.fill(order, buf, &self.cfg)? {
                        return Ok(None);
                    }
                    Shape::Polygon(Polygon::from(rings.rings.take()))
                }
                Body::MultiPoint(points) => {
                    if !points.is_sized() {
                        if buf.remaining() < COUNT_SIZE {
                            return Ok(None);
                        }
                        *points = Cursor::sized(read_count(order, buf, &self.cfg)?);
                    }
                    // Each element is a complete Point node without a spatial reference
                    let complete = points.fill(buf, HEADER_SIZE + COORD_SIZE, |buf| {
                        let order = read_sub_header(buf)?;
                        Ok(order.get_coord(buf))
                    })?;
                    if !complete {
                        return Ok(None);
                    }
                    Shape::MultiPoint(points.take())
                }
                Body::MultiLineString {
                    lines,
                    points,
                    order: element,
                } => {
                    if !lines.is_sized() {
                        if buf.remaining() < COUNT_SIZE {
                            return Ok(None);
                        }
                        *lines = Cursor::sized(read_count(order, buf, &self.cfg)?);
                    }
                    while !lines.is_complete() {
                        if !points.is_sized() {
                            if buf.remaining() < HEADER_SIZE + COUNT_SIZE {
                                return Ok(None);
                            }
                            *element = read_sub_header(buf)?;
                            *points = Cursor::sized(read_count(*element, buf, &self.cfg)?);
                        }
                        let element = *element;
                        if !points.fill(buf, COORD_SIZE, |buf| Ok(element.get_coord(buf)))? {
                            return Ok(None);
                        }
                        lines.push(LineString::from(points.take()));
                    }
                    Shape::MultiLineString(lines.take())
                }
                Body::MultiPolygon {
                    polygons,
                    rings,
                    order: element,
                } => {
                    if !polygons.is_sized() {
                        if buf.remaining() < COUNT_SIZE {
                            return Ok(None);
                        }
                        *polygons = Cursor::sized(read_count(order, buf, &self.cfg)?);
                    }
                    while !polygons.is_complete() {
                        if !rings.rings.is_sized() {
                            if buf.remaining() < HEADER_SIZE + COUNT_SIZE {
                                return Ok(None);
                            }
                            *element = read_sub_header(buf)?;
                            rings.rings = Cursor::sized(read_count(*element, buf, &self.cfg)?);
                        }
                        if !rings.fill(*element, buf, &self.cfg)? {
                            return Ok(None);
                        }
                        polygons.push(Polygon::from(rings.rings.take()));
                    }
                    Shape::MultiPolygon(polygons.take())
                }
                Body::GeometryCollection => {
                    if buf.remaining() < COUNT_SIZE {
                        return Ok(None);
                    }
                    let count = read_count(order, buf, &self.cfg)?;
                    if count == 0 {
                        Shape::GeometryCollection(Vec::new())
                    } else {
                        if self.frames.len() >= self.cfg.max_depth {
                            debug!(max = self.cfg.max_depth, "collection nesting exceeds limit");
                            return Err(Error::DepthExceeded(self.cfg.max_depth));
                        }
                        self.frames.push(Cursor::sized(count));
                        self.header = None;
                        trace!(count, depth = self.frames.len(), "entered collection");
                        continue;
                    }
                }
            };

            self.header = None;
            if let Some(geometry) = self.complete(shape) {
                return Ok(Some(geometry));
            }
        }
    }

    /// Hands a finished node to the innermost open collection, closing every collection that
    /// becomes full. Returns the outermost geometry once no collection remains open.
    fn complete(&mut self, shape: Shape) -> Option<Geometry> {
        let srid = self.srid.unwrap_or(self.default_srid);
        let mut geometry = Geometry::new(shape).with_srid(srid);
        loop {
            let frame = match self.frames.last_mut() {
                Some(frame) => frame,
                None => return Some(geometry),
            };
            frame.push(geometry);
            if !frame.is_complete() {
                return None;
            }
            let geometries = frame.take();
            self.frames.pop();
            trace!(depth = self.frames.len(), "left collection");
            geometry = Geometry::new(Shape::GeometryCollection(geometries)).with_srid(srid);
        }
    }
}
