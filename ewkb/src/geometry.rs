//! Geometry values exchanged with PostGIS.
//!
//! A [Geometry] is a [Shape] (one of the seven OGC feature kinds) plus a spatial reference tag.
//! Values are plain data: each tree owns its children, and the tag is the only field that may be
//! changed after construction (see [Geometry::set_srid]).
//!
//! Equality is exact structural equality over coordinates (no tolerance). The spatial reference
//! tag does not participate in equality or hashing.
//!
//! Comparing, hashing, and dropping a [Geometry] walk nested collections with an explicit stack, so
//! any nesting depth the decoder accepts is safe to use. The derived `Clone` and `Debug` recurse
//! once per nesting level.

use crate::{
    header::{COORD_SIZE, COUNT_SIZE, HEADER_SIZE, SRID_SIZE},
    EncodeSize, GeometryType,
};
use std::{
    hash::{Hash, Hasher},
    ops::Index,
};

/// Seed for geometry fingerprints, so that all-zero geometries do not hash to zero.
const HASH_SEED: u64 = 266_370_105;

/// Folds `value` into `acc`, rotating `value` by an amount derived from `acc`.
#[inline]
fn fold(acc: u64, value: u64) -> u64 {
    acc ^ value.rotate_left((acc % 64) as u32)
}

/// Bits of an ordinate for hashing (`0.0 == -0.0`, so both map to the same bits).
#[inline]
fn ordinate_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

fn fold_coords<'a>(acc: u64, coords: impl IntoIterator<Item = &'a Coord>) -> u64 {
    coords
        .into_iter()
        .fold(acc, |acc, coord| fold(acc, coord.fingerprint()))
}

/// A 2D coordinate pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Creates a coordinate pair.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn fingerprint(&self) -> u64 {
        ordinate_bits(self.x) ^ ordinate_bits(self.y).rotate_left(32)
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

/// An ordered sequence of points. May be empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineString(Vec<Coord>);

impl LineString {
    /// Creates a line from anything convertible to [Coord] (e.g. `(f64, f64)` tuples).
    pub fn new<C: Into<Coord>>(points: impl IntoIterator<Item = C>) -> Self {
        Self(points.into_iter().map(Into::into).collect())
    }

    /// Returns the points in order.
    pub fn points(&self) -> &[Coord] {
        &self.0
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the line has no points.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the points, consuming the line.
    pub fn into_inner(self) -> Vec<Coord> {
        self.0
    }

    /// Wire size of the body: point count plus the points.
    fn body_size(&self) -> usize {
        COUNT_SIZE + COORD_SIZE * self.0.len()
    }

    fn fingerprint(&self) -> u64 {
        fold_coords(HASH_SEED, &self.0)
    }
}

impl From<Vec<Coord>> for LineString {
    fn from(points: Vec<Coord>) -> Self {
        Self(points)
    }
}

impl Index<usize> for LineString {
    type Output = Coord;

    fn index(&self, index: usize) -> &Coord {
        &self.0[index]
    }
}

impl Hash for LineString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

/// A sequence of rings: the exterior boundary first, then any holes.
///
/// Ring closure and minimum ring size are not checked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon(Vec<Vec<Coord>>);

impl Polygon {
    /// Creates a polygon from rings of anything convertible to [Coord].
    pub fn new<R, C>(rings: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = C>,
        C: Into<Coord>,
    {
        Self(
            rings
                .into_iter()
                .map(|ring| ring.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// Returns the rings, exterior first.
    pub fn rings(&self) -> &[Vec<Coord>] {
        &self.0
    }

    /// Returns the number of rings.
    pub fn ring_count(&self) -> usize {
        self.0.len()
    }

    /// Returns the number of points across all rings.
    pub fn total_point_count(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    /// Returns the rings, consuming the polygon.
    pub fn into_inner(self) -> Vec<Vec<Coord>> {
        self.0
    }

    /// Wire size of the body: ring count, then a point count and the points of each ring.
    fn body_size(&self) -> usize {
        COUNT_SIZE + COUNT_SIZE * self.0.len() + COORD_SIZE * self.total_point_count()
    }

    fn fingerprint(&self) -> u64 {
        self.0.iter().fold(HASH_SEED, |acc, ring| {
            fold_coords(fold(acc, ring.len() as u64), ring)
        })
    }
}

impl From<Vec<Vec<Coord>>> for Polygon {
    fn from(rings: Vec<Vec<Coord>>) -> Self {
        Self(rings)
    }
}

impl Index<usize> for Polygon {
    type Output = [Coord];

    fn index(&self, ring: usize) -> &[Coord] {
        &self.0[ring]
    }
}

impl Hash for Polygon {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

/// The feature carried by a [Geometry].
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(Coord),
    LineString(LineString),
    Polygon(Polygon),
    /// Each point is a full Point sub-feature on the wire.
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<LineString>),
    MultiPolygon(Vec<Polygon>),
    GeometryCollection(Vec<Geometry>),
}

impl Shape {
    /// Returns the kind of this shape.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::LineString(_) => GeometryType::LineString,
            Self::Polygon(_) => GeometryType::Polygon,
            Self::MultiPoint(_) => GeometryType::MultiPoint,
            Self::MultiLineString(_) => GeometryType::MultiLineString,
            Self::MultiPolygon(_) => GeometryType::MultiPolygon,
            Self::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }
}

/// A PostGIS geometry: a [Shape] tagged with a spatial reference identifier.
#[derive(Clone, Debug)]
pub struct Geometry {
    shape: Shape,
    srid: u32,
}

impl Geometry {
    /// Creates an untagged geometry (spatial reference 0).
    pub fn new(shape: Shape) -> Self {
        Self { shape, srid: 0 }
    }

    /// Creates a Point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(Shape::Point(Coord::new(x, y)))
    }

    /// Creates a LineString.
    pub fn line_string<C: Into<Coord>>(points: impl IntoIterator<Item = C>) -> Self {
        Self::new(Shape::LineString(LineString::new(points)))
    }

    /// Creates a Polygon from its rings.
    pub fn polygon<R, C>(rings: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = C>,
        C: Into<Coord>,
    {
        Self::new(Shape::Polygon(Polygon::new(rings)))
    }

    /// Creates a MultiPoint.
    pub fn multi_point<C: Into<Coord>>(points: impl IntoIterator<Item = C>) -> Self {
        Self::new(Shape::MultiPoint(
            points.into_iter().map(Into::into).collect(),
        ))
    }

    /// Creates a MultiLineString.
    pub fn multi_line_string(lines: impl IntoIterator<Item = LineString>) -> Self {
        Self::new(Shape::MultiLineString(lines.into_iter().collect()))
    }

    /// Creates a MultiPolygon.
    pub fn multi_polygon(polygons: impl IntoIterator<Item = Polygon>) -> Self {
        Self::new(Shape::MultiPolygon(polygons.into_iter().collect()))
    }

    /// Creates a GeometryCollection.
    pub fn collection(geometries: impl IntoIterator<Item = Geometry>) -> Self {
        Self::new(Shape::GeometryCollection(geometries.into_iter().collect()))
    }

    /// Returns this geometry tagged with `srid`.
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }

    /// The spatial reference identifier (0 if unspecified).
    pub fn srid(&self) -> u32 {
        self.srid
    }

    /// Retags this geometry. This is the only mutation a geometry supports.
    pub fn set_srid(&mut self, srid: u32) {
        self.srid = srid;
    }

    /// Returns the feature carried by this geometry.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the feature, consuming the geometry.
    pub fn into_shape(mut self) -> Shape {
        std::mem::replace(&mut self.shape, Shape::GeometryCollection(Vec::new()))
    }

    /// Returns the kind of this geometry.
    pub fn geometry_type(&self) -> GeometryType {
        self.shape.geometry_type()
    }

    /// Returns the coordinate if this is a Point.
    pub fn as_point(&self) -> Option<Coord> {
        match &self.shape {
            Shape::Point(coord) => Some(*coord),
            _ => None,
        }
    }

    /// Returns the line if this is a LineString.
    pub fn as_line_string(&self) -> Option<&LineString> {
        match &self.shape {
            Shape::LineString(line) => Some(line),
            _ => None,
        }
    }

    /// Returns the polygon if this is a Polygon.
    pub fn as_polygon(&self) -> Option<&Polygon> {
        match &self.shape {
            Shape::Polygon(polygon) => Some(polygon),
            _ => None,
        }
    }

    /// Returns the points if this is a MultiPoint.
    pub fn as_multi_point(&self) -> Option<&[Coord]> {
        match &self.shape {
            Shape::MultiPoint(points) => Some(points),
            _ => None,
        }
    }

    /// Returns the lines if this is a MultiLineString.
    pub fn as_multi_line_string(&self) -> Option<&[LineString]> {
        match &self.shape {
            Shape::MultiLineString(lines) => Some(lines),
            _ => None,
        }
    }

    /// Returns the polygons if this is a MultiPolygon.
    pub fn as_multi_polygon(&self) -> Option<&[Polygon]> {
        match &self.shape {
            Shape::MultiPolygon(polygons) => Some(polygons),
            _ => None,
        }
    }

    /// Returns the children if this is a GeometryCollection.
    pub fn as_collection(&self) -> Option<&[Geometry]> {
        match &self.shape {
            Shape::GeometryCollection(geometries) => Some(geometries),
            _ => None,
        }
    }

    /// Folds every node in pre-order. Collections also fold their length, so nesting is part of
    /// the fingerprint.
    fn fingerprint(&self) -> u64 {
        let mut acc = HASH_SEED;
        let mut pending = vec![self];
        while let Some(geometry) = pending.pop() {
            acc = fold(acc, u64::from(geometry.geometry_type().type_id()));
            acc = match &geometry.shape {
                Shape::Point(coord) => fold(acc, coord.fingerprint()),
                Shape::LineString(line) => fold(acc, line.fingerprint()),
                Shape::Polygon(polygon) => fold(acc, polygon.fingerprint()),
                Shape::MultiPoint(points) => fold_coords(acc, points),
                Shape::MultiLineString(lines) => lines
                    .iter()
                    .fold(acc, |acc, line| fold(acc, line.fingerprint())),
                Shape::MultiPolygon(polygons) => polygons
                    .iter()
                    .fold(acc, |acc, polygon| fold(acc, polygon.fingerprint())),
                Shape::GeometryCollection(geometries) => {
                    pending.extend(geometries.iter().rev());
                    fold(acc, geometries.len() as u64)
                }
            };
        }
        acc
    }
}

impl From<Shape> for Geometry {
    fn from(shape: Shape) -> Self {
        Self::new(shape)
    }
}

impl From<Coord> for Geometry {
    fn from(coord: Coord) -> Self {
        Self::new(Shape::Point(coord))
    }
}

impl From<LineString> for Geometry {
    fn from(line: LineString) -> Self {
        Self::new(Shape::LineString(line))
    }
}

impl From<Polygon> for Geometry {
    fn from(polygon: Polygon) -> Self {
        Self::new(Shape::Polygon(polygon))
    }
}

impl PartialEq for Geometry {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            match (&a.shape, &b.shape) {
                (Shape::GeometryCollection(left), Shape::GeometryCollection(right)) => {
                    if left.len() != right.len() {
                        return false;
                    }
                    pending.extend(left.iter().zip(right));
                }
                (left, right) => {
                    if left != right {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Drop for Geometry {
    fn drop(&mut self) {
        let Shape::GeometryCollection(children) = &mut self.shape else {
            return;
        };

        // Detach every descendant collection so each child is dropped with no children left
        let mut pending = std::mem::take(children);
        while let Some(mut child) = pending.pop() {
            if let Shape::GeometryCollection(grandchildren) = &mut child.shape {
                pending.append(grandchildren);
            }
        }
    }
}

impl Hash for Geometry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl EncodeSize for Geometry {
    /// Returns the number of bytes [crate::Encoder] writes for this geometry.
    ///
    /// Only the outermost node carries the spatial reference. Nested collections are walked with
    /// an explicit stack.
    fn encode_size(&self) -> usize {
        let srid = if self.srid != 0 { SRID_SIZE } else { 0 };
        let mut size = HEADER_SIZE + srid;
        let mut pending = vec![&self.shape];
        while let Some(shape) = pending.pop() {
            size += match shape {
                Shape::Point(_) => COORD_SIZE,
                Shape::LineString(line) => line.body_size(),
                Shape::Polygon(polygon) => polygon.body_size(),
                Shape::MultiPoint(points) => COUNT_SIZE + (HEADER_SIZE + COORD_SIZE) * points.len(),
                Shape::MultiLineString(lines) => {
                    COUNT_SIZE
                        + lines
                            .iter()
                            .map(|line| HEADER_SIZE + line.body_size())
                            .sum::<usize>()
                }
                Shape::MultiPolygon(polygons) => {
                    COUNT_SIZE
                        + polygons
                            .iter()
                            .map(|polygon| HEADER_SIZE + polygon.body_size())
                            .sum::<usize>()
                }
                Shape::GeometryCollection(geometries) => {
                    pending.extend(geometries.iter().map(Geometry::shape));
                    COUNT_SIZE + HEADER_SIZE * geometries.len()
                }
            };
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &impl Hash) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn triangle() -> Polygon {
        Polygon::new([[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (1.0, 1.0)]])
    }

    #[test]
    fn test_encode_size() {
        assert_eq!(Geometry::point(1.0, 2500.0).encode_size(), 21);
        assert_eq!(Geometry::point(1.0, 2500.0).with_srid(3942).encode_size(), 25);

        let line = Geometry::line_string([(1.0, 1.0), (1.0, 2500.0)]);
        assert_eq!(line.encode_size(), 5 + 4 + 32);

        let polygon = Geometry::from(triangle());
        assert_eq!(polygon.encode_size(), 5 + 4 + 4 + 64);

        let multi_point = Geometry::multi_point([(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(multi_point.encode_size(), 5 + 4 + 2 * 21);

        let multi_line = Geometry::multi_line_string([
            LineString::new([(1.0, 1.0), (1.0, 2500.0)]),
            LineString::new(Vec::<Coord>::new()),
        ]);
        assert_eq!(multi_line.encode_size(), 5 + 4 + (9 + 32) + 9);

        let multi_polygon = Geometry::multi_polygon([triangle()]);
        assert_eq!(multi_polygon.encode_size(), 5 + 4 + (9 + 4 + 64));
    }

    #[test]
    fn test_encode_size_nested() {
        // Nested nodes never carry the spatial reference
        let inner = Geometry::collection([
            Geometry::point(1.0, 1.0).with_srid(4326),
            Geometry::multi_polygon([triangle()]),
        ])
        .with_srid(4326);
        let outer = Geometry::collection([Geometry::point(1.0, 1.0), inner]).with_srid(3942);
        let inner_size = 5 + 4 + 21 + (5 + 4 + (9 + 4 + 64));
        assert_eq!(outer.encode_size(), 5 + 4 + 4 + 21 + inner_size);

        let empty = Geometry::collection(Vec::new());
        assert_eq!(empty.encode_size(), 9);
    }

    #[test]
    fn test_equality() {
        let a = Geometry::line_string([(1.0, 1.0), (2.0, 2.0)]);
        let b = Geometry::line_string([(2.0, 2.0), (1.0, 1.0)]);
        assert_ne!(a, b);

        // Same coordinates, different kinds
        let c = Geometry::multi_point([(1.0, 1.0), (2.0, 2.0)]);
        assert_ne!(a, c);

        // Spatial reference is not part of equality
        assert_eq!(a.clone().with_srid(3942), a);

        // Exact comparison
        assert_ne!(Geometry::point(0.1 + 0.2, 0.0), Geometry::point(0.3, 0.0));
    }

    #[test]
    fn test_equality_nesting() {
        let point = Geometry::point(1.0, 1.0);
        let flat = Geometry::collection([point.clone()]);
        let nested = Geometry::collection([Geometry::collection([point.clone()])]);
        assert_ne!(flat, nested);
        assert_ne!(hash_of(&flat), hash_of(&nested));

        let one_ring = Geometry::from(triangle());
        let two_rings = Geometry::polygon([
            triangle().rings()[0].clone(),
            triangle().rings()[0].clone(),
        ]);
        assert_ne!(one_ring, two_rings);
    }

    #[test]
    fn test_hash_consistency() {
        let build = || {
            Geometry::collection([
                Geometry::point(1.0, 1.0),
                Geometry::collection([
                    Geometry::point(1.0, 1.0),
                    Geometry::multi_polygon([triangle()]),
                ]),
            ])
        };
        let a = build();
        let b = build().with_srid(3942);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        // Signed zeros compare equal and must hash equal
        let pos = Geometry::point(0.0, 1.0);
        let neg = Geometry::point(-0.0, 1.0);
        assert_eq!(pos, neg);
        assert_eq!(hash_of(&pos), hash_of(&neg));
    }

    #[test]
    fn test_nesting_in_hash() {
        let a = Geometry::point(1.0, 1.0);
        let b = Geometry::point(2.0, 2.0);
        let left = Geometry::collection([Geometry::collection([a.clone()]), b.clone()]);
        let right = Geometry::collection([Geometry::collection([a, b])]);
        assert_ne!(left, right);
        assert_ne!(hash_of(&left), hash_of(&right));
    }

    #[test]
    fn test_deep_nesting_without_recursion() {
        const DEPTH: usize = 200_000;
        let build = |leaf: f64| {
            let mut geometry = Geometry::point(leaf, 1.0);
            for _ in 0..DEPTH {
                geometry = Geometry::collection([geometry]);
            }
            geometry
        };
        let a = build(1.0);
        let b = build(1.0);
        let c = build(2.0);

        assert!(a == b);
        assert!(a != c);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.encode_size(), DEPTH * 9 + 21);

        let shape = c.into_shape();
        assert_eq!(shape.geometry_type(), GeometryType::GeometryCollection);
        drop(shape);
        drop(a);
        drop(b);
    }

    #[test]
    fn test_zero_fingerprint() {
        assert_ne!(Geometry::point(0.0, 0.0).fingerprint(), 0);
        assert_ne!(LineString::new([(0.0, 0.0), (0.0, 0.0)]).fingerprint(), 0);
        assert_ne!(Polygon::new([[(0.0, 0.0)]]).fingerprint(), 0);
    }

    #[test]
    fn test_accessors() {
        let polygon = Geometry::from(triangle());
        assert_eq!(polygon.geometry_type(), GeometryType::Polygon);
        let inner = polygon.as_polygon().unwrap();
        assert_eq!(inner.ring_count(), 1);
        assert_eq!(inner.total_point_count(), 4);
        assert_eq!(inner[0][1], Coord::new(2.0, 2.0));
        assert!(polygon.as_point().is_none());
        assert!(polygon.as_collection().is_none());

        let line = LineString::new([(1.0, 2.0), (3.0, 4.0)]);
        assert_eq!(line.len(), 2);
        assert_eq!(line[1], Coord::new(3.0, 4.0));

        let mut geometry = Geometry::from(line);
        assert_eq!(geometry.srid(), 0);
        geometry.set_srid(3942);
        assert_eq!(geometry.srid(), 3942);
        assert_eq!(geometry.as_line_string().unwrap().points().len(), 2);
    }
}
