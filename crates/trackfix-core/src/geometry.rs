#![forbid(unsafe_code)]

//! Geographic primitives.

use serde::Serialize;

/// A latitude/longitude bounding box.
///
/// An extent built from zero points is *empty*; extending an empty extent
/// by one point yields a degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    /// Southern edge (degrees).
    pub min_lat: f64,
    /// Western edge (degrees).
    pub min_lon: f64,
    /// Northern edge (degrees).
    pub max_lat: f64,
    /// Eastern edge (degrees).
    pub max_lon: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Extent {
    /// The empty extent: contains nothing, unions to the other operand.
    pub const EMPTY: Self = Self {
        min_lat: f64::INFINITY,
        min_lon: f64::INFINITY,
        max_lat: f64::NEG_INFINITY,
        max_lon: f64::NEG_INFINITY,
    };

    /// Create an extent from its edges.
    #[inline]
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Build the smallest extent containing every point.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |acc, (lat, lon)| acc.extended(lat, lon))
    }

    /// Check whether the extent contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat || self.min_lon > self.max_lon
    }

    /// Return a copy grown to include the given point.
    #[must_use]
    pub fn extended(&self, lat: f64, lon: f64) -> Self {
        Self {
            min_lat: self.min_lat.min(lat),
            min_lon: self.min_lon.min(lon),
            max_lat: self.max_lat.max(lat),
            max_lon: self.max_lon.max(lon),
        }
    }

    /// Smallest extent containing both.
    #[must_use]
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Check if a point lies inside (edges inclusive).
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Check whether two extents overlap.
    pub fn intersects(&self, other: &Extent) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extent_has_no_points() {
        assert!(Extent::EMPTY.is_empty());
        assert!(!Extent::EMPTY.contains(0.0, 0.0));
    }

    #[test]
    fn from_points_bounds_all_points() {
        let extent = Extent::from_points([(63.5, -150.0), (64.0, -149.0), (63.7, -151.2)]);
        assert_eq!(extent, Extent::new(63.5, -151.2, 64.0, -149.0));
        assert!(extent.contains(63.7, -150.5));
    }

    #[test]
    fn union_with_empty_is_identity() {
        let extent = Extent::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(extent.union(&Extent::EMPTY), extent);
    }

    #[test]
    fn intersects_detects_overlap_and_disjoint() {
        let a = Extent::new(0.0, 0.0, 2.0, 2.0);
        let b = Extent::new(1.0, 1.0, 3.0, 3.0);
        let c = Extent::new(5.0, 5.0, 6.0, 6.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&Extent::EMPTY));
    }
}
