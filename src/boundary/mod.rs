//! Administrative boundary polygons
//!
//! A `Boundary` is one administrative area: its outer rings on the
//! metric plane, measured road-start density, and nested child
//! boundaries. Trees of these drive the in-town classification during
//! extraction.

pub mod classify;
pub mod list;

pub use list::BoundaryList;

use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::formats::reader::BinaryReader;
use crate::geo::{PlaneCoord, Rect};

pub(crate) const BOUNDARY_MAGIC: u32 = 0xE9E9E9E9;
pub(crate) const OUTER_WAY_MAGIC: u32 = 0xE8E8E8E8;

const MAX_ISO_CODE_BYTES: u64 = 99;

/// One outer ring with its cached bounding box. Rings need not be
/// explicitly closed; membership tests close them implicitly.
#[derive(Debug, Clone)]
pub struct OuterRing {
    bbox: Rect,
    coords: Vec<PlaneCoord>,
}

impl OuterRing {
    pub fn new(coords: Vec<PlaneCoord>) -> Self {
        debug_assert!(coords.len() >= 3);
        let mut bbox = Rect::around(coords[0]);
        for &coord in &coords[1..] {
            bbox.extend(coord);
        }
        Self { bbox, coords }
    }

    fn contains(&self, c: PlaneCoord) -> bool {
        if !self.bbox.contains(c) {
            return false;
        }
        // Points on a vertex count as inside; the ray cast below is
        // half-open and would otherwise flip on them
        if self.coords.iter().any(|&vertex| vertex == c) {
            return true;
        }
        point_in_ring(&self.coords, c)
    }
}

/// Ray-casting membership test with 64-bit intermediates. Uses the
/// half-open edge rule, and closes the ring when first != last.
fn point_in_ring(coords: &[PlaneCoord], c: PlaneCoord) -> bool {
    if coords.len() < 3 {
        return false;
    }

    let mut inside = false;
    for pair in coords.windows(2) {
        if ray_crosses(pair[0], pair[1], c) {
            inside = !inside;
        }
    }

    let first = coords[0];
    let last = coords[coords.len() - 1];
    if first != last && ray_crosses(last, first, c) {
        inside = !inside;
    }

    inside
}

fn ray_crosses(a: PlaneCoord, b: PlaneCoord, c: PlaneCoord) -> bool {
    (a.y > c.y) != (b.y > c.y)
        && (c.x as i64)
            < (b.x as i64 - a.x as i64) * (c.y as i64 - a.y as i64) / (b.y as i64 - a.y as i64)
                + a.x as i64
}

/// One administrative boundary with nested children
#[derive(Debug, Clone)]
pub struct Boundary {
    pub total_area: i64,
    pub road_starts: u32,
    pub iso_code: String,
    /// In-town density threshold, set from the ISO code at load
    pub target_density: f64,
    outer_rings: Vec<OuterRing>,
    pub children: Vec<Boundary>,
    enclosing: Option<Rect>,
}

impl Boundary {
    /// Parse one boundary record (and its children, recursively).
    ///
    /// Rings with fewer than three coordinates are consumed but
    /// dropped; they cannot enclose anything.
    pub fn parse<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.expect_magic(BOUNDARY_MAGIC, "boundary")?;

        let nr_outer_ways = reader.read_u32()?;
        let nr_children = reader.read_u32()?;
        let total_area = reader.read_i64()?.abs();
        let road_starts = reader.read_u32()?;

        let iso_len = reader.read_u64()?;
        if iso_len > MAX_ISO_CODE_BYTES {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("iso code length {iso_len} exceeds {MAX_ISO_CODE_BYTES} bytes"),
            )));
        }
        let mut iso_bytes = vec![0u8; iso_len as usize];
        reader.read_into(&mut iso_bytes)?;
        let iso_code = String::from_utf8_lossy(&iso_bytes).into_owned();

        let mut outer_rings = Vec::with_capacity(nr_outer_ways as usize);
        let mut enclosing: Option<Rect> = None;

        for _ in 0..nr_outer_ways {
            let found = reader.read_u32()?;
            if found != OUTER_WAY_MAGIC {
                return Err(Error::CoordHeaderBad { found });
            }

            let coord_count = reader.read_u32()?;
            let mut coords = Vec::with_capacity(coord_count as usize);
            for _ in 0..coord_count {
                let x = reader.read_i32()?;
                let y = reader.read_i32()?;
                coords.push(PlaneCoord { x, y });
            }

            if coords.len() < 3 {
                tracing::warn!(
                    coords = coords.len(),
                    iso = %iso_code,
                    "skipping degenerate outer way"
                );
                continue;
            }

            for &coord in &coords {
                match &mut enclosing {
                    Some(rect) => rect.extend(coord),
                    None => enclosing = Some(Rect::around(coord)),
                }
            }
            outer_rings.push(OuterRing::new(coords));
        }

        let mut children = Vec::with_capacity(nr_children as usize);
        for _ in 0..nr_children {
            children.push(Boundary::parse(reader)?);
        }

        let target_density = list::density_for_iso(&iso_code);

        Ok(Self {
            total_area,
            road_starts,
            iso_code,
            target_density,
            outer_rings,
            children,
            enclosing,
        })
    }

    pub fn contains(&self, c: PlaneCoord) -> bool {
        match self.enclosing {
            Some(rect) if rect.contains(c) => {}
            _ => return false,
        }
        self.outer_rings.iter().any(|ring| ring.contains(c))
    }

    /// Deepest descendant containing `c`, ties broken by smallest area
    pub fn smallest_for(&self, c: PlaneCoord) -> Option<&Boundary> {
        if !self.contains(c) {
            return None;
        }

        let mut smallest: Option<&Boundary> = None;
        for child in &self.children {
            if let Some(candidate) = child.smallest_for(c) {
                if smallest.map_or(true, |found| candidate.total_area < found.total_area) {
                    smallest = Some(candidate);
                }
            }
        }

        Some(smallest.unwrap_or(self))
    }

    /// Measured road-start density per projected area unit
    pub fn density(&self) -> f64 {
        self.road_starts as f64 / self.total_area as f64
    }

    /// True when `c` lies in this boundary and either this boundary or
    /// some containing descendant is at least `town_density` dense
    pub fn is_in_town(&self, c: PlaneCoord, town_density: f64) -> bool {
        if !self.contains(c) {
            return false;
        }
        if self.density() >= town_density {
            return true;
        }
        self.children
            .iter()
            .any(|child| child.is_in_town(c, town_density))
    }

    #[cfg(test)]
    pub(crate) fn synthetic(
        total_area: i64,
        road_starts: u32,
        rings: Vec<Vec<PlaneCoord>>,
        children: Vec<Boundary>,
    ) -> Self {
        let outer_rings: Vec<OuterRing> = rings.into_iter().map(OuterRing::new).collect();
        let mut enclosing: Option<Rect> = None;
        for ring in &outer_rings {
            for &coord in &ring.coords {
                match &mut enclosing {
                    Some(rect) => rect.extend(coord),
                    None => enclosing = Some(Rect::around(coord)),
                }
            }
        }
        Self {
            total_area,
            road_starts,
            iso_code: String::new(),
            target_density: list::density_for_iso(""),
            outer_rings,
            children,
            enclosing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> PlaneCoord {
        PlaneCoord { x, y }
    }

    fn unit_square_open() -> Vec<PlaneCoord> {
        vec![p(0, 0), p(100, 0), p(100, 100), p(0, 100)]
    }

    #[test]
    fn test_point_in_polygon_unit_square() {
        let boundary = Boundary::synthetic(10_000, 0, vec![unit_square_open()], vec![]);
        assert!(boundary.contains(p(50, 50)));
        assert!(boundary.contains(p(0, 0)));
        assert!(!boundary.contains(p(150, 50)));
    }

    #[test]
    fn test_open_and_closed_rings_agree() {
        let mut closed = unit_square_open();
        closed.push(p(0, 0));
        let open_boundary = Boundary::synthetic(10_000, 0, vec![unit_square_open()], vec![]);
        let closed_boundary = Boundary::synthetic(10_000, 0, vec![closed], vec![]);

        for probe in [p(50, 50), p(0, 0), p(150, 50), p(99, 1), p(100, 100), p(-1, 50)] {
            assert_eq!(
                open_boundary.contains(probe),
                closed_boundary.contains(probe),
                "open/closed disagreement at {probe:?}"
            );
        }
    }

    #[test]
    fn test_ray_cast_near_coordinate_extremes() {
        // Magnitudes close to the i32 range must not overflow the
        // crossing predicate
        let big = 2_000_000_000;
        let ring = vec![p(-big, -big), p(big, -big), p(big, big), p(-big, big)];
        let boundary = Boundary::synthetic(1, 0, vec![ring], vec![]);
        assert!(boundary.contains(p(0, 0)));
        assert!(boundary.contains(p(big - 1, big - 1)));
        assert!(!boundary.contains(p(big + 1, 0)));
    }

    #[test]
    fn test_smallest_descends_into_child() {
        let child = Boundary::synthetic(100, 50, vec![vec![p(10, 10), p(40, 10), p(40, 40), p(10, 40)]], vec![]);
        let parent = Boundary::synthetic(10_000, 60, vec![unit_square_open()], vec![child]);

        let smallest = parent.smallest_for(p(20, 20)).unwrap();
        assert_eq!(smallest.total_area, 100);

        let outside_child = parent.smallest_for(p(80, 80)).unwrap();
        assert_eq!(outside_child.total_area, 10_000);

        assert!(parent.smallest_for(p(150, 150)).is_none());
    }

    #[test]
    fn test_density_round_trip() {
        let boundary = Boundary::synthetic(3, 1, vec![unit_square_open()], vec![]);
        assert!((boundary.density() - 1.0 / 3.0).abs() <= f64::EPSILON);
    }

    #[test]
    fn test_in_town_via_dense_child() {
        // Sparse parent, dense child: points in the child are in town,
        // points only in the parent are not
        let child = Boundary::synthetic(
            100,
            50,
            vec![vec![p(10, 10), p(40, 10), p(40, 40), p(10, 40)]],
            vec![],
        );
        let parent = Boundary::synthetic(1_000_000, 1, vec![unit_square_open()], vec![child]);

        let threshold = 0.01;
        assert!(parent.is_in_town(p(20, 20), threshold));
        assert!(!parent.is_in_town(p(80, 80), threshold));
        assert!(!parent.is_in_town(p(150, 150), threshold));
    }
}
