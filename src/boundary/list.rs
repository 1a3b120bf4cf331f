//! Per-country boundary forest
//!
//! A density file holds one boundary tree per country. Each country is
//! assigned its in-town density threshold from its ISO code at load.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::boundary::Boundary;
use crate::error::Result;
use crate::formats::reader::BinaryReader;
use crate::geo::{FixedCoord, PlaneCoord};

const DENSITY_TREE_MAGIC: u32 = 0xE0E0E0E0;

/// Fallback threshold for countries without a tuned value
const DEFAULT_TOWN_DENSITY: f64 = 5.8887e-6;

/// In-town density threshold for an ISO country code.
/// Thresholds are road starts per projected-metric area unit, measured
/// per country; an empty or unknown code gets the default.
pub fn density_for_iso(iso_code: &str) -> f64 {
    match iso_code {
        "NL" => 1.27158e-5,
        "BE" | "DE" => 8.0000e-6,
        "JP" => 1.40105e-5,
        "RU" => 4.2000e-6,
        _ => DEFAULT_TOWN_DENSITY,
    }
}

/// Forest of top-level country boundaries
#[derive(Debug, Clone, Default)]
pub struct BoundaryList {
    countries: Vec<Boundary>,
}

impl BoundaryList {
    pub fn from_countries(countries: Vec<Boundary>) -> Self {
        Self { countries }
    }

    /// Read a density file (`E0E0E0E0` header, then one boundary tree
    /// per country)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BinaryReader::new(BufReader::new(File::open(path)?));
        Self::parse(&mut reader)
    }

    pub fn parse<R: std::io::Read + std::io::Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.expect_magic(DENSITY_TREE_MAGIC, "density tree")?;
        let nr_countries = reader.read_u32()?;

        let mut countries = Vec::with_capacity(nr_countries as usize);
        for _ in 0..nr_countries {
            countries.push(Boundary::parse(reader)?);
        }
        Ok(Self { countries })
    }

    pub fn countries(&self) -> &[Boundary] {
        &self.countries
    }

    /// Smallest boundary across all countries containing `c`
    pub fn smallest_for(&self, c: PlaneCoord) -> Option<&Boundary> {
        let mut smallest: Option<&Boundary> = None;
        for country in &self.countries {
            if let Some(candidate) = country.smallest_for(c) {
                if smallest.map_or(true, |found| candidate.total_area < found.total_area) {
                    smallest = Some(candidate);
                }
            }
        }
        smallest
    }

    /// In-town test for a fixed-point coordinate. Country polygons are
    /// disjoint, so evaluation order does not matter.
    pub fn is_in_town(&self, coord: FixedCoord) -> bool {
        let c = coord.to_plane();
        self.countries
            .iter()
            .any(|country| country.is_in_town(c, country.target_density))
    }
}
