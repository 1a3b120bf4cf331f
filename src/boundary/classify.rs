//! Parallel in-town classification
//!
//! Phase 3 of the extraction pipeline: every valid edge's source
//! coordinate is tested against the boundary forest. Jobs are
//! pre-collected, each one writes its own slot of a pre-sized result
//! vector, and the call returns only after every job has run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::boundary::BoundaryList;
use crate::geo::FixedCoord;

const PROGRESS_INTERVAL: usize = 100_000;

/// One classification task: the edge's index and its source coordinate
#[derive(Debug, Clone, Copy)]
pub struct ClassifyJob {
    pub edge_index: usize,
    pub coord: FixedCoord,
}

/// Totals reported after a classification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyTotals {
    pub city: usize,
    pub country: usize,
}

/// Classify every job against the boundary forest, writing results
/// into `in_town` (one slot per edge, sized by the caller).
pub fn classify_edges(
    boundaries: &BoundaryList,
    jobs: &[ClassifyJob],
    in_town: &[AtomicBool],
) -> ClassifyTotals {
    let city = AtomicUsize::new(0);
    let country = AtomicUsize::new(0);
    let count = AtomicUsize::new(0);
    let queued = jobs.len();

    jobs.par_iter().for_each(|job| {
        if boundaries.is_in_town(job.coord) {
            in_town[job.edge_index].store(true, Ordering::Relaxed);
            city.fetch_add(1, Ordering::Relaxed);
        } else {
            country.fetch_add(1, Ordering::Relaxed);
        }

        let done = count.fetch_add(1, Ordering::Relaxed) + 1;
        if done % PROGRESS_INTERVAL == 0 {
            let city_so_far = city.load(Ordering::Relaxed);
            let country_so_far = country.load(Ordering::Relaxed);
            let percent = (done * 100) / queued;
            println!(
                "Country: {country_so_far}, city: {city_so_far}, {done}/{queued} = {percent}%"
            );
        }
    });

    ClassifyTotals {
        city: city.into_inner(),
        country: country.into_inner(),
    }
}
