//! Extraction containers and the sort/merge phases
//!
//! Everything the front-end collects lands here: referenced node ids,
//! all nodes, candidate edges, restriction candidates, way endpoints
//! and the name pool. `prepare_*` turns the raw material into the
//! node-based graph: external ids become dense internal ids, every
//! edge gets a weight, parallel duplicates collapse to at most one
//! edge per direction, and restrictions are remapped through the way
//! endpoint table.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::boundary::classify::{classify_edges, ClassifyJob};
use crate::boundary::BoundaryList;
use crate::error::{Error, Result};
use crate::formats::{
    ExternalMemoryNode, NamesFile, NodeBasedEdge, NodeGraphWriter, RestrictionsFile,
    TurnRestriction,
};
use crate::geo::{great_circle_distance, FixedCoord};
use crate::{NodeId, EMPTY_NAMEID, SPECIAL_NODEID, SPECIAL_OSM_NODEID};

/// How a candidate edge's weight is derived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightData {
    Invalid,
    /// Speeds in km/h; which one applies depends on the in-town
    /// classification of the edge's source
    Speed { city: f64, country: f64 },
    /// Fixed traversal duration in seconds for one segment
    EdgeDuration(f64),
    /// Fixed traversal duration in seconds inherited from the way
    WayDuration(f64),
}

/// Candidate edge as collected from the input, before remapping
#[derive(Debug, Clone)]
pub struct ExtractionEdge {
    pub osm_source_id: u64,
    pub osm_target_id: u64,
    pub source: NodeId,
    pub target: NodeId,
    pub name_id: u32,
    pub weight: i32,
    pub forward: bool,
    pub backward: bool,
    pub is_split: bool,
    pub weight_data: WeightData,
    pub source_coordinate: FixedCoord,
}

impl ExtractionEdge {
    pub fn new(
        osm_source_id: u64,
        osm_target_id: u64,
        name_id: u32,
        forward: bool,
        backward: bool,
        weight_data: WeightData,
    ) -> Self {
        Self {
            osm_source_id,
            osm_target_id,
            source: SPECIAL_NODEID,
            target: SPECIAL_NODEID,
            name_id,
            weight: 0,
            forward,
            backward,
            is_split: false,
            weight_data,
            source_coordinate: FixedCoord::new(0, 0),
        }
    }
}

/// Turn-restriction candidate; node fields resolve during
/// `prepare_restrictions` and stay `None` when any lookup fails
#[derive(Debug, Clone)]
pub struct RestrictionCandidate {
    pub from_way: u64,
    pub to_way: u64,
    pub via_osm_node: u64,
    pub is_only: bool,
    pub from_node: Option<NodeId>,
    pub via_node: Option<NodeId>,
    pub to_node: Option<NodeId>,
    pub invalid: bool,
}

impl RestrictionCandidate {
    pub fn new(from_way: u64, via_osm_node: u64, to_way: u64, is_only: bool) -> Self {
        Self {
            from_way,
            to_way,
            via_osm_node,
            is_only,
            from_node: None,
            via_node: None,
            to_node: None,
            invalid: false,
        }
    }
}

/// First and last segment endpoints of a way, for restriction remapping
#[derive(Debug, Clone, Copy)]
pub struct WaySegmentEndpoints {
    pub way_id: u64,
    pub first_segment_source: u64,
    pub first_segment_target: u64,
    pub last_segment_source: u64,
    pub last_segment_target: u64,
}

/// Hook invoked once per segment before the weight formula runs; the
/// scripting collaborator plugs in here and may rewrite the weight data
pub trait SegmentHook {
    fn process_segment(
        &self,
        source: FixedCoord,
        target: &ExternalMemoryNode,
        distance: f64,
        weight_data: &mut WeightData,
    );
}

/// Default hook: leaves the weight data untouched
pub struct NoopSegmentHook;

impl SegmentHook for NoopSegmentHook {
    fn process_segment(&self, _: FixedCoord, _: &ExternalMemoryNode, _: f64, _: &mut WeightData) {}
}

pub struct ExtractionContainers {
    pub used_node_ids: Vec<u64>,
    pub all_nodes: Vec<ExternalMemoryNode>,
    pub all_edges: Vec<ExtractionEdge>,
    pub restrictions: Vec<RestrictionCandidate>,
    pub way_endpoints: Vec<WaySegmentEndpoints>,
    pub name_chars: Vec<u8>,
    pub name_offsets: Vec<u32>,
    node_id_map: HashMap<u64, NodeId>,
    max_internal_node_id: u32,
}

impl Default for ExtractionContainers {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionContainers {
    pub fn new() -> Self {
        // Four reserved empty entries (name, destination, pronunciation,
        // ref) plus the running total-length sentinel
        let name_offsets = vec![0u32; 5];
        Self {
            used_node_ids: Vec::new(),
            all_nodes: Vec::new(),
            all_edges: Vec::new(),
            restrictions: Vec::new(),
            way_endpoints: Vec::new(),
            name_chars: Vec::new(),
            name_offsets,
            node_id_map: HashMap::new(),
            max_internal_node_id: 0,
        }
    }

    /// Append a name to the pool and return its id
    pub fn add_name(&mut self, name: &str) -> u32 {
        let id = (self.name_offsets.len() - 1) as u32;
        self.name_chars.extend_from_slice(name.as_bytes());
        self.name_offsets.push(self.name_chars.len() as u32);
        id
    }

    pub fn max_internal_node_id(&self) -> u32 {
        self.max_internal_node_id
    }

    /// Phase 1: sort and dedup referenced ids, sort all nodes, and
    /// assign dense internal ids to the intersection
    pub fn prepare_nodes(&mut self) -> Result<()> {
        let started = Instant::now();
        print!("Sorting used nodes        ... ");
        self.used_node_ids.par_sort_unstable();
        self.used_node_ids.dedup();
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        print!("Sorting all nodes         ... ");
        self.all_nodes.par_sort_unstable_by_key(|node| node.osm_id);
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        print!("Building node id map      ... ");
        self.node_id_map.reserve(self.used_node_ids.len());

        let mut internal_id: u64 = 0;
        let mut node_iter = self.all_nodes.iter().peekable();
        let mut ref_iter = self.used_node_ids.iter().peekable();

        while let (Some(node), Some(&&reference)) = (node_iter.peek(), ref_iter.peek()) {
            if node.osm_id < reference {
                node_iter.next();
                continue;
            }
            if node.osm_id > reference {
                ref_iter.next();
                continue;
            }
            if internal_id > NodeId::MAX as u64 {
                return Err(Error::TooManyNodes(internal_id));
            }
            self.node_id_map.insert(reference, internal_id as NodeId);
            internal_id += 1;
            node_iter.next();
            ref_iter.next();
        }

        if internal_id > NodeId::MAX as u64 {
            return Err(Error::TooManyNodes(internal_id));
        }
        self.max_internal_node_id = internal_id as u32;
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Write the used-node records, in external-id order
    pub fn write_nodes(&self, writer: &mut NodeGraphWriter) -> Result<()> {
        let started = Instant::now();
        print!("Writing used nodes        ... ");
        writer.write_node_count(self.max_internal_node_id)?;

        let mut node_iter = self.all_nodes.iter().peekable();
        let mut ref_iter = self.used_node_ids.iter().peekable();
        while let (Some(node), Some(&&reference)) = (node_iter.peek(), ref_iter.peek()) {
            if reference < node.osm_id {
                ref_iter.next();
                continue;
            }
            if reference > node.osm_id {
                node_iter.next();
                continue;
            }
            writer.write_node(node)?;
            node_iter.next();
            ref_iter.next();
        }
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
        println!("Processed {} nodes", self.max_internal_node_id);
        Ok(())
    }

    /// Phases 2–5: attach start coordinates, classify, weight, remap,
    /// orient, and collapse parallel edges
    pub fn prepare_edges(
        &mut self,
        hook: &dyn SegmentHook,
        boundaries: &BoundaryList,
    ) -> Result<()> {
        self.set_start_coordinates();
        let in_town = self.classify_edge_starts(boundaries);
        self.compute_weights(hook, &in_town)?;
        self.sort_by_internal_ids_and_name();
        self.collapse_parallel_edges();
        Ok(())
    }

    /// Phase 2: sort edges by external source id, attach source
    /// coordinates and internal source ids, collapse loops
    fn set_start_coordinates(&mut self) {
        let started = Instant::now();
        print!("Sorting edges by start    ... ");
        self.all_edges
            .par_sort_unstable_by_key(|edge| edge.osm_source_id);
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        print!("Setting start coords      ... ");
        let mut node_index = 0usize;
        let mut edge_index = 0usize;

        while edge_index < self.all_edges.len() && node_index < self.all_nodes.len() {
            let edge = &mut self.all_edges[edge_index];
            let node = &self.all_nodes[node_index];

            if edge.osm_source_id < node.osm_id {
                tracing::debug!(osm_id = edge.osm_source_id, "edge references unknown node");
                edge.source = SPECIAL_NODEID;
                edge_index += 1;
                continue;
            }
            if edge.osm_source_id > node.osm_id {
                node_index += 1;
                continue;
            }

            // collapse loops
            if edge.osm_source_id == edge.osm_target_id {
                edge.source = SPECIAL_NODEID;
                edge.target = SPECIAL_NODEID;
                edge_index += 1;
                continue;
            }

            match self.node_id_map.get(&node.osm_id) {
                Some(&internal) => {
                    edge.source = internal;
                    edge.source_coordinate = node.coord;
                }
                None => {
                    edge.source = SPECIAL_NODEID;
                }
            }
            edge_index += 1;
        }

        // Everything past the merge frontier references nodes we never
        // saw (clipped inputs)
        for edge in &mut self.all_edges[edge_index..] {
            tracing::debug!(osm_id = edge.osm_source_id, "edge references unknown node");
            edge.source = SPECIAL_NODEID;
            edge.osm_source_id = SPECIAL_OSM_NODEID;
        }
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
    }

    /// Phase 3: sort by external target id and classify every valid
    /// edge's source coordinate against the boundary forest
    fn classify_edge_starts(&mut self, boundaries: &BoundaryList) -> Vec<AtomicBool> {
        let started = Instant::now();
        print!("Sorting edges by target   ... ");
        self.all_edges
            .par_sort_unstable_by_key(|edge| edge.osm_target_id);
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let mut jobs: Vec<ClassifyJob> = Vec::new();
        let mut node_index = 0usize;
        let mut edge_index = 0usize;

        while edge_index < self.all_edges.len() && node_index < self.all_nodes.len() {
            let edge = &self.all_edges[edge_index];
            let node = &self.all_nodes[node_index];

            if edge.source == SPECIAL_NODEID {
                edge_index += 1;
                continue;
            }
            if edge.osm_target_id < node.osm_id {
                edge_index += 1;
                continue;
            }
            if edge.osm_target_id > node.osm_id {
                node_index += 1;
                continue;
            }

            jobs.push(ClassifyJob {
                edge_index,
                coord: edge.source_coordinate,
            });
            edge_index += 1;
        }

        println!("Finished queueing {} edges", jobs.len());
        let in_town: Vec<AtomicBool> = (0..self.all_edges.len())
            .map(|_| AtomicBool::new(false))
            .collect();
        let totals = classify_edges(boundaries, &jobs, &in_town);
        println!(
            "Classified {} city / {} country edge starts",
            totals.city, totals.country
        );
        in_town
    }

    /// Phase 4: weight assignment, target remap and orientation.
    /// Relies on the edge order of `classify_edge_starts` so the
    /// in-town slots line up.
    fn compute_weights(&mut self, hook: &dyn SegmentHook, in_town: &[AtomicBool]) -> Result<()> {
        let started = Instant::now();
        println!("Computing edge weights for {} edges", self.all_edges.len());
        let bar = ProgressBar::new(self.all_edges.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{wide_bar}] {pos}/{len}")
                .expect("static progress template"),
        );

        let mut node_index = 0usize;
        let mut edge_index = 0usize;

        while edge_index < self.all_edges.len() && node_index < self.all_nodes.len() {
            let edge = &mut self.all_edges[edge_index];
            let node = &self.all_nodes[node_index];

            if edge.source == SPECIAL_NODEID {
                edge_index += 1;
                bar.inc(1);
                continue;
            }
            if edge.osm_target_id < node.osm_id {
                edge.target = SPECIAL_NODEID;
                edge_index += 1;
                bar.inc(1);
                continue;
            }
            if edge.osm_target_id > node.osm_id {
                node_index += 1;
                continue;
            }

            let distance = great_circle_distance(edge.source_coordinate, node.coord);
            hook.process_segment(edge.source_coordinate, node, distance, &mut edge.weight_data);

            let in_town_here = in_town[edge_index].load(std::sync::atomic::Ordering::Relaxed);
            let weight = match edge.weight_data {
                WeightData::EdgeDuration(duration) | WeightData::WayDuration(duration) => {
                    duration * 10.0
                }
                WeightData::Speed { city, country } => {
                    let speed = if in_town_here { city } else { country };
                    (distance * 10.0) / (speed / 3.6)
                }
                WeightData::Invalid => {
                    return Err(Error::InvalidWeight {
                        segment: format!(
                            "{},{} to {},{}",
                            edge.source_coordinate.lon_degrees(),
                            edge.source_coordinate.lat_degrees(),
                            node.coord.lon_degrees(),
                            node.coord.lat_degrees()
                        ),
                    });
                }
            };
            edge.weight = std::cmp::max(1, (weight + 0.5).floor() as i32);

            match self.node_id_map.get(&node.osm_id) {
                Some(&internal) => edge.target = internal,
                None => edge.target = SPECIAL_NODEID,
            }

            // orient edges consistently: source id < target id,
            // required by the parallel-edge collapse
            if edge.target != SPECIAL_NODEID && edge.source > edge.target {
                std::mem::swap(&mut edge.source, &mut edge.target);
                std::mem::swap(&mut edge.forward, &mut edge.backward);
            }
            edge_index += 1;
            bar.inc(1);
        }

        for edge in &mut self.all_edges[edge_index..] {
            tracing::debug!(osm_id = edge.osm_target_id, "edge references unknown node");
            edge.target = SPECIAL_NODEID;
        }
        bar.finish_and_clear();
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Phase 5a: order edge groups by internal ids, name bytes breaking
    /// ties so parallel duplicates become adjacent deterministically.
    /// Sentinel edges sort last.
    fn sort_by_internal_ids_and_name(&mut self) {
        let started = Instant::now();
        print!("Sorting edges by renumbered start ... ");

        let mut edges = std::mem::take(&mut self.all_edges);
        let name_offsets = &self.name_offsets;
        let name_chars = &self.name_chars;

        edges.par_sort_unstable_by(|lhs, rhs| {
            cmp_source_target_name(lhs, rhs, name_offsets, name_chars)
        });
        self.all_edges = edges;
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
    }

    /// Phase 5b: per (source, target) group keep the minimum-weight
    /// edge of each direction, invalidate the rest
    fn collapse_parallel_edges(&mut self) {
        let edges = &mut self.all_edges;
        let mut i = 0usize;

        while i < edges.len() {
            if edges[i].source == SPECIAL_NODEID {
                // only sentinel edges remain
                break;
            }
            if edges[i].target == SPECIAL_NODEID {
                i += 1;
                continue;
            }

            let start_idx = i;
            let source = edges[i].source;
            let target = edges[i].target;

            let mut min_forward_weight = i32::MAX;
            let mut min_backward_weight = i32::MAX;
            let mut min_forward_idx = usize::MAX;
            let mut min_backward_idx = usize::MAX;

            while i < edges.len() && edges[i].source == source && edges[i].target == target {
                if edges[i].forward && edges[i].weight < min_forward_weight {
                    min_forward_idx = i;
                    min_forward_weight = edges[i].weight;
                }
                if edges[i].backward && edges[i].weight < min_backward_weight {
                    min_backward_idx = i;
                    min_backward_weight = edges[i].weight;
                }
                i += 1;
            }

            let has_forward = min_forward_idx != usize::MAX;
            let has_backward = min_backward_idx != usize::MAX;

            if min_forward_idx == min_backward_idx && has_forward {
                edges[min_forward_idx].is_split = false;
                edges[min_forward_idx].forward = true;
                edges[min_forward_idx].backward = true;
            } else {
                if has_forward {
                    edges[min_forward_idx].forward = true;
                    edges[min_forward_idx].backward = false;
                    edges[min_forward_idx].is_split = has_backward;
                }
                if has_backward {
                    let edge = &mut edges[min_backward_idx];
                    std::mem::swap(&mut edge.source, &mut edge.target);
                    edge.forward = true;
                    edge.backward = false;
                    edge.is_split = has_forward;
                }
            }

            for j in start_idx..i {
                if j == min_forward_idx || j == min_backward_idx {
                    continue;
                }
                edges[j].source = SPECIAL_NODEID;
                edges[j].target = SPECIAL_NODEID;
            }
        }
    }

    /// Phase 6a: stream the surviving edges behind a count placeholder
    pub fn write_edges(&self, writer: &mut NodeGraphWriter) -> Result<u64> {
        let started = Instant::now();
        print!("Writing used edges        ... ");
        writer.begin_edges()?;

        for edge in &self.all_edges {
            if edge.source == SPECIAL_NODEID || edge.target == SPECIAL_NODEID {
                continue;
            }
            writer.write_edge(&NodeBasedEdge {
                source: edge.source,
                target: edge.target,
                name_id: edge.name_id,
                weight: edge.weight,
                forward: edge.forward,
                backward: edge.backward,
                is_split: edge.is_split,
            })?;
        }

        let written = writer.finish()?;
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
        println!("Processed {written} edges");
        Ok(written)
    }

    /// Phase 6b: remap restriction endpoints through the way-endpoint
    /// table, invalidating on any missing lookup
    pub fn prepare_restrictions(&mut self) {
        let started = Instant::now();
        print!("Sorting used ways         ... ");
        self.way_endpoints.par_sort_unstable_by_key(|way| way.way_id);
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        print!("Fixing restriction starts ... ");
        self.restrictions
            .par_sort_unstable_by_key(|restriction| restriction.from_way);

        let mut way_index = 0usize;
        let mut restriction_index = 0usize;
        while way_index < self.way_endpoints.len() && restriction_index < self.restrictions.len() {
            let way = &self.way_endpoints[way_index];
            let restriction = &mut self.restrictions[restriction_index];

            if way.way_id < restriction.from_way {
                way_index += 1;
                continue;
            }
            if way.way_id > restriction.from_way {
                tracing::debug!(way = restriction.from_way, "restriction references unknown way");
                restriction.invalid = true;
                restriction_index += 1;
                continue;
            }

            let via = restriction.via_osm_node;
            if !self.node_id_map.contains_key(&via) {
                tracing::debug!(node = via, "restriction references unknown via node");
                restriction.invalid = true;
                restriction_index += 1;
                continue;
            }

            if way.first_segment_source == via {
                match self.node_id_map.get(&way.first_segment_target) {
                    Some(&from) => restriction.from_node = Some(from),
                    None => {
                        restriction.invalid = true;
                        restriction_index += 1;
                        way_index += 1;
                        continue;
                    }
                }
            } else if way.last_segment_target == via {
                match self.node_id_map.get(&way.last_segment_source) {
                    Some(&from) => restriction.from_node = Some(from),
                    None => {
                        restriction.invalid = true;
                        restriction_index += 1;
                        way_index += 1;
                        continue;
                    }
                }
            }
            restriction_index += 1;
        }
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        print!("Fixing restriction ends   ... ");
        self.restrictions
            .par_sort_unstable_by_key(|restriction| restriction.to_way);

        let mut way_index = 0usize;
        let mut restriction_index = 0usize;
        while way_index < self.way_endpoints.len() && restriction_index < self.restrictions.len() {
            let way = &self.way_endpoints[way_index];
            let restriction = &mut self.restrictions[restriction_index];

            if way.way_id < restriction.to_way {
                way_index += 1;
                continue;
            }
            if restriction.invalid || restriction.from_node.is_none() {
                restriction_index += 1;
                continue;
            }
            if way.way_id > restriction.to_way {
                tracing::debug!(way = restriction.to_way, "restriction references unknown way");
                restriction.invalid = true;
                restriction_index += 1;
                continue;
            }

            let via = restriction.via_osm_node;
            match self.node_id_map.get(&via) {
                Some(&internal) => restriction.via_node = Some(internal),
                None => {
                    restriction.invalid = true;
                    restriction_index += 1;
                    continue;
                }
            }

            if way.first_segment_source == via {
                match self.node_id_map.get(&way.first_segment_target) {
                    Some(&to) => restriction.to_node = Some(to),
                    None => {
                        restriction.invalid = true;
                        restriction_index += 1;
                        way_index += 1;
                        continue;
                    }
                }
            } else if way.last_segment_target == via {
                match self.node_id_map.get(&way.last_segment_source) {
                    Some(&to) => restriction.to_node = Some(to),
                    None => {
                        restriction.invalid = true;
                        restriction_index += 1;
                        way_index += 1;
                        continue;
                    }
                }
            }
            restriction_index += 1;
        }
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
    }

    /// Phase 6c: write the fully-resolved triples
    pub fn write_restrictions<P: AsRef<std::path::Path>>(&self, path: P) -> Result<u32> {
        let valid: Vec<TurnRestriction> = self
            .restrictions
            .iter()
            .filter(|restriction| !restriction.invalid)
            .filter_map(|restriction| {
                Some(TurnRestriction {
                    from: restriction.from_node?,
                    via: restriction.via_node?,
                    to: restriction.to_node?,
                    is_only: restriction.is_only,
                })
            })
            .collect();

        let written = RestrictionsFile::write(path, &valid)?;
        println!("usable restrictions: {written}");
        Ok(written)
    }

    /// Phase 6d: serialise the name table; consumes the offsets
    pub fn write_names<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<()> {
        let started = Instant::now();
        print!("writing street name index ... ");
        let offsets = std::mem::take(&mut self.name_offsets);
        NamesFile::write(path, offsets, &self.name_chars)?;
        println!("ok, after {:.1}s", started.elapsed().as_secs_f64());
        Ok(())
    }
}

/// Name bytes of `name_id`, given the cumulative offset table
fn name_bytes<'a>(name_id: u32, offsets: &[u32], chars: &'a [u8]) -> &'a [u8] {
    let begin = offsets[name_id as usize] as usize;
    let end = offsets[name_id as usize + 1] as usize;
    &chars[begin..end]
}

/// Group ordering for the parallel-edge collapse: by source, then
/// target, then name bytes. Sentinel ids compare equal beyond the
/// sentinel so invalid edges gather at the tail; unnamed edges sort
/// after named ones.
fn cmp_source_target_name(
    lhs: &ExtractionEdge,
    rhs: &ExtractionEdge,
    offsets: &[u32],
    chars: &[u8],
) -> Ordering {
    match lhs.source.cmp(&rhs.source) {
        Ordering::Equal => {}
        unequal => return unequal,
    }
    if lhs.source == SPECIAL_NODEID {
        return Ordering::Equal;
    }

    match lhs.target.cmp(&rhs.target) {
        Ordering::Equal => {}
        unequal => return unequal,
    }
    if lhs.target == SPECIAL_NODEID {
        return Ordering::Equal;
    }

    if lhs.name_id == rhs.name_id {
        return Ordering::Equal;
    }
    if lhs.name_id == EMPTY_NAMEID {
        return Ordering::Greater;
    }
    if rhs.name_id == EMPTY_NAMEID {
        return Ordering::Less;
    }

    name_bytes(lhs.name_id, offsets, chars).cmp(name_bytes(rhs.name_id, offsets, chars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::FixedCoord;

    fn node(osm_id: u64, lon: i32, lat: i32) -> ExternalMemoryNode {
        ExternalMemoryNode {
            coord: FixedCoord::new(lon, lat),
            osm_id,
        }
    }

    fn speed_edge(source: u64, target: u64, speed: f64) -> ExtractionEdge {
        ExtractionEdge::new(
            source,
            target,
            EMPTY_NAMEID,
            true,
            false,
            WeightData::Speed {
                city: speed,
                country: speed,
            },
        )
    }

    fn prepared_containers(edges: Vec<ExtractionEdge>) -> ExtractionContainers {
        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![
            node(100, 4_900_000, 52_370_000),
            node(101, 4_901_000, 52_370_000),
            node(102, 4_902_000, 52_370_000),
        ];
        containers.used_node_ids = vec![100, 101, 102];
        containers.all_edges = edges;
        containers.prepare_nodes().unwrap();
        containers
            .prepare_edges(&NoopSegmentHook, &BoundaryList::default())
            .unwrap();
        containers
    }

    fn surviving(containers: &ExtractionContainers) -> Vec<&ExtractionEdge> {
        containers
            .all_edges
            .iter()
            .filter(|edge| edge.source != SPECIAL_NODEID && edge.target != SPECIAL_NODEID)
            .collect()
    }

    #[test]
    fn test_dense_remap_is_contiguous() {
        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![node(500, 0, 0), node(100, 0, 0), node(300, 0, 0)];
        containers.used_node_ids = vec![300, 100, 500, 300];
        containers.prepare_nodes().unwrap();

        assert_eq!(containers.max_internal_node_id(), 3);
        assert_eq!(containers.node_id_map[&100], 0);
        assert_eq!(containers.node_id_map[&300], 1);
        assert_eq!(containers.node_id_map[&500], 2);
    }

    #[test]
    fn test_unreferenced_nodes_get_no_id() {
        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![node(100, 0, 0), node(200, 0, 0)];
        containers.used_node_ids = vec![100, 999];
        containers.prepare_nodes().unwrap();

        assert_eq!(containers.max_internal_node_id(), 1);
        assert!(!containers.node_id_map.contains_key(&200));
        assert!(!containers.node_id_map.contains_key(&999));
    }

    #[test]
    fn test_loops_and_unknown_references_collapse() {
        let containers = prepared_containers(vec![
            speed_edge(100, 100, 50.0), // loop
            speed_edge(100, 101, 50.0),
            speed_edge(100, 777, 50.0), // unknown target
            speed_edge(888, 101, 50.0), // unknown source
        ]);

        let live = surviving(&containers);
        assert_eq!(live.len(), 1);
        assert_eq!((live[0].source, live[0].target), (0, 1));
    }

    #[test]
    fn test_orientation_source_below_target() {
        // 102 → 100 is swapped to (0, 2) with flipped flags during the
        // weight pass; the collapse then re-expresses the lone backward
        // minimum as a forward edge from the swapped side
        let containers = prepared_containers(vec![speed_edge(102, 100, 50.0)]);
        let live = surviving(&containers);
        assert_eq!(live.len(), 1);
        assert_eq!((live[0].source, live[0].target), (2, 0));
        assert!(live[0].forward);
        assert!(!live[0].backward);
        assert!(!live[0].is_split);
    }

    #[test]
    fn test_parallel_edge_collapse_keeps_min_per_direction() {
        // Two forward edges (7 and 4) and one backward edge (6)
        // between the same endpoints
        let mut forward_heavy = speed_edge(100, 101, 50.0);
        forward_heavy.weight_data = WeightData::EdgeDuration(0.7);
        let mut forward_light = speed_edge(100, 101, 50.0);
        forward_light.weight_data = WeightData::EdgeDuration(0.4);
        let mut backward = speed_edge(100, 101, 50.0);
        backward.forward = false;
        backward.backward = true;
        backward.weight_data = WeightData::EdgeDuration(0.6);

        let containers = prepared_containers(vec![forward_heavy, forward_light, backward]);

        let mut live: Vec<(NodeId, NodeId, i32, bool, bool, bool)> = surviving(&containers)
            .iter()
            .map(|edge| {
                (
                    edge.source,
                    edge.target,
                    edge.weight,
                    edge.forward,
                    edge.backward,
                    edge.is_split,
                )
            })
            .collect();
        live.sort();

        // u→v weight 4 and v→u weight 6, both forward-only and split
        assert_eq!(live, vec![(0, 1, 4, true, false, true), (1, 0, 6, true, false, true)]);
    }

    #[test]
    fn test_shared_min_edge_becomes_bidirectional() {
        let mut both = speed_edge(100, 101, 50.0);
        both.backward = true;
        both.weight_data = WeightData::EdgeDuration(0.4);
        let mut heavier = speed_edge(100, 101, 50.0);
        heavier.weight_data = WeightData::EdgeDuration(0.9);

        let containers = prepared_containers(vec![both, heavier]);
        let live = surviving(&containers);
        assert_eq!(live.len(), 1);
        assert!(live[0].forward && live[0].backward);
        assert!(!live[0].is_split);
        assert_eq!(live[0].weight, 4);
    }

    #[test]
    fn test_speed_weight_formula() {
        // ~100 m eastward at 52.37°N; country speed applies with an
        // empty boundary forest
        let a = FixedCoord::new(4_900_000, 52_370_000);
        let step = 100.0 / great_circle_distance(a, FixedCoord::new(4_901_000, 52_370_000));
        let lon_delta = (1000.0 * step).round() as i32;

        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![
            node(100, 4_900_000, 52_370_000),
            node(101, 4_900_000 + lon_delta, 52_370_000),
        ];
        containers.used_node_ids = vec![100, 101];
        containers.all_edges = vec![ExtractionEdge::new(
            100,
            101,
            EMPTY_NAMEID,
            true,
            false,
            WeightData::Speed {
                city: 50.0,
                country: 90.0,
            },
        )];
        containers.prepare_nodes().unwrap();
        containers
            .prepare_edges(&NoopSegmentHook, &BoundaryList::default())
            .unwrap();

        let live = surviving(&containers);
        assert_eq!(live.len(), 1);
        // weight = floor(d * 10 / (90 / 3.6) + 0.5) = 40 for d = 100 m
        assert_eq!(live[0].weight, 40);
    }

    #[test]
    fn test_duration_weight_and_floor() {
        let containers = prepared_containers(vec![{
            let mut edge = speed_edge(100, 101, 50.0);
            edge.weight_data = WeightData::WayDuration(12.34);
            edge
        }]);
        let live = surviving(&containers);
        // floor(12.34 * 10 + 0.5) = 123
        assert_eq!(live[0].weight, 123);
    }

    #[test]
    fn test_invalid_weight_aborts() {
        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![node(100, 0, 0), node(101, 1000, 0)];
        containers.used_node_ids = vec![100, 101];
        containers.all_edges = vec![ExtractionEdge::new(
            100,
            101,
            EMPTY_NAMEID,
            true,
            false,
            WeightData::Invalid,
        )];
        containers.prepare_nodes().unwrap();

        let err = containers
            .prepare_edges(&NoopSegmentHook, &BoundaryList::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { .. }));
    }

    #[test]
    fn test_minimum_weight_is_one() {
        let containers = prepared_containers(vec![{
            let mut edge = speed_edge(100, 101, 50.0);
            edge.weight_data = WeightData::EdgeDuration(0.0);
            edge
        }]);
        let live = surviving(&containers);
        assert_eq!(live[0].weight, 1);
    }

    #[test]
    fn test_name_comparator_orders_groups() {
        let mut containers = ExtractionContainers::new();
        let kerk = containers.add_name("Kerkstraat");
        let aalto = containers.add_name("Aaltolaan");

        let offsets = containers.name_offsets.clone();
        let chars = containers.name_chars.clone();

        let mut a = speed_edge(0, 0, 50.0);
        a.source = 1;
        a.target = 2;
        a.name_id = kerk;
        let mut b = a.clone();
        b.name_id = aalto;
        let mut c = a.clone();
        c.name_id = EMPTY_NAMEID;
        let mut sentinel = a.clone();
        sentinel.source = SPECIAL_NODEID;
        sentinel.target = SPECIAL_NODEID;

        assert_eq!(
            cmp_source_target_name(&b, &a, &offsets, &chars),
            Ordering::Less
        );
        assert_eq!(
            cmp_source_target_name(&a, &c, &offsets, &chars),
            Ordering::Less,
            "unnamed edges sort last within the group"
        );
        assert_eq!(
            cmp_source_target_name(&a, &sentinel, &offsets, &chars),
            Ordering::Less
        );
    }

    #[test]
    fn test_restriction_remapping() {
        let mut containers = ExtractionContainers::new();
        containers.all_nodes = vec![
            node(100, 0, 0),
            node(101, 1000, 0),
            node(102, 2000, 0),
            node(103, 3000, 0),
        ];
        containers.used_node_ids = vec![100, 101, 102, 103];
        containers.prepare_nodes().unwrap();

        // Way 7 runs 100 → 101, way 9 runs 101 → 102; turning from
        // way 7 onto way 9 over via node 101 is forbidden
        containers.way_endpoints = vec![
            WaySegmentEndpoints {
                way_id: 7,
                first_segment_source: 100,
                first_segment_target: 101,
                last_segment_source: 100,
                last_segment_target: 101,
            },
            WaySegmentEndpoints {
                way_id: 9,
                first_segment_source: 101,
                first_segment_target: 102,
                last_segment_source: 101,
                last_segment_target: 102,
            },
        ];
        containers.restrictions = vec![
            RestrictionCandidate::new(7, 101, 9, false),
            // references a way that does not exist
            RestrictionCandidate::new(7, 101, 99, false),
        ];

        containers.prepare_restrictions();

        // Only fully-resolved candidates survive the write filter
        let resolved: Vec<&RestrictionCandidate> = containers
            .restrictions
            .iter()
            .filter(|restriction| {
                !restriction.invalid
                    && restriction.from_node.is_some()
                    && restriction.via_node.is_some()
                    && restriction.to_node.is_some()
            })
            .collect();
        assert_eq!(resolved.len(), 1);
        // way 7's far endpoint 100 → internal 0, via 101 → 1, way 9's
        // far endpoint 102 → 2
        assert_eq!(resolved[0].from_node, Some(0));
        assert_eq!(resolved[0].via_node, Some(1));
        assert_eq!(resolved[0].to_node, Some(2));
    }
}
