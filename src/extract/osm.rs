//! OSM PBF front-end
//!
//! Reads nodes, ways and restriction relations from a PBF extract and
//! fills the extraction containers. Ways pass through a built-in car
//! profile that yields a country/city speed pair per highway class;
//! `maxspeed` overrides both, `oneway` trims the direction flags, and
//! ferry-style `duration` tags turn into per-segment durations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use osmpbf::{Element, ElementReader};

use crate::extract::containers::{
    ExtractionContainers, ExtractionEdge, RestrictionCandidate, WaySegmentEndpoints, WeightData,
};
use crate::formats::ExternalMemoryNode;
use crate::geo::FixedCoord;
use crate::EMPTY_NAMEID;

struct RawWay {
    id: i64,
    nodes: Vec<i64>,
    tags: Vec<(String, String)>,
}

struct RawRestriction {
    from_way: i64,
    via_node: i64,
    to_way: i64,
    is_only: bool,
}

/// Read a PBF extract into freshly-filled extraction containers
pub fn read_pbf<P: AsRef<Path>>(path: P) -> Result<ExtractionContainers> {
    let path = path.as_ref();

    println!("Pass 1/3: Reading nodes...");
    let nodes = extract_nodes(path)?;
    println!("  ✓ {} nodes", nodes.len());

    println!("Pass 2/3: Reading ways...");
    let ways = extract_ways(path)?;
    println!("  ✓ {} ways", ways.len());

    println!("Pass 3/3: Reading restriction relations...");
    let restrictions = extract_restrictions(path)?;
    println!("  ✓ {} restrictions", restrictions.len());

    let mut containers = ExtractionContainers::new();
    containers.all_nodes = nodes;

    let mut name_ids: HashMap<String, u32> = HashMap::new();
    let mut routable_ways = 0usize;

    for way in &ways {
        let Some(profile) = car_profile(&way.tags) else {
            continue;
        };
        if way.nodes.len() < 2 {
            continue;
        }
        routable_ways += 1;

        let name_id = match way.tags.iter().find(|(key, _)| key == "name") {
            Some((_, name)) if !name.is_empty() => *name_ids
                .entry(name.clone())
                .or_insert_with(|| containers.add_name(name)),
            _ => EMPTY_NAMEID,
        };

        let segment_count = way.nodes.len() - 1;
        let weight_data = match profile.duration {
            // A way-level duration is split evenly across its segments
            Some(duration) => WeightData::WayDuration(duration / segment_count as f64),
            None => WeightData::Speed {
                city: profile.city_speed,
                country: profile.country_speed,
            },
        };

        for node in &way.nodes {
            containers.used_node_ids.push(*node as u64);
        }
        for pair in way.nodes.windows(2) {
            containers.all_edges.push(ExtractionEdge::new(
                pair[0] as u64,
                pair[1] as u64,
                name_id,
                profile.forward,
                profile.backward,
                weight_data,
            ));
        }

        containers.way_endpoints.push(WaySegmentEndpoints {
            way_id: way.id as u64,
            first_segment_source: way.nodes[0] as u64,
            first_segment_target: way.nodes[1] as u64,
            last_segment_source: way.nodes[way.nodes.len() - 2] as u64,
            last_segment_target: way.nodes[way.nodes.len() - 1] as u64,
        });
    }
    println!("  ✓ {} routable ways", routable_ways);

    for restriction in &restrictions {
        containers.restrictions.push(RestrictionCandidate::new(
            restriction.from_way as u64,
            restriction.via_node as u64,
            restriction.to_way as u64,
            restriction.is_only,
        ));
    }

    Ok(containers)
}

fn extract_nodes(path: &Path) -> Result<Vec<ExternalMemoryNode>> {
    let reader = ElementReader::from_path(path)?;
    let nodes = Mutex::new(Vec::new());

    reader
        .for_each(|element| {
            let (id, lon, lat) = match element {
                Element::Node(node) => (node.id(), node.lon(), node.lat()),
                Element::DenseNode(node) => (node.id(), node.lon(), node.lat()),
                _ => return,
            };
            nodes.lock().unwrap().push(ExternalMemoryNode {
                coord: FixedCoord::from_degrees(lon, lat),
                osm_id: id as u64,
            });
        })
        .context("Failed to read nodes")?;

    Ok(nodes.into_inner().unwrap())
}

fn extract_ways(path: &Path) -> Result<Vec<RawWay>> {
    let reader = ElementReader::from_path(path)?;
    let ways = Mutex::new(Vec::new());

    reader
        .for_each(|element| {
            if let Element::Way(way) = element {
                let tags: Vec<(String, String)> = way
                    .tags()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect();
                // Only highway and ferry ways can become edges
                if !tags
                    .iter()
                    .any(|(key, value)| key == "highway" || (key == "route" && value == "ferry"))
                {
                    return;
                }
                ways.lock().unwrap().push(RawWay {
                    id: way.id(),
                    nodes: way.refs().collect(),
                    tags,
                });
            }
        })
        .context("Failed to read ways")?;

    Ok(ways.into_inner().unwrap())
}

fn extract_restrictions(path: &Path) -> Result<Vec<RawRestriction>> {
    let reader = ElementReader::from_path(path)?;
    let restrictions = Mutex::new(Vec::new());

    reader
        .for_each(|element| {
            if let Element::Relation(relation) = element {
                let mut is_restriction = false;
                let mut is_only = false;
                for (key, value) in relation.tags() {
                    if key == "type" && value == "restriction" {
                        is_restriction = true;
                    }
                    if key == "restriction" {
                        is_only = value.starts_with("only_");
                    }
                }
                if !is_restriction {
                    return;
                }

                let mut from_way = None;
                let mut via_node = None;
                let mut to_way = None;
                for member in relation.members() {
                    let role = member.role().unwrap_or("");
                    match (member.member_type, role) {
                        (osmpbf::RelMemberType::Way, "from") => from_way = Some(member.member_id),
                        (osmpbf::RelMemberType::Node, "via") => via_node = Some(member.member_id),
                        (osmpbf::RelMemberType::Way, "to") => to_way = Some(member.member_id),
                        _ => {}
                    }
                }

                if let (Some(from_way), Some(via_node), Some(to_way)) = (from_way, via_node, to_way)
                {
                    restrictions.lock().unwrap().push(RawRestriction {
                        from_way,
                        via_node,
                        to_way,
                        is_only,
                    });
                }
            }
        })
        .context("Failed to read relations")?;

    Ok(restrictions.into_inner().unwrap())
}

struct CarWay {
    country_speed: f64,
    city_speed: f64,
    forward: bool,
    backward: bool,
    duration: Option<f64>,
}

fn tag<'a>(tags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(tag_key, _)| tag_key == key)
        .map(|(_, value)| value.as_str())
}

fn is_denied(value: Option<&str>) -> bool {
    matches!(
        value,
        Some("no") | Some("private") | Some("agricultural") | Some("forestry") | Some("delivery")
    )
}

/// Car access rules and speeds for one way; `None` means not routable
fn car_profile(tags: &[(String, String)]) -> Option<CarWay> {
    // Ferries are timed, not driven
    if tag(tags, "route") == Some("ferry") {
        let duration = parse_duration(tag(tags, "duration")?)?;
        return Some(CarWay {
            country_speed: 0.0,
            city_speed: 0.0,
            forward: true,
            backward: true,
            duration: Some(duration),
        });
    }

    let highway = tag(tags, "highway")?;

    // (country km/h, city km/h) per highway class
    let (country_speed, city_speed) = match highway {
        "motorway" => (110.0, 90.0),
        "motorway_link" => (60.0, 45.0),
        "trunk" => (90.0, 60.0),
        "trunk_link" => (50.0, 40.0),
        "primary" => (70.0, 50.0),
        "primary_link" => (40.0, 30.0),
        "secondary" => (60.0, 45.0),
        "secondary_link" => (40.0, 30.0),
        "tertiary" => (50.0, 40.0),
        "tertiary_link" => (30.0, 25.0),
        "unclassified" => (50.0, 30.0),
        "residential" => (30.0, 25.0),
        "service" => (20.0, 15.0),
        "living_street" => (10.0, 10.0),
        _ => return None,
    };

    if is_denied(tag(tags, "motor_vehicle"))
        || is_denied(tag(tags, "vehicle"))
        || is_denied(tag(tags, "access"))
    {
        return None;
    }

    // An explicit maxspeed overrides both halves of the pair
    let (country_speed, city_speed) = match tag(tags, "maxspeed").and_then(parse_maxspeed) {
        Some(limit) => (limit, limit),
        None => (country_speed, city_speed),
    };

    let mut forward = true;
    let mut backward = true;
    let roundabout = tag(tags, "junction") == Some("roundabout");
    match tag(tags, "oneway") {
        Some("yes") | Some("1") | Some("true") => backward = false,
        Some("-1") | Some("reverse") => forward = false,
        Some("no") | Some("0") | Some("false") => {}
        _ if roundabout => backward = false,
        _ => {}
    }

    Some(CarWay {
        country_speed,
        city_speed,
        forward,
        backward,
        duration: None,
    })
}

/// Parse a maxspeed value in km/h; `NN mph` converts
fn parse_maxspeed(value: &str) -> Option<f64> {
    let value = value.trim();
    if let Some(mph) = value.strip_suffix("mph") {
        return mph.trim().parse::<f64>().ok().map(|v| v * 1.609_344);
    }
    value.parse::<f64>().ok().filter(|speed| *speed > 0.0)
}

/// Parse a duration tag into seconds: `MM` or `HH:MM` or `HH:MM:SS`
fn parse_duration(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    let numbers: Option<Vec<f64>> = parts.iter().map(|part| part.parse::<f64>().ok()).collect();
    let numbers = numbers?;
    match numbers.as_slice() {
        [minutes] => Some(minutes * 60.0),
        [hours, minutes] => Some(hours * 3600.0 + minutes * 60.0),
        [hours, minutes, seconds] => Some(hours * 3600.0 + minutes * 60.0 + seconds),
        _ => None,
    }
}
