//! Shortcut path unpacking
//!
//! A CH query produces a packed path of hierarchy nodes. Expanding it
//! back into original-graph edges is a depth-first walk: each node pair
//! either resolves to an original edge or to a shortcut whose two
//! halves are pushed back onto the stack. Because the halves are pushed
//! deepest-first, the callback sees the original edges in forward
//! order, start to finish.

use crate::error::{Error, Result};
use crate::formats::{EdgePayload, ShardEdge};
use crate::graph::ShardedGraph;
use crate::NodeId;

/// Expand `packed` into original edges, invoking `callback` once per
/// edge. Pairs found by the backward search resolve through the
/// reversed backward lookup; a pair found by neither is a
/// `SegmentationFailure`.
pub fn unpack_ch_path<F>(graph: &mut ShardedGraph, packed: &[NodeId], mut callback: F) -> Result<()>
where
    F: FnMut((NodeId, NodeId), &ShardEdge),
{
    if packed.len() < 2 {
        return Ok(());
    }

    // Pushed in reverse so the first pair is popped first
    let mut stack: Vec<(NodeId, NodeId)> = Vec::with_capacity(packed.len() - 1);
    for pair in packed.windows(2).rev() {
        stack.push((pair[0], pair[1]));
    }

    while let Some((source, target)) = stack.pop() {
        let mut smallest = graph.find_smallest_forward_edge(source, target)?;
        if smallest.is_none() {
            smallest = graph.find_smallest_backward_edge(target, source)?;
        }
        let Some(edge) = smallest else {
            return Err(Error::SegmentationFailure { source, target });
        };

        match edge.payload {
            EdgePayload::Middle(Some(middle)) => {
                // Stack order: source→middle must be expanded first
                stack.push((middle, target));
                stack.push((source, middle));
            }
            // A voided shortcut cannot be expanded; its shard data is
            // incomplete
            EdgePayload::Middle(None) => {
                return Err(Error::SegmentationFailure { source, target });
            }
            EdgePayload::Geometry(_) => {
                callback((source, target), &edge);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::HsgrFile;
    use crate::graph::GraphPaths;
    use tempfile::TempDir;

    fn original(target: NodeId, weight: u32, forward: bool, backward: bool) -> ShardEdge {
        ShardEdge {
            target,
            weight,
            forward,
            backward,
            payload: EdgePayload::Geometry(0),
        }
    }

    fn shortcut(target: NodeId, weight: u32, middle: NodeId) -> ShardEdge {
        ShardEdge {
            target,
            weight,
            forward: true,
            backward: false,
            payload: EdgePayload::Middle(Some(middle)),
        }
    }

    fn open_single_shard(dir: &TempDir, node_start: NodeId, first_edges: &[u32], edges: &[ShardEdge]) -> ShardedGraph {
        let path = dir.path().join("graph.hsgr");
        HsgrFile::write(&path, 0, node_start, first_edges, edges).unwrap();
        ShardedGraph::open(&GraphPaths {
            hsgr: vec![path],
            ..Default::default()
        })
    }

    fn collect_unpacked(graph: &mut ShardedGraph, packed: &[NodeId]) -> Vec<(NodeId, NodeId, u32)> {
        let mut emitted = Vec::new();
        unpack_ch_path(graph, packed, |(source, target), edge| {
            emitted.push((source, target, edge.weight));
        })
        .unwrap();
        emitted
    }

    #[test]
    fn test_plain_path_emits_in_order() {
        // 0→1 and 1→2, no shortcuts
        let dir = TempDir::new().unwrap();
        let mut graph = open_single_shard(
            &dir,
            0,
            &[0, 1, 2],
            &[original(1, 3, true, false), original(2, 4, true, false)],
        );

        let emitted = collect_unpacked(&mut graph, &[0, 1, 2]);
        assert_eq!(emitted, vec![(0, 1, 3), (1, 2, 4)]);
    }

    #[test]
    fn test_shortcut_expands_to_both_halves() {
        // Node 0: 0→1 original, 0→2 shortcut via 1; node 1: 1→2
        let dir = TempDir::new().unwrap();
        let mut graph = open_single_shard(
            &dir,
            0,
            &[0, 2, 3],
            &[
                original(1, 3, true, false),
                shortcut(2, 7, 1),
                original(2, 4, true, false),
            ],
        );

        let emitted = collect_unpacked(&mut graph, &[0, 2]);
        assert_eq!(emitted, vec![(0, 1, 3), (1, 2, 4)]);
    }

    #[test]
    fn test_backward_pair_resolves_through_reverse_lookup() {
        // The packed pair (2, 0) only exists as the backward edge 0→2
        let dir = TempDir::new().unwrap();
        let mut graph = open_single_shard(
            &dir,
            0,
            &[0, 1, 1],
            &[original(2, 5, false, true)],
        );

        let emitted = collect_unpacked(&mut graph, &[2, 0]);
        assert_eq!(emitted, vec![(2, 0, 5)]);
    }

    #[test]
    fn test_missing_edge_is_a_segmentation_failure() {
        let dir = TempDir::new().unwrap();
        let mut graph = open_single_shard(&dir, 0, &[0, 1], &[original(1, 3, true, false)]);

        let err = unpack_ch_path(&mut graph, &[0, 5], |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::SegmentationFailure { source: 0, target: 5 }));
    }

    #[test]
    fn test_single_node_path_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut graph = open_single_shard(&dir, 0, &[0, 1], &[original(1, 3, true, false)]);
        let emitted = collect_unpacked(&mut graph, &[0]);
        assert!(emitted.is_empty());
    }
}
