//! Room connectivity: undirected adjacency over room names.
//!
//! Rooms are stored sorted by name and addressed by a dense [`RoomIdx`], so
//! every traversal that breaks ties by index also breaks them lexically.
//! The graph is built once from an adjacency description and never mutated.

use crate::{
    error::{TrackerError, TrackerResult},
    types::{RoomId, RoomIdx},
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Undirected room graph. Isolated rooms are allowed.
#[derive(Clone, Debug)]
pub struct RoomGraph {
    /// Room names in lexical order; position is the room's index.
    rooms: Vec<RoomId>,
    index: HashMap<RoomId, RoomIdx>,
    /// Sorted neighbour indices per room.
    adjacency: Vec<Vec<RoomIdx>>,
}

impl RoomGraph {
    /// Build from `room -> [neighbours]`. Every key declares a room; every
    /// neighbour must itself be declared. Edges are made symmetric and
    /// repeated keys merge their neighbour lists.
    pub fn from_adjacency<K, V, I>(adjacency: I) -> TrackerResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<RoomId>,
        V: IntoIterator,
        V::Item: Into<RoomId>,
    {
        // A room listed more than once keeps the union of its neighbours.
        let mut declared: BTreeMap<RoomId, Vec<RoomId>> = BTreeMap::new();
        for (room, neighbours) in adjacency {
            declared
                .entry(room.into())
                .or_default()
                .extend(neighbours.into_iter().map(Into::into));
        }

        if declared.is_empty() {
            return Err(TrackerError::EmptyGraph);
        }

        let rooms: Vec<RoomId> = declared.keys().cloned().collect();
        let index: HashMap<RoomId, RoomIdx> = rooms
            .iter()
            .enumerate()
            .map(|(i, r)| (r.clone(), RoomIdx(i)))
            .collect();

        let mut sets: Vec<BTreeSet<RoomIdx>> = vec![BTreeSet::new(); rooms.len()];
        for (room, neighbours) in &declared {
            let a = index[room];
            for n in neighbours {
                let b = *index
                    .get(n)
                    .ok_or_else(|| TrackerError::UnknownRoom(n.clone()))?;
                if a == b {
                    continue;
                }
                sets[a.0].insert(b);
                sets[b.0].insert(a);
            }
        }

        Ok(Self {
            rooms,
            index,
            adjacency: sets.into_iter().map(|s| s.into_iter().collect()).collect(),
        })
    }

    /// Number of declared rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Always false for a constructed graph; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// All rooms in index (lexical) order.
    pub fn rooms(&self) -> &[RoomId] {
        &self.rooms
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.index.contains_key(room)
    }

    /// Resolve a room name to its index.
    pub fn index_of(&self, room: &RoomId) -> TrackerResult<RoomIdx> {
        self.index
            .get(room)
            .copied()
            .ok_or_else(|| TrackerError::UnknownRoom(room.clone()))
    }

    /// Room name for an index produced by this graph.
    pub fn room(&self, idx: RoomIdx) -> &RoomId {
        &self.rooms[idx.0]
    }

    /// Neighbour indices of `idx`, sorted.
    pub fn neighbor_indices(&self, idx: RoomIdx) -> &[RoomIdx] {
        &self.adjacency[idx.0]
    }

    /// Rooms directly reachable from `room`.
    pub fn neighbors(&self, room: &RoomId) -> TrackerResult<BTreeSet<RoomId>> {
        let idx = self.index_of(room)?;
        Ok(self
            .neighbor_indices(idx)
            .iter()
            .map(|&n| self.room(n).clone())
            .collect())
    }

    /// Hop count of the shortest path, `None` if unreachable.
    pub fn distance(&self, from: &RoomId, to: &RoomId) -> TrackerResult<Option<usize>> {
        let from = self.index_of(from)?;
        let to = self.index_of(to)?;
        Ok(self.distance_idx(from, to))
    }

    /// First room on a shortest path from `from` toward `to`.
    ///
    /// Returns `from` itself when `from == to`, `None` when unreachable.
    pub fn shortest_path_next_hop(
        &self,
        from: &RoomId,
        to: &RoomId,
    ) -> TrackerResult<Option<RoomId>> {
        let from = self.index_of(from)?;
        let to = self.index_of(to)?;
        Ok(self.next_hop_idx(from, to).map(|i| self.room(i).clone()))
    }

    pub fn distance_idx(&self, from: RoomIdx, to: RoomIdx) -> Option<usize> {
        self.bfs_from(to)[from.0]
    }

    pub fn next_hop_idx(&self, from: RoomIdx, to: RoomIdx) -> Option<RoomIdx> {
        if from == to {
            return Some(from);
        }
        // Distances are measured from the target, so any neighbour one hop
        // closer lies on a shortest path; neighbours are sorted, first wins.
        let dist = self.bfs_from(to);
        let here = dist[from.0]?;
        self.neighbor_indices(from)
            .iter()
            .copied()
            .find(|n| dist[n.0] == Some(here - 1))
    }

    /// Unweighted BFS distances from `source` to every room.
    fn bfs_from(&self, source: RoomIdx) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.rooms.len()];
        let mut queue = VecDeque::new();
        dist[source.0] = Some(0);
        queue.push_back(source);
        while let Some(cur) = queue.pop_front() {
            let d = dist[cur.0].unwrap_or(0);
            for &n in self.neighbor_indices(cur) {
                if dist[n.0].is_none() {
                    dist[n.0] = Some(d + 1);
                    queue.push_back(n);
                }
            }
        }
        dist
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> RoomGraph {
        RoomGraph::from_adjacency([
            ("bedroom", vec!["hallway"]),
            ("hallway", vec!["kitchen"]),
            ("kitchen", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn edges_are_symmetric() {
        let g = chain();
        let n = g.neighbors(&"kitchen".into()).unwrap();
        assert!(n.contains(&RoomId::from("hallway")));
        let n = g.neighbors(&"hallway".into()).unwrap();
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn next_hop_and_distance_on_chain() {
        let g = chain();
        let hop = g
            .shortest_path_next_hop(&"bedroom".into(), &"kitchen".into())
            .unwrap();
        assert_eq!(hop, Some(RoomId::from("hallway")));
        assert_eq!(
            g.distance(&"bedroom".into(), &"kitchen".into()).unwrap(),
            Some(2)
        );
        assert_eq!(
            g.shortest_path_next_hop(&"kitchen".into(), &"kitchen".into())
                .unwrap(),
            Some(RoomId::from("kitchen"))
        );
    }

    #[test]
    fn next_hop_ties_break_lexically() {
        // Square: a-b, a-c, b-d, c-d. Both b and c lead to d in two hops.
        let g = RoomGraph::from_adjacency([
            ("a", vec!["c", "b"]),
            ("b", vec!["d"]),
            ("c", vec!["d"]),
            ("d", vec![]),
        ])
        .unwrap();
        let hop = g.shortest_path_next_hop(&"a".into(), &"d".into()).unwrap();
        assert_eq!(hop, Some(RoomId::from("b")));
    }

    #[test]
    fn isolated_room_is_unreachable() {
        let g = RoomGraph::from_adjacency([
            ("bedroom", vec!["hallway"]),
            ("hallway", vec![]),
            ("shed", vec![]),
        ])
        .unwrap();
        assert!(g.neighbors(&"shed".into()).unwrap().is_empty());
        assert_eq!(g.distance(&"shed".into(), &"bedroom".into()).unwrap(), None);
        assert_eq!(
            g.shortest_path_next_hop(&"bedroom".into(), &"shed".into())
                .unwrap(),
            None
        );
    }

    #[test]
    fn repeated_room_merges_neighbours() {
        let g = RoomGraph::from_adjacency([
            ("hallway", vec!["bedroom"]),
            ("bedroom", vec![]),
            ("kitchen", vec![]),
            ("hallway", vec!["kitchen"]),
        ])
        .unwrap();
        assert_eq!(g.len(), 3);
        let n = g.neighbors(&"hallway".into()).unwrap();
        assert!(n.contains(&RoomId::from("bedroom")));
        assert!(n.contains(&RoomId::from("kitchen")));
        assert_eq!(
            g.distance(&"bedroom".into(), &"kitchen".into()).unwrap(),
            Some(2)
        );
    }

    #[test]
    fn undeclared_neighbour_fails_construction() {
        let err = RoomGraph::from_adjacency([("bedroom", vec!["attic"])]).unwrap_err();
        assert_eq!(err, TrackerError::UnknownRoom(RoomId::from("attic")));
    }

    #[test]
    fn empty_adjacency_fails_construction() {
        let empty: Vec<(&str, Vec<&str>)> = Vec::new();
        assert_eq!(
            RoomGraph::from_adjacency(empty).unwrap_err(),
            TrackerError::EmptyGraph
        );
    }

    #[test]
    fn unknown_room_query_fails() {
        let g = chain();
        assert!(matches!(
            g.neighbors(&"garage".into()),
            Err(TrackerError::UnknownRoom(_))
        ));
    }

    #[test]
    fn indices_follow_lexical_order() {
        let g = chain();
        assert_eq!(g.index_of(&"bedroom".into()).unwrap(), RoomIdx(0));
        assert_eq!(g.index_of(&"kitchen".into()).unwrap(), RoomIdx(2));
        assert_eq!(g.room(RoomIdx(1)).as_str(), "hallway");
    }
}
