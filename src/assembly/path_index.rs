//! Inverted index from edges to the read paths that traverse them
//!
//! The index is a snapshot: any edge deletion or renumbering makes it stale,
//! so the pruner rebuilds it at the start of every pass.

use crate::core::ReadPath;
use rayon::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    /// Sorted, de-duplicated read-path ids per edge
    entries: Vec<Vec<usize>>,
}

impl PathIndex {
    /// Build the index for edges `0..edge_count`; edge ids outside that range are ignored
    pub fn build(paths: &[ReadPath], edge_count: usize) -> Self {
        let mut hits: Vec<(usize, usize)> = paths
            .par_iter()
            .enumerate()
            .flat_map_iter(|(id, path)| {
                path.edges
                    .iter()
                    .filter(move |&&e| e < edge_count)
                    .map(move |&e| (e, id))
            })
            .collect();
        hits.par_sort_unstable();
        hits.dedup();

        let mut entries = vec![Vec::new(); edge_count];
        for (edge, id) in hits {
            entries[edge].push(id);
        }

        Self { entries }
    }

    /// Read-path ids touching `edge`
    pub fn paths_through(&self, edge: usize) -> &[usize] {
        self.entries.get(edge).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of (edge, path) incidences
    pub fn incidence_count(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_dedups_repeated_edges() {
        let paths = vec![
            ReadPath::new(vec![0, 1, 0], 0),
            ReadPath::new(vec![1, 2], 3),
            ReadPath::new(vec![], 0),
        ];
        let index = PathIndex::build(&paths, 3);

        assert_eq!(index.paths_through(0), &[0]);
        assert_eq!(index.paths_through(1), &[0, 1]);
        assert_eq!(index.paths_through(2), &[1]);
        assert_eq!(index.incidence_count(), 4);
    }

    #[test]
    fn test_out_of_range_edges_ignored() {
        let paths = vec![ReadPath::new(vec![0, 9], 0)];
        let index = PathIndex::build(&paths, 2);
        assert_eq!(index.paths_through(0), &[0]);
        assert!(index.paths_through(9).is_empty());
        assert_eq!(index.edge_count(), 2);
    }
}
