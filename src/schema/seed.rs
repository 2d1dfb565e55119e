//! Genesis layout types for placing the initial population.

use serde::{Deserialize, Serialize};

/// Offsets `(dx, dy)` assigned to successive species around a clustered site.
pub const SITE_OFFSETS: [(i64, i64); 5] = [(0, 0), (1, 0), (0, 1), (-1, 0), (0, -1)];

/// Strategy for placing genesis agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationLayout {
    /// Evenly spaced twin sites; every species gets a member next to each site,
    /// so all species start with identical access to local resources.
    #[default]
    Clustered,
    /// Each agent lands on a uniformly random free cell.
    Random,
}

/// Centres of `count` evenly spaced sites on a `width` x `height` grid.
///
/// Sites are laid out in a lattice whose column/row ratio follows the grid
/// aspect ratio, each site centred inside its lattice cell.
pub fn cluster_sites(width: usize, height: usize, count: usize) -> Vec<(usize, usize)> {
    if count == 0 {
        return Vec::new();
    }
    let aspect = width as f64 / height as f64;
    let cols = ((count as f64 * aspect).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(cols);
    let x_space = width as f64 / cols as f64;
    let y_space = height as f64 / rows as f64;

    (0..count)
        .map(|idx| {
            let row = idx / cols;
            let col = idx % cols;
            let x = (col as f64 * x_space + x_space / 2.0) as usize % width;
            let y = (row as f64 * y_space + y_space / 2.0) as usize % height;
            (x, y)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_sites_in_bounds_and_distinct() {
        let sites = cluster_sites(20, 20, 40);
        assert_eq!(sites.len(), 40);
        for &(x, y) in &sites {
            assert!(x < 20 && y < 20);
        }
        let mut unique = sites.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), sites.len());
    }

    #[test]
    fn test_single_site_is_centred() {
        assert_eq!(cluster_sites(10, 10, 1), vec![(5, 5)]);
    }

    #[test]
    fn test_layout_serde_names() {
        let layout: PopulationLayout = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(layout, PopulationLayout::Random);
    }
}
