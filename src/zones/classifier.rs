// src/zones/classifier.rs
//
// Labels grid cells as root (entry) or end (exit) zones for the "on" and
// "under" directional families. Runs once at construction; after that the
// role lives on each cell and nothing here is consulted per frame.

use std::collections::BTreeSet;
use tracing::debug;

use super::grid::{CellId, Grid, ZoneFamily, ZoneRole};
use crate::error::ConfigError;
use crate::types::{ZoneConfig, ZoneSpan};

/// The four named zone sets produced by classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSets {
    pub root_on: BTreeSet<CellId>,
    pub root_under: BTreeSet<CellId>,
    pub end_on: BTreeSet<CellId>,
    pub end_under: BTreeSet<CellId>,
}

impl ZoneSets {
    #[cfg(test)]
    pub fn get(&self, role: ZoneRole) -> Option<&BTreeSet<CellId>> {
        match role {
            ZoneRole::Root(ZoneFamily::On) => Some(&self.root_on),
            ZoneRole::Root(ZoneFamily::Under) => Some(&self.root_under),
            ZoneRole::End(ZoneFamily::On) => Some(&self.end_on),
            ZoneRole::End(ZoneFamily::Under) => Some(&self.end_under),
            ZoneRole::None => None,
        }
    }

    fn get_mut(&mut self, role: ZoneRole) -> Option<&mut BTreeSet<CellId>> {
        match role {
            ZoneRole::Root(ZoneFamily::On) => Some(&mut self.root_on),
            ZoneRole::Root(ZoneFamily::Under) => Some(&mut self.root_under),
            ZoneRole::End(ZoneFamily::On) => Some(&mut self.end_on),
            ZoneRole::End(ZoneFamily::Under) => Some(&mut self.end_under),
            ZoneRole::None => None,
        }
    }

    pub fn root_families(&self) -> Vec<ZoneFamily> {
        families(&self.root_on, &self.root_under)
    }

    pub fn end_families(&self) -> Vec<ZoneFamily> {
        families(&self.end_on, &self.end_under)
    }
}

fn families(on: &BTreeSet<CellId>, under: &BTreeSet<CellId>) -> Vec<ZoneFamily> {
    let mut out = Vec::with_capacity(2);
    if !on.is_empty() {
        out.push(ZoneFamily::On);
    }
    if !under.is_empty() {
        out.push(ZoneFamily::Under);
    }
    out
}

pub struct ZoneClassifier;

impl ZoneClassifier {
    /// Writes zone roles into `grid` and returns the named zone sets.
    ///
    /// Fails if a configured span is empty, leaves the grid, overlaps
    /// another span, or if no root or no end span is configured at all.
    pub fn classify(grid: &mut Grid, cfg: &ZoneConfig) -> Result<ZoneSets, ConfigError> {
        let spans: Vec<(ZoneRole, ZoneSpan)> = [
            (ZoneRole::Root(ZoneFamily::On), cfg.root_on),
            (ZoneRole::Root(ZoneFamily::Under), cfg.root_under),
            (ZoneRole::End(ZoneFamily::On), cfg.end_on),
            (ZoneRole::End(ZoneFamily::Under), cfg.end_under),
        ]
        .into_iter()
        .filter_map(|(role, span)| span.map(|s| (role, s)))
        .collect();

        if !spans.iter().any(|(role, _)| role.is_root()) {
            return Err(ConfigError::MissingZones("root"));
        }
        if !spans.iter().any(|(role, _)| role.is_end()) {
            return Err(ConfigError::MissingZones("end"));
        }

        let (rows, cols) = (grid.rows(), grid.cols());
        for (role, span) in &spans {
            let zone = zone_name(*role);
            if span.is_empty(cols) {
                return Err(ConfigError::EmptySpan { zone });
            }
            let [c0, c1] = span.columns(cols);
            if span.rows[1] > rows || c1 > cols || c0 >= cols {
                return Err(ConfigError::SpanOutOfRange { zone, rows, cols });
            }
        }

        for (i, (role_a, a)) in spans.iter().enumerate() {
            for (role_b, b) in &spans[i + 1..] {
                if let Some((row, col)) = first_shared_cell(a, b, cols) {
                    return Err(ConfigError::OverlappingSpans {
                        first: zone_name(*role_a),
                        second: zone_name(*role_b),
                        row,
                        col,
                    });
                }
            }
        }

        let mut sets = ZoneSets::default();
        for (role, span) in &spans {
            let [c0, c1] = span.columns(cols);
            for row in span.rows[0]..span.rows[1] {
                for col in c0..c1 {
                    grid.set_role(row, col, *role);
                    if let (Some(cell), Some(set)) = (grid.cell_at(row, col), sets.get_mut(*role)) {
                        set.insert(cell.id);
                    }
                }
            }
            debug!(
                "zone {} → rows {:?} cols {:?}",
                zone_name(*role),
                span.rows,
                [c0, c1]
            );
        }

        Ok(sets)
    }
}

fn zone_name(role: ZoneRole) -> &'static str {
    role.zone_name().unwrap_or("none")
}

fn first_shared_cell(a: &ZoneSpan, b: &ZoneSpan, cols: usize) -> Option<(usize, usize)> {
    let [ac0, ac1] = a.columns(cols);
    let [bc0, bc1] = b.columns(cols);
    let r0 = a.rows[0].max(b.rows[0]);
    let r1 = a.rows[1].min(b.rows[1]);
    let c0 = ac0.max(bc0);
    let c1 = ac1.min(bc1);
    if r0 < r1 && c0 < c1 {
        Some((r0, c0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridConfig;

    fn grid(rows: usize, cols: usize) -> Grid {
        Grid::new(&GridConfig {
            rows,
            cols,
            cell_width_px: 10.0,
            cell_height_px: 10.0,
            origin_px: [0.0, 0.0],
        })
        .unwrap()
    }

    #[test]
    fn test_default_layout_is_disjoint() {
        let mut g = Grid::new(&GridConfig::default()).unwrap();
        let sets = ZoneClassifier::classify(&mut g, &ZoneConfig::default()).unwrap();
        assert_eq!(sets.root_on.len(), 5);
        assert_eq!(sets.root_under.len(), 4);
        assert_eq!(sets.end_on.len(), 5);
        assert_eq!(sets.end_under.len(), 4);

        let all = [&sets.root_on, &sets.root_under, &sets.end_on, &sets.end_under];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(a.is_disjoint(b));
            }
        }
        // roles on cells agree with the sets, unlabeled cells are in none
        for cell in g.cells() {
            match cell.role.zone_name() {
                Some(_) => assert!(sets.get(cell.role).unwrap().contains(&cell.id)),
                None => assert!(all.iter().all(|s| !s.contains(&cell.id))),
            }
        }
        assert_eq!(g.cell_at(8, 0).unwrap().role, ZoneRole::Root(ZoneFamily::On));
        assert_eq!(g.cell_at(0, 8).unwrap().role, ZoneRole::Root(ZoneFamily::Under));
        assert_eq!(g.cell_at(4, 4).unwrap().role, ZoneRole::None);
    }

    #[test]
    fn test_span_without_cols_covers_whole_row() {
        let mut g = grid(4, 3);
        let cfg = ZoneConfig {
            root_on: Some(ZoneSpan::new([0, 1], None)),
            root_under: None,
            end_on: Some(ZoneSpan::new([3, 4], None)),
            end_under: None,
        };
        let sets = ZoneClassifier::classify(&mut g, &cfg).unwrap();
        assert_eq!(sets.root_on.len(), 3);
        assert_eq!(sets.end_on.len(), 3);
        assert_eq!(sets.root_families(), vec![ZoneFamily::On]);
        assert_eq!(sets.end_families(), vec![ZoneFamily::On]);
    }

    #[test]
    fn test_overlapping_spans_rejected() {
        let mut g = grid(4, 4);
        let cfg = ZoneConfig {
            root_on: Some(ZoneSpan::new([0, 2], Some([0, 2]))),
            root_under: None,
            end_on: Some(ZoneSpan::new([1, 3], Some([1, 3]))),
            end_under: None,
        };
        let err = ZoneClassifier::classify(&mut g, &cfg).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OverlappingSpans {
                first: "root-on",
                second: "end-on",
                row: 1,
                col: 1
            }
        );
    }

    #[test]
    fn test_empty_span_rejected() {
        let mut g = grid(4, 4);
        let cfg = ZoneConfig {
            root_on: Some(ZoneSpan::new([2, 2], None)),
            root_under: None,
            end_on: Some(ZoneSpan::new([3, 4], None)),
            end_under: None,
        };
        assert_eq!(
            ZoneClassifier::classify(&mut g, &cfg).unwrap_err(),
            ConfigError::EmptySpan { zone: "root-on" }
        );
    }

    #[test]
    fn test_out_of_range_span_rejected() {
        let mut g = grid(4, 4);
        let cfg = ZoneConfig {
            root_on: Some(ZoneSpan::new([0, 1], Some([2, 6]))),
            root_under: None,
            end_on: Some(ZoneSpan::new([3, 4], None)),
            end_under: None,
        };
        assert!(matches!(
            ZoneClassifier::classify(&mut g, &cfg),
            Err(ConfigError::SpanOutOfRange { zone: "root-on", .. })
        ));
    }

    #[test]
    fn test_missing_end_zones_rejected() {
        let mut g = grid(4, 4);
        let cfg = ZoneConfig {
            root_on: Some(ZoneSpan::new([0, 1], None)),
            root_under: None,
            end_on: None,
            end_under: None,
        };
        assert_eq!(
            ZoneClassifier::classify(&mut g, &cfg).unwrap_err(),
            ConfigError::MissingZones("end")
        );
    }
}
