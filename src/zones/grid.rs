// src/zones/grid.rs
//
// Regular lattice of rectangular cells over the monitored image region.
// Cells are addressed by a dense integer id (row * cols + col) and carry
// their zone role, which is written once by the zone classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;
use crate::types::{GridConfig, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub usize);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Directional family a zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneFamily {
    On,
    Under,
}

impl ZoneFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Under => "under",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneRole {
    None,
    Root(ZoneFamily),
    End(ZoneFamily),
}

impl ZoneRole {
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End(_))
    }

    /// Zone set name, e.g. "root-on" or "end-under".
    pub fn zone_name(&self) -> Option<&'static str> {
        match self {
            Self::Root(ZoneFamily::On) => Some("root-on"),
            Self::Root(ZoneFamily::Under) => Some("root-under"),
            Self::End(ZoneFamily::On) => Some("end-on"),
            Self::End(ZoneFamily::Under) => Some("end-under"),
            Self::None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub row: usize,
    pub col: usize,
    /// [x1, y1, x2, y2] pixels, half-open on the right and bottom edges
    pub bbox: [f64; 4],
    pub role: ZoneRole,
}

impl Cell {
    pub fn name(&self) -> String {
        format!("grid_{}_{}", self.row, self.col)
    }

    #[cfg(test)]
    pub fn center(&self) -> Point {
        Point::new(
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.bbox[0] && p.x < self.bbox[2] && p.y >= self.bbox[1] && p.y < self.bbox[3]
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cell_width: f64,
    cell_height: f64,
    origin: Point,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(cfg: &GridConfig) -> Result<Self, ConfigError> {
        if cfg.rows == 0 || cfg.cols == 0 {
            return Err(ConfigError::DegenerateGrid(format!(
                "{}x{} cells",
                cfg.rows, cfg.cols
            )));
        }
        for (name, v) in [
            ("cell_width_px", cfg.cell_width_px),
            ("cell_height_px", cfg.cell_height_px),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::DegenerateGrid(format!("{} = {}", name, v)));
            }
        }
        let origin = Point::new(cfg.origin_px[0], cfg.origin_px[1]);
        if !origin.is_finite() {
            return Err(ConfigError::DegenerateGrid(format!(
                "origin ({}, {})",
                origin.x, origin.y
            )));
        }

        let mut cells = Vec::with_capacity(cfg.rows * cfg.cols);
        for row in 0..cfg.rows {
            let y1 = origin.y + row as f64 * cfg.cell_height_px;
            let y2 = origin.y + (row + 1) as f64 * cfg.cell_height_px;
            for col in 0..cfg.cols {
                let x1 = origin.x + col as f64 * cfg.cell_width_px;
                let x2 = origin.x + (col + 1) as f64 * cfg.cell_width_px;
                cells.push(Cell {
                    id: CellId(row * cfg.cols + col),
                    row,
                    col,
                    bbox: [x1, y1, x2, y2],
                    role: ZoneRole::None,
                });
            }
        }

        Ok(Self {
            rows: cfg.rows,
            cols: cfg.cols,
            cell_width: cfg.cell_width_px,
            cell_height: cfg.cell_height_px,
            origin,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[cfg(test)]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0)
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn role(&self, id: CellId) -> ZoneRole {
        self.cell(id).map(|c| c.role).unwrap_or(ZoneRole::None)
    }

    /// Only the zone classifier assigns roles, once, before the grid is shared.
    pub(crate) fn set_role(&mut self, row: usize, col: usize, role: ZoneRole) {
        let idx = row * self.cols + col;
        if let Some(cell) = self.cells.get_mut(idx) {
            cell.role = role;
        }
    }

    /// Cell containing `p`, if any.
    pub fn locate(&self, p: Point) -> Option<CellId> {
        if !p.is_finite() {
            return None;
        }
        let fx = ((p.x - self.origin.x) / self.cell_width).floor();
        let fy = ((p.y - self.origin.y) / self.cell_height).floor();
        if fx < 0.0 || fy < 0.0 || fx >= self.cols as f64 || fy >= self.rows as f64 {
            return None;
        }
        let (col, row) = (fx as usize, fy as usize);
        let cell = self.cell_at(row, col)?;
        // Division rounding can land one cell off right at an edge
        if cell.contains(p) {
            return Some(cell.id);
        }
        self.neighbours(row, col)
            .find(|c| c.contains(p))
            .map(|c| c.id)
    }

    fn neighbours(&self, row: usize, col: usize) -> impl Iterator<Item = &Cell> + '_ {
        let rows = row.saturating_sub(1)..=(row + 1).min(self.rows - 1);
        rows.flat_map(move |r| {
            let cols = col.saturating_sub(1)..=(col + 1).min(self.cols - 1);
            cols.filter_map(move |c| self.cell_at(r, c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(rows: usize, cols: usize) -> GridConfig {
        GridConfig {
            rows,
            cols,
            cell_width_px: 40.0,
            cell_height_px: 30.0,
            origin_px: [577.0, 288.0],
        }
    }

    #[test]
    fn test_cell_boxes_follow_lattice() {
        let grid = Grid::new(&cfg(11, 9)).unwrap();
        assert_eq!(grid.cells().len(), 99);
        let c = grid.cell_at(2, 3).unwrap();
        assert_eq!(c.bbox, [697.0, 348.0, 737.0, 378.0]);
        assert_eq!(c.id, CellId(2 * 9 + 3));
        assert_eq!(c.name(), "grid_2_3");
    }

    #[test]
    fn test_locate_every_cell_center() {
        let grid = Grid::new(&cfg(11, 9)).unwrap();
        for cell in grid.cells() {
            assert_eq!(grid.locate(cell.center()), Some(cell.id), "{}", cell.name());
        }
    }

    #[test]
    fn test_locate_shared_edge_goes_to_lower_right_cell() {
        let grid = Grid::new(&cfg(11, 9)).unwrap();
        // x = 617 is the boundary between col 0 and col 1
        let id = grid.locate(Point::new(617.0, 300.0)).unwrap();
        assert_eq!(grid.cell(id).unwrap().col, 1);
    }

    #[test]
    fn test_locate_outside_returns_none() {
        let grid = Grid::new(&cfg(11, 9)).unwrap();
        assert_eq!(grid.locate(Point::new(576.9, 300.0)), None);
        assert_eq!(grid.locate(Point::new(600.0, 287.0)), None);
        // right and bottom edges of the region are exclusive
        assert_eq!(grid.locate(Point::new(577.0 + 9.0 * 40.0, 300.0)), None);
        assert_eq!(grid.locate(Point::new(600.0, 288.0 + 11.0 * 30.0)), None);
        assert_eq!(grid.locate(Point::new(f64::NAN, 300.0)), None);
    }

    #[test]
    fn test_locate_matches_linear_scan() {
        let grid = Grid::new(&cfg(11, 9)).unwrap();
        let mut x = 560.0;
        while x < 960.0 {
            let mut y = 270.0;
            while y < 640.0 {
                let p = Point::new(x, y);
                let scanned: Vec<CellId> = grid
                    .cells()
                    .iter()
                    .filter(|c| c.contains(p))
                    .map(|c| c.id)
                    .collect();
                assert!(scanned.len() <= 1);
                assert_eq!(grid.locate(p), scanned.first().copied(), "({}, {})", x, y);
                y += 7.3;
            }
            x += 6.1;
        }
    }

    #[test]
    fn test_degenerate_dimensions_rejected() {
        assert!(Grid::new(&cfg(0, 9)).is_err());
        assert!(Grid::new(&cfg(11, 0)).is_err());
        let mut bad = cfg(2, 2);
        bad.cell_width_px = 0.0;
        assert!(matches!(Grid::new(&bad), Err(ConfigError::DegenerateGrid(_))));
        let mut bad = cfg(2, 2);
        bad.cell_height_px = f64::INFINITY;
        assert!(Grid::new(&bad).is_err());
    }
}
