//! Uniform bucket grid for neighborhood queries.

use crate::vector::Vec2;

/// Uniform grid over the world rectangle.
///
/// Buckets hold indices into the caller's agent collection. The cell size must be
/// at least the largest perception radius for a 3x3 query to cover it.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f64,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<usize>>,
    occupied: Vec<usize>,
}

impl SpatialGrid {
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let mut grid = Self {
            cell_size,
            cols: 0,
            rows: 0,
            cells: Vec::new(),
            occupied: Vec::new(),
        };
        grid.resize(width, height);
        grid
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Empty every occupied bucket.
    pub fn clear(&mut self) {
        for &cell in &self.occupied {
            self.cells[cell].clear();
        }
        self.occupied.clear();
    }

    /// Bucket agent `idx` by its position.
    pub fn insert(&mut self, idx: usize, position: Vec2) {
        let (col, row) = self.cell_of(position);
        let cell = row * self.cols + col;
        if self.cells[cell].is_empty() {
            self.occupied.push(cell);
        }
        self.cells[cell].push(idx);
    }

    /// Indices in the 3x3 block of cells around the cell containing `(x, y)`.
    pub fn query(&self, x: f64, y: f64) -> Vec<usize> {
        let (col, row) = self.cell_of(Vec2::new(x, y));
        let mut result = Vec::new();

        for r in row.saturating_sub(1)..=(row + 1).min(self.rows - 1) {
            for c in col.saturating_sub(1)..=(col + 1).min(self.cols - 1) {
                result.extend_from_slice(&self.cells[r * self.cols + c]);
            }
        }

        result
    }

    /// Recompute the column and row counts. Existing contents are discarded.
    pub fn resize(&mut self, width: f64, height: f64) {
        let cols = cells_along(width, self.cell_size);
        let rows = cells_along(height, self.cell_size);
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Vec::new(); cols * rows];
        self.occupied.clear();
    }

    // Out-of-world positions map to the nearest edge cell.
    fn cell_of(&self, position: Vec2) -> (usize, usize) {
        let col = axis_cell(position.x, self.cell_size, self.cols);
        let row = axis_cell(position.y, self.cell_size, self.rows);
        (col, row)
    }
}

fn cells_along(extent: f64, cell_size: f64) -> usize {
    ((extent / cell_size).ceil() as usize).max(1)
}

fn axis_cell(coord: f64, cell_size: f64, count: usize) -> usize {
    let cell = (coord / cell_size).floor();
    if cell.is_nan() || cell < 0.0 {
        return 0;
    }
    (cell as usize).min(count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_round_up() {
        let grid = SpatialGrid::new(1000.0, 450.0, 200.0);
        assert_eq!(grid.cols(), 5);
        assert_eq!(grid.rows(), 3);
    }

    #[test]
    fn query_covers_neighboring_cells_only() {
        let mut grid = SpatialGrid::new(1000.0, 1000.0, 100.0);
        grid.insert(0, Vec2::new(150.0, 150.0));
        grid.insert(1, Vec2::new(250.0, 150.0));
        grid.insert(2, Vec2::new(450.0, 450.0));

        let mut found = grid.query(150.0, 150.0);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);

        assert!(grid.query(850.0, 850.0).is_empty());
    }

    #[test]
    fn clear_empties_every_bucket() {
        let mut grid = SpatialGrid::new(400.0, 400.0, 100.0);
        for idx in 0..10 {
            grid.insert(idx, Vec2::new(idx as f64 * 35.0, 200.0));
        }
        grid.clear();
        for x in [50.0, 150.0, 250.0, 350.0] {
            assert!(grid.query(x, 200.0).is_empty());
        }

        grid.insert(3, Vec2::new(120.0, 220.0));
        assert_eq!(grid.query(200.0, 200.0), vec![3]);
    }

    #[test]
    fn query_is_superset_of_true_radius() {
        let cell_size = 50.0;
        let mut grid = SpatialGrid::new(500.0, 500.0, cell_size);
        let points: Vec<Vec2> = (0..100)
            .map(|i| Vec2::new((i * 37 % 500) as f64, (i * 91 % 500) as f64))
            .collect();
        for (idx, &p) in points.iter().enumerate() {
            grid.insert(idx, p);
        }

        let center = Vec2::new(260.0, 240.0);
        let found = grid.query(center.x, center.y);
        for (idx, p) in points.iter().enumerate() {
            if p.distance(center) <= cell_size {
                assert!(found.contains(&idx), "missing agent {idx} at {p:?}");
            }
        }
    }

    #[test]
    fn outside_positions_land_in_edge_cells() {
        let mut grid = SpatialGrid::new(300.0, 300.0, 100.0);
        grid.insert(0, Vec2::new(-20.0, 350.0));
        assert_eq!(grid.query(10.0, 290.0), vec![0]);
    }

    #[test]
    fn resize_with_same_dimensions_is_noop() {
        let mut grid = SpatialGrid::new(800.0, 600.0, 200.0);
        grid.insert(0, Vec2::new(10.0, 10.0));
        let (cols, rows) = (grid.cols(), grid.rows());

        grid.resize(800.0, 600.0);
        assert_eq!((grid.cols(), grid.rows()), (cols, rows));
        assert_eq!(grid.query(10.0, 10.0), vec![0]);

        grid.resize(1200.0, 600.0);
        assert_eq!((grid.cols(), grid.rows()), (6, 3));
        assert!(grid.query(10.0, 10.0).is_empty());
    }
}
