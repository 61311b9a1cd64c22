use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Cell coordinates on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Toroidal grid holding any number of agents per cell.
///
/// Agents are referred to by their index in the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Vec<usize>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("grid must have a non-zero area, but is {width}x{height}");
        }
        let mut cells = Vec::new();
        cells.resize_with(width * height, Vec::new);
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Cells of the Moore neighborhood of `pos`, wrapping around the edges.
    ///
    /// Each cell appears once, even on grids narrower than three cells.
    pub fn neighborhood(&self, pos: Pos, include_center: bool) -> Vec<Pos> {
        let mut cells = Vec::with_capacity(9);
        for dy in [-1, 0, 1] {
            for dx in [-1, 0, 1] {
                if dx == 0 && dy == 0 && !include_center {
                    continue;
                }
                let cell = Pos::new(
                    wrap(pos.x, dx, self.width),
                    wrap(pos.y, dy, self.height),
                );
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Agents located in the Moore neighborhood of `pos`.
    pub fn neighbors(&self, pos: Pos, include_center: bool) -> Vec<usize> {
        self.neighborhood(pos, include_center)
            .into_iter()
            .flat_map(|cell| self.cells[self.cell_idx(cell)].iter().copied())
            .collect()
    }

    pub fn place_agent(&mut self, i_agt: usize, pos: Pos) {
        let idx = self.cell_idx(pos);
        self.cells[idx].push(i_agt);
    }

    pub fn move_agent(&mut self, i_agt: usize, from: Pos, to: Pos) -> Result<()> {
        let from_idx = self.cell_idx(from);
        let cell = &mut self.cells[from_idx];
        let i_slot = cell
            .iter()
            .position(|&i| i == i_agt)
            .with_context(|| format!("agent {i_agt} is not located at {from:?}"))?;
        cell.remove(i_slot);
        self.place_agent(i_agt, to);
        Ok(())
    }

    fn cell_idx(&self, pos: Pos) -> usize {
        pos.y * self.width + pos.x
    }
}

fn wrap(coord: usize, delta: isize, len: usize) -> usize {
    (coord as isize + delta).rem_euclid(len as isize) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_is_rejected() {
        assert!(Grid::new(0, 5).is_err());
        assert!(Grid::new(5, 0).is_err());
    }

    #[test]
    fn neighborhood_wraps_around_corners() {
        let grid = Grid::new(5, 4).unwrap();
        let cells = grid.neighborhood(Pos::new(0, 0), false);
        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&Pos::new(4, 3)));
        assert!(cells.contains(&Pos::new(1, 1)));
        assert!(cells.contains(&Pos::new(4, 0)));
        assert!(!cells.contains(&Pos::new(0, 0)));

        let cells = grid.neighborhood(Pos::new(0, 0), true);
        assert_eq!(cells.len(), 9);
        assert!(cells.contains(&Pos::new(0, 0)));
    }

    #[test]
    fn narrow_grids_have_no_duplicate_cells() {
        let grid = Grid::new(2, 1).unwrap();
        let cells = grid.neighborhood(Pos::new(0, 0), true);
        assert_eq!(cells.len(), 2);

        let grid = Grid::new(1, 1).unwrap();
        assert_eq!(grid.neighborhood(Pos::new(0, 0), false), vec![Pos::new(0, 0)]);
    }

    #[test]
    fn neighbors_follow_moves() {
        let mut grid = Grid::new(10, 10).unwrap();
        grid.place_agent(0, Pos::new(5, 5));
        grid.place_agent(1, Pos::new(5, 5));
        grid.place_agent(2, Pos::new(6, 6));
        grid.place_agent(3, Pos::new(8, 8));

        let mut found = grid.neighbors(Pos::new(5, 5), true);
        found.sort();
        assert_eq!(found, vec![0, 1, 2]);

        grid.move_agent(3, Pos::new(8, 8), Pos::new(4, 4)).unwrap();
        let mut found = grid.neighbors(Pos::new(5, 5), false);
        found.sort();
        assert_eq!(found, vec![2, 3]);

        assert!(grid.move_agent(3, Pos::new(8, 8), Pos::new(0, 0)).is_err());
    }
}
