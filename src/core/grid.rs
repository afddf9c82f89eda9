//! Spatial Interest Grid
//!
//! Uniform grid over entity positions for area-of-interest queries.
//! Each cell holds the set of entity ids currently inside it; a query
//! returns the union of the 3x3 cell neighborhood around a point, which
//! bounds broadcast fan-out to local density instead of total population.
//!
//! Uses BTreeMap/BTreeSet for sorted, reproducible iteration order.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

/// Uniform spatial grid keyed by `floor(coord / cell_size)`.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: BTreeMap<(i32, i32), BTreeSet<Uuid>>,
    /// Reverse index: entity -> current cell
    entities: BTreeMap<Uuid, (i32, i32)>,
}

impl SpatialGrid {
    /// Create a grid with the given cell size (world units).
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: BTreeMap::new(),
            entities: BTreeMap::new(),
        }
    }

    /// Cell coordinates containing a world-space point.
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Insert an entity at a position. Replaces any previous registration.
    pub fn add_entity(&mut self, id: Uuid, x: f32, y: f32) {
        self.remove_entity(&id);
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().insert(id);
        self.entities.insert(id, cell);
    }

    /// Remove an entity. Returns true if it was present.
    pub fn remove_entity(&mut self, id: &Uuid) -> bool {
        let Some(cell) = self.entities.remove(id) else {
            return false;
        };
        if let Some(members) = self.cells.get_mut(&cell) {
            members.remove(id);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
        true
    }

    /// Move an entity to a new position. No-op if the cell is unchanged.
    pub fn update_entity(&mut self, id: Uuid, x: f32, y: f32) {
        let new_cell = self.cell_of(x, y);
        match self.entities.get(&id) {
            Some(old_cell) if *old_cell == new_cell => {}
            Some(old_cell) => {
                let old_cell = *old_cell;
                if let Some(members) = self.cells.get_mut(&old_cell) {
                    members.remove(&id);
                    if members.is_empty() {
                        self.cells.remove(&old_cell);
                    }
                }
                self.cells.entry(new_cell).or_default().insert(id);
                self.entities.insert(id, new_cell);
            }
            None => {
                self.cells.entry(new_cell).or_default().insert(id);
                self.entities.insert(id, new_cell);
            }
        }
    }

    /// All entity ids in the 3x3 cell neighborhood around a point.
    ///
    /// This is the interest set: everyone who must receive updates about
    /// activity at (x, y).
    pub fn get_nearby_entities(&self, x: f32, y: f32) -> Vec<Uuid> {
        let (cx, cy) = self.cell_of(x, y);
        let mut result = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(members) = self.cells.get(&(cx + dx, cy + dy)) {
                    result.extend(members.iter().copied());
                }
            }
        }
        result
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn test_add_and_query() {
        let mut grid = SpatialGrid::new(10.0);
        grid.add_entity(id(1), 5.0, 5.0);
        grid.add_entity(id(2), 15.0, 5.0);

        let nearby = grid.get_nearby_entities(5.0, 5.0);
        assert!(nearby.contains(&id(1)));
        assert!(nearby.contains(&id(2)));
    }

    #[test]
    fn test_neighborhood_excludes_second_ring() {
        let mut grid = SpatialGrid::new(10.0);
        // Query cell is (0,0); (2,0) is two cells away
        grid.add_entity(id(1), 5.0, 5.0); // cell (0,0)
        grid.add_entity(id(2), 15.0, 5.0); // cell (1,0) - included
        grid.add_entity(id(3), 25.0, 5.0); // cell (2,0) - excluded

        let nearby = grid.get_nearby_entities(5.0, 5.0);
        assert!(nearby.contains(&id(1)));
        assert!(nearby.contains(&id(2)));
        assert!(!nearby.contains(&id(3)));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(10.0);
        grid.add_entity(id(1), -5.0, -5.0); // cell (-1,-1)
        grid.add_entity(id(2), 5.0, 5.0); // cell (0,0) - adjacent

        let nearby = grid.get_nearby_entities(-5.0, -5.0);
        assert!(nearby.contains(&id(1)));
        assert!(nearby.contains(&id(2)));
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut grid = SpatialGrid::new(10.0);
        grid.add_entity(id(1), 5.0, 5.0);

        grid.update_entity(id(1), 95.0, 95.0);

        assert!(!grid.get_nearby_entities(5.0, 5.0).contains(&id(1)));
        assert!(grid.get_nearby_entities(95.0, 95.0).contains(&id(1)));
    }

    #[test]
    fn test_update_same_cell_is_noop() {
        let mut grid = SpatialGrid::new(10.0);
        grid.add_entity(id(1), 1.0, 1.0);
        grid.update_entity(id(1), 9.0, 9.0); // still cell (0,0)

        assert_eq!(grid.len(), 1);
        assert!(grid.get_nearby_entities(1.0, 1.0).contains(&id(1)));
    }

    #[test]
    fn test_update_unregistered_entity_registers_it() {
        let mut grid = SpatialGrid::new(10.0);
        grid.update_entity(id(1), 5.0, 5.0);

        assert!(grid.get_nearby_entities(5.0, 5.0).contains(&id(1)));
    }

    #[test]
    fn test_remove() {
        let mut grid = SpatialGrid::new(10.0);
        grid.add_entity(id(1), 5.0, 5.0);

        assert!(grid.remove_entity(&id(1)));
        assert!(!grid.remove_entity(&id(1)));
        assert!(grid.is_empty());
        assert!(grid.get_nearby_entities(5.0, 5.0).is_empty());
    }
}
