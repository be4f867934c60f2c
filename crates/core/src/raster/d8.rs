//! D8 flow direction encoding
//!
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = outlet/pit (no downslope neighbor), 1-8 = direction to the steepest
//! downslope neighbor, [`NODATA`] = no valid elevation at this cell.

/// Code for cells with no flow at all (no-data source cells)
pub const NODATA: u8 = 255;

/// Direction offsets: (row_offset, col_offset)
/// Indexed by direction code (1-8), 0 is unused
pub const OFFSETS: [(isize, isize); 9] = [
    (0, 0),   // 0: no flow / pit
    (0, 1),   // 1: E
    (-1, 1),  // 2: NE
    (-1, 0),  // 3: N
    (-1, -1), // 4: NW
    (0, -1),  // 5: W
    (1, -1),  // 6: SW
    (1, 0),   // 7: S
    (1, 1),   // 8: SE
];

/// Neighbor of (row, col) in direction `dir`, if it lies inside a
/// `rows` x `cols` grid. Pits, no-data and invalid codes have no downstream cell.
pub fn neighbor(row: usize, col: usize, dir: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if !(1..=8).contains(&dir) {
        return None;
    }
    let (dr, dc) = OFFSETS[dir as usize];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        return None;
    }
    Some((nr as usize, nc as usize))
}
