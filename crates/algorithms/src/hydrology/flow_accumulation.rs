//! Flow accumulation algorithm
//!
//! Counts, for every cell, how many cells drain through it under D8 routing.
//! The count includes the cell itself, so headwaters carry 1 and an outlet
//! draining the whole grid carries the number of valid cells.

use std::collections::VecDeque;
use ndarray::Array2;
use terrover_core::raster::{d8, Raster};
use terrover_core::{Error, Result};

/// Downstream cell of a valid, non-pit cell, if it lies on the grid.
fn receiver(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (rows, cols) = flow_dir.shape();
    let dir = unsafe { flow_dir.get_unchecked(row, col) };
    if dir == 0 || dir > 8 {
        return None;
    }
    d8::neighbor(row, col, dir, rows, cols)
        .filter(|&(nr, nc)| unsafe { flow_dir.get_unchecked(nr, nc) } != d8::NODATA)
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Cells coded [`d8::NODATA`] (or any code above 8) are no-data and come out
/// as NaN. Flow pointing off the grid or into no-data terminates there.
///
/// # Algorithm
/// 1. Count incoming flows for each cell (in-degree)
/// 2. Queue every valid cell with in-degree 0 (headwaters)
/// 3. Pop a cell, add its total to its receiver, queue the receiver once
///    all of its donors are done
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();
    let is_valid = |row: usize, col: usize| unsafe { flow_dir.get_unchecked(row, col) } <= 8;

    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    let mut accumulation = Array2::<f64>::from_elem((rows, cols), f64::NAN);

    for row in 0..rows {
        for col in 0..cols {
            if !is_valid(row, col) {
                continue;
            }
            accumulation[(row, col)] = 1.0;
            if let Some(down) = receiver(flow_dir, row, col) {
                in_degree[down] += 1;
            }
        }
    }

    let mut queue: VecDeque<(usize, usize)> = (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (row, col)))
        .filter(|&(row, col)| is_valid(row, col) && in_degree[(row, col)] == 0)
        .collect();

    while let Some((row, col)) = queue.pop_front() {
        let Some(down) = receiver(flow_dir, row, col) else {
            continue;
        };

        accumulation[down] += accumulation[(row, col)];
        in_degree[down] -= 1;
        if in_degree[down] == 0 {
            queue.push_back(down);
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = accumulation;

    Ok(output)
}
