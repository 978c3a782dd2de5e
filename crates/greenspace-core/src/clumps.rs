//! Connected-component ("clump") labelling with barrier classes.

use std::collections::VecDeque;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::raster::{Connectivity, Raster};

/// Label the maximal connected regions of non-barrier, non-nodata pixels.
///
/// Labels are positive integers assigned in first-encounter scan order
/// (row-major), so the labelling is deterministic for a fixed connectivity.
/// Barrier and nodata pixels are nodata in the output. Every reachability
/// computation downstream is confined to a single clump: supply or demand on
/// the far side of a road or water body is never treated as reachable.
pub fn detect_clumps(
    landuse: &Raster<i32>,
    barrier_classes: &[i32],
    connectivity: Connectivity,
    cancel: &CancelToken,
) -> Result<Raster<i32>> {
    let mut labels = landuse.like(landuse.nodata, landuse.nodata);
    let mut visited = vec![false; landuse.data.len()];
    for (i, &v) in landuse.data.iter().enumerate() {
        if v == landuse.nodata || barrier_classes.contains(&v) {
            visited[i] = true;
        }
    }

    let offsets = connectivity.offsets();
    // Queue reused across clumps; it is empty again after each fill.
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    let mut next_label = 1i32;

    for row in 0..landuse.rows {
        for col in 0..landuse.cols {
            let start = landuse.idx(row, col);
            if visited[start] {
                continue;
            }
            cancel.guard("clump detection")?;

            visited[start] = true;
            labels.data[start] = next_label;
            queue.push_back((row, col));
            while let Some((r, c)) = queue.pop_front() {
                for &(dr, dc) in offsets {
                    if let Some((nr, nc)) = landuse.offset(r, c, dr, dc) {
                        let ni = landuse.idx(nr, nc);
                        if !visited[ni] {
                            visited[ni] = true;
                            labels.data[ni] = next_label;
                            queue.push_back((nr, nc));
                        }
                    }
                }
            }
            next_label += 1;
        }
    }
    Ok(labels)
}

/// Number of clumps in a label raster (the largest label).
pub fn clump_count(labels: &Raster<i32>) -> usize {
    labels
        .data
        .iter()
        .filter(|&&v| v != labels.nodata)
        .max()
        .copied()
        .unwrap_or(0) as usize
}
