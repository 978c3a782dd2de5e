//! Within-clump travel-cost fields and their reductions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use log::warn;
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::raster::{Connectivity, DistanceMetric, Raster};

/// Frontier entry for the multi-source expansion. Ordered as a min-heap on
/// cost, ties broken by index so the expansion order is deterministic.
#[derive(Debug, Clone, Copy)]
struct Node {
    cost: f32,
    index: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.index == other.index
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Travel cost from every clump pixel to the nearest same-clump pixel of one
/// class (multi-source Dijkstra over the clump pixels; steps cost 1, or
/// sqrt(2) on diagonals under the euclidean metric). Pixels with no
/// reachable instance of the class keep the nodata sentinel; so do all
/// pixels outside any clump. Expansion never crosses nodata, so a clump
/// without the class stays entirely unreachable.
pub fn class_proximity(
    mask: &Raster<i32>,
    clumps: &Raster<i32>,
    connectivity: Connectivity,
    metric: DistanceMetric,
) -> Raster<f32> {
    debug_assert!(mask.same_shape(clumps));
    let nodata = clumps.nodata as f32;
    let mut dist = vec![f32::INFINITY; clumps.data.len()];
    let mut heap = BinaryHeap::new();

    for i in 0..clumps.data.len() {
        if clumps.data[i] != clumps.nodata && mask.data[i] == 1 {
            dist[i] = 0.0;
            heap.push(Node { cost: 0.0, index: i });
        }
    }

    let offsets = connectivity.offsets();
    while let Some(Node { cost, index }) = heap.pop() {
        if cost > dist[index] {
            continue; // stale entry
        }
        let row = index / clumps.cols;
        let col = index % clumps.cols;
        for &(dr, dc) in offsets {
            if let Some((nr, nc)) = clumps.offset(row, col, dr, dc) {
                let ni = clumps.idx(nr, nc);
                if clumps.data[ni] == clumps.nodata {
                    continue;
                }
                let next = cost + metric.step_cost(dr, dc);
                if next < dist[ni] {
                    dist[ni] = next;
                    heap.push(Node {
                        cost: next,
                        index: ni,
                    });
                }
            }
        }
    }

    let mut out = clumps.like(nodata, nodata);
    for (i, &d) in dist.iter().enumerate() {
        if clumps.data[i] != clumps.nodata && d.is_finite() {
            out.data[i] = d;
        }
    }
    out
}

/// Per-class proximity rasters for the given class masks; the classes are
/// independent and run on the worker pool.
pub fn compute_proximity_rasters(
    masks: &BTreeMap<i32, Raster<i32>>,
    clumps: &Raster<i32>,
    connectivity: Connectivity,
    metric: DistanceMetric,
    cancel: &CancelToken,
) -> Result<BTreeMap<i32, Raster<f32>>> {
    let classes: Vec<i32> = masks.keys().copied().collect();
    let rasters = classes
        .par_iter()
        .map(|&class| {
            cancel.guard("proximity")?;
            Ok((
                class,
                class_proximity(&masks[&class], clumps, connectivity, metric),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rasters.into_iter().collect())
}

/// Assemble the validated per-class cost stack. A class that is reachable
/// from no clump pixel stays in the stack as all-nodata and is reported as a
/// data warning, never an error.
pub fn cost_to_closest(proximity: &BTreeMap<i32, Raster<f32>>) -> BTreeMap<i32, Raster<f32>> {
    let mut stack = BTreeMap::new();
    for (&class, raster) in proximity {
        if raster.valid_count() == 0 {
            warn!("supply class {class} is reachable from no clump pixel");
        }
        stack.insert(class, raster.clone());
    }
    stack
}

/// Per-pixel minimum travel cost to the nearest supply of any class.
pub fn minimum_cost_to_closest(
    stack: &BTreeMap<i32, Raster<f32>>,
    clumps: &Raster<i32>,
) -> Raster<f32> {
    let nodata = clumps.nodata as f32;
    let mut out = clumps.like(nodata, nodata);
    for i in 0..out.data.len() {
        if clumps.data[i] == clumps.nodata {
            continue;
        }
        let mut best = f32::INFINITY;
        for raster in stack.values() {
            let v = raster.data[i];
            if v != raster.nodata && v < best {
                best = v;
            }
        }
        if best.is_finite() {
            out.data[i] = best;
        }
    }
    out
}

/// Per-pixel mean travel cost over classes, after dropping unreachable
/// entries and distances beyond `distance_threshold`. A pixel with no
/// contributing class is nodata rather than a division failure.
pub fn average_cost_to_closest(
    stack: &BTreeMap<i32, Raster<f32>>,
    clumps: &Raster<i32>,
    distance_threshold: u32,
) -> Raster<f32> {
    let nodata = clumps.nodata as f32;
    let cutoff = distance_threshold as f32;
    let mut out = clumps.like(nodata, nodata);
    for i in 0..out.data.len() {
        if clumps.data[i] == clumps.nodata {
            continue;
        }
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for raster in stack.values() {
            let v = raster.data[i];
            if v != raster.nodata && v <= cutoff {
                sum += v as f64;
                n += 1;
            }
        }
        if n > 0 {
            out.data[i] = (sum / n as f64) as f32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ND: i32 = -9999;
    const NDF: f32 = -9999.0;

    fn clumps_of(landuse: &Raster<i32>, barriers: &[i32]) -> Raster<i32> {
        crate::clumps::detect_clumps(landuse, barriers, Connectivity::Eight, &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn chessboard_distances_from_corner() {
        let mut landuse = Raster::filled(3, 3, 500i32, ND);
        landuse.set(0, 0, 300);
        let clumps = clumps_of(&landuse, &[]);
        let mask = crate::landuse::class_mask(&landuse, 300);

        let prox = class_proximity(&mask, &clumps, Connectivity::Eight, DistanceMetric::Chessboard);
        assert_eq!(prox.get(0, 0), 0.0);
        assert_eq!(prox.get(1, 1), 1.0);
        assert_eq!(prox.get(2, 2), 2.0);
        assert_eq!(prox.get(0, 2), 2.0);
    }

    #[test]
    fn euclidean_diagonals_cost_sqrt_two() {
        let mut landuse = Raster::filled(3, 3, 500i32, ND);
        landuse.set(0, 0, 300);
        let clumps = clumps_of(&landuse, &[]);
        let mask = crate::landuse::class_mask(&landuse, 300);

        let prox = class_proximity(&mask, &clumps, Connectivity::Eight, DistanceMetric::Euclidean);
        let sqrt2 = std::f32::consts::SQRT_2;
        assert_relative_eq!(prox.get(1, 1), sqrt2, epsilon = 1e-6);
        assert_relative_eq!(prox.get(2, 2), 2.0 * sqrt2, epsilon = 1e-6);
        assert_relative_eq!(prox.get(1, 2), 1.0 + sqrt2, epsilon = 1e-6);
    }

    #[test]
    fn barrier_keeps_other_clump_unreachable() {
        // Open land split by a barrier row; class 300 only below it.
        let mut landuse = Raster::filled(5, 5, 500i32, ND);
        for c in 0..5 {
            landuse.set(2, c, 100);
        }
        landuse.set(4, 4, 300);
        let clumps = clumps_of(&landuse, &[100]);
        let mask = crate::landuse::class_mask(&landuse, 300);

        let prox = class_proximity(&mask, &clumps, Connectivity::Eight, DistanceMetric::Chessboard);
        for c in 0..5 {
            assert_eq!(prox.get(0, c), NDF, "clump A never reaches clump B");
            assert_eq!(prox.get(1, c), NDF);
        }
        assert_eq!(prox.get(4, 4), 0.0);
        assert_eq!(prox.get(3, 3), 1.0);
        assert_eq!(prox.get(4, 0), 4.0);
    }

    #[test]
    fn travel_cost_detours_around_barrier() {
        // A barrier wall with one opening forces a detour.
        let mut landuse = Raster::filled(3, 3, 500i32, ND);
        landuse.set(0, 1, 100);
        landuse.set(1, 1, 100);
        landuse.set(0, 0, 300);
        let clumps = clumps_of(&landuse, &[100]);
        let mask = crate::landuse::class_mask(&landuse, 300);

        let prox = class_proximity(&mask, &clumps, Connectivity::Four, DistanceMetric::Chessboard);
        // Straight-line distance from (0,2) is 2; the path around the wall
        // is (0,2) -> (1,2) -> (2,2)/(2,1) -> ... -> (0,0), length 6.
        assert_eq!(prox.get(0, 2), 6.0);
    }

    #[test]
    fn reductions_over_the_stack() {
        let mut landuse = Raster::filled(1, 4, 500i32, ND);
        landuse.set(0, 0, 300);
        landuse.set(0, 3, 410);
        let clumps = clumps_of(&landuse, &[]);
        let mut masks = BTreeMap::new();
        masks.insert(300, crate::landuse::class_mask(&landuse, 300));
        masks.insert(410, crate::landuse::class_mask(&landuse, 410));

        let prox = compute_proximity_rasters(
            &masks,
            &clumps,
            Connectivity::Eight,
            DistanceMetric::Chessboard,
            &CancelToken::new(),
        )
        .unwrap();
        let stack = cost_to_closest(&prox);

        let minimum = minimum_cost_to_closest(&stack, &clumps);
        assert_eq!(minimum.get(0, 1), 1.0, "min(1 to 300, 2 to 410)");
        assert_eq!(minimum.get(0, 0), 0.0);

        // Unrestricted mean at pixel 1: (1 + 2) / 2.
        let average = average_cost_to_closest(&stack, &clumps, 61);
        assert_relative_eq!(average.get(0, 1), 1.5, epsilon = 1e-6);
        // A cutoff of 1 drops the distance-2 class from the mean.
        let average = average_cost_to_closest(&stack, &clumps, 1);
        assert_relative_eq!(average.get(0, 1), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn pixel_beyond_every_cutoff_is_nodata() {
        let mut landuse = Raster::filled(1, 5, 500i32, ND);
        landuse.set(0, 0, 300);
        let clumps = clumps_of(&landuse, &[]);
        let mut masks = BTreeMap::new();
        masks.insert(300, crate::landuse::class_mask(&landuse, 300));
        let prox = compute_proximity_rasters(
            &masks,
            &clumps,
            Connectivity::Eight,
            DistanceMetric::Chessboard,
            &CancelToken::new(),
        )
        .unwrap();
        let stack = cost_to_closest(&prox);

        let average = average_cost_to_closest(&stack, &clumps, 2);
        assert_eq!(average.get(0, 4), NDF, "distance 4 exceeds the cutoff");
        assert_eq!(average.get(0, 2), 2.0);
    }

    #[test]
    fn class_absent_from_clump_is_all_nodata_not_error() {
        let landuse = Raster::filled(2, 2, 500i32, ND);
        let clumps = clumps_of(&landuse, &[]);
        let mask = crate::landuse::class_mask(&landuse, 300);
        let prox = class_proximity(&mask, &clumps, Connectivity::Eight, DistanceMetric::Chessboard);
        assert_eq!(prox.valid_count(), 0);
    }
}
