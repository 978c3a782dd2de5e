//! Per-class reachable supply, aggregation, diversity, and the cost-weighted
//! averaging shared by every later stage.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::{AssessmentError, Result};
use crate::raster::{DistanceMetric, Raster};

/// Same-clump windowed accumulation: for every clump pixel, the sum of
/// `values` over the pixels of the same clump within `cost` under `metric`.
///
/// This is the shared kernel behind class supply (values are a 0/1 mask) and
/// beneficiaries (values are population). Nodata contributions are skipped;
/// pixels outside any clump are nodata in the output.
pub fn windowed_clump_sum(
    values: &Raster<f32>,
    clumps: &Raster<i32>,
    cost: u32,
    metric: DistanceMetric,
) -> Raster<f32> {
    debug_assert!(values.same_shape(clumps));
    let nodata = values.nodata;
    let mut out = clumps.like(0.0f32, nodata);
    let t = cost as isize;

    for row in 0..clumps.rows {
        for col in 0..clumps.cols {
            if clumps.is_nodata(row, col) {
                out.set(row, col, nodata);
                continue;
            }
            let label = clumps.get(row, col);
            let mut acc = 0.0f32;
            for dr in -t..=t {
                for dc in -t..=t {
                    if !metric.within(dr, dc, cost) {
                        continue;
                    }
                    if let Some((nr, nc)) = clumps.offset(row, col, dr, dc) {
                        if clumps.get(nr, nc) == label {
                            let v = values.get(nr, nc);
                            if v != nodata {
                                acc += v;
                            }
                        }
                    }
                }
            }
            out.set(row, col, acc);
        }
    }
    out
}

/// Per-(class, threshold) reachable supply: the area (pixel count) of each
/// class reachable within each cost threshold, confined to the pixel's
/// clump. The (class, threshold) tasks are independent and run on the
/// worker pool.
pub fn class_total_supply(
    masks: &BTreeMap<i32, Raster<i32>>,
    clumps: &Raster<i32>,
    costs: &[u32],
    metric: DistanceMetric,
    cancel: &CancelToken,
) -> Result<BTreeMap<(i32, u32), Raster<f32>>> {
    let tasks: Vec<(i32, u32)> = masks
        .keys()
        .flat_map(|&class| costs.iter().map(move |&cost| (class, cost)))
        .collect();

    let rasters = tasks
        .par_iter()
        .map(|&(class, cost)| {
            cancel.guard("class total supply")?;
            let supply = windowed_clump_sum(&masks[&class].to_f32(), clumps, cost, metric);
            Ok(((class, cost), supply))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rasters.into_iter().collect())
}

/// Sum a per-(class, threshold) stack into one aggregate raster per
/// threshold.
pub fn aggregate_over_classes(
    per_class: &BTreeMap<(i32, u32), Raster<f32>>,
    costs: &[u32],
) -> BTreeMap<u32, Raster<f32>> {
    let mut out = BTreeMap::new();
    for &cost in costs {
        let members: Vec<&Raster<f32>> = per_class
            .iter()
            .filter(|&(&(_, c), _)| c == cost)
            .map(|(_, r)| r)
            .collect();
        let Some(first) = members.first() else {
            continue;
        };
        let mut sum = first.like(0.0f32, first.nodata);
        for member in &members {
            for i in 0..sum.data.len() {
                if sum.data[i] == sum.nodata {
                    continue;
                }
                let v = member.data[i];
                if v == member.nodata {
                    sum.data[i] = sum.nodata;
                } else {
                    sum.data[i] += v;
                }
            }
        }
        out.insert(cost, sum);
    }
    out
}

/// Cost-weighted aggregation across thresholds: `sum(w_T * x_T)` per pixel.
///
/// Weights encode a distance decay and need not sum to one; with a single
/// threshold and weight 1 the result equals that threshold's raster exactly.
pub fn average_across_cost(
    per_cost: &BTreeMap<u32, Raster<f32>>,
    weights: &BTreeMap<u32, f64>,
) -> Result<Raster<f32>> {
    let Some(first) = per_cost.values().next() else {
        return Err(AssessmentError::Config {
            reason: "no per-cost rasters to aggregate".into(),
        });
    };
    let mut out = first.like(0.0f32, first.nodata);
    for (&cost, raster) in per_cost {
        let Some(&w) = weights.get(&cost) else {
            return Err(AssessmentError::Config {
                reason: format!("no cost weight for threshold {cost}"),
            });
        };
        let w = w as f32;
        for i in 0..out.data.len() {
            if out.data[i] == out.nodata {
                continue;
            }
            let v = raster.data[i];
            if v == raster.nodata {
                out.data[i] = out.nodata;
            } else {
                out.data[i] += w * v;
            }
        }
    }
    Ok(out)
}

/// Per-threshold diversity: the number of distinct supply classes with
/// non-zero reachable supply at each pixel. Zero inside a clump with nothing
/// reachable; nodata outside any clump.
pub fn class_diversity(
    per_class: &BTreeMap<(i32, u32), Raster<f32>>,
    costs: &[u32],
) -> BTreeMap<u32, Raster<i32>> {
    let mut out = BTreeMap::new();
    for &cost in costs {
        let members: Vec<&Raster<f32>> = per_class
            .iter()
            .filter(|&(&(_, c), _)| c == cost)
            .map(|(_, r)| r)
            .collect();
        let Some(first) = members.first() else {
            continue;
        };
        let nodata = first.nodata as i32;
        let mut count = first.like(0i32, nodata);
        for member in &members {
            for i in 0..count.data.len() {
                if count.data[i] == nodata {
                    continue;
                }
                let v = member.data[i];
                if v == member.nodata {
                    count.data[i] = nodata;
                } else if v > 0.0 {
                    count.data[i] += 1;
                }
            }
        }
        out.insert(cost, count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Connectivity;

    const ND: i32 = -9999;
    const NDF: f32 = -9999.0;

    /// 5x5 with a 3x3 patch of class 300 in the middle, nodata elsewhere.
    fn patch_landscape() -> (Raster<i32>, Raster<i32>) {
        let mut landuse = Raster::filled(5, 5, ND, ND);
        for r in 1..4 {
            for c in 1..4 {
                landuse.set(r, c, 300);
            }
        }
        let clumps = crate::clumps::detect_clumps(
            &landuse,
            &[],
            Connectivity::Eight,
            &CancelToken::new(),
        )
        .unwrap();
        (landuse, clumps)
    }

    fn supply_for(
        landuse: &Raster<i32>,
        clumps: &Raster<i32>,
        costs: &[u32],
    ) -> BTreeMap<(i32, u32), Raster<f32>> {
        let mut masks = BTreeMap::new();
        masks.insert(300, crate::landuse::class_mask(landuse, 300));
        class_total_supply(
            &masks,
            clumps,
            costs,
            DistanceMetric::Chessboard,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn centre_supply_counts_window_pixels() {
        let (landuse, clumps) = patch_landscape();
        let supply = supply_for(&landuse, &clumps, &[1, 2]);

        // All 9 patch pixels lie within chessboard distance 1 of the centre.
        assert_eq!(supply[&(300, 1)].get(2, 2), 9.0);
        assert_eq!(supply[&(300, 2)].get(2, 2), 9.0);
        // A corner of the patch reaches only its 2x2 quadrant at distance 1.
        assert_eq!(supply[&(300, 1)].get(1, 1), 4.0);
        assert_eq!(supply[&(300, 2)].get(1, 1), 9.0);
        // Outside the clump the supply is nodata, not zero.
        assert!(supply[&(300, 1)].is_nodata(0, 0));
    }

    #[test]
    fn supply_is_monotone_in_cost() {
        let (landuse, clumps) = patch_landscape();
        let supply = supply_for(&landuse, &clumps, &[1, 2]);
        let near = &supply[&(300, 1)];
        let far = &supply[&(300, 2)];
        for i in 0..near.data.len() {
            if near.data[i] != NDF {
                assert!(near.data[i] <= far.data[i]);
            }
        }
    }

    #[test]
    fn window_sum_respects_clump_boundary() {
        // Two one-pixel clumps separated by a nodata pixel.
        let landuse = Raster::from_vec(1, 3, vec![300, ND, 300], ND);
        let clumps = crate::clumps::detect_clumps(
            &landuse,
            &[],
            Connectivity::Eight,
            &CancelToken::new(),
        )
        .unwrap();
        let supply = supply_for(&landuse, &clumps, &[2]);
        // Distance 2 spans the gap, but the far pixel belongs to another
        // clump and never counts.
        assert_eq!(supply[&(300, 2)].get(0, 0), 1.0);
        assert_eq!(supply[&(300, 2)].get(0, 2), 1.0);
    }

    #[test]
    fn aggregate_sums_classes_per_cost() {
        let a = Raster::from_vec(1, 2, vec![1.0, 2.0], NDF);
        let b = Raster::from_vec(1, 2, vec![10.0, NDF], NDF);
        let mut per_class = BTreeMap::new();
        per_class.insert((300, 1), a);
        per_class.insert((410, 1), b);

        let total = aggregate_over_classes(&per_class, &[1]);
        assert_eq!(total[&1].data[0], 11.0);
        assert_eq!(total[&1].data[1], NDF, "nodata absorbs");
    }

    #[test]
    fn weighted_average_is_exact() {
        let (landuse, clumps) = patch_landscape();
        let supply = supply_for(&landuse, &clumps, &[1, 2]);
        let total = aggregate_over_classes(&supply, &[1, 2]);

        let mut weights = BTreeMap::new();
        weights.insert(1u32, 1.0f64);
        weights.insert(2u32, 0.5f64);
        let avg = average_across_cost(&total, &weights).unwrap();

        assert_eq!(avg.get(2, 2), 1.0 * 9.0 + 0.5 * 9.0);
        assert_eq!(avg.get(1, 1), 1.0 * 4.0 + 0.5 * 9.0);
        assert!(avg.is_nodata(0, 0));
    }

    #[test]
    fn single_threshold_average_reduces_to_input() {
        let (landuse, clumps) = patch_landscape();
        let supply = supply_for(&landuse, &clumps, &[1]);
        let total = aggregate_over_classes(&supply, &[1]);

        let mut weights = BTreeMap::new();
        weights.insert(1u32, 1.0f64);
        let avg = average_across_cost(&total, &weights).unwrap();
        assert_eq!(avg, total[&1]);
    }

    #[test]
    fn diversity_counts_distinct_classes() {
        let landuse = Raster::from_vec(1, 3, vec![300, 410, ND], ND);
        let clumps = crate::clumps::detect_clumps(
            &landuse,
            &[],
            Connectivity::Eight,
            &CancelToken::new(),
        )
        .unwrap();
        let mut masks = BTreeMap::new();
        masks.insert(300, crate::landuse::class_mask(&landuse, 300));
        masks.insert(410, crate::landuse::class_mask(&landuse, 410));
        masks.insert(999, crate::landuse::class_mask(&landuse, 999));
        let supply = class_total_supply(
            &masks,
            &clumps,
            &[1],
            DistanceMetric::Chessboard,
            &CancelToken::new(),
        )
        .unwrap();

        let diversity = class_diversity(&supply, &[1]);
        assert_eq!(diversity[&1].get(0, 0), 2, "absent class 999 contributes 0");
        assert!(diversity[&1].get(0, 0) <= 3, "never exceeds configured classes");
        assert!(diversity[&1].is_nodata(0, 2));
    }

    #[test]
    fn cancellation_stops_supply_tasks() {
        let (landuse, clumps) = patch_landscape();
        let mut masks = BTreeMap::new();
        masks.insert(300, crate::landuse::class_mask(&landuse, 300));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = class_total_supply(
            &masks,
            &clumps,
            &[1],
            DistanceMetric::Chessboard,
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::Cancelled { .. }));
    }
}
