//! Beneficiaries within cost and demand-adjusted class flow.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::{AssessmentError, Result};
use crate::raster::{DistanceMetric, Raster};
use crate::supply::windowed_clump_sum;

/// Per-threshold beneficiaries: the disaggregated population reachable
/// within each cost threshold, confined to the pixel's clump. Thresholds are
/// independent tasks on the worker pool.
pub fn beneficiaries_within_cost(
    population: &Raster<f32>,
    clumps: &Raster<i32>,
    costs: &[u32],
    metric: DistanceMetric,
    cancel: &CancelToken,
) -> Result<BTreeMap<u32, Raster<f32>>> {
    let rasters = costs
        .par_iter()
        .map(|&cost| {
            cancel.guard("beneficiaries within cost")?;
            Ok((cost, windowed_clump_sum(population, clumps, cost, metric)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(rasters.into_iter().collect())
}

/// Demand-adjusted flow per (class, threshold):
///
/// `flow = supply / (1 + beneficiaries / window_area)`
///
/// Supply is discounted by the demand density of the beneficiaries sharing
/// the window, so flow rises with supply and falls as competing demand
/// densifies. Dividing the count by the full window area keeps the discount
/// comparable across thresholds.
pub fn class_flow(
    supply: &BTreeMap<(i32, u32), Raster<f32>>,
    beneficiaries: &BTreeMap<u32, Raster<f32>>,
    metric: DistanceMetric,
) -> Result<BTreeMap<(i32, u32), Raster<f32>>> {
    let mut out = BTreeMap::new();
    for (&(class, cost), supply_raster) in supply {
        let Some(demand) = beneficiaries.get(&cost) else {
            return Err(AssessmentError::Config {
                reason: format!("no beneficiaries raster for threshold {cost}"),
            });
        };
        let area = metric.window_area(cost) as f32;
        let nodata = supply_raster.nodata;
        let mut flow = supply_raster.like(0.0f32, nodata);
        for i in 0..flow.data.len() {
            let s = supply_raster.data[i];
            let b = demand.data[i];
            flow.data[i] = if s == nodata || b == demand.nodata {
                nodata
            } else {
                s / (1.0 + b / area)
            };
        }
        out.insert((class, cost), flow);
    }
    Ok(out)
}
