//! Immutable run configuration and cost-weight schemas.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, Result};
use crate::raster::{Connectivity, DistanceMetric};

/// Nodata sentinel shared by the assessment inputs and outputs.
pub const DEFAULT_NODATA: i32 = -9999;

/// Configuration for one assessment run.
///
/// The struct is built once, validated once, and passed by reference into
/// every stage; nothing mutates it mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Nodata sentinel for integer rasters; float rasters use it cast to f32.
    pub nodata: i32,
    /// Recreation-supply patch classes.
    pub patch_classes: Vec<i32>,
    /// Linear / boundary classes assessed through their detected edges.
    pub edge_classes: Vec<i32>,
    /// Residential classes receiving disaggregated population.
    pub builtup_classes: Vec<i32>,
    /// Classes acting as movement barriers during clump detection. The
    /// nodata sentinel is always a barrier and need not be listed.
    pub barrier_classes: Vec<i32>,
    /// Edge classes whose detected edges are dilated outward by one pixel
    /// ring. Required for edge classes that are also barriers, since their
    /// own pixels lie outside every clump.
    pub buffer_edge_classes: Vec<i32>,
    /// Ascending travel-cost thresholds in pixel units.
    pub costs: Vec<u32>,
    /// Distance-decay weight per cost threshold; must cover every entry of
    /// `costs`. Weights need not sum to one.
    pub cost_weights: BTreeMap<u32, f64>,
    /// Cutoff for the average-cost reduction; larger distances are excluded
    /// from the mean.
    pub distance_threshold: u32,
    /// Maximum number of fine pixels per coarse cell that may receive
    /// population during disaggregation.
    pub max_pixel_count: usize,
    /// Reclassification applied during alignment: target code to the source
    /// codes it absorbs. Unmapped codes pass through unchanged.
    #[serde(default)]
    pub reclassification: BTreeMap<i32, Vec<i32>>,
    /// Additional codes normalised to the nodata sentinel during alignment.
    #[serde(default)]
    pub extra_nodata: Vec<i32>,
    pub connectivity: Connectivity,
    pub metric: DistanceMetric,
}

impl Default for AssessmentConfig {
    /// Defaults follow the published land-systems class scheme: forest,
    /// water and open-land patches, road and river edges (roads doubling as
    /// barriers), three residential density classes.
    fn default() -> Self {
        let costs = vec![3, 11, 21, 61];
        let cost_weights = CostWeightSchema::InverseLogistic {
            midpoint: 20.0,
            rate: 0.22,
        }
        .weights(&costs);
        Self {
            nodata: DEFAULT_NODATA,
            patch_classes: vec![300, 410, 420, 610, 620, 630, 810, 830, 840],
            edge_classes: vec![100, 700],
            builtup_classes: vec![210, 220, 230],
            barrier_classes: vec![100],
            buffer_edge_classes: vec![100],
            costs,
            cost_weights,
            distance_threshold: 61,
            max_pixel_count: 1,
            reclassification: BTreeMap::new(),
            extra_nodata: vec![0],
            connectivity: Connectivity::Eight,
            metric: DistanceMetric::Chessboard,
        }
    }
}

impl AssessmentConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AssessmentError::Config {
            reason: format!("invalid JSON configuration: {e}"),
        })
    }

    /// Patch and edge classes in ascending order: the classes assessed for
    /// supply, diversity, and proximity.
    pub fn supply_classes(&self) -> Vec<i32> {
        let mut set: BTreeSet<i32> = self.patch_classes.iter().copied().collect();
        set.extend(self.edge_classes.iter().copied());
        set.into_iter().collect()
    }

    /// Every class that gets a mask: patch, edge, and builtup.
    pub fn masked_classes(&self) -> Vec<i32> {
        let mut set: BTreeSet<i32> = self.patch_classes.iter().copied().collect();
        set.extend(self.edge_classes.iter().copied());
        set.extend(self.builtup_classes.iter().copied());
        set.into_iter().collect()
    }

    /// Reject invalid configurations before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if self.patch_classes.is_empty() && self.edge_classes.is_empty() {
            return Err(config_err("no patch or edge classes configured"));
        }
        if self.builtup_classes.is_empty() {
            return Err(config_err("no builtup classes configured"));
        }
        check_disjoint("patch", &self.patch_classes, "edge", &self.edge_classes)?;
        check_disjoint("patch", &self.patch_classes, "builtup", &self.builtup_classes)?;
        check_disjoint("edge", &self.edge_classes, "builtup", &self.builtup_classes)?;

        if self.costs.is_empty() {
            return Err(config_err("no cost thresholds configured"));
        }
        if self.costs[0] == 0 {
            return Err(config_err("cost thresholds must be positive"));
        }
        if self.costs.windows(2).any(|w| w[0] >= w[1]) {
            return Err(config_err("cost thresholds must be strictly ascending"));
        }
        for &cost in &self.costs {
            match self.cost_weights.get(&cost) {
                None => {
                    return Err(config_err(format!(
                        "no cost weight for threshold {cost}"
                    )))
                }
                Some(w) if !w.is_finite() || *w < 0.0 => {
                    return Err(config_err(format!(
                        "cost weight for threshold {cost} must be finite and non-negative"
                    )))
                }
                Some(_) => {}
            }
        }
        if self.distance_threshold == 0 {
            return Err(config_err("distance_threshold must be positive"));
        }
        if self.max_pixel_count == 0 {
            return Err(config_err("max_pixel_count must be at least 1"));
        }

        // A source code claimed by two reclassification targets would make
        // alignment order-dependent.
        let mut seen: BTreeSet<i32> = BTreeSet::new();
        for sources in self.reclassification.values() {
            for &source in sources {
                if !seen.insert(source) {
                    return Err(config_err(format!(
                        "source class {source} appears under multiple reclassification targets"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn config_err(reason: impl Into<String>) -> AssessmentError {
    AssessmentError::Config {
        reason: reason.into(),
    }
}

fn check_disjoint(a_name: &str, a: &[i32], b_name: &str, b: &[i32]) -> Result<()> {
    for &code in a {
        if b.contains(&code) {
            return Err(config_err(format!(
                "class {code} appears in both {a_name} and {b_name} role sets"
            )));
        }
    }
    Ok(())
}

// ── Cost-weight schemas ───────────────────────────────────────────────────────

/// Distance-decay schemas for generating per-threshold cost weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostWeightSchema {
    /// `w(d) = d_min / d`; the nearest threshold gets weight 1.
    InverseDistance,
    /// `w(d) = 1 / (1 + exp(rate * (d - midpoint)))`.
    InverseLogistic { midpoint: f64, rate: f64 },
}

impl CostWeightSchema {
    /// Weights for the given thresholds under this schema.
    pub fn weights(self, costs: &[u32]) -> BTreeMap<u32, f64> {
        match self {
            CostWeightSchema::InverseDistance => {
                let d_min = costs.first().copied().unwrap_or(1).max(1) as f64;
                costs.iter().map(|&c| (c, d_min / c as f64)).collect()
            }
            CostWeightSchema::InverseLogistic { midpoint, rate } => costs
                .iter()
                .map(|&c| (c, 1.0 / (1.0 + (rate * (c as f64 - midpoint)).exp())))
                .collect(),
        }
    }
}
