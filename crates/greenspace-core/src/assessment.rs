//! Pipeline orchestrator: runs all assessment stages in order.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::clumps::{self, clump_count};
use crate::config::AssessmentConfig;
use crate::disaggregation;
use crate::edges;
use crate::error::{AssessmentError, Result};
use crate::flow;
use crate::landuse::{self, align_land_use};
use crate::proximity;
use crate::raster::{ensure_aligned, Raster};
use crate::supply;

/// Demand input for a run: either a coarse population raster to
/// disaggregate (baseline runs), or a baseline demand raster plus its land
/// use to transfer from (scenario runs).
pub enum PopulationSource<'a> {
    Coarse {
        population: &'a Raster<f32>,
        /// Edge length of one coarse cell in fine pixels; 1 means the
        /// population grid already matches the land-use resolution.
        cell_size: usize,
    },
    BaselineTransfer {
        population: &'a Raster<f32>,
        landuse: &'a Raster<i32>,
    },
}

/// One assessment run over an immutable configuration.
pub struct Assessment {
    config: AssessmentConfig,
    cancel: CancelToken,
}

/// Every derived raster of a completed run. Nothing here is mutated after
/// the run returns; a later correction derives a fresh raster instead.
#[derive(Debug)]
pub struct AssessmentResult {
    /// Aligned land use (nodata normalised, reclassification applied).
    pub landuse: Raster<i32>,
    pub clumps: Raster<i32>,
    /// Masks for every patch, edge, and builtup class; edge classes carry
    /// their detected (and possibly buffered) edges.
    pub class_masks: BTreeMap<i32, Raster<i32>>,
    pub class_supply: BTreeMap<(i32, u32), Raster<f32>>,
    pub total_supply: BTreeMap<u32, Raster<f32>>,
    pub average_supply: Raster<f32>,
    pub diversity: BTreeMap<u32, Raster<i32>>,
    pub average_diversity: Raster<f32>,
    pub proximity: BTreeMap<i32, Raster<f32>>,
    pub minimum_cost: Raster<f32>,
    pub average_cost: Raster<f32>,
    /// Disaggregated population, masked to the clump footprint.
    pub population: Raster<f32>,
    pub beneficiaries: BTreeMap<u32, Raster<f32>>,
    pub average_beneficiaries: Raster<f32>,
    pub class_flow: BTreeMap<(i32, u32), Raster<f32>>,
    pub total_flow: BTreeMap<u32, Raster<f32>>,
    pub average_flow: Raster<f32>,
}

/// Compact per-run figures for the summary log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub cols: usize,
    pub clump_count: usize,
    pub valid_pixels: usize,
    pub total_population: f64,
    pub mean_average_supply: f64,
    pub max_diversity: i32,
    pub mean_minimum_cost: f64,
    pub mean_average_flow: f64,
}

impl AssessmentResult {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            rows: self.landuse.rows,
            cols: self.landuse.cols,
            clump_count: clump_count(&self.clumps),
            valid_pixels: self.clumps.valid_count(),
            total_population: sum_valid(&self.population),
            mean_average_supply: mean_valid(&self.average_supply),
            max_diversity: self
                .diversity
                .values()
                .flat_map(|r| r.data.iter())
                .filter(|&&v| v != self.clumps.nodata)
                .max()
                .copied()
                .unwrap_or(0),
            mean_minimum_cost: mean_valid(&self.minimum_cost),
            mean_average_flow: mean_valid(&self.average_flow),
        }
    }
}

fn sum_valid(raster: &Raster<f32>) -> f64 {
    raster
        .data
        .iter()
        .filter(|&&v| v != raster.nodata)
        .map(|&v| v as f64)
        .sum()
}

fn mean_valid(raster: &Raster<f32>) -> f64 {
    let n = raster.valid_count();
    if n == 0 {
        0.0
    } else {
        sum_valid(raster) / n as f64
    }
}

impl Assessment {
    /// Validate the configuration and prepare a run.
    pub fn new(config: AssessmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Token for cancelling this run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every stage in order over one land-use raster and one demand
    /// source. Stages are strictly sequential; the per-class and
    /// per-threshold rasters inside a stage are computed in parallel.
    pub fn run(
        &self,
        landuse: &Raster<i32>,
        demand: &PopulationSource<'_>,
    ) -> Result<AssessmentResult> {
        let cfg = &self.config;

        // Alignment problems abort here, before any stage has run.
        match demand {
            PopulationSource::Coarse {
                population,
                cell_size,
            } => {
                if *cell_size == 0 {
                    return Err(AssessmentError::Config {
                        reason: "cell_size must be at least 1".into(),
                    });
                }
                if landuse.rows != population.rows * cell_size
                    || landuse.cols != population.cols * cell_size
                {
                    return Err(AssessmentError::Alignment {
                        name: "coarse population".into(),
                        expected_rows: landuse.rows,
                        expected_cols: landuse.cols,
                        found_rows: population.rows * cell_size,
                        found_cols: population.cols * cell_size,
                    });
                }
            }
            PopulationSource::BaselineTransfer {
                population,
                landuse: baseline_landuse,
            } => {
                ensure_aligned("baseline population", *population, landuse.rows, landuse.cols)?;
                ensure_aligned("baseline land use", *baseline_landuse, landuse.rows, landuse.cols)?;
            }
        }

        let landuse = align_land_use(
            landuse,
            cfg.nodata,
            &cfg.extra_nodata,
            &cfg.reclassification,
        );

        info!("clump detection");
        let clumps =
            clumps::detect_clumps(&landuse, &cfg.barrier_classes, cfg.connectivity, &self.cancel)?;
        info!("detected {} clumps", clump_count(&clumps));

        let mut class_masks: BTreeMap<i32, Raster<i32>> = BTreeMap::new();
        for class in cfg.masked_classes() {
            if !landuse::class_present(&landuse, class) {
                warn!("class {class} is configured but absent from the land-use raster");
            }
            class_masks.insert(class, landuse::class_mask(&landuse, class));
        }
        for (class, mask) in edges::detect_edges(
            &landuse,
            &cfg.edge_classes,
            cfg.nodata,
            &cfg.buffer_edge_classes,
        ) {
            class_masks.insert(class, mask);
        }

        let supply_set: BTreeSet<i32> = cfg.supply_classes().into_iter().collect();
        let supply_masks: BTreeMap<i32, Raster<i32>> = class_masks
            .iter()
            .filter(|(class, _)| supply_set.contains(*class))
            .map(|(&class, mask)| (class, mask.clone()))
            .collect();

        info!("supply and diversity");
        let class_supply = supply::class_total_supply(
            &supply_masks,
            &clumps,
            &cfg.costs,
            cfg.metric,
            &self.cancel,
        )?;
        let total_supply = supply::aggregate_over_classes(&class_supply, &cfg.costs);
        let average_supply = supply::average_across_cost(&total_supply, &cfg.cost_weights)?;
        let diversity = supply::class_diversity(&class_supply, &cfg.costs);
        let diversity_f: BTreeMap<u32, Raster<f32>> = diversity
            .iter()
            .map(|(&cost, raster)| (cost, raster.to_f32()))
            .collect();
        let average_diversity = supply::average_across_cost(&diversity_f, &cfg.cost_weights)?;

        info!("proximity");
        let prox = proximity::compute_proximity_rasters(
            &supply_masks,
            &clumps,
            cfg.connectivity,
            cfg.metric,
            &self.cancel,
        )?;
        let cost_stack = proximity::cost_to_closest(&prox);
        let minimum_cost = proximity::minimum_cost_to_closest(&cost_stack, &clumps);
        let average_cost =
            proximity::average_cost_to_closest(&cost_stack, &clumps, cfg.distance_threshold);

        info!("demand");
        let population = match demand {
            PopulationSource::Coarse {
                population,
                cell_size,
            } => disaggregation::disaggregate(
                population,
                &landuse,
                &cfg.builtup_classes,
                *cell_size,
                cfg.max_pixel_count,
            )?,
            PopulationSource::BaselineTransfer {
                population,
                landuse: baseline_landuse,
            } => disaggregation::transfer_population(
                &landuse,
                population,
                baseline_landuse,
                &cfg.builtup_classes,
            )?,
        };
        let population = disaggregation::mask_to_clumps(&population, &clumps);

        info!("beneficiaries and flow");
        let beneficiaries = flow::beneficiaries_within_cost(
            &population,
            &clumps,
            &cfg.costs,
            cfg.metric,
            &self.cancel,
        )?;
        let average_beneficiaries =
            supply::average_across_cost(&beneficiaries, &cfg.cost_weights)?;
        let class_flow = flow::class_flow(&class_supply, &beneficiaries, cfg.metric)?;
        let total_flow = supply::aggregate_over_classes(&class_flow, &cfg.costs);
        let average_flow = supply::average_across_cost(&total_flow, &cfg.cost_weights)?;

        Ok(AssessmentResult {
            landuse,
            clumps,
            class_masks,
            class_supply,
            total_supply,
            average_supply,
            diversity,
            average_diversity,
            proximity: prox,
            minimum_cost,
            average_cost,
            population,
            beneficiaries,
            average_beneficiaries,
            class_flow,
            total_flow,
            average_flow,
        })
    }
}
