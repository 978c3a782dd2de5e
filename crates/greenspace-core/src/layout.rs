//! Deterministic on-disk layout for scenario inputs and derived outputs.
//!
//! Path derivation only. Reading and writing the rasters themselves belongs
//! to the caller, so a later run can locate prior outputs without
//! re-specifying every path.

use std::path::{Path, PathBuf};

/// Conventional directory tree under one scenario root.
///
/// `BASE/` holds the aligned land use, class masks, and clump labels;
/// `DEMAND/` the disaggregated population and beneficiaries; the remaining
/// folders one derived product family each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioLayout {
    root: PathBuf,
}

impl ScenarioLayout {
    pub fn new(working_directory: impl AsRef<Path>, scenario: &str) -> Self {
        Self {
            root: working_directory.as_ref().join(scenario),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.join("BASE")
    }

    pub fn demand_dir(&self) -> PathBuf {
        self.root.join("DEMAND")
    }

    pub fn supply_dir(&self) -> PathBuf {
        self.root.join("SUPPLY")
    }

    pub fn diversity_dir(&self) -> PathBuf {
        self.root.join("DIVERSITY")
    }

    pub fn proximity_dir(&self) -> PathBuf {
        self.root.join("PROXIMITY")
    }

    pub fn flow_dir(&self) -> PathBuf {
        self.root.join("FLOW")
    }

    // ── Inputs and preprocessing ──────────────────────────────────────────

    pub fn land_use(&self) -> PathBuf {
        self.base_dir().join("lulc.tif")
    }

    pub fn clumps(&self) -> PathBuf {
        self.base_dir().join("clumps.tif")
    }

    pub fn class_mask(&self, class: i32) -> PathBuf {
        self.base_dir().join(format!("mask_{class}.tif"))
    }

    // ── Supply and diversity ──────────────────────────────────────────────

    pub fn class_supply(&self, class: i32, cost: u32) -> PathBuf {
        self.supply_dir()
            .join(format!("supply_class_{class}_cost_{cost}.tif"))
    }

    pub fn total_supply(&self, cost: u32) -> PathBuf {
        self.supply_dir().join(format!("total_supply_cost_{cost}.tif"))
    }

    pub fn average_supply(&self) -> PathBuf {
        self.supply_dir().join("averaged_supply.tif")
    }

    pub fn diversity(&self, cost: u32) -> PathBuf {
        self.diversity_dir().join(format!("diversity_cost_{cost}.tif"))
    }

    pub fn average_diversity(&self) -> PathBuf {
        self.diversity_dir().join("averaged_diversity.tif")
    }

    // ── Proximity ─────────────────────────────────────────────────────────

    pub fn proximity(&self, class: i32) -> PathBuf {
        self.proximity_dir().join(format!("proximity_class_{class}.tif"))
    }

    pub fn minimum_cost(&self) -> PathBuf {
        self.proximity_dir().join("minimum_cost_to_closest.tif")
    }

    pub fn average_cost(&self) -> PathBuf {
        self.proximity_dir().join("average_cost_to_closest.tif")
    }

    // ── Demand and flow ───────────────────────────────────────────────────

    pub fn disaggregated_population(&self) -> PathBuf {
        self.demand_dir().join("disaggregated_population.tif")
    }

    pub fn beneficiaries(&self, cost: u32) -> PathBuf {
        self.demand_dir().join(format!("beneficiaries_cost_{cost}.tif"))
    }

    pub fn average_beneficiaries(&self) -> PathBuf {
        self.demand_dir().join("averaged_beneficiaries.tif")
    }

    pub fn class_flow(&self, class: i32, cost: u32) -> PathBuf {
        self.flow_dir()
            .join(format!("flow_class_{class}_cost_{cost}.tif"))
    }

    pub fn total_flow(&self, cost: u32) -> PathBuf {
        self.flow_dir().join(format!("total_flow_cost_{cost}.tif"))
    }

    pub fn average_flow(&self) -> PathBuf {
        self.flow_dir().join("averaged_flow.tif")
    }
}
