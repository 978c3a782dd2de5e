//! Landscape recreational-potential assessment over classified land-use and
//! population rasters.
//!
//! The pipeline quantifies, per pixel, how much recreational supply (area
//! and diversity of recreation-relevant land classes) is reachable within
//! travel-cost thresholds, and how much demand each supply pixel serves,
//! producing cost-weighted supply, diversity, proximity, beneficiary, and
//! flow surfaces. Stages run in a fixed order over one immutable
//! configuration:
//!
//! 1. alignment and reclassification
//! 2. clump detection (connected components with barrier classes)
//! 3. class masks and edge detection
//! 4. supply and diversity
//! 5. within-clump travel-cost fields
//! 6. population disaggregation
//! 7. beneficiaries and flow
//!
//! Raster file I/O is the caller's concern; everything here works on
//! in-memory [`Raster`] grids sharing one shape and nodata sentinel.

pub mod assessment;
pub mod cancel;
pub mod clumps;
pub mod config;
pub mod disaggregation;
pub mod edges;
pub mod error;
pub mod flow;
pub mod landuse;
pub mod layout;
pub mod proximity;
pub mod raster;
pub mod supply;

pub use assessment::{Assessment, AssessmentResult, PopulationSource, RunSummary};
pub use cancel::CancelToken;
pub use config::{AssessmentConfig, CostWeightSchema, DEFAULT_NODATA};
pub use error::{AssessmentError, Result};
pub use layout::ScenarioLayout;
pub use raster::{Connectivity, DistanceMetric, Raster};
