//! Land-use alignment, reclassification, and per-class masks.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::raster::{ensure_aligned, Raster};

/// Reclassification applied during alignment: target code to the source
/// codes it absorbs.
pub type ReclassificationMap = BTreeMap<i32, Vec<i32>>;

/// Align a raw land-use raster to the run's conventions: alternative nodata
/// codes collapse onto the `nodata` sentinel and reclassified source codes
/// become their target code. Unmapped codes pass through unchanged.
pub fn align_land_use(
    landuse: &Raster<i32>,
    nodata: i32,
    extra_nodata: &[i32],
    reclassification: &ReclassificationMap,
) -> Raster<i32> {
    let mut lookup: BTreeMap<i32, i32> = BTreeMap::new();
    for (&target, sources) in reclassification {
        for &source in sources {
            lookup.insert(source, target);
        }
    }

    let mut out = landuse.clone();
    out.nodata = nodata;
    for v in &mut out.data {
        if *v == landuse.nodata || extra_nodata.contains(v) {
            *v = nodata;
        } else if let Some(&target) = lookup.get(v) {
            *v = target;
        }
    }
    out
}

/// Fill scenario nodata pixels from the baseline where the baseline carries
/// one of the named classes. Used to carry immutable structures (roads, sea)
/// into scenario maps that left them out, so clump detection sees the same
/// barriers in both runs. Pixels that already carry data are never touched.
pub fn burn_classes(
    scenario: &Raster<i32>,
    baseline: &Raster<i32>,
    classes: &[i32],
) -> Result<Raster<i32>> {
    ensure_aligned("baseline land use", baseline, scenario.rows, scenario.cols)?;
    let mut out = scenario.clone();
    for (i, v) in out.data.iter_mut().enumerate() {
        let b = baseline.data[i];
        if *v == scenario.nodata && b != baseline.nodata && classes.contains(&b) {
            *v = b;
        }
    }
    Ok(out)
}

/// 0/1 mask of one land-use class; nodata where the land use is nodata.
pub fn class_mask(landuse: &Raster<i32>, class: i32) -> Raster<i32> {
    let mut out = landuse.like(0i32, landuse.nodata);
    for (i, &v) in landuse.data.iter().enumerate() {
        out.data[i] = if v == landuse.nodata {
            landuse.nodata
        } else if v == class {
            1
        } else {
            0
        };
    }
    out
}

/// Whether the class occurs anywhere in the raster. A configured class that
/// is absent is a data warning, not an error: it simply contributes zero
/// supply and zero edges.
pub fn class_present(landuse: &Raster<i32>, class: i32) -> bool {
    landuse.data.iter().any(|&v| v == class)
}
