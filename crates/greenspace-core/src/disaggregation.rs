//! Population disaggregation onto residential pixels, and the scenario
//! transfer path built on per-class baseline means.

use std::collections::BTreeMap;

use log::warn;

use crate::error::{AssessmentError, Result};
use crate::raster::{ensure_aligned, Raster};

/// Redistribute a coarse population raster onto builtup fine pixels (simple
/// area weighting).
///
/// Each coarse cell covers a `cell_size` x `cell_size` footprint of fine
/// pixels. Every builtup pixel's share is `cell_pop / n_builtup` (equal
/// weighting per pixel), but only the first `min(n_builtup, max_pixel_count)`
/// builtup pixels in scan order receive it; all other pixels get zero. Mass
/// is therefore conserved per footprint exactly while the cap does not bite;
/// once it does, the allocated total drops to
/// `cell_pop * max_pixel_count / n_builtup`.
///
/// A nodata coarse cell propagates nodata across its whole footprint; fine
/// pixels whose land use is nodata stay nodata regardless.
pub fn disaggregate(
    coarse: &Raster<f32>,
    landuse: &Raster<i32>,
    builtup_classes: &[i32],
    cell_size: usize,
    max_pixel_count: usize,
) -> Result<Raster<f32>> {
    if cell_size == 0 {
        return Err(AssessmentError::Config {
            reason: "cell_size must be at least 1".into(),
        });
    }
    if landuse.rows != coarse.rows * cell_size || landuse.cols != coarse.cols * cell_size {
        return Err(AssessmentError::Alignment {
            name: "coarse population".into(),
            expected_rows: landuse.rows,
            expected_cols: landuse.cols,
            found_rows: coarse.rows * cell_size,
            found_cols: coarse.cols * cell_size,
        });
    }

    let nodata = landuse.nodata as f32;
    let mut out = landuse.like(0.0f32, nodata);
    for (i, &v) in landuse.data.iter().enumerate() {
        if v == landuse.nodata {
            out.data[i] = nodata;
        }
    }

    let mut receivers: Vec<(usize, usize)> = Vec::new();
    for cr in 0..coarse.rows {
        for cc in 0..coarse.cols {
            let pop = coarse.get(cr, cc);
            let rows = cr * cell_size..(cr + 1) * cell_size;
            let cols = cc * cell_size..(cc + 1) * cell_size;

            if pop == coarse.nodata {
                for r in rows.clone() {
                    for c in cols.clone() {
                        out.set(r, c, nodata);
                    }
                }
                continue;
            }

            receivers.clear();
            for r in rows {
                for c in cols.clone() {
                    if builtup_classes.contains(&landuse.get(r, c)) {
                        receivers.push((r, c));
                    }
                }
            }
            if receivers.is_empty() || pop == 0.0 {
                continue;
            }
            let share = pop / receivers.len() as f32;
            for &(r, c) in receivers.iter().take(max_pixel_count) {
                out.set(r, c, share);
            }
        }
    }
    Ok(out)
}

/// Transfer a baseline demand raster onto a scenario land use.
///
/// Builtup scenario pixels take their baseline population directly, which
/// keeps demand constant where the residential fabric is unchanged. A
/// builtup pixel that is still zero afterwards (new in the scenario, or zero
/// in the baseline) receives the per-class mean of the baseline population,
/// computed over every non-nodata baseline pixel of that class with zeros
/// included. A class with no baseline pixels keeps zero and is reported as a
/// data warning.
pub fn transfer_population(
    scenario_landuse: &Raster<i32>,
    baseline_pop: &Raster<f32>,
    baseline_landuse: &Raster<i32>,
    builtup_classes: &[i32],
) -> Result<Raster<f32>> {
    ensure_aligned(
        "baseline population",
        baseline_pop,
        scenario_landuse.rows,
        scenario_landuse.cols,
    )?;
    ensure_aligned(
        "baseline land use",
        baseline_landuse,
        scenario_landuse.rows,
        scenario_landuse.cols,
    )?;

    let mut means: BTreeMap<i32, f32> = BTreeMap::new();
    for &class in builtup_classes {
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for i in 0..baseline_landuse.data.len() {
            if baseline_landuse.data[i] == class {
                let v = baseline_pop.data[i];
                if v != baseline_pop.nodata {
                    sum += v as f64;
                    n += 1;
                }
            }
        }
        if n > 0 {
            means.insert(class, (sum / n as f64) as f32);
        } else {
            warn!(
                "builtup class {class} has no baseline pixels; \
                 new pixels of this class keep zero population"
            );
        }
    }

    let nodata = scenario_landuse.nodata as f32;
    let mut out = scenario_landuse.like(0.0f32, nodata);
    for i in 0..scenario_landuse.data.len() {
        let lu = scenario_landuse.data[i];
        if lu == scenario_landuse.nodata {
            out.data[i] = nodata;
            continue;
        }
        if !builtup_classes.contains(&lu) {
            continue;
        }
        let direct = baseline_pop.data[i];
        let mut v = if direct == baseline_pop.nodata {
            0.0
        } else {
            direct
        };
        if v == 0.0 {
            if let Some(&mean) = means.get(&lu) {
                v = mean;
            }
        }
        out.data[i] = v;
    }
    Ok(out)
}

/// Stamp the clump footprint onto a demand raster: pixels outside every
/// clump become nodata. Returns a fresh raster.
pub fn mask_to_clumps(values: &Raster<f32>, clumps: &Raster<i32>) -> Raster<f32> {
    debug_assert!(values.same_shape(clumps));
    let mut out = values.clone();
    for i in 0..out.data.len() {
        if clumps.data[i] == clumps.nodata {
            out.data[i] = values.nodata;
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

    #[test]
    fn footprint_mass_is_conserved_without_cap() {
        // 2x2 coarse cells over a 4x4 land use; each footprint has two
        // builtup pixels.
        let mut landuse = Raster::filled(4, 4, 500i32, ND);
        for (r, c) in [(0, 0), (1, 1), (0, 2), (1, 3), (2, 0), (3, 1), (2, 3), (3, 3)] {
            landuse.set(r, c, 210);
        }
        let coarse = Raster::from_vec(2, 2, vec![10.0, 6.0, 4.0, 0.0], NDF);

        let fine = disaggregate(&coarse, &landuse, &[210], 2, usize::MAX).unwrap();
        for (cr, cc, expected) in [(0, 0, 10.0), (0, 1, 6.0), (1, 0, 4.0), (1, 1, 0.0)] {
            let mut total = 0.0f32;
            for r in cr * 2..cr * 2 + 2 {
                for c in cc * 2..cc * 2 + 2 {
                    if !fine.is_nodata(r, c) {
                        total += fine.get(r, c);
                    }
                }
            }
            assert_relative_eq!(total, expected, epsilon = 1e-6);
        }
        // Equal weighting per builtup pixel.
        assert_eq!(fine.get(0, 0), 5.0);
        assert_eq!(fine.get(1, 1), 5.0);
        assert_eq!(fine.get(0, 1), 0.0, "non-residential pixels receive zero");
    }

    #[test]
    fn cap_limits_receivers_and_loses_mass() {
        // One coarse cell, 6 builtup pixels among 9, population 12.
        let mut landuse = Raster::filled(3, 3, 500i32, ND);
        for (r, c) in [(0, 0), (0, 1), (1, 0), (1, 2), (2, 1), (2, 2)] {
            landuse.set(r, c, 210);
        }
        let coarse = Raster::from_vec(1, 1, vec![12.0], NDF);

        let fine = disaggregate(&coarse, &landuse, &[210], 3, 4).unwrap();
        // Share stays pop / n_builtup = 2; only the first four scan-order
        // builtup pixels receive it.
        assert_eq!(fine.get(0, 0), 2.0);
        assert_eq!(fine.get(0, 1), 2.0);
        assert_eq!(fine.get(1, 0), 2.0);
        assert_eq!(fine.get(1, 2), 2.0);
        assert_eq!(fine.get(2, 1), 0.0, "beyond the cap");
        assert_eq!(fine.get(2, 2), 0.0);
        let total: f32 = fine.data.iter().filter(|&&v| v != NDF).sum();
        assert_relative_eq!(total, 8.0, epsilon = 1e-6);
    }

    #[test]
    fn nodata_coarse_cell_blankets_its_footprint() {
        let landuse = Raster::filled(2, 2, 210i32, ND);
        let coarse = Raster::from_vec(1, 1, vec![NDF], NDF);
        let fine = disaggregate(&coarse, &landuse, &[210], 2, 1).unwrap();
        assert!(fine.data.iter().all(|&v| v == NDF));
    }

    #[test]
    fn misaligned_coarse_raster_is_rejected() {
        let landuse = Raster::filled(4, 4, 210i32, ND);
        let coarse = Raster::filled(3, 2, 1.0f32, NDF);
        let err = disaggregate(&coarse, &landuse, &[210], 2, 1).unwrap_err();
        assert!(matches!(err, AssessmentError::Alignment { .. }));
    }

    #[test]
    fn baseline_mean_fills_new_residential_pixels() {
        // Baseline: three pixels of class 210 with populations 0, 4, 8.
        let baseline_landuse = Raster::from_vec(1, 4, vec![210, 210, 210, 500], ND);
        let baseline_pop = Raster::from_vec(1, 4, vec![0.0, 4.0, 8.0, 0.0], NDF);
        // Scenario: a new 210 pixel appears where the baseline had open land.
        let scenario_landuse = Raster::from_vec(1, 4, vec![210, 210, 210, 210], ND);

        let pop = transfer_population(
            &scenario_landuse,
            &baseline_pop,
            &baseline_landuse,
            &[210],
        )
        .unwrap();
        assert_eq!(pop.get(0, 1), 4.0, "direct transfer");
        assert_eq!(pop.get(0, 2), 8.0);
        assert_eq!(pop.get(0, 3), 4.0, "new pixel takes the class mean (0+4+8)/3");
        assert_eq!(pop.get(0, 0), 4.0, "zero baseline pixels take the mean too");
    }

    #[test]
    fn class_without_baseline_keeps_zero() {
        let baseline_landuse = Raster::from_vec(1, 2, vec![500, 500], ND);
        let baseline_pop = Raster::from_vec(1, 2, vec![0.0, 0.0], NDF);
        let scenario_landuse = Raster::from_vec(1, 2, vec![220, 500], ND);

        let pop = transfer_population(
            &scenario_landuse,
            &baseline_pop,
            &baseline_landuse,
            &[220],
        )
        .unwrap();
        assert_eq!(pop.get(0, 0), 0.0);
    }

    #[test]
    fn clump_mask_blanks_outside_pixels() {
        let values = Raster::from_vec(1, 3, vec![1.0, 2.0, 3.0], NDF);
        let clumps = Raster::from_vec(1, 3, vec![1, ND, 1], ND);
        let masked = mask_to_clumps(&values, &clumps);
        assert_eq!(masked.data, vec![1.0, NDF, 3.0]);
    }
}
