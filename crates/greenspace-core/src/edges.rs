//! Edge detection between land-use classes, with optional buffering.

use std::collections::BTreeMap;

use crate::raster::{Connectivity, Raster};

/// Detect per-class edge masks.
///
/// A pixel of class `C` is an edge iff at least one 4-neighbour carries a
/// different class; the `ignore_class` (commonly the nodata sentinel) never
/// counts as a partner. Masks for classes in `buffer_classes` are dilated
/// outward by one pixel ring, so their influence reaches the adjacent
/// pixels. For edge classes that double as barriers this is what keeps them
/// assessable at all: the ring lands on clump pixels while the class's own
/// pixels stay outside every clump.
pub fn detect_edges(
    landuse: &Raster<i32>,
    edge_classes: &[i32],
    ignore_class: i32,
    buffer_classes: &[i32],
) -> BTreeMap<i32, Raster<i32>> {
    edge_classes
        .iter()
        .map(|&class| {
            let mut mask = landuse.like(0i32, landuse.nodata);
            for row in 0..landuse.rows {
                for col in 0..landuse.cols {
                    let v = landuse.get(row, col);
                    if v == landuse.nodata {
                        mask.set(row, col, landuse.nodata);
                        continue;
                    }
                    if v != class {
                        continue;
                    }
                    let is_edge = Connectivity::Four.offsets().iter().any(|&(dr, dc)| {
                        landuse
                            .offset(row, col, dr, dc)
                            .map(|(nr, nc)| {
                                let n = landuse.get(nr, nc);
                                n != class && n != ignore_class
                            })
                            .unwrap_or(false)
                    });
                    if is_edge {
                        mask.set(row, col, 1);
                    }
                }
            }
            if buffer_classes.contains(&class) {
                mask = dilate(&mask);
            }
            (class, mask)
        })
        .collect()
}

/// Dilate a 0/1 mask outward by one ring (full 3x3 neighbourhood). Nodata
/// pixels never join the mask.
fn dilate(mask: &Raster<i32>) -> Raster<i32> {
    let mut out = mask.clone();
    for row in 0..mask.rows {
        for col in 0..mask.cols {
            if mask.get(row, col) != 0 {
                continue; // nodata, or already part of the mask
            }
            let hit = Connectivity::Eight.offsets().iter().any(|&(dr, dc)| {
                mask.offset(row, col, dr, dc)
                    .map(|(nr, nc)| mask.get(nr, nc) == 1)
                    .unwrap_or(false)
            });
            if hit {
                out.set(row, col, 1);
            }
        }
    }
    out
}
