use serde::{Deserialize, Serialize};

use crate::error::{AssessmentError, Result};

/// A single-band 2D raster storing cell values row-major over a fixed
/// rows x cols shape, with one nodata sentinel.
///
/// Nodata is absorbing: an operation that reads nodata in any input pixel
/// writes nodata to the corresponding output pixel unless it explicitly
/// defines an override, and statistics skip nodata entirely. The grid
/// boundary is hard; nothing wraps around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    /// Row-major cell values.
    pub data: Vec<T>,
    pub rows: usize,
    pub cols: usize,
    /// Sentinel marking cells that carry no value.
    pub nodata: T,
}

impl<T: Copy + PartialEq> Raster<T> {
    /// Create a raster filled with the given value.
    pub fn filled(rows: usize, cols: usize, fill: T, nodata: T) -> Self {
        Self {
            data: vec![fill; rows * cols],
            rows,
            cols,
            nodata,
        }
    }

    /// Wrap an existing row-major buffer. `data.len()` must equal rows * cols.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>, nodata: T) -> Self {
        assert_eq!(data.len(), rows * cols, "buffer length must match shape");
        Self {
            data,
            rows,
            cols,
            nodata,
        }
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        let i = self.idx(row, col);
        self.data[i] = val;
    }

    #[inline]
    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == self.nodata
    }

    /// Number of cells carrying a value.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != self.nodata).count()
    }

    pub fn same_shape<U>(&self, other: &Raster<U>) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    /// A raster of identical shape filled with `fill`, possibly of another
    /// cell type.
    pub fn like<U: Copy>(&self, fill: U, nodata: U) -> Raster<U> {
        Raster {
            data: vec![fill; self.data.len()],
            rows: self.rows,
            cols: self.cols,
            nodata,
        }
    }

    /// The cell at offset (dr, dc) from (row, col), or None past the grid
    /// boundary.
    #[inline]
    pub fn offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<(usize, usize)> {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= self.rows as isize || c >= self.cols as isize {
            None
        } else {
            Some((r as usize, c as usize))
        }
    }
}

impl Raster<i32> {
    /// Convert to f32 cells, carrying the nodata sentinel across.
    pub fn to_f32(&self) -> Raster<f32> {
        let nodata = self.nodata as f32;
        Raster {
            data: self
                .data
                .iter()
                .map(|&v| if v == self.nodata { nodata } else { v as f32 })
                .collect(),
            rows: self.rows,
            cols: self.cols,
            nodata,
        }
    }
}

/// Guard that `raster` matches the reference shape, naming the offending
/// raster in the error.
pub fn ensure_aligned<T: Copy + PartialEq>(
    name: &str,
    raster: &Raster<T>,
    rows: usize,
    cols: usize,
) -> Result<()> {
    if raster.rows == rows && raster.cols == cols {
        Ok(())
    } else {
        Err(AssessmentError::Alignment {
            name: name.to_string(),
            expected_rows: rows,
            expected_cols: cols,
            found_rows: raster.rows,
            found_cols: raster.cols,
        })
    }
}

// ── Grid topology ─────────────────────────────────────────────────────────────

const OFFSETS_4: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const OFFSETS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Neighbourhood rule used for clump labelling and travel steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Orthogonal neighbours only.
    Four,
    /// Orthogonal and diagonal neighbours.
    #[default]
    Eight,
}

impl Connectivity {
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &OFFSETS_4,
            Connectivity::Eight => &OFFSETS_8,
        }
    }
}

/// Distance rule for reachability windows and travel-step costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Chebyshev windows; every step costs 1.
    #[default]
    Chessboard,
    /// Circular windows; diagonal steps cost sqrt(2).
    Euclidean,
}

impl DistanceMetric {
    /// Whether the offset (dr, dc) lies within `threshold` pixels of the
    /// origin.
    #[inline]
    pub fn within(self, dr: isize, dc: isize, threshold: u32) -> bool {
        let t = threshold as i64;
        let dr = dr as i64;
        let dc = dc as i64;
        match self {
            DistanceMetric::Chessboard => dr.abs().max(dc.abs()) <= t,
            DistanceMetric::Euclidean => dr * dr + dc * dc <= t * t,
        }
    }

    /// Travel cost of one step between adjacent pixels.
    #[inline]
    pub fn step_cost(self, dr: isize, dc: isize) -> f32 {
        match self {
            DistanceMetric::Chessboard => 1.0,
            DistanceMetric::Euclidean => {
                if dr != 0 && dc != 0 {
                    std::f32::consts::SQRT_2
                } else {
                    1.0
                }
            }
        }
    }

    /// Number of pixels inside a full (boundary-free) window of the given
    /// threshold, the centre included.
    pub fn window_area(self, threshold: u32) -> usize {
        let t = threshold as isize;
        let mut n = 0usize;
        for dr in -t..=t {
            for dc in -t..=t {
                if self.within(dr, dc, threshold) {
                    n += 1;
                }
            }
        }
        n
    }
}
