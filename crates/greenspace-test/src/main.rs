/// Offline assessment harness: synthesizes a deterministic landscape grid,
/// runs the full recreational-potential pipeline on it, and prints a
/// per-stage summary. Useful for eyeballing pipeline behaviour without any
/// raster files.
use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;

use greenspace_core::{
    Assessment, AssessmentConfig, CostWeightSchema, PopulationSource, Raster, RunSummary,
};

#[derive(Parser, Debug)]
#[command(
    name = "greenspace-test",
    about = "Run the assessment pipeline over a synthetic landscape"
)]
struct Args {
    /// Grid rows of the synthetic land-use raster.
    #[arg(long, default_value = "48")]
    rows: usize,

    /// Grid columns of the synthetic land-use raster.
    #[arg(long, default_value = "64")]
    cols: usize,

    /// Edge length of one coarse population cell, in fine pixels. Must
    /// divide both rows and cols.
    #[arg(long, default_value = "4")]
    cell_size: usize,

    /// Emit the report as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct HarnessReport {
    costs: Vec<u32>,
    summary: RunSummary,
}

// Class codes used by the synthetic landscape; they follow the default
// configuration's scheme.
const OPEN_LAND: i32 = 500;
const FOREST: i32 = 300;
const WATER: i32 = 610;
const ROAD: i32 = 100;
const RIVER: i32 = 700;
const RESIDENTIAL: i32 = 210;

/// A landscape with forest patches, a lake, a road barrier down the middle,
/// a river band, a residential block, and a nodata margin. Purely a
/// function of the grid shape.
fn synthetic_landuse(rows: usize, cols: usize, nodata: i32) -> Raster<i32> {
    let mut landuse = Raster::filled(rows, cols, OPEN_LAND, nodata);

    for r in 0..rows {
        for c in 0..cols {
            // one-pixel nodata margin, as clipped maps have
            if r == 0 || c == 0 || r == rows - 1 || c == cols - 1 {
                landuse.set(r, c, nodata);
            } else if c == cols / 2 {
                landuse.set(r, c, ROAD);
            } else if r == rows / 3 && c < cols / 2 {
                landuse.set(r, c, RIVER);
            } else if (r / 6 + c / 6) % 3 == 0 {
                landuse.set(r, c, FOREST);
            } else if r > (2 * rows) / 3 && c > (3 * cols) / 4 {
                landuse.set(r, c, WATER);
            } else if r < rows / 4 && c > cols / 2 + cols / 8 && c < (3 * cols) / 4 {
                landuse.set(r, c, RESIDENTIAL);
            }
        }
    }
    landuse
}

/// A coarse population surface peaking towards the residential quarter.
fn synthetic_population(rows: usize, cols: usize, nodata: f32) -> Raster<f32> {
    let mut population = Raster::filled(rows, cols, 0.0f32, nodata);
    for r in 0..rows {
        for c in 0..cols {
            population.set(r, c, ((r * 7 + c * 3) % 23) as f32);
        }
    }
    population
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.rows < 8 || args.cols < 8 {
        bail!("grid must be at least 8x8");
    }
    if args.cell_size == 0 || args.rows % args.cell_size != 0 || args.cols % args.cell_size != 0 {
        bail!("cell_size must divide rows and cols");
    }

    let mut config = AssessmentConfig::default();
    config.costs = vec![2, 5, 9];
    config.cost_weights = CostWeightSchema::InverseLogistic {
        midpoint: 5.0,
        rate: 0.5,
    }
    .weights(&config.costs);
    config.distance_threshold = 9;
    config.max_pixel_count = args.cell_size * args.cell_size;

    let landuse = synthetic_landuse(args.rows, args.cols, config.nodata);
    let population = synthetic_population(
        args.rows / args.cell_size,
        args.cols / args.cell_size,
        config.nodata as f32,
    );

    let costs = config.costs.clone();
    let assessment = Assessment::new(config)?;
    let result = assessment.run(
        &landuse,
        &PopulationSource::Coarse {
            population: &population,
            cell_size: args.cell_size,
        },
    )?;
    let report = HarnessReport {
        costs,
        summary: result.summary(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = &report.summary;
    println!("grid:                {} x {}", s.rows, s.cols);
    println!("cost thresholds:     {:?}", report.costs);
    println!("clumps:              {}", s.clump_count);
    println!("clump pixels:        {}", s.valid_pixels);
    println!("total population:    {:.1}", s.total_population);
    println!("mean avg supply:     {:.3}", s.mean_average_supply);
    println!("max diversity:       {}", s.max_diversity);
    println!("mean min cost:       {:.3}", s.mean_minimum_cost);
    println!("mean avg flow:       {:.3}", s.mean_average_flow);
    Ok(())
}
