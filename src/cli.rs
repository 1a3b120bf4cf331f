//! CLI commands for switchback

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::boundary::BoundaryList;
use crate::extract::{run_extract, ExtractConfig, NoopSegmentHook};
use crate::formats::HsgrShard;
use crate::geo::FixedCoord;
use crate::graph::{unpack_ch_path, GraphPaths, ShardedGraph};

#[derive(Parser)]
#[command(name = "switchback")]
#[command(about = "Segmented contraction-hierarchy routing core", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a node-based graph from an OSM PBF file
    Extract {
        /// Input OSM PBF file
        input: PathBuf,

        /// Output graph file (companion .restrictions and .names files
        /// derive from this path)
        #[arg(short, long)]
        output: PathBuf,

        /// Density file with per-country boundary trees for in-town
        /// classification
        #[arg(long)]
        density: Option<PathBuf>,
    },

    /// Print the header of a CH graph shard
    ShardInfo {
        /// Shard file (.hsgr)
        shard: PathBuf,
    },

    /// Report whether a coordinate is classified as in town
    Classify {
        /// Density file with per-country boundary trees
        density: PathBuf,

        /// Longitude in degrees
        #[arg(long)]
        lon: f64,

        /// Latitude in degrees
        #[arg(long)]
        lat: f64,
    },

    /// Expand a packed CH node path into original edges
    Unpack {
        /// Graph shard files (.hsgr)
        #[arg(long, required = true)]
        graphs: Vec<PathBuf>,

        /// Coordinates side-files
        #[arg(long)]
        coordinates: Vec<PathBuf>,

        /// Geometry side-files
        #[arg(long)]
        geometries: Vec<PathBuf>,

        /// Packed path as comma-separated node ids
        #[arg(long, value_delimiter = ',', required = true)]
        path: Vec<u32>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            input,
            output,
            density,
        } => {
            let config = ExtractConfig {
                input,
                output,
                density,
            };
            let result = run_extract(&config, &NoopSegmentHook)?;
            println!(
                "{} nodes, {} edges, {} restrictions",
                result.nodes, result.edges, result.restrictions
            );
            Ok(())
        }

        Commands::ShardInfo { shard: path } => {
            let shard = HsgrShard::open(&path)
                .with_context(|| format!("Failed to open shard {}", path.display()))?;
            let range = shard.range_of_graph();
            println!("checksum:  0x{:08X}", shard.checksum());
            println!("nodes:     [{}, {})", range.start, range.end);
            println!("edges:     {}", shard.num_edges());
            Ok(())
        }

        Commands::Classify { density, lon, lat } => {
            let boundaries = BoundaryList::open(&density)
                .with_context(|| format!("Failed to load density file {}", density.display()))?;
            let coord = FixedCoord::from_degrees(lon, lat);

            let in_town = boundaries.is_in_town(coord);
            println!("{lon},{lat}: {}", if in_town { "in town" } else { "out of town" });

            if let Some(smallest) = boundaries.smallest_for(coord.to_plane()) {
                println!(
                    "smallest boundary: area {}, density {:.3e}",
                    smallest.total_area,
                    smallest.density()
                );
            }
            Ok(())
        }

        Commands::Unpack {
            graphs,
            coordinates,
            geometries,
            path,
        } => {
            let mut graph = ShardedGraph::open(&GraphPaths {
                hsgr: graphs,
                coordinates,
                geometries,
            });

            let mut count = 0usize;
            unpack_ch_path(&mut graph, &path, |(source, target), edge| {
                count += 1;
                println!("{source} -> {target}  weight {}", edge.weight);
            })?;
            println!("{count} original edges");
            Ok(())
        }
    }
}
