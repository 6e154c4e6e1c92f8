use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Leak detection and localization for water distribution networks.
///
/// Reads SCADA pressure and flow exports, flags sensors whose behavior
/// departs from a leak-free calibration period and estimates where each
/// leak is.
#[derive(Parser, Debug)]
#[command(name = "aquaguard", version, about)]
pub struct CliArgs {
    /// TOML configuration file
    #[arg(long, global = true, env = "AQUAGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train on the calibration window, detect and localize leaks.
    Run(RunArgs),
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory holding Pressures.csv and Flows.csv
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// EPANET network model
    #[arg(long)]
    pub inp: Option<PathBuf>,

    /// Sensor edge list (Node1,Node2[,Length,Diameter,Roughness])
    #[arg(long)]
    pub edges: Option<PathBuf>,

    /// Sensor coordinates (Node,X,Y)
    #[arg(long)]
    pub coordinates: Option<PathBuf>,

    /// Leakages table used to score localization
    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    /// Start of the leak-free calibration window
    #[arg(long, requires = "calibration_end")]
    pub calibration_start: Option<String>,

    /// End of the leak-free calibration window
    #[arg(long, requires = "calibration_start")]
    pub calibration_end: Option<String>,

    /// Flow column used as the network source
    #[arg(long)]
    pub flow_source: Option<String>,

    /// Weight of the autoencoder signal in triangulation
    #[arg(long)]
    pub w_gnn: Option<f64>,

    /// Weight of the entropy signal in triangulation
    #[arg(long)]
    pub w_ent: Option<f64>,

    /// Skip the graph autoencoder
    #[arg(long)]
    pub no_gnn: bool,

    /// Reference localization error to compute improvement against
    #[arg(long)]
    pub baseline_error: Option<f64>,

    /// Write the JSON report here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}
