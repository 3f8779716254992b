use crate::core::engine::{DEFAULT_LEN_BINS, DEFAULT_QUAL_BINS};
use crate::report::figures::DEFAULT_SCATTER_QUAL_RANGE;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lqplot",
    version,
    about = "Read length and quality distribution plots for long-read runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Plot(PlotArgs),
}

#[derive(Parser)]
pub struct PlotArgs {
    /// Tab-separated per-read table (plain or gzip).
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// 0-based column holding the read length.
    #[arg(long, default_value_t = 1)]
    pub length_col: usize,

    /// 0-based column holding the mean read quality.
    #[arg(long, default_value_t = 2)]
    pub quality_col: usize,

    /// Skip the first line of the table.
    #[arg(long, default_value_t = false)]
    pub header: bool,

    #[arg(long, short = 'o', default_value = "./plot_output")]
    pub prefix: String,

    /// png, pdf, jpg or svg; repeat or comma-separate for several.
    #[arg(long, short = 'f', value_delimiter = ',', default_value = "pdf")]
    pub format: Vec<String>,

    /// Name shown in figure titles; defaults to the last component of the prefix.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub mean_length: Option<f64>,

    #[arg(long)]
    pub std_length: Option<f64>,

    #[arg(long)]
    pub n50: Option<f64>,

    #[arg(long)]
    pub mean_quality: Option<f64>,

    #[arg(long)]
    pub mode_quality: Option<f64>,

    /// Keep reads strictly between the q and 1-q length quantiles.
    #[arg(long, conflicts_with = "std_multiplier")]
    pub quantile: Option<f64>,

    /// Keep reads within mean ± k·std of length (default 3).
    #[arg(long)]
    pub std_multiplier: Option<f64>,

    #[arg(long, default_value_t = DEFAULT_LEN_BINS)]
    pub len_bins: usize,

    #[arg(long, default_value_t = DEFAULT_QUAL_BINS)]
    pub qual_bins: usize,

    #[arg(
        long,
        num_args = 2,
        value_names = ["MIN", "MAX"],
        default_values_t = [DEFAULT_SCATTER_QUAL_RANGE.0, DEFAULT_SCATTER_QUAL_RANGE.1]
    )]
    pub scatter_qual_range: Vec<f64>,

    #[arg(long, value_enum, default_value_t = N50OrderArg::Descending)]
    pub n50_order: N50OrderArg,

    #[arg(long, value_enum, default_value_t = N50ThresholdArg::AtLeast)]
    pub n50_threshold: N50ThresholdArg,

    #[arg(long, default_value_t = false)]
    pub no_mean_length_line: bool,

    #[arg(long, default_value_t = false)]
    pub no_n50_line: bool,

    #[arg(long, default_value_t = false)]
    pub no_mean_quality_line: bool,

    #[arg(long, default_value_t = false)]
    pub no_mode_quality_line: bool,

    /// Also write `{prefix}__Summary.txt` with basic statistics.
    #[arg(long, default_value_t = false)]
    pub summary: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum N50OrderArg {
    #[value(name = "descending")]
    Descending,
    #[value(name = "ascending")]
    Ascending,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum N50ThresholdArg {
    #[value(name = "at-least")]
    AtLeast,
    #[value(name = "exceeds")]
    Exceeds,
}
