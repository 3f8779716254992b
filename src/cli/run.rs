use crate::cli::args::{Cli, Commands, N50OrderArg, N50ThresholdArg, PlotArgs};
use crate::core::engine::{self, RunConfig, fmt_dur, log_stage, stats_enabled};
use crate::core::io::TableLayout;
use crate::core::model::{NxConvention, SortOrder, Threshold, TrimPolicy};
use crate::core::stats::StatOverrides;
use crate::report::figures::DrawToggles;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::Path;
use std::time::Instant;

pub fn entry() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Plot(args) => plot(args),
    }
}

fn plot(args: PlotArgs) -> Result<()> {
    let stats = stats_enabled();
    let t0 = Instant::now();

    let t_pre = Instant::now();
    if !args.input.is_file() {
        bail!("input file not found: {}", args.input.display());
    }
    let config = to_config(args)?;
    // nothing is created on disk for a config that would be rejected anyway
    engine::preflight(&config).context("invalid plot options")?;
    log_stage(stats, "cli.preflight", t_pre);

    let t_out = Instant::now();
    if let Some(parent) = Path::new(&config.prefix)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir {}", parent.display()))?;
    }
    log_stage(stats, "cli.mkdir", t_out);

    let input_size = fs::metadata(&config.input).map(|m| m.len()).unwrap_or(0);

    let output = engine::run(&config)
        .with_context(|| format!("failed to plot {}", config.input.display()))?;
    let s = &output.stats;
    log::info!(
        "mean length {:.2} (std {:.2}), N50 {:?}, mean quality {:?}, mode quality {:?}",
        s.mean_length,
        s.std_length,
        s.n50,
        s.mean_quality,
        s.mode_quality
    );
    if stats {
        eprintln!(
            "LQPLOT_STATS input={} bytes={} reads={} kept={} plotted_bases={} len_bins={} qual_bins={}",
            config.input.display(),
            input_size,
            output.total_reads,
            output.kept_reads,
            output.length_hist.weighted_total(),
            output.length_hist.counts.len(),
            output.quality_hist.counts.len()
        );
        eprintln!("LQPLOT_STATS total={}", fmt_dur(t0.elapsed()));
    }
    for path in &output.written {
        println!("{}", path.display());
    }
    Ok(())
}

fn to_config(args: PlotArgs) -> Result<RunConfig> {
    let trim = match (args.quantile, args.std_multiplier) {
        (Some(q), _) => TrimPolicy::Quantile { q },
        (None, Some(k)) => TrimPolicy::StdWindow { k },
        (None, None) => TrimPolicy::default(),
    };
    let scatter_qual_range = match args.scatter_qual_range.as_slice() {
        [lo, hi] => (*lo, *hi),
        other => bail!("--scatter-qual-range takes MIN MAX, got {} values", other.len()),
    };
    let nx = NxConvention {
        order: match args.n50_order {
            N50OrderArg::Descending => SortOrder::Descending,
            N50OrderArg::Ascending => SortOrder::Ascending,
        },
        threshold: match args.n50_threshold {
            N50ThresholdArg::AtLeast => Threshold::AtLeast,
            N50ThresholdArg::Exceeds => Threshold::Exceeds,
        },
    };

    Ok(RunConfig {
        input: args.input,
        layout: TableLayout {
            length_col: args.length_col,
            quality_col: args.quality_col,
            header: args.header,
        },
        prefix: args.prefix,
        formats: args.format,
        name: args.name,
        overrides: StatOverrides {
            mean_length: args.mean_length,
            std_length: args.std_length,
            n50: args.n50,
            mean_quality: args.mean_quality,
            mode_quality: args.mode_quality,
        },
        trim,
        len_bins: args.len_bins,
        qual_bins: args.qual_bins,
        nx,
        draw: DrawToggles {
            mean_length: !args.no_mean_length_line,
            n50: !args.no_n50_line,
            mean_quality: !args.no_mean_quality_line,
            mode_quality: !args.no_mode_quality_line,
        },
        scatter_qual_range,
        summary: args.summary,
    })
}
