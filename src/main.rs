use anyhow::{Context, Result};
use clap::Parser;
use pdp_ingest::config::{HeaderMode, OutputCompression, PipelineConfig, YearRange};
use pdp_ingest::logging::init_logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pdp-ingest")]
#[command(about = "Convert yearly PDP archives into a year-partitioned Parquet dataset")]
#[command(version)]
struct Cli {
    /// TOML config file; flags given on the command line override it
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory scanned for yearly archives
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Root of the year=<Y> partition tree
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Glob matched against archive file names
    #[arg(long)]
    pattern: Option<String>,

    /// Parent directory for per-year scratch space
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Maximum result rows per partition
    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long, value_enum)]
    header: Option<HeaderMode>,

    #[arg(long)]
    delimiter: Option<char>,

    #[arg(long, value_enum)]
    compression: Option<OutputCompression>,

    /// Replace partitions left by an earlier run
    #[arg(long)]
    overwrite: bool,

    /// Process years concurrently
    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    threads: Option<usize>,

    /// First expected year; requires --to-year
    #[arg(long, requires = "to_year")]
    from_year: Option<i32>,

    #[arg(long, requires = "from_year")]
    to_year: Option<i32>,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<(PipelineConfig, Option<PathBuf>)> {
        let mut cfg = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.input {
            cfg.input_dir = v;
        }
        if let Some(v) = self.output {
            cfg.output_dir = v;
        }
        if let Some(v) = self.pattern {
            cfg.archive_pattern = v;
        }
        if let Some(v) = self.work_dir {
            cfg.work_dir = Some(v);
        }
        if let Some(v) = self.chunk_size {
            cfg.chunk_size = v;
        }
        if let Some(v) = self.header {
            cfg.header = v;
        }
        if let Some(v) = self.delimiter {
            cfg.delimiter = v;
        }
        if let Some(v) = self.compression {
            cfg.compression = v;
        }
        if let Some(v) = self.threads {
            cfg.threads = Some(v);
        }
        if let (Some(from), Some(to)) = (self.from_year, self.to_year) {
            cfg.expected_years = Some(YearRange { from, to });
        }
        cfg.overwrite |= self.overwrite;
        cfg.parallel |= self.parallel;

        cfg.validate().context("invalid configuration")?;
        Ok((cfg, self.report))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let (cfg, report_path) = cli.into_config()?;
    info!(
        input = %cfg.input_dir.display(),
        output = %cfg.output_dir.display(),
        chunk_size = cfg.chunk_size,
        parallel = cfg.parallel,
        "starting ingest"
    );

    let report = pdp_ingest::run(&cfg).context("archive discovery failed")?;
    report.log_summary();

    if let Some(path) = report_path {
        report
            .save_to_file(&path)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}
