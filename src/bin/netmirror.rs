//! netmirror command-line entry point.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use netmirror::config::{MirrorConfig, MirrorSettings};
use netmirror::logging::init_logging;
use netmirror::remote::driver::CliDriver;
use netmirror::sync::reconciler::Reconciler;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "netmirror", version, about = "Mirror a local tree onto a remote namespace through an external driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the source tree: provision remote directories and upload
    /// files whose remote content is absent or different.
    Backup(RunArgs),
    /// Audit only: report which files have no remote metadata, without
    /// creating or uploading anything.
    Examine(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// TOML settings file; inline flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Driver executable path.
    #[arg(long)]
    driver: Option<PathBuf>,

    /// Local source root.
    #[arg(long)]
    src: Option<PathBuf>,

    /// Remote destination root.
    #[arg(long)]
    dst: Option<String>,

    /// Exclude file names matching this pattern.
    #[arg(long)]
    ignore: Option<String>,

    /// Only consider file names matching this pattern.
    #[arg(long)]
    include: Option<String>,

    /// Log level / filter directive.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also log to a file; without a value, a dated file under ./log/ is
    /// used.
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    log_file: Option<PathBuf>,
}

impl RunArgs {
    fn into_settings(self) -> Result<(MirrorSettings, String, Option<Option<PathBuf>>)> {
        let mut settings = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {:?}", path))?;
                toml::from_str::<MirrorSettings>(&raw)
                    .with_context(|| format!("failed to parse config file {:?}", path))?
            }
            None => {
                let (driver, src, dst) = match (&self.driver, &self.src, &self.dst) {
                    (Some(d), Some(s), Some(t)) => (d.clone(), s.clone(), t.clone()),
                    _ => bail!("either --config or all of --driver/--src/--dst are required"),
                };
                MirrorSettings {
                    driver,
                    src,
                    dst,
                    ignore: None,
                    include: None,
                    retry: Default::default(),
                }
            }
        };
        if let Some(driver) = self.driver {
            settings.driver = driver;
        }
        if let Some(src) = self.src {
            settings.src = src;
        }
        if let Some(dst) = self.dst {
            settings.dst = dst;
        }
        if self.ignore.is_some() {
            settings.ignore = self.ignore;
        }
        if self.include.is_some() {
            settings.include = self.include;
        }
        let log_file = self.log_file.map(|p| {
            if p.as_os_str().is_empty() {
                None
            } else {
                Some(p)
            }
        });
        Ok((settings, self.log_level, log_file))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Backup(args) => {
            let (settings, log_level, log_file) = args.into_settings()?;
            init_logging(&log_level, log_file)?;
            let config = MirrorConfig::from_settings(settings)?;
            let transport = Arc::new(CliDriver::new(&config.driver));
            let reconciler = Reconciler::new(&config, transport);
            let summary = reconciler.run().await?;
            println!(
                "uploaded: {}  skipped: {}  failed: {}  unprocessed: {}",
                summary.uploaded, summary.skipped, summary.failed, summary.unprocessed
            );
            if summary.failed > 0 || summary.unprocessed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Examine(args) => {
            let (settings, log_level, log_file) = args.into_settings()?;
            init_logging(&log_level, log_file)?;
            let config = MirrorConfig::from_settings(settings)?;
            let transport = Arc::new(CliDriver::new(&config.driver));
            let reconciler = Reconciler::new(&config, transport);
            let report = reconciler.examine().await?;
            println!("checked: {}  missing: {}", report.checked, report.missing.len());
            for path in &report.missing {
                println!("{}", path);
            }
            if !report.missing.is_empty() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
