//! `career-harvest` command line entry point

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use career_harvest::application::HarvestService;
use career_harvest::infrastructure::{
    AppConfig, DelimitedExportSink, FileDiagnostics, HttpSessionFactory, NoopDiagnostics, init_logging_with_config,
};

#[derive(Parser, Debug)]
#[command(name = "career-harvest", version, about = "Harvest job listings from configured career pages")]
struct Cli {
    /// Configuration file (extension picks the format)
    #[arg(short, long, default_value = "career-harvest.toml")]
    config: String,

    /// Only harvest these sites (repeatable, case-insensitive)
    #[arg(short, long = "site")]
    sites: Vec<String>,

    /// Override max_pages for every selected site
    #[arg(long)]
    max_pages: Option<u32>,

    /// Sites harvested at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Directory for the export file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the configured sites and adapters, then exit
    #[arg(long)]
    list_sites: bool,

    /// Skip writing the export file
    #[arg(long)]
    no_export: bool,

    /// Write a JSON report of every run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("career-harvest: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::from_file(&cli.config).with_context(|| format!("Loading {}", cli.config))?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(dir) = cli.output_dir {
        config.export.output_dir = dir;
    }

    init_logging_with_config(&config.logging)?;

    let sessions = Arc::new(HttpSessionFactory::new(&config.engine.http)?);
    let mut service = HarvestService::from_config(&config, sessions);

    if cli.list_sites {
        for (name, site) in &config.sites {
            let extractor = site.extractor.as_deref().unwrap_or("generic");
            println!(
                "{name}\t{}\textractor={extractor}{}\tmax_pages={}{}",
                site.start_url,
                if service.registry().contains(extractor) { "" } else { " (unknown)" },
                site.max_pages,
                if site.enabled { "" } else { "\tdisabled" }
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let selected: Vec<_> = config
        .selected_sites(&cli.sites)
        .into_iter()
        .map(|(name, site)| {
            let mut site = site.clone();
            if let Some(max_pages) = cli.max_pages {
                site.max_pages = max_pages.max(1);
            }
            (name.to_string(), site)
        })
        .collect();
    if selected.is_empty() {
        bail!("No sites selected; check the [sites] table or --site filters");
    }

    service = if config.diagnostics.enabled {
        service.with_diagnostics(Arc::new(FileDiagnostics::new(&config.diagnostics.directory)))
    } else {
        service.with_diagnostics(Arc::new(NoopDiagnostics))
    };
    if config.export.enabled && !cli.no_export {
        let sink = DelimitedExportSink::create(&config.export).await?;
        service = service.with_export(Arc::new(sink));
    }

    let summary = service.run_all(&selected).await;
    for run in &summary.runs {
        info!(
            "{}: {} ({} records, {} pages){}",
            run.company,
            run.status,
            run.record_count(),
            run.pages_processed,
            run.error.as_deref().map(|e| format!(" - {e}")).unwrap_or_default()
        );
    }

    if let Some(path) = &cli.report {
        let json = summary.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Writing report {}", path.display()))?;
        info!("📊 Run report written to {}", path.display());
    }

    if summary.all_failed() {
        error!("❌ Every selected site failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
