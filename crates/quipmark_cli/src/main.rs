//! Quipmark CLI entry point.
mod args;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use export_logging::{export_error, export_info};
use tokio_util::sync::CancellationToken;

use quipmark_core::RunReport;
use quipmark_engine::{
    ClientSettings, ExportConfig, Exporter, Html2MdConverter, HttpQuipClient, RootSelection,
};

use args::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(report) => {
            print_summary(&report);
            if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            export_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let settings = ClientSettings {
        base_url: cli.base_url.clone(),
        ..ClientSettings::default()
    };
    let client = HttpQuipClient::new(&cli.token, settings)?;
    let converter = Html2MdConverter;

    let roots = if cli.all {
        RootSelection::AllAccessible
    } else {
        RootSelection::Folders(cli.folder_ids.clone())
    };
    let mut config = ExportConfig::new(roots, cli.output_dir());
    config.recursive = !cli.no_recursive;
    config.keep_structure = cli.maintain_structure;
    config.concurrency = cli.concurrency;

    export_info!("Exporting to {:?}", config.output_dir);

    // Ctrl-C stops intake; in-flight documents finish their atomic writes
    // and recorded progress is flushed to the manifest.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            export_info!("Interrupt received, finishing in-flight documents");
            signal_cancel.cancel();
        }
    });

    let exporter = Exporter::new(&client, &converter);
    Ok(exporter.run(&config, &cancel).await?)
}

fn print_summary(report: &RunReport) {
    println!(
        "Done. Exported: {}, Skipped: {}, Failed: {}",
        report.exported,
        report.skipped,
        report.failed.len()
    );
    for failure in &report.failed {
        println!(
            "  [failed] {} ({}): {}",
            failure.title, failure.thread_id, failure.reason
        );
    }
}
