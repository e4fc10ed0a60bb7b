#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use anyhow::Context;
use clap::CommandFactory;
use log::debug;
use std::path::Path;
use webscan::archive;
use webscan::input::{Config, Opts};
use webscan::scanner::{HttpProber, Reporter, ResultSink, ScanSummary, Scanner};
use webscan::target::{self, TargetIterator};
use webscan::tui::print_opening;
use webscan::{detail, output, warning};

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;

#[tokio::main]
#[allow(clippy::too_many_lines)]
/// Reads the command line arguments and the config file, then runs one scan.
/// A missing input or output path prints the usage and exits successfully.
async fn main() {
    #[cfg(windows)]
    let _ = ansi_term::enable_ansi_support();

    env_logger::init();

    let mut opts: Opts = Opts::read();
    if !opts.no_config {
        match Config::read(opts.config_path.clone()) {
            Ok(config) => opts.merge(&config),
            Err(e) => {
                warning!(format!("{e}\nAborting scan.\n"), opts.accessible);
                std::process::exit(1);
            }
        }
    }

    debug!("Main() `opts` arguments are {opts:?}");

    let (Some(input), Some(output)) = (opts.input.clone(), opts.output.clone()) else {
        let _ = Opts::command().print_help();
        println!();
        std::process::exit(0);
    };

    if !opts.no_banner {
        print_opening(&opts);
    }

    #[cfg(unix)]
    adjust_ulimit_size(&opts);

    match scan(&opts, &input, &output).await {
        Ok(summary) => {
            output!(
                format!(
                    "{} targets probed, {} records written to {}",
                    summary.dispatched,
                    summary.recorded,
                    output.display()
                ),
                opts.accessible
            );
            if summary.write_failures > 0 {
                warning!(
                    format!("{} records could not be written", summary.write_failures),
                    opts.accessible
                );
                std::process::exit(1);
            }
        }
        Err(e) => {
            warning!(format!("{e:#}"), opts.accessible);
            std::process::exit(1);
        }
    }

    if opts.compress {
        let dst = archive::archive_path(&output);
        let src = output.clone();
        match tokio::task::spawn_blocking(move || archive::compress(&src, &dst)).await {
            Ok(Ok(())) => detail!("File compressed", opts.accessible),
            Ok(Err(e)) => warning!(format!("Compression failed: {e:#}"), opts.accessible),
            Err(e) => warning!(format!("Compression failed: {e}"), opts.accessible),
        }
    }

    detail!("Done!", opts.accessible);
}

/// Sets up the session from the parsed options and runs it to completion.
async fn scan(opts: &Opts, input: &Path, output: &Path) -> anyhow::Result<ScanSummary> {
    let entries = target::read_lines(input)
        .await
        .with_context(|| format!("Could not read the IP list {}", input.display()))?;
    let hosts = match &opts.hosts {
        Some(path) => target::read_lines(path)
            .await
            .with_context(|| format!("Could not read the host list {}", path.display()))?,
        None => Vec::new(),
    };
    let targets = TargetIterator::new(entries, hosts, !opts.skip_bare);

    let prober = HttpProber::new(opts.probe_timeout()).context("Could not build the HTTP client")?;
    let sink = ResultSink::open(output)
        .await
        .with_context(|| format!("Could not open {}", output.display()))?;
    let total = u64::try_from(targets.total()).unwrap_or(u64::MAX);
    let reporter = Reporter::new(total, opts.verbose, opts.accessible);

    detail!("Scanning...", opts.accessible);
    let scanner = Scanner::new(targets, opts.threads, prober, sink, reporter, opts.accessible);
    debug!("Scanner finished building: {scanner:?}");

    Ok(scanner.run().await)
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.accessible
            );
        } else {
            warning!("ERROR. Failed to set ulimit value.", opts.accessible);
        }
    }

    let soft = match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(e) => {
            debug!("Could not read the file descriptor limit: {e}");
            return;
        }
    };

    let threads = u64::try_from(opts.threads).unwrap_or(u64::MAX);
    if threads > soft {
        warning!(
            format!(
                "File limit ({soft}) is lower than the number of workers ({threads}). Some probes will fail with 'too many open files'."
            ),
            opts.accessible
        );
        if soft < DEFAULT_FILE_DESCRIPTORS_LIMIT {
            detail!(
                format!("Try raising it, e.g. -u {DEFAULT_FILE_DESCRIPTORS_LIMIT}"),
                opts.accessible
            );
        }
    }
}
