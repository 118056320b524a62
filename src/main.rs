mod cli;

use mp4press::{config, report};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mp_batch::{ArchivePackager, BatchOrchestrator, BatchReport, BatchState, Reporter};
use mp_core::InputFile;
use mp_engine::{FfmpegEngine, ToolRegistry};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mp4press=debug,mp_batch=debug,mp_engine=debug,mp_core=debug".to_string()
        } else {
            "mp4press=info,mp_batch=warn,mp_engine=warn,mp_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<mp_core::Error>()
                .map(mp_core::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Compress {
            files,
            output_dir,
            archive,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(compress(
                &files,
                &output_dir,
                archive,
                json,
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()).map(|_| ExitCode::SUCCESS),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref()).map(|_| ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("mp4press {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn compress(
    paths: &[PathBuf],
    output_dir: &Path,
    archive: bool,
    json: bool,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;

    let files = paths
        .iter()
        .map(|p| {
            InputFile::from_path(p).with_context(|| format!("Failed to read input file: {:?}", p))
        })
        .collect::<Result<Vec<_>>>()?;

    let engine = Arc::new(FfmpegEngine::new(config.engine.clone()));
    let reporter = Reporter::new(Arc::new(report::ConsoleSink::new()));
    let orchestrator = BatchOrchestrator::from_config(engine, &config, reporter);

    let outcome = orchestrator.process_batch(files).await?;
    let snapshot = orchestrator.reporter().snapshot();

    // The console sink has already shown the rejection message.
    if let BatchReport::Rejected { message } = &outcome {
        return Ok(ExitCode::from(
            u8::try_from(mp_core::Error::NotAccepted(message.clone()).exit_code()).unwrap_or(1),
        ));
    }

    let written = write_outputs(&snapshot, output_dir)?;

    let archive_path = if archive {
        let packager = ArchivePackager::new(config.archive.file_name.clone());
        match packager.package(snapshot.video_outputs(), snapshot.thumbnail_outputs())? {
            Some(zip) => {
                let path = output_dir.join(&zip.file_name);
                std::fs::write(&path, &zip.data)
                    .with_context(|| format!("Failed to write archive: {:?}", path))?;
                Some(path)
            }
            None => {
                eprintln!("Nothing to archive");
                None
            }
        }
    } else {
        None
    };

    if json {
        let value = serde_json::json!({
            "report": outcome,
            "batch": snapshot,
            "written": written,
            "archive": archive_path,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!();
        for record in &snapshot.records {
            println!("{}", report::summary_line(record));
        }
        for path in &written {
            tracing::debug!("Wrote {}", path.display());
        }
        if let Some(path) = &archive_path {
            println!("\nArchive: {}", path.display());
        }
    }

    let all_failed = !snapshot.records.is_empty() && snapshot.succeeded() == 0;
    if all_failed {
        Ok(ExitCode::from(4))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Write every produced output into `dir`, returning the written paths.
fn write_outputs(batch: &BatchState, dir: &Path) -> Result<Vec<PathBuf>> {
    if !batch.has_outputs() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let mut written = Vec::new();
    for output in batch.video_outputs().chain(batch.thumbnail_outputs()) {
        let path = dir.join(&output.filename);
        std::fs::write(&path, &output.data)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;
        written.push(path);
    }
    Ok(written)
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.engine).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to compress files.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Accepted media type: {}", config.acceptance.media_type);
    println!("  Transcode args: {}", config.transcode.transcode_args().join(" "));
    println!("  Thumbnail args: {}", config.transcode.thumbnail_args().join(" "));
    println!("  Engine timeout: {}s", config.engine.timeout_secs);
    println!("  Archive name: {}", config.archive.file_name);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }

    Ok(())
}
