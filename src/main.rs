use celeste_converter::config::{self, ConverterConfig};
use celeste_converter::convert::{BatchConverter, BatchError, BatchReport};
use celeste_converter::output;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

/// Source and destination of a batch.
#[derive(clap::Args, Clone)]
struct DirArgs {
    /// Directory tree to read from
    from: PathBuf,
    /// Directory tree to write into (created if missing)
    to: PathBuf,
}

#[derive(Parser)]
#[command(name = "celeste-converter")]
#[command(about = "Convert Celeste DATA bitmaps to and from PNG")]
#[command(long_about = "\
Convert Celeste DATA bitmaps to and from PNG

Every matching file under <FROM> is converted to the same relative path
under <TO>, with the extension swapped:

  data2png  Content/Graphics/Atlases/Gameplay/dirt.data  →  out/Gameplay/dirt.png
  png2data  out/Gameplay/dirt.png                        →  mod/Gameplay/dirt.data

Files are converted in parallel. A file that fails to convert does not stop
the others; the first failure is reported once everything has finished.

Run 'celeste-converter gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// Number of parallel workers (default: CPU cores, at most 8)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert DATA files to PNG
    #[command(name = "data2png")]
    DataToPng(DirArgs),
    /// Convert PNG files to DATA
    #[command(name = "png2data")]
    PngToData(DirArgs),
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Conversion failed: {err}");
            if cli.verbose {
                if let Some(batch) = err.downcast_ref::<BatchError>() {
                    for failure in batch.failures().iter().skip(1) {
                        eprintln!("    also: {failure}");
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let dirs = match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::DataToPng(dirs) | Command::PngToData(dirs) => dirs,
    };

    let mut settings = config::load_config(cli.config.as_deref())?;
    if let Some(workers) = cli.workers.filter(|&n| n > 0) {
        settings.processing.max_workers = Some(workers);
    }
    let from = std::path::absolute(&dirs.from)?;
    let to = std::path::absolute(&dirs.to)?;

    log::info!(
        "Workers: {}",
        config::effective_workers(&settings.processing)
    );
    log::debug!("Verbose: {}", cli.verbose);

    let start = Instant::now();
    let report = convert_with_progress(&cli.command, &settings, &from, &to)?;
    if !report.truncated.is_empty() {
        println!(
            "{} file(s) ended early and were padded with the default color",
            report.truncated.len()
        );
    }
    println!(
        "Conversion completed successfully in {:?}",
        start.elapsed()
    );
    Ok(())
}

/// Run one batch with a printer thread draining progress events.
fn convert_with_progress(
    command: &Command,
    settings: &ConverterConfig,
    from: &Path,
    to: &Path,
) -> Result<BatchReport, BatchError> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_convert_event(&event);
        }
    });

    let converter = BatchConverter::from_config(settings).with_events(tx);
    let result = match command {
        Command::PngToData(_) => converter.png_to_data(from, to),
        _ => converter.data_to_png(from, to),
    };
    // Dropping the converter closes the channel so the printer can finish.
    drop(converter);
    printer.join().ok();
    result
}
