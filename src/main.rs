mod bundler;
mod config;
mod error;
mod launcher;
mod logging;
mod pipeline;
mod platform;
mod provisioner;
mod relay;
mod scanner;
mod session;
mod surface;
#[cfg(test)]
mod testing;

use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{AppContext, Settings, DEFAULT_LOG_FILE};
use indicatif::MultiProgress;
use log::{debug, info};
use pipeline::{ConversionRequest, Outcome, Pipeline};
use session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use surface::{JsonSurface, Surface, TerminalSurface};

/// Exit status telling the caller to launch the tool again.
const RESTART_EXIT_CODE: u8 = 3;
const RESTART_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "folderpack")]
#[command(about = "Turn a folder with an EXE or Python script plus assets into a single executable")]
#[command(version)]
#[command(
    long_about = "folderpack wraps a folder containing one executable or Python entry point and its asset files into a single self-contained executable built with PyInstaller"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Diagnostic log file, appended to on every run
    #[arg(long, global = true, env = "FOLDERPACK_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a folder into a single executable
    Convert(ConvertArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Console log with a progress bar
    Terminal,
    /// One JSON event per line on stdout
    Json,
}

#[derive(Args)]
struct ConvertArgs {
    /// Folder containing the EXE or Python script and its assets
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Folder that receives the single executable
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Hide the console window of the produced executable
    #[arg(short, long)]
    windowed: bool,
    /// Name of the produced executable (defaults to the entry point's name)
    #[arg(short, long)]
    name: Option<String>,
    /// Python interpreter used to run PyInstaller
    #[arg(long, env = "FOLDERPACK_PYTHON")]
    python: Option<PathBuf>,
    /// Directory the default source/output/dependencies folders live in
    #[arg(long, env = "FOLDERPACK_BASE_DIR")]
    base_dir: Option<PathBuf>,
    /// Where downloaded dependencies are installed
    #[arg(long, env = "FOLDERPACK_DEPS_DIR")]
    deps_dir: Option<PathBuf>,
    /// Override the PyInstaller download URL
    #[arg(long, env = "FOLDERPACK_PYINSTALLER_URL")]
    pyinstaller_url: Option<String>,
    /// Expected SHA-256 of the PyInstaller download
    #[arg(long)]
    pyinstaller_sha256: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
    format: OutputFormat,
    /// Never wait for Enter after error and success messages
    #[arg(long)]
    no_prompt: bool,
}

impl ConvertArgs {
    fn settings(&self) -> Settings {
        Settings {
            base_dir: self.base_dir.clone(),
            deps_dir: self.deps_dir.clone(),
            python: self.python.clone(),
            pyinstaller_url: self.pyinstaller_url.clone(),
            pyinstaller_sha256: self.pyinstaller_sha256.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let multi_progress = MultiProgress::new();
    let cli = Cli::parse();

    logging::init(&multi_progress, cli.verbose, &cli.log_file)?;
    info!("Application starting");

    match cli.command {
        Commands::Convert(args) => convert(args, multi_progress).await,
    }
}

async fn convert(args: ConvertArgs, multi: MultiProgress) -> anyhow::Result<ExitCode> {
    let ctx = AppContext::resolve(args.settings())?;

    let source = match args.source.clone() {
        Some(path) => path,
        None => default_dir(ctx.default_source_dir())?,
    };
    let output = match args.output.clone() {
        Some(path) => path,
        None => default_dir(ctx.default_output_dir())?,
    };

    let request = ConversionRequest::new(source, output, args.windowed, args.name.clone());
    let pipeline = Arc::new(Pipeline::pyinstaller(ctx));

    let outcome = match args.format {
        OutputFormat::Terminal => {
            let prompt = !args.no_prompt && console::user_attended_stderr();
            run_session(TerminalSurface::new(multi, prompt), pipeline, request).await
        }
        OutputFormat::Json => run_session(JsonSurface::stdout(), pipeline, request).await,
    };

    Ok(match outcome {
        Some(Outcome::Completed { artifact }) => {
            info!("Bundle created at {}", artifact.display());
            ExitCode::SUCCESS
        }
        Some(Outcome::RestartRequired) => {
            eprintln!("Dependencies were installed. Run folderpack again to convert.");
            tokio::time::sleep(RESTART_DELAY).await;
            ExitCode::from(RESTART_EXIT_CODE)
        }
        Some(Outcome::Failed {
            stage,
            kind,
            message,
        }) => {
            debug!("Conversion failed after stage {stage} ({kind:?}): {message}");
            ExitCode::FAILURE
        }
        None => ExitCode::FAILURE,
    })
}

async fn run_session<S: Surface>(
    surface: S,
    pipeline: Arc<Pipeline<bundler::PyInstaller>>,
    request: ConversionRequest,
) -> Option<Outcome> {
    let mut session = Session::new(surface);
    session.start(pipeline, request);
    session.wait().await
}

/// Default folders are created up front so they can be filled in.
fn default_dir(path: PathBuf) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&path)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
    debug!("Default path: {}", path.display());
    Ok(path)
}
