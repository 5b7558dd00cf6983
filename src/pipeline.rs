use crate::bundler::{count_embedded_files, Bundle, BundleJob, PyInstaller};
use crate::config::AppContext;
use crate::error::{ConvertError, ConvertResult, ErrorKind};
use crate::launcher::{LauncherTemplate, STUB_FILE_NAME};
use crate::provisioner::{Provisioned, Provisioner};
use crate::relay::RelaySender;
use crate::scanner;
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What the user asked for when pressing start.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub id: Uuid,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub window_mode: bool,
    /// Artifact name; the entry point's file stem when absent.
    pub name: Option<String>,
}

impl ConversionRequest {
    pub fn new(source_dir: PathBuf, output_dir: PathBuf, window_mode: bool, name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_dir: trim_path(source_dir),
            output_dir: trim_path(output_dir),
            window_mode,
            name: name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }

    fn validate(&self) -> ConvertResult<()> {
        if self.source_dir.as_os_str().is_empty() || self.output_dir.as_os_str().is_empty() {
            error!("Source or output path not specified");
            return Err(ConvertError::MissingPaths);
        }
        if !self.source_dir.exists() {
            error!("Source folder does not exist: {}", self.source_dir.display());
            return Err(ConvertError::SourceMissing(self.source_dir.clone()));
        }
        Ok(())
    }
}

fn trim_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) if s.trim() != s => PathBuf::from(s.trim()),
        _ => path,
    }
}

/// Furthest point a conversion got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    ProvisionChecked,
    Scanned,
    OutputPrepared,
    StubWritten,
    Bundled,
    CleanedUp,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ProvisionChecked => "provision-checked",
            Stage::Scanned => "scanned",
            Stage::OutputPrepared => "output-prepared",
            Stage::StubWritten => "stub-written",
            Stage::Bundled => "bundled",
            Stage::CleanedUp => "cleaned-up",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { artifact: PathBuf },
    /// Dependencies were installed; nothing was converted.
    RestartRequired,
    Failed {
        /// Last stage that completed before the failure.
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
}

/// The conversion worker: provision, scan, write the launcher, bundle, clean up.
pub struct Pipeline<B: Bundle> {
    ctx: AppContext,
    provisioner: Provisioner,
    launcher: LauncherTemplate,
    bundler: B,
}

impl Pipeline<PyInstaller> {
    pub fn pyinstaller(ctx: AppContext) -> Self {
        let bundler = PyInstaller::new(ctx.python.clone(), ctx.search_paths(), ctx.platform);
        Self::new(ctx, bundler)
    }
}

impl<B: Bundle> Pipeline<B> {
    pub fn new(ctx: AppContext, bundler: B) -> Self {
        Self {
            provisioner: Provisioner::new(ctx.dependencies.clone()),
            launcher: LauncherTemplate::new(),
            ctx,
            bundler,
        }
    }

    #[cfg(test)]
    pub fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Run one conversion, reporting through `relay`. Always ends with exactly
    /// one `done` event.
    pub async fn run(&self, request: &ConversionRequest, relay: &RelaySender) -> Outcome {
        info!("Starting app conversion {}", request.id);
        debug!("Source path: {}", request.source_dir.display());
        debug!("Output path: {}", request.output_dir.display());

        let mut stage = Stage::Idle;
        let result = self.execute(request, relay, &mut stage).await;
        let outcome = match result {
            Ok(Some(artifact)) => {
                info!("Conversion completed successfully");
                relay.log("Conversion completed successfully!");
                relay.success(format!(
                    "Folder converted to single EXE successfully!\nOutput location: {}",
                    request.output_dir.display()
                ));
                Outcome::Completed { artifact }
            }
            Ok(None) => Outcome::RestartRequired,
            Err(err) => {
                let kind = err.kind();
                let message = if kind == ErrorKind::Validation {
                    err.to_string()
                } else {
                    format!("An error occurred: {err}")
                };
                error!(
                    "Conversion {} failed after stage {stage}: {:#}",
                    request.id,
                    anyhow::Error::from(err)
                );
                if kind != ErrorKind::Validation {
                    relay.log(format!("ERROR: {message}"));
                }
                relay.error(message.clone());
                Outcome::Failed {
                    stage,
                    kind,
                    message,
                }
            }
        };

        relay.done();
        outcome
    }

    async fn execute(
        &self,
        request: &ConversionRequest,
        relay: &RelaySender,
        stage: &mut Stage,
    ) -> ConvertResult<Option<PathBuf>> {
        if self.provisioner.ensure_ready(relay).await? == Provisioned::RestartRequired {
            return Ok(None);
        }
        *stage = Stage::ProvisionChecked;

        request.validate()?;

        relay.progress(0);
        relay.log("Starting conversion process...");
        relay.log(format!(
            "Scanning source directory: {}",
            request.source_dir.display()
        ));

        let target = scanner::scan(&request.source_dir).inspect_err(|e| error!("{e}"))?;
        info!("Found {} file: {}", target.kind, target.path.display());
        relay.log(format!("Found {} file: {}", target.kind, target.path.display()));
        *stage = Stage::Scanned;
        relay.progress(20);

        prepare_output_dir(&request.output_dir, relay)?;
        *stage = Stage::OutputPrepared;

        relay.log("Creating launcher script...");
        relay.progress(40);

        let stub_dir = tempfile::Builder::new()
            .prefix("folderpack-")
            .tempdir()
            .map_err(|source| ConvertError::Stub {
                path: std::env::temp_dir(),
                source,
            })?;
        let stub_path = self
            .launcher
            .write_to_dir(&target, stub_dir.path())
            .map_err(|source| ConvertError::Stub {
                path: stub_dir.path().join(STUB_FILE_NAME),
                source,
            })?;
        debug!("Created launcher script at {}", stub_path.display());
        *stage = Stage::StubWritten;

        relay.log("Configuring PyInstaller...");
        relay.progress(60);

        let job = BundleJob {
            stub_path,
            source_dir: request.source_dir.clone(),
            output_dir: request.output_dir.clone(),
            name: request.name.clone().unwrap_or_else(|| target.file_stem()),
            window_mode: request.window_mode,
        };
        if job.window_mode {
            debug!("Window mode enabled");
            relay.log("Window mode enabled - console will be hidden in final EXE");
        }
        relay.log(format!(
            "Embedding {} files from {}",
            count_embedded_files(&job.source_dir),
            job.source_dir.display()
        ));

        info!("Running PyInstaller...");
        relay.log("Running PyInstaller...");
        relay.progress(80);

        let bundled = self.bundler.invoke(&job, relay).await;
        if bundled.is_ok() {
            *stage = Stage::Bundled;
        }

        let warnings = cleanup(stub_dir, &job);
        bundled?;

        if warnings == 0 {
            debug!("Cleaned up temporary files and build artifacts");
            relay.log("Cleaned up temporary files and build artifacts");
        }
        *stage = Stage::CleanedUp;
        relay.progress(100);

        *stage = Stage::Done;
        Ok(Some(
            self.ctx.platform.artifact_path(&job.output_dir, &job.name),
        ))
    }
}

fn prepare_output_dir(output_dir: &Path, relay: &RelaySender) -> ConvertResult<()> {
    if output_dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(output_dir).map_err(|source| {
        error!("Could not create output directory: {source}");
        ConvertError::OutputDirectory {
            path: output_dir.to_path_buf(),
            source,
        }
    })?;
    debug!("Created output directory: {}", output_dir.display());
    relay.log(format!("Created output directory: {}", output_dir.display()));
    Ok(())
}

/// Remove the stub, the work directory and the spec file. Failures are only
/// logged; returns how many removals failed.
fn cleanup(stub_dir: tempfile::TempDir, job: &BundleJob) -> usize {
    let mut failures = 0;

    let stub_dir_path = stub_dir.path().to_path_buf();
    if let Err(e) = stub_dir.close() {
        warn!("Failed to remove launcher directory {}: {e}", stub_dir_path.display());
        failures += 1;
    }

    let work_dir = job.work_dir();
    if work_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&work_dir) {
            warn!("Failed to remove build directory {}: {e}", work_dir.display());
            failures += 1;
        }
    }

    let spec_file = job.spec_file();
    if spec_file.exists() {
        if let Err(e) = fs::remove_file(&spec_file) {
            warn!("Failed to remove spec file {}: {e}", spec_file.display());
            failures += 1;
        }
    }

    failures
}
