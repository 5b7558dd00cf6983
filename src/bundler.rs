use crate::error::{ConvertError, ConvertResult};
use crate::platform::Platform;
use crate::relay::RelaySender;
use log::{debug, info};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// How many trailing stderr lines are kept for the failure message.
const STDERR_TAIL: usize = 10;

/// Everything the bundler needs for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleJob {
    pub stub_path: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub name: String,
    pub window_mode: bool,
}

impl BundleJob {
    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join("build")
    }

    pub fn spec_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}.spec", self.name))
    }

    /// PyInstaller arguments for this job.
    pub fn args(&self, platform: Platform) -> Vec<OsString> {
        let mut data = self.source_dir.as_os_str().to_os_string();
        data.push(format!("/*{}.", platform.data_separator()));

        let mut args: Vec<OsString> = vec![
            self.stub_path.clone().into(),
            "--distpath".into(),
            self.output_dir.clone().into(),
            "--workpath".into(),
            self.work_dir().into(),
            "--specpath".into(),
            self.output_dir.clone().into(),
            "--name".into(),
            self.name.clone().into(),
            "--onefile".into(),
            "--noconfirm".into(),
            "--add-data".into(),
            data,
        ];
        if self.window_mode {
            args.push("--windowed".into());
        }
        args
    }
}

/// Something that can turn a launcher stub plus data folder into one executable.
pub trait Bundle: Send + Sync + 'static {
    fn invoke(
        &self,
        job: &BundleJob,
        relay: &RelaySender,
    ) -> impl Future<Output = ConvertResult<()>> + Send;
}

/// Runs PyInstaller as `python -m PyInstaller`.
pub struct PyInstaller {
    python: PathBuf,
    search_paths: Vec<PathBuf>,
    platform: Platform,
}

impl PyInstaller {
    pub fn new(python: PathBuf, search_paths: Vec<PathBuf>, platform: Platform) -> Self {
        Self {
            python,
            search_paths,
            platform,
        }
    }

    /// Check that the interpreter exists and report its version.
    async fn check_interpreter(&self) -> ConvertResult<String> {
        let output = Command::new(&self.python)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                ConvertError::Bundler(format!(
                    "Python interpreter {} not found: {e}",
                    self.python.display()
                ))
            })?;

        if !output.status.success() {
            return Err(ConvertError::Bundler(format!(
                "Python interpreter {} is not usable",
                self.python.display()
            )));
        }

        // Older interpreters print the version on stderr.
        let mut version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            version = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }
        debug!("Found Python interpreter: {version}");
        Ok(version)
    }

    fn python_path(&self) -> ConvertResult<Option<OsString>> {
        let mut paths = self.search_paths.clone();
        if let Some(existing) = std::env::var_os("PYTHONPATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        if paths.is_empty() {
            return Ok(None);
        }
        std::env::join_paths(paths)
            .map(Some)
            .map_err(|e| ConvertError::Bundler(format!("Invalid PYTHONPATH entry: {e}")))
    }
}

impl Bundle for PyInstaller {
    fn invoke(
        &self,
        job: &BundleJob,
        relay: &RelaySender,
    ) -> impl Future<Output = ConvertResult<()>> + Send {
        async move {
            self.check_interpreter().await?;

            let args = job.args(self.platform);
            debug!("PyInstaller arguments: {args:?}");

            let mut command = Command::new(&self.python);
            command
                .arg("-m")
                .arg("PyInstaller")
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(python_path) = self.python_path()? {
                command.env("PYTHONPATH", python_path);
            }

            let mut child = command
                .spawn()
                .map_err(|e| ConvertError::Bundler(format!("Failed to start PyInstaller: {e}")))?;

            let stdout = child.stdout.take().map(|out| {
                tokio::spawn(forward_lines(out, relay.clone(), 0))
            });
            let stderr = child.stderr.take().map(|err| {
                tokio::spawn(forward_lines(err, relay.clone(), STDERR_TAIL))
            });

            let status = child
                .wait()
                .await
                .map_err(|e| ConvertError::Bundler(format!("Failed to wait for PyInstaller: {e}")))?;

            if let Some(handle) = stdout {
                let _ = handle.await;
            }
            let tail = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => Vec::new(),
            };

            if !status.success() {
                let mut message = format!("PyInstaller exited with {status}");
                if !tail.is_empty() {
                    message.push('\n');
                    message.push_str(&tail.join("\n"));
                }
                return Err(ConvertError::Bundler(message));
            }

            info!("PyInstaller completed successfully");
            Ok(())
        }
    }
}

/// Relay every line of `stream` as a log event, keeping the last `keep` lines.
async fn forward_lines<R>(stream: R, relay: RelaySender, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(keep);
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("pyinstaller: {line}");
        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line.clone());
        }
        relay.log(line);
    }
    tail.into_iter().collect()
}

/// Number of files under `dir` that end up embedded in the artifact.
pub fn count_embedded_files(dir: &Path) -> u64 {
    walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .count() as u64
}
