use crate::config::DependencyRecord;
use crate::error::{ConvertError, ConvertResult};
use crate::relay::RelaySender;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use log::{debug, error, info};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Result of checking the declared dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Everything was already on disk.
    Ready,
    /// Something was installed during this run; the application has to be
    /// relaunched before converting.
    RestartRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    fn from_url(url: &str) -> Result<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();

        if file_name.ends_with(".whl") || file_name.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else {
            anyhow::bail!("Unsupported archive type: {file_name}")
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::TarGz => ".tar.gz",
        }
    }
}

pub struct Provisioner {
    dependencies: Vec<DependencyRecord>,
    client: reqwest::Client,
}

impl Provisioner {
    pub fn new(dependencies: Vec<DependencyRecord>) -> Self {
        Self::with_client(dependencies, reqwest::Client::new())
    }

    pub fn with_client(dependencies: Vec<DependencyRecord>, client: reqwest::Client) -> Self {
        Self {
            dependencies,
            client,
        }
    }

    /// Make sure every dependency is installed, downloading the missing ones.
    pub async fn ensure_ready(&self, relay: &RelaySender) -> ConvertResult<Provisioned> {
        info!("Checking dependencies...");
        relay.log("Checking dependencies...");

        let mut installed_any = false;
        for dep in &self.dependencies {
            debug!(
                "Checking dependency: {} at {}",
                dep.name,
                dep.install_path.display()
            );
            if dep.is_installed() {
                continue;
            }

            installed_any = true;
            info!("Downloading {}...", dep.name);
            relay.log(format!("Downloading {}...", dep.name));

            self.install(dep).await.map_err(|e| {
                error!("Failed to install {}: {e:#}", dep.name);
                ConvertError::provision(&dep.name, e)
            })?;

            info!("Installed {} successfully", dep.name);
            relay.log(format!("Installed {} successfully", dep.name));
        }

        if installed_any {
            info!("Dependencies installed. Restarting application...");
            relay.log("Dependencies installed. Restarting application...");
            Ok(Provisioned::RestartRequired)
        } else {
            Ok(Provisioned::Ready)
        }
    }

    async fn install(&self, dep: &DependencyRecord) -> Result<()> {
        let format = ArchiveFormat::from_url(&dep.source_url)?;
        let archive = tempfile::Builder::new()
            .prefix(&format!("{}-", dep.name))
            .suffix(format.suffix())
            .tempfile()
            .context("Failed to create temporary archive file")?;

        let digest = self.download(&dep.source_url, archive.path()).await?;
        debug!("Downloaded {} (sha256 {digest})", dep.name);
        if let Some(expected) = &dep.sha256 {
            anyhow::ensure!(
                *expected == digest,
                "Checksum mismatch for {}: expected {expected}, got {digest}",
                dep.name
            );
        }

        // Extract next to the final location first so an interrupted run
        // never leaves an install path that looks complete.
        let staging = staging_path(&dep.install_path);
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .await
                .context("Failed to remove stale staging directory")?;
        }
        fs::create_dir_all(&staging)
            .await
            .context("Failed to create staging directory")?;

        let archive_path = archive.path().to_path_buf();
        let target = staging.clone();
        tokio::task::spawn_blocking(move || match format {
            ArchiveFormat::Zip => extract_zip(&archive_path, &target),
            ArchiveFormat::TarGz => extract_tar_gz(&archive_path, &target),
        })
        .await
        .context("Extraction task failed")??;

        fs::rename(&staging, &dep.install_path)
            .await
            .with_context(|| format!("Failed to move {} into place", dep.name))?;

        archive
            .close()
            .context("Failed to remove temporary archive file")?;
        Ok(())
    }

    /// Stream `url` into `dest`, returning the SHA-256 of what was written.
    async fn download(&self, url: &str, dest: &Path) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download {url}: HTTP {}", response.status());
        }

        let mut file = fs::File::create(dest)
            .await
            .context("Failed to create archive file")?;
        let mut hasher = Sha256::new();

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read download chunk")?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .context("Failed to write archive chunk")?;
        }

        file.flush().await.context("Failed to flush archive file")?;
        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn staging_path(install_path: &Path) -> PathBuf {
    let name = install_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    install_path.with_file_name(format!("{name}.partial"))
}

fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path).context("Failed to open zip archive")?;
    let mut archive = zip::ZipArchive::new(file).context("Failed to read zip archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("Failed to read zip entry")?;

        let outpath = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).context("Failed to create directory")?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).context("Failed to create parent directory")?;
        }
        let mut outfile = std::fs::File::create(&outpath).context("Failed to create output file")?;
        std::io::copy(&mut entry, &mut outfile).context("Failed to extract file")?;

        #[cfg(unix)]
        {
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                    .context("Failed to set permissions")?;
            }
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path).context("Failed to open tar.gz archive")?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .unpack(target_dir)
        .context("Failed to extract tar.gz archive")?;
    Ok(())
}
