//! GeoLite2 database bootstrap.
//!
//! On first start the GeoLite2-City archive is downloaded from MaxMind with
//! the configured license key and unpacked, flattened, into the GeoLite
//! directory. An existing directory skips the download.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Database file expected inside the GeoLite directory.
pub const DATABASE_FILE: &str = "GeoLite2-City.mmdb";

/// Name the downloaded archive is saved under.
pub const ARCHIVE_FILE: &str = "geolite.tar.gz";

const EDITION_ID: &str = "GeoLite2-City";

/// Makes sure the GeoLite directory exists and returns the database path.
///
/// The download only happens when this call creates the directory. If the
/// download or extraction fails the directory is removed again so the next
/// start retries.
pub async fn ensure_database(config: &AppConfig) -> AppResult<PathBuf> {
    let dir = PathBuf::from(&config.geolite_dir);
    let db_path = dir.join(DATABASE_FILE);

    match tokio::fs::create_dir(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::info!(dir = %dir.display(), "GeoIP DB already present");
            return Ok(db_path);
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(dir = %dir.display(), "Local geolite DB doesn't exist, downloading...");
    if let Err(e) = download_and_extract(config, &dir).await {
        if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(
                dir = %dir.display(),
                "Failed to remove partial GeoLite directory: {}",
                cleanup
            );
        }
        return Err(e);
    }

    Ok(db_path)
}

async fn download_and_extract(config: &AppConfig, dir: &Path) -> AppResult<()> {
    if config.geolite_license_key.is_empty() {
        return Err(AppError::Config(
            "GEOLITE2_LICENSE_KEY must be set to download the GeoLite2 database".to_string(),
        ));
    }

    let archive = dir.join(ARCHIVE_FILE);
    download_archive(config, &archive).await?;
    tracing::info!("Response completed");

    let dest = dir.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest))
        .await
        .map_err(|e| AppError::Geo(format!("extraction task failed: {e}")))??;
    tracing::info!(files = extracted, "Untar completed successfully");

    Ok(())
}

/// Streams the archive to `dest`. The license key never appears in errors.
async fn download_archive(config: &AppConfig, dest: &Path) -> AppResult<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(300))
        .build()?;

    let mut resp = client
        .get(&config.geolite_download_url)
        .query(&[
            ("edition_id", EDITION_ID),
            ("license_key", config.geolite_license_key.as_str()),
            ("suffix", "tar.gz"),
        ])
        .send()
        .await
        .map_err(reqwest::Error::without_url)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Geo(format!(
            "GeoLite2 download failed with status {status}"
        )));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await?;
    while let Some(chunk) = resp.chunk().await.map_err(reqwest::Error::without_url)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(())
}

/// Unpacks every regular file of a `.tar.gz` directly into `dest`,
/// dropping the archive's directory structure. Returns the file count.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> AppResult<usize> {
    let file = std::fs::File::open(archive)
        .map_err(|e| AppError::Geo(format!("cannot open {}: {e}", archive.display())))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0;
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        let Some(name) = path.file_name() else {
            continue;
        };

        let target = dest.join(name);
        tracing::debug!(entry = %path.display(), target = %target.display(), "Extracting");
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        count += 1;
    }

    Ok(count)
}
