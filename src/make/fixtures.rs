//! Test fixture download.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{Environment, Layout};
use crate::error::{Error, Result};

/// Top-level directory inside the fixture archive.
const ARCHIVE_ROOT: &str = "intraop";

/// Cached archive name under `$DOWNLOADS`.
const ARCHIVE_NAME: &str = "intraop.zip";

/// Download the fixture archive from `DATA_INTRAOP` and unpack it to
/// `tests/data`.
///
/// Returns 1 without touching the network when `DATA_INTRAOP` is unset. On CI
/// with `DOWNLOADS` set the archive is cached there and reused if non-empty.
pub async fn get_files(layout: &Layout, env: &Environment) -> Result<i32> {
    let Some(url) = env.data_url.as_deref() else {
        println!(
            "You need to specify the environment variable DATA_INTRAOP containing the link to the data repository."
        );
        println!("Contact the developer for the link");
        return Ok(1);
    };

    let mut scratch = None;
    let archive: PathBuf = match (env.ci, env.downloads.as_deref()) {
        (true, Some(downloads)) => {
            tokio::fs::create_dir_all(downloads).await?;
            downloads.join(ARCHIVE_NAME)
        }
        _ => {
            let file = tempfile::Builder::new().suffix(".zip").tempfile()?;
            let path = file.path().to_path_buf();
            scratch = Some(file);
            path
        }
    };

    info!("Fixture archive: {}", url);
    if is_empty_or_missing(&archive).await {
        download(url, &archive).await?;
    } else {
        debug!("Reusing cached archive {}", archive.display());
    }

    let tests_dir = layout.tests_dir();
    let extract_archive = archive.clone();
    tokio::task::spawn_blocking(move || extract(&extract_archive, &tests_dir))
        .await
        .map_err(|e| Error::Internal(format!("archive extraction task failed: {}", e)))??;
    drop(scratch);

    tokio::fs::rename(layout.tests_dir().join(ARCHIVE_ROOT), layout.data_dir()).await?;
    info!("Fixtures ready in {}", layout.data_dir().display());

    Ok(0)
}

async fn is_empty_or_missing(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() == 0)
        .unwrap_or(true)
}

async fn download(url: &str, target: &Path) -> Result<()> {
    let bytes = reqwest::get(url)
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(target, &bytes).await?;
    info!("Downloaded {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    zip.extract(dest)?;
    Ok(())
}
