//! PDF engine provisioning: locate, or download once, the pdfium library.
//!
//! pdfium ships as a native shared library that most machines do not have.
//! On first use it is fetched from the
//! [pdfium-binaries](https://github.com/bblanchon/pdfium-binaries) release
//! matching [`PDFIUM_RELEASE`], and only the library file is unpacked into a
//! per-release cache directory:
//!
//! - Linux: `~/.cache/pdfchat/pdfium-{RELEASE}/`
//! - macOS: `~/Library/Caches/pdfchat/pdfium-{RELEASE}/`
//! - Windows: `%LOCALAPPDATA%\pdfchat\pdfium-{RELEASE}\`
//!
//! Lookup order: `PDFIUM_LIB_PATH` (a library file, or a directory holding
//! one), then the cache directory (`PDFCHAT_PDFIUM_DIR` overrides its base),
//! then the download. Everything here blocks; call it from
//! `spawn_blocking` or `block_in_place`.

use pdfium_render::prelude::Pdfium;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// pdfium-binaries release tag (`chromium/{RELEASE}`).
pub const PDFIUM_RELEASE: &str = "7690";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const CHUNK_SIZE: usize = 64 * 1024;

/// Download progress: `(bytes so far, total bytes if known)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

/// Why the pdfium library could not be made available.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no pdfium build for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("cannot create pdfium cache directory '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pdfium download failed: {0}")]
    Download(String),

    #[error("pdfium archive is unusable: {0}")]
    Archive(String),
}

/// Release asset for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Asset {
    archive: &'static str,
    member: &'static str,
    file_name: &'static str,
}

fn asset_for(os: &str, arch: &str) -> Option<Asset> {
    let (archive, member, file_name) = match (os, arch) {
        ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so"),
        ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so"),
        ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
        ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
        ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll"),
        ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll"),
        ("windows", "x86") => ("pdfium-win-x86.tgz", "bin/pdfium.dll", "pdfium.dll"),
        _ => return None,
    };
    Some(Asset {
        archive,
        member,
        file_name,
    })
}

fn current_asset() -> Result<Asset, EngineError> {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    asset_for(os, arch).ok_or_else(|| EngineError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    })
}

/// Per-release cache directory under `base`.
fn release_dir(base: &Path) -> PathBuf {
    base.join(format!("pdfium-{PDFIUM_RELEASE}"))
}

/// Directory the downloaded library is kept in.
pub fn cache_dir() -> PathBuf {
    if let Some(base) = std::env::var_os("PDFCHAT_PDFIUM_DIR").filter(|v| !v.is_empty()) {
        return release_dir(Path::new(&base));
    }
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);
    release_dir(&base.join("pdfchat"))
}

/// Library named by `PDFIUM_LIB_PATH`, if it exists.
fn override_path() -> Option<PathBuf> {
    let raw = std::env::var_os("PDFIUM_LIB_PATH").filter(|v| !v.is_empty())?;
    let path = PathBuf::from(raw);
    if path.is_file() {
        return Some(path);
    }
    if path.is_dir() {
        let candidate = Pdfium::pdfium_platform_library_name_at_path(&path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    warn!(
        "PDFIUM_LIB_PATH '{}' has no pdfium library, falling back to the cache",
        path.display()
    );
    None
}

/// Library path that works without network access, if there is one.
pub fn local_library() -> Option<PathBuf> {
    if let Some(path) = override_path() {
        return Some(path);
    }
    let asset = current_asset().ok()?;
    let path = cache_dir().join(asset.file_name);
    path.is_file().then_some(path)
}

/// Whether [`ensure_library`] would return without downloading.
pub fn is_available_locally() -> bool {
    local_library().is_some()
}

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

/// Path to a usable pdfium library, downloading it on first use.
///
/// The path is resolved once per process.
pub fn ensure_library(progress: Option<DownloadProgress<'_>>) -> Result<PathBuf, EngineError> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    let path = match local_library() {
        Some(path) => path,
        None => download_library(progress)?,
    };
    debug!("pdfium library: {}", path.display());
    Ok(RESOLVED.get_or_init(|| path).clone())
}

fn download_library(progress: Option<DownloadProgress<'_>>) -> Result<PathBuf, EngineError> {
    let asset = current_asset()?;
    let dir = cache_dir();
    std::fs::create_dir_all(&dir).map_err(|source| EngineError::CacheDir {
        path: dir.clone(),
        source,
    })?;

    let url = format!("{RELEASE_URL}/chromium%2F{PDFIUM_RELEASE}/{}", asset.archive);
    info!("Downloading pdfium from {}", url);
    let archive = fetch(&url, progress)?;

    // Unpack next to the target, then rename, so a crash never leaves a
    // truncated library behind.
    let target = dir.join(asset.file_name);
    let partial = dir.join(format!("{}.partial", asset.file_name));
    unpack_member(&archive, asset.member, &partial)?;
    std::fs::rename(&partial, &target)
        .map_err(|e| EngineError::Archive(format!("cannot move library into place: {e}")))?;

    info!("pdfium cached at {}", target.display());
    Ok(target)
}

fn fetch(url: &str, progress: Option<DownloadProgress<'_>>) -> Result<Vec<u8>, EngineError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfchat/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| EngineError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| EngineError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(EngineError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::Download(format!("read error: {e}"))),
        };
        body.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(body.len() as u64, total);
        }
    }
    Ok(body)
}

/// Write the archive member named `member` of a `.tgz` to `dest`.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), EngineError> {
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| EngineError::Archive(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| EngineError::Archive(e.to_string()))?;
        let is_member = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .unwrap_or(false);
        if is_member {
            entry
                .unpack(dest)
                .map_err(|e| EngineError::Archive(format!("unpack {member}: {e}")))?;
            return Ok(());
        }
    }
    Err(EngineError::Archive(format!("{member} not in archive")))
}
