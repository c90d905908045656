//! Per-profile session token cache.
//!
//! Each profile owns one YAML file, `<dir>/.aws-mfa-<profile>.cache`, holding
//! the last successful token exchange. An invocation reuses that entry until
//! it expires and only then asks for an MFA code.
//!
//! ## Refresh protocol
//!
//! 1. Take an exclusive advisory lock (`File::lock`) on `<dir>/.aws-mfa-<profile>.lock`, so
//!    concurrent invocations for the same profile prompt at most once between
//!    them; the second one finds the fresh entry written by the first.
//! 2. Read the whole cache file into memory. A missing, empty or unparseable
//!    file counts as "no entry"; any other read failure is fatal.
//! 3. If the entry is still valid, return it without prompting or calling the
//!    token service.
//! 4. Otherwise obtain a code, exchange it, and only after a successful
//!    exchange write the new entry to a work file (created `0600`) that is
//!    renamed over the cache file.
//!
//! The cache file is never opened for writing in place. A failed prompt,
//! exchange or write leaves the previous entry byte-for-byte intact.

use std::{
    fs::File,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    credentials::TokenExchanger,
    error::{Error, ExchangeError},
    prompt::CodeSource,
    session::SessionToken,
};

pub const PROGRAM: &str = "aws-mfa";

const FILE_MODE: u32 = 0o600;
const DIR_MODE: u32 = 0o700;

/// Cached credential provider rooted at one directory (normally `~/.aws`).
pub struct CredentialCache {
    dir: PathBuf,
}

impl CredentialCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the cache file for `profile`.
    pub fn path_for(&self, profile: &str) -> Result<PathBuf, Error> {
        validate_profile_name(profile)?;
        Ok(self.dir.join(format!(".{PROGRAM}-{profile}.cache")))
    }

    fn lock_path_for(&self, profile: &str) -> PathBuf {
        self.dir.join(format!(".{PROGRAM}-{profile}.lock"))
    }

    /// Returns a valid session token for `profile`, refreshing it through
    /// `codes` and `exchanger` only when the cached entry is absent or expired.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidProfileName`] if `profile` cannot be embedded in a file name
    /// * [`Error::CacheIo`] if the directory, lock or cache file is inaccessible
    /// * prompt errors from `codes`
    /// * [`Error::Exchange`] if the exchange fails or reports a non-success status
    pub async fn obtain<C, X>(
        &self,
        profile: &str,
        codes: &mut C,
        exchanger: &X,
    ) -> Result<SessionToken, Error>
    where
        C: CodeSource + ?Sized,
        X: TokenExchanger,
    {
        let path = self.path_for(profile)?;
        self.ensure_dir().await?;
        let lock_path = self.lock_path_for(profile);
        let _lock = {
            let target = lock_path.clone();
            tokio::task::spawn_blocking(move || CacheLock::acquire(&target))
                .await
                .map_err(|e| Error::cache_io(&lock_path)(io::Error::other(e)))??
        };

        if let Some(cached) = read_entry(&path).await? {
            if cached.is_usable(Utc::now()) {
                debug!("Using cached session token from {}", path.display());
                return Ok(cached);
            }
            info!("Cached session token expired at {}", cached.expiration);
        }

        // Reads the terminal on the runtime thread. The lock is held and
        // nothing else is scheduled until the code arrives.
        let code = codes.mfa_code()?;
        let fresh = exchanger.exchange(&code).await?;
        if !fresh.is_success() {
            return Err(ExchangeError::Status {
                status: fresh.response_status,
                message: "unexpected response status".to_string(),
            }
            .into());
        }

        write_entry(&path, &fresh).await?;
        info!("Session token cached, expires at {}", fresh.expiration);
        Ok(fresh)
    }

    async fn ensure_dir(&self) -> Result<(), Error> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder
            .create(&self.dir)
            .await
            .map_err(Error::cache_io(&self.dir))
    }
}

/// Profile names become part of a file name and must not escape the cache
/// directory.
fn validate_profile_name(profile: &str) -> Result<(), Error> {
    let invalid = profile.is_empty()
        || profile == "."
        || profile == ".."
        || profile.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidProfileName(profile.to_string()));
    }
    Ok(())
}

async fn read_entry(path: &Path) -> Result<Option<SessionToken>, Error> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            warn!("Ignoring non-UTF-8 cache file {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(Error::cache_io(path)(e)),
    };

    if content.trim().is_empty() {
        return Ok(None);
    }
    match serde_yaml::from_str(&content) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {e}", path.display());
            Ok(None)
        }
    }
}

/// Replaces the cache file with `entry` as a whole.
async fn write_entry(path: &Path, entry: &SessionToken) -> Result<(), Error> {
    let content = serde_yaml::to_string(entry)?;
    let wip = work_path(path);

    // A work file left behind by a killed process may carry any mode.
    remove_file_ignoring_enoent(&wip)
        .await
        .map_err(Error::cache_io(&wip))?;

    let written = async {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);
        let mut file = options.open(&wip).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&wip).await;
        return Err(Error::cache_io(&wip)(e));
    }

    fs::rename(&wip, path).await.map_err(|e| {
        let _ = std::fs::remove_file(&wip);
        Error::cache_io(path)(e)
    })
}

fn work_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".wip");
    path.with_file_name(name)
}

async fn remove_file_ignoring_enoent(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Exclusive advisory lock on the profile's lock file, released on drop.
struct CacheLock {
    _file: File,
}

impl CacheLock {
    fn acquire(path: &Path) -> Result<Self, Error> {
        let mut options = std::fs::OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }
        let file = options.open(path).map_err(Error::cache_io(path))?;
        // Waits until the other holder finishes its refresh.
        file.lock().map_err(Error::cache_io(path))?;

        Ok(Self { _file: file })
    }
}
