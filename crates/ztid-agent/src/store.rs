//! On-disk certificate bundle.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ztid_core::api::IssueResponse;

use crate::error::AgentError;

pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";
pub const CHAIN_FILE: &str = "chain.pem";

/// Writes the issued material into a single directory.
#[derive(Debug, Clone)]
pub struct CertStore {
    dir: PathBuf,
}

impl CertStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write cert, key and chain. Each file is replaced atomically; the key
    /// is owner-only.
    pub fn write(&self, issued: &IssueResponse) -> Result<(), AgentError> {
        fs::create_dir_all(&self.dir).map_err(|e| self.write_error(&self.dir, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| self.write_error(&self.dir, e))?;
        }

        self.write_file(CERT_FILE, &issued.cert_pem, 0o644)?;
        self.write_file(KEY_FILE, &issued.key_pem, 0o600)?;
        self.write_file(CHAIN_FILE, &issued.chain_pem, 0o644)?;
        Ok(())
    }

    fn write_file(&self, name: &str, contents: &str, mode: u32) -> Result<(), AgentError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));

        let result = (|| {
            // A leftover temp file would keep its old mode
            match fs::remove_file(&tmp) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(mode);
            }
            #[cfg(not(unix))]
            let _ = mode;

            let mut file = options.open(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        result.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.write_error(&path, e)
        })
    }

    fn write_error(&self, path: &Path, source: std::io::Error) -> AgentError {
        AgentError::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}
