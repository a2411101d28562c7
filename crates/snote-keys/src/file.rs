//! PEM-file backend: `<dir>/<tag>.pem`, written via temp file + rename.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::backend::KeyBackend;

pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, tag: &str) -> Result<PathBuf> {
        let valid = !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            anyhow::bail!("invalid key tag '{tag}'");
        }
        Ok(self.dir.join(format!("{tag}.pem")))
    }
}

impl KeyBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn save(&self, tag: &str, key: &SecretString) -> Result<()> {
        let path = self.path_for(tag)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating key dir: {}", self.dir.display()))?;

        let tmp = path.with_extension("pem.tmp");
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&tmp)
            .with_context(|| format!("opening {}", tmp.display()))?;
        file.write_all(key.expose_secret().as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing {}", tmp.display()))?;
        drop(file);

        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
        tracing::debug!(tag, path = %path.display(), "stored key file");
        Ok(())
    }

    fn load(&self, tag: &str) -> Result<Option<SecretString>> {
        let path = self.path_for(tag)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(SecretString::from(content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading key file: {}", path.display())),
        }
    }

    fn delete(&self, tag: &str) -> Result<()> {
        let path = self.path_for(tag)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing key file: {}", path.display())),
        }
    }
}
