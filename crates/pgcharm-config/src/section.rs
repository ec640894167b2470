//! Managed sections in foreign configuration files.
//!
//! pgcharm owns exactly one block of a hand-editable file, delimited by a
//! start marker line and an end marker line. Everything outside that block
//! belongs to the operator and is preserved byte for byte, including line
//! endings.
//!
//! ```text
//! data_directory = '/var/lib/postgresql/10/main'   <- unmanaged
//! # JUJU SECTION                                    <- start marker
//! listen_addresses = '*'                           <- managed
//! port = 5432                                      <- managed
//! # JUJU END SECTION                                <- end marker
//! max_connections = 100                            <- unmanaged
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{ConfigError, Result};

/// Line opening the managed section.
pub const START_MARKER: &str = "# JUJU SECTION";

/// Line closing the managed section.
pub const END_MARKER: &str = "# JUJU END SECTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Before,
    Inside,
    After,
}

/// Result of splitting file content into unmanaged and managed lines.
///
/// Lines keep their original terminators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionScan {
    pub unmanaged: Vec<String>,
    pub managed: Vec<String>,
    /// `false` when a start marker was never closed; everything after it was
    /// treated as managed.
    pub terminated: bool,
}

/// Marker pair used to find and rewrite a managed section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSection {
    start_marker: String,
    end_marker: String,
}

impl Default for ManagedSection {
    fn default() -> Self {
        Self::new(START_MARKER, END_MARKER)
    }
}

impl ManagedSection {
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }

    fn is_start(&self, line: &str) -> bool {
        line.trim_end() == self.start_marker
    }

    fn is_end(&self, line: &str) -> bool {
        line.trim_end() == self.end_marker
    }

    /// Splits content into unmanaged and managed lines.
    ///
    /// Marker lines are dropped. A start marker with no end marker makes the
    /// rest of the content managed. A stray end marker outside a section is
    /// dropped too, so a later rewrite never duplicates it.
    pub fn scan(&self, content: &str) -> SectionScan {
        let mut scan = SectionScan {
            terminated: true,
            ..Default::default()
        };
        let mut state = ScanState::Before;

        for line in content.split_inclusive('\n') {
            match state {
                ScanState::Before | ScanState::After => {
                    if self.is_start(line) {
                        state = ScanState::Inside;
                    } else if self.is_end(line) {
                        debug!("Dropping end marker found outside a managed section");
                    } else {
                        scan.unmanaged.push(line.to_string());
                    }
                }
                ScanState::Inside => {
                    if self.is_end(line) {
                        state = ScanState::After;
                    } else if self.is_start(line) {
                        debug!("Ignoring nested start marker");
                    } else {
                        scan.managed.push(line.to_string());
                    }
                }
            }
        }

        if state == ScanState::Inside {
            scan.terminated = false;
        }
        scan
    }

    /// Reads a file and returns its unmanaged lines in original order.
    pub fn strip(&self, path: &Path) -> Result<Vec<String>> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::file(path, e))?;
        let scan = self.scan(&content);
        if !scan.terminated {
            warn!(
                path = %path.display(),
                "Managed section has no end marker; treating the rest of the file as managed"
            );
        }
        Ok(scan.unmanaged)
    }

    /// Renders unmanaged lines followed by the managed section.
    ///
    /// Unmanaged lines are written verbatim. Managed lines may or may not carry
    /// a trailing newline; each is written as one whole line.
    pub fn render<U, M>(&self, unmanaged: &[U], managed: &[M]) -> String
    where
        U: AsRef<str>,
        M: AsRef<str>,
    {
        let mut out = String::new();
        for line in unmanaged {
            out.push_str(line.as_ref());
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }

        out.push_str(&self.start_marker);
        out.push('\n');
        for line in managed {
            out.push_str(line.as_ref().trim_end_matches('\n'));
            out.push('\n');
        }
        out.push_str(&self.end_marker);
        out.push('\n');
        out
    }

    /// Writes unmanaged lines and a fresh managed section to `path`.
    ///
    /// The content goes to a temporary file in the same directory which then
    /// replaces `path`, so readers see either the old or the new file.
    pub fn write<U, M>(&self, path: &Path, unmanaged: &[U], managed: &[M]) -> Result<()>
    where
        U: AsRef<str>,
        M: AsRef<str>,
    {
        let content = self.render(unmanaged, managed);
        write_atomic(path, content.as_bytes())?;
        debug!(path = %path.display(), lines = managed.len(), "Wrote managed section");
        Ok(())
    }
}

/// Replaces `path` with `content` via a same-directory temp file and rename.
///
/// Permissions and ownership of an existing file are carried over.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ConfigError::file(dir, e))?;
    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ConfigError::file(tmp.path(), e))?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| ConfigError::file(tmp.path(), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if let Err(e) = std::os::unix::fs::chown(tmp.path(), Some(meta.uid()), Some(meta.gid()))
            {
                debug!(path = %path.display(), error = %e, "Could not carry over file ownership");
            }
        }
    }

    tmp.persist(path)
        .map_err(|e| ConfigError::file(path, e.error))?;
    Ok(())
}
