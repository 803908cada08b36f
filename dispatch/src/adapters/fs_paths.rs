//! Run directories on the local filesystem
//!
//! Layout: `<root>/<METHOD>/<Mode>/<run_id>/{data,figures,reports}`.

use crate::collaborators::{PathBuilder, Paths};
use anyhow::Context;
use std::path::{Path, PathBuf};

pub struct FsPathBuilder {
    root: PathBuf,
}

impl FsPathBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathBuilder for FsPathBuilder {
    fn get_run_paths(&self, method: &str, mode: &str, run_id: &str) -> Paths {
        Paths::under(self.root.join(method).join(mode).join(run_id))
    }

    fn ensure_directories(&self, paths: &Paths) -> anyhow::Result<()> {
        for dir in paths.directories() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    fn add_parameter_dir(&self, paths: &mut Paths, name: &str) {
        let dir = paths.figures.join(name);
        paths.parameter_dirs.entry(name.to_string()).or_insert(dir);
    }
}
