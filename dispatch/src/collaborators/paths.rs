use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory layout of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    pub base: PathBuf,
    pub data: PathBuf,
    pub figures: PathBuf,
    pub reports: PathBuf,

    /// Per-sweep-value figure directories, keyed by label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_dirs: BTreeMap<String, PathBuf>,
}

impl Paths {
    /// Standard `data/`, `figures/`, `reports/` layout under `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().to_path_buf();
        Self {
            data: base.join("data"),
            figures: base.join("figures"),
            reports: base.join("reports"),
            base,
            parameter_dirs: BTreeMap::new(),
        }
    }

    /// Every directory the layout names.
    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        [&self.base, &self.data, &self.figures, &self.reports]
            .into_iter()
            .chain(self.parameter_dirs.values())
            .map(PathBuf::as_path)
    }
}

/// Provisions run directories. All operations are idempotent.
pub trait PathBuilder {
    fn get_run_paths(&self, method: &str, mode: &str, run_id: &str) -> Paths;

    fn ensure_directories(&self, paths: &Paths) -> anyhow::Result<()>;

    /// Register a figures subdirectory for one sweep value.
    fn add_parameter_dir(&self, paths: &mut Paths, name: &str);
}
