//! Artifact manifests
//!
//! Walks a run's base directory and writes `reports/manifest.json` listing
//! every file with its size and blake3 digest, sorted by relative path.

use crate::collaborators::{ArtifactFinalizer, ArtifactSummary, Paths};
use crate::config::Settings;
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Forward-slash path relative to the run's base directory
    pub relative_path: String,
    pub size_bytes: u64,
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestFinalizer;

impl ManifestFinalizer {
    pub fn new() -> Self {
        Self
    }

    /// Every regular file under `base` except an existing manifest.
    fn collect(base: &Path) -> Result<Vec<ManifestEntry>> {
        let walker = WalkBuilder::new(base)
            .standard_filters(false)
            .follow_links(false)
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.context("Failed to walk run directory")?;
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE) {
                continue;
            }

            let bytes =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let relative = path.strip_prefix(base).unwrap_or(path);
            entries.push(ManifestEntry {
                relative_path: relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
                size_bytes: bytes.len() as u64,
                blake3: blake3::hash(&bytes).to_hex().to_string(),
            });
        }

        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(entries)
    }
}

impl ArtifactFinalizer for ManifestFinalizer {
    fn finalize(
        &self,
        config: &RunConfig,
        _params: &Parameters,
        _settings: &Settings,
        results: &Results,
        paths: &Paths,
    ) -> Result<ArtifactSummary> {
        if !paths.base.is_dir() {
            anyhow::bail!("Run directory {} does not exist", paths.base.display());
        }

        let manifest = Manifest {
            run_id: results.run_id.clone(),
            method: results.method.clone(),
            mode: config.mode.clone(),
            generated_at: Utc::now(),
            files: Self::collect(&paths.base)?,
        };

        std::fs::create_dir_all(&paths.reports)
            .with_context(|| format!("Failed to create {}", paths.reports.display()))?;
        let manifest_path = paths.reports.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        std::fs::write(&manifest_path, json)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        Ok(ArtifactSummary {
            manifest_path,
            file_count: manifest.files.len(),
            total_bytes: manifest.total_bytes(),
            generated_at: manifest.generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_dir() -> (TempDir, Paths) {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path().join("FD/Evolution/r1"));
        for d in paths.directories() {
            std::fs::create_dir_all(d).unwrap();
        }
        (dir, paths)
    }

    #[test]
    fn test_manifest_lists_sorted_files() {
        let (_dir, paths) = run_dir();
        std::fs::write(paths.data.join("analysis.json"), "{}").unwrap();
        std::fs::write(paths.figures.join("omega.png"), [0u8; 16]).unwrap();
        std::fs::write(paths.base.join(".hidden"), "x").unwrap();

        let results = Results {
            run_id: "r1".into(),
            ..Results::new("FD")
        };
        let summary = ManifestFinalizer::new()
            .finalize(
                &RunConfig::new("FD", "Evolution"),
                &Parameters::default(),
                &Settings::default(),
                &results,
                &paths,
            )
            .unwrap();

        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.total_bytes, 2 + 16 + 1);
        assert_eq!(summary.manifest_path, paths.reports.join(MANIFEST_FILE));

        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(&summary.manifest_path).unwrap())
                .unwrap();
        let names: Vec<_> = manifest.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(names, vec![".hidden", "data/analysis.json", "figures/omega.png"]);
        assert_eq!(
            manifest.files[1].blake3,
            blake3::hash(b"{}").to_hex().to_string()
        );
    }

    #[test]
    fn test_rerun_skips_previous_manifest() {
        let (_dir, paths) = run_dir();
        std::fs::write(paths.data.join("a.bin"), "abc").unwrap();

        let finalizer = ManifestFinalizer::new();
        let args = (
            RunConfig::default(),
            Parameters::default(),
            Settings::default(),
            Results::new("FD"),
        );
        let first = finalizer
            .finalize(&args.0, &args.1, &args.2, &args.3, &paths)
            .unwrap();
        let second = finalizer
            .finalize(&args.0, &args.1, &args.2, &args.3, &paths)
            .unwrap();
        assert_eq!(first.file_count, 1);
        assert_eq!(second.file_count, 1);
    }

    #[test]
    fn test_missing_base_fails() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path().join("absent"));
        let err = ManifestFinalizer::new()
            .finalize(
                &RunConfig::default(),
                &Parameters::default(),
                &Settings::default(),
                &Results::new("FD"),
                &paths,
            )
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
