//! Master run ledger
//!
//! One JSON object per line. Rows are only ever appended; readers skip lines
//! they cannot parse.

use crate::collaborators::RunLedger;
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub timestamp: String,
    pub run_id: String,
    pub config: RunConfig,
    pub parameters: Parameters,
    pub results: Results,
}

pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<LedgerRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;
        let mut rows = Vec::new();
        for line in BufReader::new(file).split(b'\n') {
            let line =
                line.with_context(|| format!("Failed to read ledger {}", self.path.display()))?;
            // Bytes that are not valid UTF-8 fail to parse like any other bad line
            if let Ok(row) = serde_json::from_slice(&line) {
                rows.push(row);
            }
        }

        Ok(rows)
    }

    /// Last `n` rows, oldest first.
    pub fn read_last(&self, n: usize) -> Result<Vec<LedgerRow>> {
        let rows = self.read_all()?;
        let skip = rows.len().saturating_sub(n);
        Ok(rows.into_iter().skip(skip).collect())
    }
}

impl RunLedger for JsonlLedger {
    fn append_run(
        &self,
        run_id: &str,
        config: &RunConfig,
        params: &Parameters,
        results: &Results,
    ) -> Result<()> {
        let row = LedgerRow {
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            config: config.clone(),
            parameters: params.clone(),
            results: results.clone(),
        };
        let json = serde_json::to_string(&row).context("Failed to serialize ledger row")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;
        writeln!(file, "{json}").context("Failed to append ledger row")?;

        tracing::debug!(run_id, path = %self.path.display(), "Appended ledger row");
        Ok(())
    }
}
