use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;

/// Append-only record of completed runs and studies.
pub trait RunLedger {
    fn append_run(
        &self,
        run_id: &str,
        config: &RunConfig,
        params: &Parameters,
        results: &Results,
    ) -> anyhow::Result<()>;
}
