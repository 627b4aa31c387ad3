use std::path::PathBuf;

use tickstream::{Dataset, DatasetError, DatasetSource};
use tickstream_types::Country;

use crate::Context;

#[derive(Debug, thiserror::Error)]
pub enum CountriesCommandError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Print the dataset snapshot, as served by `GET /countries`
#[derive(Debug, Clone, PartialEq, Default, clap::Args)]
pub struct CountriesCommand {
    /// JSON dataset to read (defaults to the bundled countries)
    #[arg(long, short = 'd', env = "TICKSTREAM_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,
}

impl CountriesCommand {
    pub fn render(&self, ctx: &Context) -> Result<String, CountriesCommandError> {
        let source =
            DatasetSource::from(self.dataset.clone().or_else(|| ctx.config.dataset.clone()));
        let dataset = Dataset::<Country>::load(&source)?;

        let json = if self.pretty {
            serde_json::to_string_pretty(dataset.records())?
        } else {
            serde_json::to_string(dataset.records())?
        };
        Ok(json)
    }

    pub fn execute(&self, ctx: &Context) -> Result<(), CountriesCommandError> {
        println!("{}", self.render(ctx)?);
        Ok(())
    }
}
