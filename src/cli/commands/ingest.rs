//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::TubechatError;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(url: &str, session_id: Option<&str>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubechat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::from_settings(&settings).await?;

    let spinner = Output::spinner(&format!("Scraping and indexing {}...", url));
    let result = pipeline.ingest_url(url, session_id).await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            Output::success(&format!(
                "Indexed {} chunks from {} videos",
                outcome.report.chunks,
                outcome.videos.len()
            ));
            Output::kv("Session", &outcome.session_id);

            Output::header("Videos");
            for video in &outcome.videos {
                Output::video_info(video.title.as_deref(), &video.video_id, &video.url);
            }

            println!();
            Output::info(&format!(
                "Ask with: tubechat ask {} \"<question>\"",
                outcome.session_id
            ));
        }
        Err(TubechatError::NoContent(msg)) => {
            Output::warning(&msg);
            Output::info("None of the videos behind this URL have transcripts.");
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
