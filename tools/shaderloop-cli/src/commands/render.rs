//! Render every frame and encode a video per resolution.

use shaderloop_common::config::AppConfig;
use shaderloop_job_model::RenderJob;

use super::Selection;

pub async fn run(config: &AppConfig, selection: &Selection) -> anyhow::Result<u8> {
    let jobs: Vec<RenderJob> = selection
        .resolve()?
        .into_iter()
        .map(RenderJob::sequence)
        .collect();

    println!("Rendering {} resolution(s) to video", jobs.len());
    super::run_jobs(config, jobs, true).await
}
