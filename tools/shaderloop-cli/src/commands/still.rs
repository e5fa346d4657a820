//! Save a single frame per resolution.

use shaderloop_common::config::AppConfig;
use shaderloop_job_model::{validate_frame_index, ImageFormat, RenderJob};

use super::Selection;

pub async fn run(
    config: &AppConfig,
    selection: &Selection,
    frame: u32,
    format: ImageFormat,
) -> anyhow::Result<u8> {
    validate_frame_index(frame, config.render.frame_count)?;

    let jobs: Vec<RenderJob> = selection
        .resolve()?
        .into_iter()
        .map(|resolution| RenderJob::still(resolution, frame, format))
        .collect();

    println!("Exporting frame {frame} as {format}");
    super::run_jobs(config, jobs, false).await
}
