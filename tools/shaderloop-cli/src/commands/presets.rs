//! List built-in resolution presets.

use shaderloop_job_model::PRESETS;

pub fn run() -> anyhow::Result<u8> {
    println!("Built-in resolutions:");
    for preset in &PRESETS {
        println!("  {:<24} -r {}x{}", preset.name, preset.width, preset.height);
    }
    Ok(0)
}
