//! Show or persist the effective configuration.

use std::path::Path;

use shaderloop_common::config::AppConfig;

pub fn run(config: &AppConfig, path: Option<&Path>, write: bool) -> anyhow::Result<u8> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        let saved = match path {
            Some(path) => {
                config.save_to(path)?;
                path.to_path_buf()
            }
            None => config.save()?,
        };
        println!("Configuration written to {}", saved.display());
    }
    Ok(0)
}
