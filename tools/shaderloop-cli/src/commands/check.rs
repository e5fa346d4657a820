//! Check that the external tools and the content page are available.

use shaderloop_capture_engine::backend::get_launcher;
use shaderloop_capture_engine::ContentTarget;
use shaderloop_common::config::AppConfig;
use shaderloop_common::process::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<u8> {
    println!("Shaderloop System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;

    let launcher = get_launcher(&config.surface);
    if launcher.is_available() {
        println!("[OK] chromedriver: {}", config.surface.chromedriver);
    } else {
        println!("[MISSING] chromedriver: {}", config.surface.chromedriver);
        all_ok = false;
    }

    match &config.surface.chrome_binary {
        Some(binary) if binary.is_file() => println!("[OK] Chrome binary: {}", binary.display()),
        Some(binary) => {
            println!("[MISSING] Chrome binary: {}", binary.display());
            all_ok = false;
        }
        None => println!("[OK] Chrome binary: chromedriver default"),
    }

    if command_exists(&config.encoder.ffmpeg) {
        println!("[OK] ffmpeg: {}", config.encoder.ffmpeg);
    } else {
        println!("[MISSING] ffmpeg: {}", config.encoder.ffmpeg);
        all_ok = false;
    }

    let base = std::env::current_dir()?;
    match ContentTarget::resolve(&config.render.content, &base) {
        Ok(target) => println!("[OK] Content: {target}"),
        Err(e) => {
            println!("[MISSING] Content: {e}");
            all_ok = false;
        }
    }

    println!();
    println!(
        "Loop: {} frames @ {} fps, output: {}",
        config.render.frame_count,
        config.render.fps,
        config.render.output_dir.display()
    );

    println!();
    if all_ok {
        println!("All required tools are available. Shaderloop is ready.");
        Ok(0)
    } else {
        println!("Some requirements are missing. See above for fixes.");
        Ok(1)
    }
}
