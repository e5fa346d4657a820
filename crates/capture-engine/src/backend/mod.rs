use shaderloop_common::config::SurfaceSettings;

use crate::surface::SurfaceLauncher;

pub mod webdriver;

pub use webdriver::{WebDriverLauncher, WebDriverSurface};

/// Get the default surface launcher: headless Chrome over chromedriver.
pub fn get_launcher(settings: &SurfaceSettings) -> Box<dyn SurfaceLauncher> {
    Box::new(WebDriverLauncher::new(settings.clone()))
}
