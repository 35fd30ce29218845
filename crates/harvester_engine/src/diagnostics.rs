use std::path::{Path, PathBuf};

use chrono::Utc;
use engine_logging::{engine_info, engine_warn};

use crate::driver::UiDriver;
use crate::persist::ensure_output_dir;

pub fn screenshot_file_name(now: chrono::DateTime<Utc>) -> String {
    format!("error-{}.png", now.format("%Y%m%d-%H%M%S"))
}

/// Best-effort screenshot of the current page into `logs_dir`.
///
/// Never fails: problems are logged and `None` is returned.
pub async fn capture_failure_screenshot(driver: &dyn UiDriver, logs_dir: &Path) -> Option<PathBuf> {
    if let Err(err) = ensure_output_dir(logs_dir) {
        engine_warn!("Cannot prepare logs dir {:?} for screenshot: {}", logs_dir, err);
        return None;
    }
    let path = logs_dir.join(screenshot_file_name(Utc::now()));
    match driver.screenshot(&path).await {
        Ok(()) => {
            engine_info!("Saved error screenshot to {:?}", path);
            Some(path)
        }
        Err(err) => {
            engine_warn!("Could not capture error screenshot: {}", err);
            None
        }
    }
}
