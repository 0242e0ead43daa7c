//! Configuration file discovery.
//!
//! Responsibilities:
//! - Produce the ordered list of candidate configuration file locations for an
//!   application on Windows, Linux and macOS.
//! - Pick the first candidate that passes [`is_file_readable`].
//!
//! Does NOT handle:
//! - Parsing the discovered file (see `application.rs`).
//!
//! Invariants:
//! - Caller-supplied locations always come first, followed by the
//!   `<APP>_CONFIG_PATH` environment variable, the working directory, the
//!   platform config directory, the home directory and finally `/etc`.

use std::path::{Path, PathBuf};

use crate::constants::CONFIG_PATH_ENV_SUFFIX;
use crate::fs::is_file_readable;

/// Name of the environment variable that points at an application's config file.
///
/// `my-app` becomes `MY_APP_CONFIG_PATH`.
pub fn config_path_env_var(application: &str) -> String {
    format!(
        "{}{}",
        application.to_uppercase().replace('-', "_"),
        CONFIG_PATH_ENV_SUFFIX
    )
}

/// Ordered candidate locations for `application`'s configuration file.
pub fn candidate_locations(
    application: &str,
    file_type: &str,
    extra_locations: &[PathBuf],
) -> Vec<PathBuf> {
    let file_name = format!("{application}.{file_type}");
    let generic_name = format!("config.{file_type}");

    let mut locations: Vec<PathBuf> = extra_locations
        .iter()
        .filter(|p| !p.as_os_str().is_empty())
        .cloned()
        .collect();

    if let Some(path) = std::env::var_os(config_path_env_var(application))
        .filter(|p| !p.is_empty())
    {
        locations.push(PathBuf::from(path));
    }

    locations.push(PathBuf::from(&file_name));
    locations.push(PathBuf::from(&generic_name));

    if let Some(dirs) = directories::BaseDirs::new() {
        let app_dir = dirs.config_dir().join(application);
        locations.push(app_dir.join(&file_name));
        locations.push(app_dir.join(&generic_name));

        let home = dirs.home_dir();
        locations.push(home.join(format!(".{application}")));
        locations.push(home.join(".config").join(&file_name));
    }

    let etc = Path::new("/etc");
    locations.push(etc.join(application));
    locations.push(etc.join(&file_name));
    locations.push(etc.join(application).join(&file_name));
    locations.push(etc.join(application).join(&generic_name));
    locations.push(etc.join(application).join("config"));
    locations.push(etc.join("defaults").join(application));

    locations
}

/// Return the absolute path of the first usable candidate, if any.
pub fn find_config_file(
    application: &str,
    file_type: &str,
    extra_locations: &[PathBuf],
) -> Option<PathBuf> {
    candidate_locations(application, file_type, extra_locations)
        .into_iter()
        .find(|candidate| {
            let usable = is_file_readable(candidate);
            tracing::trace!(path = %candidate.display(), usable, "Checked config location");
            usable
        })
        .map(|found| std::path::absolute(&found).unwrap_or(found))
}
