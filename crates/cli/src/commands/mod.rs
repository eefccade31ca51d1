pub mod run;
pub mod tools;

use std::time::Duration;

use tether_config::AppConfig;
use tether_tools::ManifestRegistry;

/// Registry populated from every configured tool directory.
pub fn discover_tools(config: &AppConfig) -> ManifestRegistry {
    let mut registry = ManifestRegistry::new(Duration::from_secs(config.tools.timeout_secs));
    registry.discover(&config.tools.dirs);
    registry
}
