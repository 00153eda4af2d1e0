//! `siteshift config` — Configuration helpers.

use siteshift_config::AppConfig;

/// Print a starter config to stdout.
pub fn init() {
    let path = AppConfig::config_dir().join("config.toml");
    println!("# siteshift configuration. Save as {}", path.display());
    println!("{}", AppConfig::default_toml());
}
