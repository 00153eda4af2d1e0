//! `siteshift cache` — Decision cache commands.

use super::{load_config, open_store};
use siteshift_memory::DecisionCache;
use std::path::Path;

pub async fn clear(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let removed = DecisionCache::new(open_store(&config)).clear().await;
    println!("Removed {removed} cached decision(s).");
    Ok(())
}
