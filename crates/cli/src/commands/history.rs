//! `siteshift history` — Visit history commands.

use super::{load_config, open_store};
use siteshift_core::{History, HistoryStore};
use siteshift_memory::{KvHistoryStore, weighted_view};
use std::path::Path;

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = KvHistoryStore::new(open_store(&config));
    let history = store.load().await;

    print!("{}", render(&history, config.engine.history_decay));
    Ok(())
}

pub async fn clear(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    KvHistoryStore::new(open_store(&config)).clear().await;
    println!("History cleared. The next visit starts a new identity.");
    Ok(())
}

fn render(history: &History, decay_rate: f64) -> String {
    let mut out = format!(
        "Visitor {}\n  Visits: {}\n",
        history.user_id,
        history.visits.len()
    );

    if history.visits.is_empty() {
        out.push_str("  No visits recorded yet.\n");
        return out;
    }

    out.push_str("\n  Recent visits (heaviest first):\n");
    for (i, entry) in weighted_view(history, decay_rate, 10).iter().enumerate() {
        let visit = &entry.visit;
        out.push_str(&format!(
            "  {:>2}. [{:.2}] {} via {} ({}){}\n",
            i + 1,
            entry.weight,
            visit.intent,
            visit.source.as_str(),
            visit.minimal_context.referrer.source,
            if visit.ai_decision { " ai" } else { "" },
        ));
    }

    if !history.preferences.is_empty() {
        out.push_str("\n  Preferences:\n");
        for (intent, score) in &history.preferences {
            out.push_str(&format!("    {intent}: {score:.2}\n"));
        }
    }
    out
}
