use std::rc::Rc;

use anyhow::Context;
use almanac_core::config::load_config;
use almanac_rfc::rfc::ical::core::Calendar;
use almanac_rfc::rfc::ical::expand::{
    RRuleGenerator, SharedGenerator, TimeZoneResolver, Timeline, TimelineBound,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let path = std::env::args()
        .nth(1)
        .context("usage: almanac-timeline <calendar.json>")?;
    let document =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let mut calendar: Calendar =
        serde_json::from_str(&document).with_context(|| format!("invalid calendar in {path}"))?;

    let fallback = TimeZoneResolver::new()
        .resolve(&config.expansion.timezone)
        .context("invalid expansion.timezone")?;
    let excluded = calendar.reconcile();
    tracing::info!(
        path = %path,
        events = calendar.events.len(),
        todos = calendar.todos.len(),
        journals = calendar.journals.len(),
        excluded,
        "Calendar loaded"
    );

    let generator: SharedGenerator = Rc::new(RRuleGenerator::new(config.expansion.page_size));
    let bound = TimelineBound::MaxItems(config.expansion.max_instances);

    let events = Timeline::new(&calendar.events, fallback, Rc::clone(&generator))?
        .collect_bounded(bound)?;
    let todos = Timeline::new(&calendar.todos, fallback, Rc::clone(&generator))?
        .collect_bounded(bound)?;
    let journals = Timeline::new(&calendar.journals, fallback, generator)?
        .collect_bounded(bound)?;

    let output = Calendar {
        events,
        todos,
        journals,
        ..calendar
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
