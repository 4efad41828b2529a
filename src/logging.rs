use std::env;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: our crates at `log_level`, HTTP
/// access lines at info, third-party noise at warn.
pub fn default_filter(log_level: &str) -> EnvFilter {
    let mut filter = EnvFilter::new(format!(
        "notification_archive={level},load_test_data={level}",
        level = log_level
    ));
    for directive in ["tower_http=info", "sqlx=warn", "hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber. `LOG_FORMAT=json` switches to one JSON
/// object per line.
pub fn setup_logging() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&log_level));
    let json = env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!(log_level = %log_level, json, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_our_crates_to_level() {
        let rendered = default_filter("debug").to_string();
        assert!(rendered.contains("notification_archive=debug"));
        assert!(rendered.contains("load_test_data=debug"));
        assert!(rendered.contains("sqlx=warn"));
        assert!(rendered.contains("tower_http=info"));
    }
}
