//! Tracing subscriber set up from the `[tracing]` configuration table.

use parley::config::TracingConfig;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt,
};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub(crate) fn init(config: &TracingConfig) {
    let level_filter = config.level.parse::<LevelFilter>().unwrap_or_else(|err| {
        eprintln!("invalid tracing level `{}`: {err}", config.level);
        LevelFilter::WARN
    });
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .parse_lossy(match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) => directives,
            Err(_) => config.filter.clone().unwrap_or_default(),
        });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.display_target)
        .with_writer(std::io::stderr);
    let subscriber = tracing_subscriber::registry().with(env_filter);
    match config.format.as_str() {
        "compact" => {
            let subscriber = subscriber.with(fmt_layer.compact());
            if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("fail to set the default subscriber with a `Compact` formatter: {err}");
            }
        }
        "json" => {
            let subscriber = subscriber.with(fmt_layer.json().with_current_span(true));
            if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("fail to set the default subscriber with a `Json` formatter: {err}");
            }
        }
        "pretty" => {
            let subscriber = subscriber.with(fmt_layer.pretty());
            if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("fail to set the default subscriber with a `Pretty` formatter: {err}");
            }
        }
        _ => {
            let subscriber = subscriber.with(fmt_layer);
            if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("fail to set the default subscriber with a `Full` formatter: {err}");
            }
        }
    }
}
