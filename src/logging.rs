//! Logging setup and event macros.
//!
//! Two kinds of lines come out of docflow:
//! - outcome lines, one per terminal file or directory outcome, logged under
//!   the [`OUTCOME_TARGET`] target via [`outcome!`](crate::outcome);
//! - diagnostics from each module via [`log_event!`](crate::log_event) and
//!   [`debug_event!`](crate::debug_event), logged under the module path.
//!
//! Because outcomes have their own target they can be tuned independently:
//!
//! ```toml
//! [logging]
//! default = "warn"               # quiet diagnostics
//!
//! [logging.modules]
//! "docflow::outcome" = "info"    # but keep one line per file
//! "docflow::watcher" = "debug"   # per-arrival debug lines
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug docflow run
//! RUST_LOG=docflow::outcome=info,warn docflow run --once
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Target of the per-file outcome lines.
pub const OUTCOME_TARGET: &str = "docflow::outcome";

/// Level used when the configured directives do not parse.
const FALLBACK_LEVEL: &str = "info";

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Render `config` as an `EnvFilter` directive string.
///
/// Module overrides are sorted so the result does not depend on map order.
pub fn directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut out = config.default.trim().to_string();
    for (module, level) in modules {
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&format!("{module}={level}"));
    }
    out
}

/// Build the filter from config, falling back to `info` for malformed
/// directives.
fn filter_from_config(config: &LoggingConfig) -> EnvFilter {
    let directives = directives(config);
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Invalid logging directives '{directives}': {e}; using '{FALLBACK_LEVEL}'");
        EnvFilter::new(FALLBACK_LEVEL)
    })
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. `RUST_LOG`, when set, replaces the
/// configured filter entirely.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            filter_from_config(config)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log one terminal outcome under [`OUTCOME_TARGET`].
///
/// # Examples
/// ```ignore
/// outcome!("saved", "{}", rel.display());
/// outcome!("failed", "{}: {reason}", rel.display());
/// ```
#[macro_export]
macro_rules! outcome {
    ($kind:expr, $($arg:tt)*) => {
        tracing::info!(
            target: $crate::logging::OUTCOME_TARGET,
            "[{}] {}",
            $kind,
            format!($($arg)*)
        )
    };
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("engine", "started");
/// log_event!("retry", "scheduled", "{} in {delay:?}", rel.display());
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("watcher", "arrived", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(default: &str, modules: &[(&str, &str)]) -> LoggingConfig {
        LoggingConfig {
            default: default.to_string(),
            modules: modules
                .iter()
                .map(|(m, l)| (m.to_string(), l.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_directives_are_sorted_and_joined() {
        let cfg = config(
            "warn",
            &[("docflow::watcher", "debug"), (OUTCOME_TARGET, "info")],
        );
        assert_eq!(
            directives(&cfg),
            "warn,docflow::outcome=info,docflow::watcher=debug"
        );
    }

    #[test]
    fn test_directives_without_default() {
        let cfg = config(" ", &[(OUTCOME_TARGET, "off")]);
        assert_eq!(directives(&cfg), "docflow::outcome=off");
    }

    #[test]
    fn test_default_config_is_info() {
        assert_eq!(directives(&LoggingConfig::default()), "info");
    }

    #[test]
    fn test_malformed_directives_fall_back() {
        let cfg = config("info", &[("docflow::engine", "loud")]);
        assert!(EnvFilter::try_new(directives(&cfg)).is_err());
        // Still yields a usable filter
        let _filter = filter_from_config(&cfg);
    }
}
