//! Command-line interface for promdict
//!
//! Provides argument parsing and subcommand handling for the promdict binary.

use clap::{Parser, Subcommand};

/// Shared-store Prometheus metrics for multi-worker servers
#[derive(Parser)]
#[command(name = "promdict")]
#[command(version)]
#[command(about = "Shared-store Prometheus metrics for multi-worker servers")]
#[command(
    long_about = "promdict aggregates counters, gauges and histograms recorded by many \
    workers into one shared store and serves them in the Prometheus text format."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the demo server with /metrics (the default)
    Serve,

    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Drive randomized traffic through the workers, then print the exposition
    Simulate {
        /// How long to generate traffic, in seconds
        #[arg(short, long, default_value_t = 3)]
        duration: u64,

        /// Requests issued per worker per second
        #[arg(short, long, default_value_t = 200)]
        rate: u32,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# promdict Configuration
# ======================

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port serving /metrics and the demo routes
port = 9145

# ─────────────────────────────────────────────────────────────────────────────
# SHARED STORE
# ─────────────────────────────────────────────────────────────────────────────

[store]
# Maximum number of entries (metric series plus catalog bookkeeping)
capacity = 10000

# Evict least-recently-used entries when full. Evictions are counted in the
# error metric. With false, writes to a full store fail instead.
evict = true

# ─────────────────────────────────────────────────────────────────────────────
# METRICS
# ─────────────────────────────────────────────────────────────────────────────

[metrics]
# Prepended to every metric name (not to the error metric)
prefix = ""

# Counter of internal errors, always exported
error_metric_name = "nginx_metric_errors_total"

# How often buffered counters are flushed to the store (1-60000 ms).
# del() and reset() wait this long before deleting.
sync_interval_ms = 1000

# "strip": drop non-printable bytes from label values
# "escape": keep them, escaping backslash, quote and newline
label_escaping = "strip"

# "catalog": list keys through the replicated key catalog
# "native": ask the store directly (only if the store says it is cheap)
enumeration = "catalog"

# ─────────────────────────────────────────────────────────────────────────────
# KEY CATALOG
# ─────────────────────────────────────────────────────────────────────────────

[catalog]
# Attempts to claim a catalog slot before giving up
max_add_attempts = 100

# Base pause between attempts in ms, doubled each time (0 = just yield)
add_backoff_ms = 0

# ─────────────────────────────────────────────────────────────────────────────
# WORKERS
# ─────────────────────────────────────────────────────────────────────────────

[workers]
# Worker registries sharing the store; requests are spread round-robin
count = 4

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["promdict"]);
        assert_eq!(cli.config, "config.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["promdict", "--config", "custom.toml", "serve"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["promdict", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn simulate_subcommand_defaults() {
        let cli = Cli::parse_from(["promdict", "simulate"]);
        assert!(matches!(
            cli.command,
            Some(Command::Simulate {
                duration: 3,
                rate: 200
            })
        ));
    }

    #[test]
    fn simulate_subcommand_overrides() {
        let cli = Cli::parse_from(["promdict", "simulate", "-d", "10", "--rate", "50"]);
        assert!(matches!(
            cli.command,
            Some(Command::Simulate {
                duration: 10,
                rate: 50
            })
        ));
    }

    #[test]
    fn template_is_valid_config() {
        let template = generate_config_template();
        let config: Result<crate::config::Config, _> = template.parse();
        assert!(
            config.is_ok(),
            "Template should be a valid configuration: {:?}",
            config.err()
        );
    }

    #[test]
    fn template_has_all_sections() {
        let template = generate_config_template();
        for section in [
            "[server]",
            "[store]",
            "[metrics]",
            "[catalog]",
            "[workers]",
            "[observability]",
        ] {
            assert!(template.contains(section), "missing {}", section);
        }
    }
}
