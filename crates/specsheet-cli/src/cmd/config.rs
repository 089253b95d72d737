use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specsheet_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Report missing credentials and invalid settings
    Check,

    /// Print the effective configuration (secrets redacted)
    Show,
}

pub fn run(config_path: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load_with_env(config_path).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Check => check(&config, json),
        ConfigSubcommand::Show => show(config),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        let rows = warnings
            .iter()
            .map(|w| {
                let level = match w.level {
                    WarnLevel::Warning => "warning",
                    WarnLevel::Error => "error",
                };
                vec![level.to_string(), w.message.clone()]
            })
            .collect();
        print_table(&["LEVEL", "MESSAGE"], rows);
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn redact(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| !v.is_empty()) {
        *value = Some("********".to_string());
    }
}

fn show(mut config: Config) -> anyhow::Result<()> {
    redact(&mut config.identity.api_key);
    redact(&mut config.search.api_key);
    redact(&mut config.email.client_secret);
    print_json(&config)
}
