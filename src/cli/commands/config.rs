//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{CaseCheck, Config, ConfigManager};
use crate::error::{StoreError, StoreResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "storage.path",
    "storage.case_check",
    "locks.enabled",
    "locks.read_busy_delay_ms",
    "locks.write_busy_delay_ms",
    "download_cache.enabled",
    "download_cache.path",
];

/// Execute the config command
pub fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> StoreResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force)?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value)?,
    }

    Ok(())
}

fn show_config(config: &Config) -> StoreResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn init_config(manager: &ConfigManager, force: bool) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default())?;
    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );
    Ok(())
}

fn set_value(manager: &ConfigManager, config: &Config, key: &str, value: &str) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();
    apply(&mut config, key, value)?;
    manager.save(&config)?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

/// Set a dot-separated `key` on `config`
fn apply(config: &mut Config, key: &str, value: &str) -> StoreResult<()> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(StoreError::User(format!(
                    "Invalid log format: {}. Use text/json",
                    value
                )))
            }
        },
        ["storage", "path"] => config.storage.path = Some(PathBuf::from(value)),
        ["storage", "case_check"] => config.storage.case_check = parse_case_check(value)?,
        ["locks", "enabled"] => config.locks.enabled = parse_bool(value)?,
        ["locks", "read_busy_delay_ms"] => config.locks.read_busy_delay_ms = parse_u64(value)?,
        ["locks", "write_busy_delay_ms"] => config.locks.write_busy_delay_ms = parse_u64(value)?,
        ["download_cache", "enabled"] => config.download_cache.enabled = parse_bool(value)?,
        ["download_cache", "path"] => config.download_cache.path = Some(PathBuf::from(value)),
        _ => {
            return Err(StoreError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> StoreResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(StoreError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> StoreResult<u64> {
    value
        .parse()
        .map_err(|_| StoreError::User(format!("Invalid number: {}", value)))
}

fn parse_case_check(value: &str) -> StoreResult<CaseCheck> {
    match value.to_lowercase().as_str() {
        "auto" => Ok(CaseCheck::Auto),
        "always" => Ok(CaseCheck::Always),
        "never" => Ok(CaseCheck::Never),
        _ => Err(StoreError::User(format!(
            "Invalid case_check: {}. Use auto/always/never",
            value
        ))),
    }
}
