//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{BwcacheError, BwcacheResult};
use crate::ui::{self, UiContext};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "cache.enabled",
    "cache.ttl_secs",
    "cache.basename",
    "cache.directory",
    "bitwarden.program",
    "bitwarden.search",
    "bitwarden.default_collection_id",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> BwcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            if local {
                let cwd = std::env::current_dir()
                    .map_err(|e| BwcacheError::io("getting current directory", e))?;
                set_local_value(&cwd.join(LOCAL_CONFIG_NAME), &key, &value).await?
            } else {
                set_value(manager, &key, &value).await?
            }
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> BwcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> BwcacheResult<()> {
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

    manager.save(&Config::default()).await?;
    ui::step_ok(&ctx, &format!("Configuration initialized at {}", path.display()));
    Ok(())
}

/// Set a key in the global config file, leaving local overrides out of it
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> BwcacheResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    if let Err(e) = apply_value(&mut config, key, value) {
        ui::step_error_detail(&ctx, "Cannot set config key", &e.to_string());
        ui::remark(&ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

/// Apply a dot-separated key to a loaded config
fn apply_value(config: &mut Config, key: &str, value: &str) -> BwcacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,
        ["cache", "ttl_secs"] => config.cache.ttl_secs = parse_u64(value)?,
        ["cache", "basename"] => config.cache.basename = value.to_string(),
        ["cache", "directory"] => config.cache.directory = optional(value).map(PathBuf::from),

        ["bitwarden", "program"] => config.bitwarden.program = value.to_string(),
        ["bitwarden", "search"] => config.bitwarden.search = value.to_string(),
        ["bitwarden", "default_collection_id"] => {
            config.bitwarden.default_collection_id = optional(value).map(str::to_string)
        }

        _ => return Err(BwcacheError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

async fn set_local_value(local_path: &Path, key: &str, value: &str) -> BwcacheResult<()> {
    let ctx = UiContext::detect();
    let typed = typed_value(key, value)?;

    let mut doc: toml::Value = if local_path.exists() {
        let content = fs::read_to_string(local_path)
            .await
            .map_err(|e| BwcacheError::io(format!("reading {}", local_path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| BwcacheError::ConfigInvalid {
                path: local_path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, typed)?;

    // Write back only the keys the user has explicitly set
    let content = toml::to_string_pretty(&doc)?;
    fs::write(local_path, content)
        .await
        .map_err(|e| BwcacheError::io(format!("writing {}", local_path.display()), e))?;

    ui::step_ok(
        &ctx,
        &format!("Set {} = {} in {}", key, value, local_path.display()),
    );
    Ok(())
}

/// The TOML value `key` takes for `value`, `None` when the value clears the key
///
/// Goes through [`apply_value`] so the stored type always matches the schema.
fn typed_value(key: &str, value: &str) -> BwcacheResult<Option<toml::Value>> {
    let mut scratch = Config::default();
    apply_value(&mut scratch, key, value)?;

    let rendered = toml::Value::try_from(&scratch)?;
    Ok(key
        .split('.')
        .try_fold(&rendered, |node, part| node.get(part))
        .cloned())
}

/// Set or remove a dot-separated key in a TOML value tree, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, key: &str, value: Option<toml::Value>) -> BwcacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, tables)) = parts.split_last() else {
        return Err(BwcacheError::User("Empty config key".to_string()));
    };

    let mut current = doc;
    for &part in tables {
        current = current
            .as_table_mut()
            .ok_or_else(|| BwcacheError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| BwcacheError::User(format!("Expected table for key: {}", key)))?;

    match value {
        Some(value) => {
            table.insert((*leaf).to_string(), value);
        }
        None => {
            table.remove(*leaf);
        }
    }
    Ok(())
}

/// Empty string or "none" clears an optional key
fn optional(value: &str) -> Option<&str> {
    match value {
        "" | "none" => None,
        other => Some(other),
    }
}

fn parse_log_format(value: &str) -> BwcacheResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(BwcacheError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}

fn parse_bool(value: &str) -> BwcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BwcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> BwcacheResult<u64> {
    value
        .parse()
        .map_err(|_| BwcacheError::User(format!("Invalid number: {}", value)))
}
