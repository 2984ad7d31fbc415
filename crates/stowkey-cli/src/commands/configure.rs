//! configure command - manage profiles

use crate::config::{get_value, set_value, ConfigStore, KEYS};
use crate::ConfigureAction;
use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};
use stowkey_core::StorageConfig;

pub fn execute(store: &ConfigStore, profile: &str, action: Option<ConfigureAction>) -> Result<()> {
    match action {
        Some(ConfigureAction::Set { key, value }) => set_config(store, profile, &key, &value),
        Some(ConfigureAction::Get { key }) => get_config(store, profile, &key),
        Some(ConfigureAction::List) => list_config(store, profile),
        Some(ConfigureAction::AddProfile { name }) => add_profile(store, &name),
        Some(ConfigureAction::RemoveProfile { name }) => remove_profile(store, &name),
        None => interactive_configure(store, profile),
    }
}

fn set_config(store: &ConfigStore, profile: &str, key: &str, value: &str) -> Result<()> {
    let mut config = store.profile(profile)?;
    set_value(&mut config, key, value)?;
    store.save_profile(profile, &config)?;
    println!("Set {} = {} [{}]", key.cyan(), value, profile);
    Ok(())
}

fn get_config(store: &ConfigStore, profile: &str, key: &str) -> Result<()> {
    if !KEYS.iter().any(|k| *k == key) {
        anyhow::bail!("Unknown config key: {}", key);
    }
    let config = store.load_profile(profile)?;
    match get_value(&config, key) {
        Some(value) => println!("{}", value),
        None => println!("(not set)"),
    }
    Ok(())
}

fn list_config(store: &ConfigStore, profile: &str) -> Result<()> {
    let config = store.load_profile(profile)?;

    println!("{}", format!("Profile {}:", profile).bold());
    println!();
    for key in KEYS {
        let value = get_value(&config, key).unwrap_or_else(|| "(not set)".to_string());
        println!("  {}: {}", key.cyan(), value);
    }

    println!();
    println!("{}", "Available profiles:".bold());
    let profiles = store.list_profiles()?;
    if profiles.is_empty() {
        println!("  (none)");
    } else {
        for name in profiles {
            println!("  - {}", name);
        }
    }

    println!();
    println!("Config file: {}", store.path().display().to_string().dimmed());

    Ok(())
}

fn add_profile(store: &ConfigStore, name: &str) -> Result<()> {
    store.save_profile(name, &StorageConfig::default())?;
    println!("Created profile: {}", name.green());
    println!(
        "Use 'stowkey configure set <key> <value> --profile {}' to configure it.",
        name
    );
    Ok(())
}

fn remove_profile(store: &ConfigStore, name: &str) -> Result<()> {
    if store.delete_profile(name)? {
        println!("Removed profile: {}", name.red());
    } else {
        println!("No profile named {}", name);
    }
    Ok(())
}

fn prompt(label: &str, current: &str) -> Result<Option<String>> {
    print!("{} [{}]: ", label, current);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok((!input.is_empty()).then(|| input.to_string()))
}

fn interactive_configure(store: &ConfigStore, profile: &str) -> Result<()> {
    println!("{}", format!("Stowkey configuration ({})", profile).bold());
    println!("Press Enter to keep current value.\n");

    let mut config = store.profile(profile)?;

    if let Some(v) = prompt("Access Key ID", &config.access_key_id)? {
        config.access_key_id = v;
    }
    let masked = if config.secret_access_key.is_empty() { "" } else { "***" };
    if let Some(v) = prompt("Secret Access Key", masked)? {
        config.secret_access_key = v;
    }
    if let Some(v) = prompt("Bucket", &config.bucket)? {
        config.bucket = v;
    }
    if let Some(v) = prompt("Region", &config.region)? {
        config.region = v;
    }
    if let Some(v) = prompt("Prefix", config.prefix.as_deref().unwrap_or(""))? {
        config.prefix = Some(v);
    }
    if let Some(v) = prompt("Endpoint URL", config.endpoint.as_deref().unwrap_or(""))? {
        config.endpoint = Some(v);
    }

    if let Err(e) = config.validate() {
        println!("{} {}", "warning:".yellow(), e);
    }

    store.save_profile(profile, &config)?;

    println!();
    println!(
        "{} Configuration saved to {}",
        "✓".green(),
        store.path().display()
    );

    Ok(())
}
