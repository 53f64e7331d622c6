//! Init and Config commands.

use anyhow::anyhow;

use crate::config::Settings;

/// Run init command - create configuration file in the current directory.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let dir = std::env::current_dir()?;
    let existed = dir
        .join(crate::config::CONFIG_DIR)
        .join(crate::config::CONFIG_FILE)
        .exists();

    let path = Settings::init_config_file(&dir, force).map_err(|e| anyhow!("{e}"))?;

    if existed {
        println!("Overwrote configuration at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
