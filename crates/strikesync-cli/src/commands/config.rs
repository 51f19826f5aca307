//! Default configuration dump.

use std::path::Path;

use anyhow::{Context, Result};
use strikesync_core::Config;

pub fn run(output: Option<&Path>) -> Result<()> {
    let text = Config::default().to_toml()?;

    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            eprintln!("Config written to {:?}", path);
        }
        None => print!("{}", text),
    }

    Ok(())
}
