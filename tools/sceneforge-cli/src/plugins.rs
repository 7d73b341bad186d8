//! Plugins command - list registered plugins

use anyhow::Result;
use sceneforge_core::PluginRegistry;

pub fn execute() -> Result<()> {
    let registry = PluginRegistry::with_builtins()?;
    for line in listing(&registry) {
        println!("{line}");
    }
    Ok(())
}

fn listing(registry: &PluginRegistry) -> Vec<String> {
    registry
        .descriptors()
        .map(|d| {
            format!(
                "{:<16} {:<20} {}",
                d.kind.to_string(),
                d.id,
                d.description().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
        .collect()
}
