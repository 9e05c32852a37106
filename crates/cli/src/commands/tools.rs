//! `taskclaw tools`: list the built-in tools.

use std::path::Path;
use std::sync::Arc;
use taskclaw_channels::ConsoleChannel;
use taskclaw_core::event::NullSink;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = taskclaw_tools::default_registry(
        &super::tool_settings(&config),
        Arc::new(ConsoleChannel::new()),
        Arc::new(NullSink),
    );

    println!("Built-in tools ({}):\n", registry.len());
    for tool in registry.definitions() {
        let args = if tool.arguments.is_empty() {
            String::new()
        } else {
            format!(" <{}>", tool.arguments.join("> <"))
        };
        println!("  {}{}", tool.name, args);
        println!("      {}", tool.description);
    }
    Ok(())
}
