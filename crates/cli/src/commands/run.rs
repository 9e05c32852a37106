//! `taskclaw run`: an interactive session on one task plus follow-ups.

use std::path::Path;
use std::sync::Arc;
use taskclaw_agent::{AgentLoop, ChatSession, DisplayMask, system_prompt};
use taskclaw_channels::ConsoleChannel;
use taskclaw_core::channel::UserInput;
use taskclaw_core::provider::Provider;
use taskclaw_providers::OpenAiCompatProvider;
use tracing::{info, warn};

pub async fn run(
    config_path: Option<&Path>,
    task: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let mut settings = super::tool_settings(&config);
    std::fs::create_dir_all(&settings.workspace_root)?;
    settings.workspace_root = std::fs::canonicalize(&settings.workspace_root)?;

    let mut console = ConsoleChannel::new();
    if config.generate_log {
        console = console.with_transcript(Path::new(&config.log_dir))?;
    }
    let console = Arc::new(console);

    let tools = taskclaw_tools::default_registry(&settings, console.clone(), console.clone());
    let instructions = system_prompt(&config.instructions()?, &tools.definitions());

    let provider = Arc::new(OpenAiCompatProvider::new(
        "openai-compat",
        &config.provider_url,
        config.api_key.clone(),
    ));
    match provider.health_check().await {
        Ok(true) => {}
        Ok(false) => warn!(url = %config.provider_url, "Model endpoint answered with an error status"),
        Err(e) => warn!(url = %config.provider_url, error = %e, "Model endpoint is not reachable"),
    }
    let mut session = ChatSession::new(provider, &config.model_name, config.temperature, &instructions);
    if let Some(max) = config.max_tokens {
        session = session.with_max_tokens(max);
    }

    println!();
    println!("  TaskClaw");
    println!("  Model:      {}", config.model_name);
    println!("  Provider:   {}", config.provider_url);
    println!("  Workspace:  {}", settings.workspace_root.display());
    println!("  Tools:      {}", tools.names().join(", "));
    if let Some(path) = console.transcript_path() {
        println!("  Transcript: {}", path.display());
    }
    println!();

    let task = match task {
        Some(task) => task,
        None => console.read_line("Task:").await?.unwrap_or_default(),
    };

    let mut agent = AgentLoop::new(
        session,
        tools,
        console.clone(),
        console.clone(),
        settings.workspace_root.to_string_lossy(),
    )
    .with_display_mask(DisplayMask {
        thought: config.display_thought,
        tool_calls: config.display_toolcall,
    })
    .with_termination_keyword(&config.termination_keyword);
    if let Some(max) = config.max_turns {
        agent = agent.with_max_turns(max);
    }

    let report = agent.run(&task).await?;
    info!(
        turns = report.turns,
        tool_calls = report.tool_calls,
        cwd = %report.working_directory,
        "Session finished"
    );
    println!();
    println!("  Goodbye!");
    Ok(())
}
