//! `ragway agent`: Run the retrieval agent once on a single message.

use ragway_agent::{AgentLoop, AgentSettings};
use ragway_core::message::Message;
use ragway_core::wire::to_wire;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

pub async fn run(message: String, full: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let provider = super::build_provider(&config)?;
    let retriever = ragway_retrieval::from_config(&config, provider.clone())?;
    let tools = ragway_tools::default_registry(
        retriever,
        config.retrieval.top_k,
        config.agent.tool_timeout(),
    );

    let agent = AgentLoop::new(provider, Arc::new(tools), AgentSettings::from_config(&config));
    let history = vec![Message::user(message)];
    debug!(full, retriever = ?config.retrieval.backend, "Running retrieval agent");

    if full {
        let transcript = agent.run(history).await?;
        println!("{}", serde_json::to_string_pretty(&to_wire(&transcript.messages))?);
        return Ok(());
    }

    let mut stream = agent.stream(history);
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        write!(stdout, "{}", chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(())
}
