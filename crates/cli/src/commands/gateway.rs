//! `ragway gateway`: Start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Ragway Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);
    println!("   Retrieval: {:?} (top_k = {})", config.retrieval.backend, config.retrieval.top_k);

    ragway_gateway::start(config).await?;

    Ok(())
}
