//! `ragway extract`: Structured extraction from a piece of text.

use ragway_agent::Extractor;

pub async fn run(input: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let provider = super::build_provider(&config)?;

    let extraction = Extractor::from_config(provider, &config).extract(&input).await?;
    println!("{}", serde_json::to_string_pretty(&extraction)?);

    Ok(())
}
