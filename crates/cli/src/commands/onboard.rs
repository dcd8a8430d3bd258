//! `ragway onboard`: Write a starter config file.

use ragway_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Ragway First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set OPENAI_API_KEY (or api_key in {})", config_path.display());
    println!("   2. Set SUPABASE_URL and SUPABASE_PRIVATE_KEY, or use backend = \"memory\"");
    println!("   3. Run: ragway gateway\n");

    Ok(())
}
