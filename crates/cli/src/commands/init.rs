//! `repairkit init`: First-time setup.

use repairkit_config::AppConfig;
use std::path::Path;

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_path(explicit);

    println!("🔧 RepairKit · First-Time Setup");
    println!("===============================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if dir.exists() {
            println!("  Config directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set GEMINI_API_KEY (or add api_key to {})", config_path.display());
    println!("   2. Optionally set TAVILY_API_KEY for better fallback search");
    println!("   3. Run: repairkit ask \"my iPhone 12 battery drains fast\"\n");

    Ok(())
}
