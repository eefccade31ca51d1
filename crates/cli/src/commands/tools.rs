//! `tether tools`: list discovered tools and check their manifests.

use tether_config::AppConfig;
use tether_core::tool::ToolExecutor;

pub fn run(config: AppConfig, validate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = super::discover_tools(&config);

    if registry.is_empty() {
        println!("No tools found. Searched:");
        for dir in &config.tools.dirs {
            println!("  {}", dir.display());
        }
        return Ok(());
    }

    if validate {
        let issues = registry.validate();
        if issues.is_empty() {
            println!("All {} manifests OK", registry.len());
        } else {
            for issue in &issues {
                println!("  warning: {issue}");
            }
            println!("{} warning(s); unmatched placeholders are dropped at run time", issues.len());
        }
        return Ok(());
    }

    println!("Tools ({} manifests):", registry.len());
    for def in registry.definitions() {
        println!("  {:<32} {}", def.name, def.description);
    }

    Ok(())
}
