//! Config validation command.

use std::path::PathBuf;

use clap::Args;
use mixgraph_config::validate_config;

use super::common::load_config;

#[derive(Args)]
pub struct CheckArgs {
    /// Graph config file (defaults to the user config file)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let (config, source) = load_config(args.config.as_deref())?;

    println!("Config: {source}");
    println!(
        "Stream: {} Hz, {} ch{}{}",
        config.stream.frequency,
        config.stream.channels,
        if config.stream.nonstop { ", nonstop" } else { "" },
        if config.stream.float { ", float" } else { "" },
    );
    println!("Device: {}", config.device);
    println!("Tick:   {} ms", config.tick_ms);
    println!();
    println!("Mixers:");
    println!("  default (fallback)");
    for mixer in &config.mixers {
        let chain: Vec<&str> = mixer.effects.iter().map(|e| e.effect_type.as_str()).collect();
        if chain.is_empty() {
            println!("  {}", mixer.name);
        } else {
            println!("  {} -> {}", mixer.name, chain.join(" -> "));
        }
    }
    println!();

    match validate_config(&config) {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(err) => {
            let problems = err.errors();
            println!("Problems:");
            for problem in &problems {
                println!("  - {problem}");
            }
            anyhow::bail!("{} problem(s) found in {source}", problems.len())
        }
    }
}
