//! Effect listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use mixgraph_core::EffectKind;

#[derive(Args)]
pub struct EffectsArgs {
    /// Show details for a specific effect
    #[arg(value_name = "EFFECT")]
    effect: Option<String>,
}

pub fn run(args: EffectsArgs) -> anyhow::Result<()> {
    let Some(name) = &args.effect else {
        list_all();
        return Ok(());
    };

    let kind: EffectKind = name.parse()?;
    let id = kind.id();

    println!("{id}");
    println!("{}", "=".repeat(id.len()));
    println!();
    println!("{} ({})", kind.description(), kind.category().name());
    println!();

    println!("Parameters:");
    println!();
    println!(
        "  {:12}  {:32}  {:10}  {}",
        "Name", "Description", "Default", "Range"
    );
    println!(
        "  {:12}  {:32}  {:10}  {}",
        "----", "-----------", "-------", "-----"
    );
    for param in kind.params() {
        println!(
            "  {:12}  {:32}  {:10}  {} .. {}",
            param.name, param.description, param.default, param.min, param.max
        );
    }

    println!();
    println!("Config example:");
    println!();
    println!("  [[mixers.effects]]");
    println!("  type = \"{id}\"");
    let params: Vec<String> = kind
        .params()
        .iter()
        .take(2)
        .map(|p| format!("{} = \"{}\"", p.name, p.default))
        .collect();
    if !params.is_empty() {
        println!("  params = {{ {} }}", params.join(", "));
    }
    Ok(())
}

fn list_all() {
    println!("Available Effects");
    println!("=================");
    println!();
    for kind in EffectKind::ALL {
        println!(
            "  {:12} {:12} - {}",
            kind.id(),
            kind.category().name(),
            kind.description()
        );
    }
    println!();
    println!("Use 'mixgraph effects <name>' for detailed parameter info.");
}
