use anyhow::{anyhow, bail, Context as _, Result};
use clap::Parser as _;

use chordmap::cli::{context_from_assignments, keymap_path, simulate, CliArgs, CliCommand};
use chordmap::config_paths::ConfigPaths;
use chordmap::context_key::{implies, Parser};
use chordmap::keymap::{load_keymap_file, ResolutionResult};
use chordmap::{Expr, KeybindingConfig};

fn main() -> Result<()> {
    chordmap::tracing::init();

    let args = CliArgs::parse();
    match args.command {
        CliCommand::Parse { expression } => {
            let expr = parse_or_report(&expression)?;
            println!("{}", expr.serialize());
        }
        CliCommand::Eval { expression, set } => {
            let expr = parse_or_report(&expression)?;
            let context = context_from_assignments(&set).map_err(|e| anyhow!(e))?;
            println!("{}", expr.evaluate(&context));
        }
        CliCommand::Implies {
            premise,
            conclusion,
        } => {
            let p = parse_or_report(&premise)?;
            let q = parse_or_report(&conclusion)?;
            println!("{}", implies(&p, &q));
        }
        CliCommand::Resolve {
            keymap,
            platform,
            set,
            chords,
        } => {
            let mut config = KeybindingConfig::load();
            if platform.is_some() {
                config.platform = platform;
            }
            let os = config.os();
            let keymap = keymap_path(keymap, ConfigPaths::discover().as_ref())?;
            let loaded = load_keymap_file(&keymap, os)
                .with_context(|| format!("Failed to load keymap {}", keymap.display()))?;
            let context = context_from_assignments(&set).map_err(|e| anyhow!(e))?;

            for press in simulate(loaded, &config, context, &chords)? {
                let outcome = match &press.result {
                    ResolutionResult::NoMatchingKb => "no match".to_string(),
                    ResolutionResult::MoreChordsNeeded => "more chords needed".to_string(),
                    ResolutionResult::KbFound {
                        command_id: Some(id),
                        is_bubble,
                        ..
                    } => {
                        if *is_bubble {
                            format!("{} (bubbles)", id)
                        } else {
                            id.clone()
                        }
                    }
                    ResolutionResult::KbFound {
                        command_id: None, ..
                    } => "unbound".to_string(),
                };
                println!(
                    "{:<16} {:<32} handled={}",
                    press.label, outcome, press.handled
                );
                for command in &press.invoked {
                    println!("  invoked {}", command);
                }
                if let Some(status) = &press.status {
                    println!("  {}", status);
                }
            }
        }
    }

    Ok(())
}

/// Parse `input`, printing every diagnostic to stderr on failure
fn parse_or_report(input: &str) -> Result<Expr> {
    let mut parser = Parser::new();
    if let Some(expr) = parser.parse(input) {
        return Ok(expr);
    }
    for error in parser.errors() {
        eprintln!("error: {}", error);
        if let Some(hint) = &error.hint {
            eprintln!("  hint: {}", hint);
        }
    }
    for error in parser.lexing_errors() {
        eprintln!(
            "lexing error at offset {} ('{}'): {}",
            error.offset, error.lexeme, error.error
        );
    }
    bail!("Could not parse '{}'", input)
}
