use std::sync::Arc;

use clap::Parser;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use mudtext::cli::{self, CliArgs, Command};
use mudtext::config::Config;
use mudtext::pattern::RegexEngine;
use mudtext::script::ScriptLexer;
use mudtext::stream;
use mudtext::var::VariableEvent;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // ── Settings ──────────────────────────────────────────────────────────────
    let path = args.config.clone().or_else(Config::default_path);
    let (config, errors) = match &path {
        Some(p) if p.exists() || args.config.is_some() => match Config::load_file(p) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("mudtext: {}: {e}", p.display());
                std::process::exit(1);
            }
        },
        _ => (Config::default(), Vec::new()),
    };
    for e in &errors {
        eprintln!("mudtext: warning: {e}");
    }

    // ── Logging ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.as_deref().unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Some(p) = &path {
        debug!(path = %p.display(), "settings");
    }

    if let Err(e) = run(args.command, &config).await {
        eprintln!("mudtext: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(stdin()).lines();

    match command {
        Command::Tokenize => {
            while let Some(line) = lines.next_line().await? {
                for tag in stream::tokenize(&line) {
                    println!("{}", cli::describe(&tag));
                }
            }
        }
        Command::Lex => {
            let mut lexer = ScriptLexer::new();
            while let Some(line) = lines.next_line().await? {
                match lexer.tokenize(&line) {
                    Some(token) => println!("{token}"),
                    None => println!(),
                }
            }
        }
        Command::Expand { vars } => {
            let store = config.build_store();
            let mut events = store.subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(VariableEvent::Set { key, value }) => debug!(key = %key, value = %value, "set"),
                        Ok(VariableEvent::Removed { key }) => debug!(key = %key, "removed"),
                        Ok(VariableEvent::Cleared) => debug!("cleared"),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "variable events lagged")
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            for (name, value) in vars {
                store.set(name, value);
            }
            let engine = config.build_engine(Arc::new(RegexEngine::new()), &store)?;
            while let Some(line) = lines.next_line().await? {
                println!("{}", engine.substitute(&line));
            }
        }
    }
    Ok(())
}
