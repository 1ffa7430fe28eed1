//! Interactive session: one engine stays loaded while commands are read
//! line by line from stdin. Errors are reported and the session continues.

use crate::cmd::{self, Commands};
use crate::{env_filter, LogHandle};
use anyhow::Context;
use clap::Parser;
use maint_core::engine::MaintenanceEngine;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

#[derive(Parser)]
#[command(name = "maint", disable_version_flag = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Commands,
}

struct Session {
    engine: MaintenanceEngine,
    log: LogHandle,
    json: bool,
}

enum Flow {
    Continue,
    Exit,
}

pub fn run(root: &Path, log: LogHandle, json: bool) -> anyhow::Result<()> {
    let engine = cmd::open_engine(root)?;
    let mut session = Session { engine, log, json };

    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("maint> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else { break };
        let line = line.context("failed to read from stdin")?;
        match session.handle(&line) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    Ok(())
}

impl Session {
    fn handle(&mut self, line: &str) -> anyhow::Result<Flow> {
        let words = split_words(line)?;
        let Some(first) = words.first() else {
            return Ok(Flow::Continue);
        };

        match first.as_str() {
            "exit" | "quit" => return Ok(Flow::Exit),
            "verbose" => {
                let level = match words.get(1).map(String::as_str) {
                    Some("on") => tracing::Level::DEBUG,
                    Some("off") => tracing::Level::INFO,
                    _ => anyhow::bail!("usage: verbose on|off"),
                };
                self.log
                    .reload(env_filter(level))
                    .context("failed to change log level")?;
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        let parsed = match ReplLine::try_parse_from(std::iter::once("maint".to_string()).chain(words)) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Help and usage errors are printed by clap itself
                if let Err(err) = e.print() {
                    tracing::warn!(error = %err, "failed to print usage");
                }
                return Ok(Flow::Continue);
            }
        };
        cmd::run(&mut self.engine, parsed.command, self.json)?;
        Ok(Flow::Continue)
    }
}

/// Split a command line into words. Single or double quotes group words;
/// a backslash escapes the next character outside single quotes.
fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('\''), _) => current.push(c),
            (_, '\\') => {
                let next = chars.next().context("trailing backslash")?;
                current.push(next);
                in_word = true;
            }
            (Some(_), _) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, _) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        anyhow::bail!("unterminated quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
