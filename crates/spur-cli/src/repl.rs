//! Interactive shell for spur
//!
//! Provides a rustyline-based interactive shell with:
//! - Command history (up/down arrows), kept in `~/.spur/history`
//! - A current stream that `put`, `iterate` and `read` act on
//! - Background lifecycle watches after `create` and `delete`

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spur_client::StreamStatus;

use crate::commands::{put, read, stream, ReadArgs};
use crate::config::Config;
use crate::format::print_key_value;
use crate::session::Session;

/// Payload of records written by `iterate`.
const ITERATE_TEST_STRING: &str = "Testing the stream.";

/// REPL context holding the session and editor
pub struct Repl {
    session: Session,
    editor: DefaultEditor,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(session: Session) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;

        // Load history from file if it exists
        let history_path = Config::history_path();
        if history_path.exists() {
            let _ = editor.load_history(&history_path);
        }

        Ok(Self { session, editor })
    }

    /// Run the interactive REPL loop
    pub async fn run(&mut self) -> Result<()> {
        println!("Spur Interactive Shell");
        println!("Type 'help' for available commands, 'exit' or Ctrl+D to quit");

        // Deletes and `use` only work on registered streams.
        if let Err(e) = self.session.registry.list().await {
            self.session
                .formatter
                .print_warning(&format!("Couldn't list streams: {:#}", e));
        }
        println!("{}", self.session.registry);
        println!();

        loop {
            match self.editor.readline("spur> ") {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    if line == "exit" || line == "quit" {
                        break;
                    }

                    if line == "help" {
                        Self::print_help();
                        continue;
                    }

                    if let Err(e) = self.execute_command(line).await {
                        self.session.formatter.print_error(&format!("{:#}", e));
                    }

                    println!();
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - continue
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!("exit");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading line: {}", err);
                    break;
                }
            }
        }

        // Save history on exit
        let history_path = Config::history_path();
        if let Some(parent) = history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.editor.save_history(&history_path)?;

        println!("Goodbye!");
        Ok(())
    }

    /// Execute a command from the REPL
    async fn execute_command(&mut self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = tokens.split_first() else {
            return Ok(());
        };

        match *command {
            "list" => stream::list(&self.session).await?,
            "create" => self.handle_create(args).await?,
            "delete" => self.handle_delete(args).await?,
            "use" => self.handle_use(args)?,
            "describe" => self.handle_describe(args).await?,
            "iterate" => self.handle_iterate(args).await?,
            "put" => self.handle_put(line, args).await?,
            "read" => self.handle_read(args).await?,
            "status" => self.handle_status(),
            _ => {
                println!("Unknown command: {}", command);
                println!("Type 'help' for available commands");
            }
        }

        Ok(())
    }

    /// Create a stream and report when it becomes usable
    async fn handle_create(&self, args: &[&str]) -> Result<()> {
        let Some(name) = args.first() else {
            println!("Usage: create <name> [shards]");
            return Ok(());
        };
        let shards = match args.get(1) {
            Some(s) => s
                .parse()
                .with_context(|| format!("Invalid shard count: {}", s))?,
            None => stream::DEFAULT_SHARD_COUNT,
        };

        stream::create(&self.session, name, shards).await?;
        self.watch_in_background(name, StreamStatus::Creating);
        Ok(())
    }

    /// Delete a stream and report when it is gone
    async fn handle_delete(&self, args: &[&str]) -> Result<()> {
        let Some(name) = args.first() else {
            println!("Usage: delete <name>");
            return Ok(());
        };

        stream::delete(&self.session, name).await?;
        self.watch_in_background(name, StreamStatus::Deleting);
        Ok(())
    }

    fn watch_in_background(&self, name: &str, expected: StreamStatus) {
        let registry = self.session.registry.clone();
        let formatter = self.session.formatter;

        self.session
            .watcher
            .watch_with(name, expected, move |outcome| match outcome.result {
                Ok(status) => {
                    registry.record_status(&outcome.stream, status.clone());
                    formatter.print_success(&format!(
                        "Stream {} is now {}.",
                        outcome.stream, status
                    ));
                }
                Err(e) => formatter.print_error(&format!("{:#}", anyhow::Error::new(e))),
            });
    }

    fn handle_use(&self, args: &[&str]) -> Result<()> {
        let Some(name) = args.first() else {
            println!("Usage: use <name>");
            return Ok(());
        };

        self.session.registry.set_current(name)?;
        println!("Using stream: {}", name);
        Ok(())
    }

    async fn handle_describe(&self, args: &[&str]) -> Result<()> {
        let name = match args.first() {
            Some(name) => name.to_string(),
            None => self.current()?.name().to_string(),
        };
        stream::describe(&self.session, &name).await
    }

    /// Write `n` numbered test records to the current stream
    async fn handle_iterate(&self, args: &[&str]) -> Result<()> {
        let Some(count) = args.first() else {
            println!("Usage: iterate <count>");
            return Ok(());
        };
        let count: u32 = count
            .parse()
            .with_context(|| format!("Invalid count: {}", count))?;

        let handle = self.current()?;
        let sent =
            put::put_test_lines(&self.session, &handle, ITERATE_TEST_STRING, ": ", count, false)
                .await?;
        println!("Pushed {} records to {}", sent, handle);
        Ok(())
    }

    /// Write the rest of the line as one record
    async fn handle_put(&self, line: &str, args: &[&str]) -> Result<()> {
        if args.is_empty() {
            println!("Usage: put <text>");
            return Ok(());
        }

        // Keep the text's own spacing.
        let text = line.trim_start()["put".len()..].trim();
        let handle = self.current()?;
        put::put_line(&self.session, &handle, text, false).await?;
        Ok(())
    }

    async fn handle_read(&self, args: &[&str]) -> Result<()> {
        let read_args = ReadArgs {
            all: args.contains(&"--all"),
            tail: args.contains(&"--tail"),
            limit: Self::parse_flag_u32(args, "--limit"),
            ..ReadArgs::default()
        };

        let mut handle = self.current()?;
        read::read(&self.session, &mut handle, &read_args).await?;
        Ok(())
    }

    fn handle_status(&self) {
        println!("{}", self.session.registry);
        if let Some(entry) = self.session.registry.current() {
            let handle = &entry.handle;
            let mut pairs = vec![
                ("Name".to_string(), handle.name().to_string()),
                ("Partition".to_string(), handle.partition_key().to_string()),
                ("Shard".to_string(), handle.shard_id().to_string()),
                ("Start".to_string(), handle.start().to_string()),
            ];
            if let Some(status) = entry.status() {
                pairs.push(("Status".to_string(), status.to_string()));
            }
            print_key_value(pairs, self.session.config.colored);
        }
    }

    fn current(&self) -> Result<spur_client::StreamHandle> {
        self.session
            .registry
            .current()
            .map(|entry| entry.handle)
            .context("No current stream. Select one with 'use <name>'")
    }

    /// Parse a flag value as u32
    fn parse_flag_u32(args: &[&str], flag: &str) -> Option<u32> {
        args.iter()
            .position(|&arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .and_then(|s| s.parse().ok())
    }

    /// Print help message
    fn print_help() {
        println!("Available commands:");
        println!();
        println!("  list                      List streams in the region");
        println!("  create <name> [shards]    Create a stream (default 2 shards)");
        println!("  delete <name>             Delete a stream");
        println!("  use <name>                Make a stream the current one");
        println!("  describe [name]           Describe a stream (default: current)");
        println!();
        println!("  put <text>                Append a line to the current stream");
        println!("  iterate <count>           Append <count> test lines");
        println!("  read [--all] [--tail] [--limit N]");
        println!("                            Read the current stream's shard");
        println!();
        println!("  status                    Show the registry and current stream");
        println!("  help                      Show this help");
        println!("  exit, quit                Leave the shell");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_u32() {
        let args = ["--all", "--limit", "25"];
        assert_eq!(Repl::parse_flag_u32(&args, "--limit"), Some(25));
        assert_eq!(Repl::parse_flag_u32(&args, "--missing"), None);
        assert_eq!(Repl::parse_flag_u32(&["--limit"], "--limit"), None);
        assert_eq!(Repl::parse_flag_u32(&["--limit", "x"], "--limit"), None);
    }
}
