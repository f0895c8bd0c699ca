//! Append log lines to a stream
//!
//! Every line is sent as its own record, prefixed with the time it was sent
//! (`[ Thu, 16 Jul 2015 17:08:03 +0000 ] line`) unless `--raw` is given.

use anyhow::{Context, Result};
use clap::Args;
use spur_client::{AppendAck, StreamHandle};
use std::io::IsTerminal;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::format::decorate_log_line;
use crate::session::Session;

/// Payload of generated test records.
pub const DEFAULT_TEST_STRING: &str = "This is a test record";

#[derive(Args, Debug, Clone)]
pub struct PutArgs {
    /// Lines to append; stdin is read when none are given
    pub lines: Vec<String>,

    /// Append this many generated test records ("<test-string> <i>")
    #[arg(long, default_value_t = 0)]
    pub iterations: u32,

    /// Text of the generated test records
    #[arg(long, default_value = DEFAULT_TEST_STRING)]
    pub test_string: String,

    /// Read lines from stdin until EOF, after any other writes
    #[arg(long)]
    pub prompt: bool,

    /// Send lines exactly as given, without the timestamp prefix
    #[arg(long)]
    pub raw: bool,
}

impl PutArgs {
    fn reads_stdin(&self) -> bool {
        self.prompt || (self.lines.is_empty() && self.iterations == 0)
    }
}

/// Handle the put command
pub async fn handle_put(session: &Session, stream: &str, args: PutArgs) -> Result<()> {
    let handle = session.handle(stream);
    let mut sent = 0u64;

    for line in &args.lines {
        put_line(session, &handle, line, args.raw).await?;
        sent += 1;
    }

    if args.iterations > 0 {
        if session.verbose {
            session.formatter.print_info(&format!(
                "Will push {} entries using the string: {}",
                args.iterations, args.test_string
            ));
        }
        sent += put_test_lines(session, &handle, &args.test_string, " ", args.iterations, args.raw)
            .await?;
    }

    if args.reads_stdin() {
        sent += put_stdin(session, &handle, args.raw).await?;
    }

    session
        .formatter
        .print_success(&format!("Appended {} records to {}", sent, handle));
    Ok(())
}

/// Append one line, decorated unless `raw`.
pub async fn put_line(
    session: &Session,
    handle: &StreamHandle,
    line: &str,
    raw: bool,
) -> Result<AppendAck> {
    let data = if raw {
        line.to_string()
    } else {
        decorate_log_line(line, chrono::Utc::now())
    };

    let ack = session
        .writer
        .append(handle, data)
        .await
        .with_context(|| format!("Failed to append to {}", handle.name()))?;

    if session.verbose {
        session.formatter.print_info(&format!(
            "Appended to {} as {}",
            ack.shard_id, ack.sequence_number
        ));
    }
    Ok(ack)
}

/// Append `count` records `"<text><separator><i>"` for i in `0..count`.
pub async fn put_test_lines(
    session: &Session,
    handle: &StreamHandle,
    text: &str,
    separator: &str,
    count: u32,
    raw: bool,
) -> Result<u64> {
    for i in 0..count {
        let line = format!("{}{}{}", text, separator, i);
        put_line(session, handle, &line, raw).await?;
    }
    Ok(u64::from(count))
}

async fn put_stdin(session: &Session, handle: &StreamHandle, raw: bool) -> Result<u64> {
    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sent = 0;

    loop {
        if interactive {
            eprint!("Text to send <ctrl-D> to end > ");
        }
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        put_line(session, handle, &line, raw).await?;
        sent += 1;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        put: PutArgs,
    }

    fn parse(args: &[&str]) -> PutArgs {
        TestCli::parse_from(std::iter::once("put").chain(args.iter().copied())).put
    }

    #[test]
    fn test_no_lines_reads_stdin() {
        let args = parse(&[]);
        assert!(args.reads_stdin());
        assert_eq!(args.test_string, DEFAULT_TEST_STRING);
    }

    #[test]
    fn test_lines_skip_stdin() {
        let args = parse(&["first", "second"]);
        assert_eq!(args.lines, vec!["first", "second"]);
        assert!(!args.reads_stdin());
    }

    #[test]
    fn test_iterations_skip_stdin_unless_prompted() {
        assert!(!parse(&["--iterations", "5"]).reads_stdin());
        assert!(parse(&["--iterations", "5", "--prompt"]).reads_stdin());
    }
}
