//! Read records from one shard
//!
//! Without `--tail` the read stops once it has caught up with the newest
//! record; with `--tail` it keeps waiting for more until Ctrl+C.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use spur_client::{
    Lag, PollEvent, PollSummary, ShutdownHandle, StartPosition, StopReason, StreamHandle,
};

use crate::format::format_lag;
use crate::session::Session;

#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// Start at the oldest untrimmed record
    #[arg(long, conflicts_with_all = ["latest", "at_sequence", "after_sequence"])]
    pub all: bool,

    /// Start just after the newest record (default)
    #[arg(long, conflicts_with_all = ["at_sequence", "after_sequence"])]
    pub latest: bool,

    /// Start at the record with this sequence number
    #[arg(long, value_name = "SEQUENCE", conflicts_with = "after_sequence")]
    pub at_sequence: Option<String>,

    /// Start just after the record with this sequence number
    #[arg(long, value_name = "SEQUENCE")]
    pub after_sequence: Option<String>,

    /// Keep waiting for new records
    #[arg(short, long)]
    pub tail: bool,

    /// Maximum records per fetch
    #[arg(short, long)]
    pub limit: Option<u32>,
}

impl ReadArgs {
    pub fn start_position(&self) -> StartPosition {
        if let Some(seq) = &self.at_sequence {
            StartPosition::AtSequenceNumber(seq.clone())
        } else if let Some(seq) = &self.after_sequence {
            StartPosition::AfterSequenceNumber(seq.clone())
        } else if self.all {
            StartPosition::TrimHorizon
        } else {
            StartPosition::Latest
        }
    }
}

/// Handle the read command
pub async fn handle_read(session: &Session, stream: &str, args: &ReadArgs) -> Result<()> {
    let mut handle = session.handle(stream);
    read(session, &mut handle, args).await?;
    Ok(())
}

/// Read `handle`'s shard, printing records as they arrive.
///
/// The handle's start position is replaced by the one `args` asks for.
pub async fn read(
    session: &Session,
    handle: &mut StreamHandle,
    args: &ReadArgs,
) -> Result<PollSummary> {
    read_to(session, handle, args, &mut std::io::stdout()).await
}

/// Like [`read`], writing records to `out`.
///
/// The first failed write (e.g. a closed pipe) stops the read and is
/// returned as its error.
pub async fn read_to<W: Write>(
    session: &Session,
    handle: &mut StreamHandle,
    args: &ReadArgs,
    out: &mut W,
) -> Result<PollSummary> {
    *handle = handle.clone().with_start(args.start_position());

    if session.verbose {
        session.formatter.print_info(&format!(
            "Reading {} from {} ({})",
            handle.name(),
            handle.shard_id(),
            handle.start()
        ));
    }

    let shutdown = ShutdownHandle::new();
    let ctrl_c = shutdown.cancel_on_ctrl_c();
    let poller = session.poller(args.tail, args.limit);
    let formatter = session.formatter;
    let verbose = session.verbose;
    let mut output_error: Option<anyhow::Error> = None;

    let result = poller
        .run(handle, &shutdown, |event| match event {
            PollEvent::Record { index, record } => {
                if output_error.is_some() {
                    return;
                }
                if let Err(e) = formatter.write_record(out, index, &record, verbose) {
                    output_error = Some(e);
                    shutdown.cancel();
                }
            }
            PollEvent::Lag(lag) => {
                if verbose {
                    formatter.print_info(&lag_message(lag));
                }
            }
            PollEvent::EmptyReads { count, lag } => {
                formatter.print_info(&empty_reads_message(count, lag));
            }
            PollEvent::Done(reason) => {
                if verbose && output_error.is_none() {
                    formatter.print_info(&match reason {
                        StopReason::CaughtUp => "Caught up with the stream.".to_string(),
                        StopReason::Cancelled(signal) => format!("Stopped by {}.", signal),
                    });
                }
            }
        })
        .await;
    ctrl_c.abort();

    if let Some(e) = output_error {
        return Err(e.context(format!("Failed to write records from {}", handle.name())));
    }
    let summary = result.with_context(|| format!("Failed to read {}", handle.name()))?;

    if verbose {
        formatter.print_info(&format!(
            "Read {} records in {} fetches.",
            summary.records, summary.fetches
        ));
    }
    Ok(summary)
}

fn describe_lag(lag: Lag) -> String {
    match lag {
        Lag::CaughtUp => "caught up".to_string(),
        Lag::Behind(_) => format_lag(lag.as_millis()),
    }
}

fn lag_message(lag: Lag) -> String {
    match lag {
        Lag::CaughtUp => "The read is caught up with the tip of the stream.".to_string(),
        Lag::Behind(_) => format!(
            "The read is {} behind the tip of the stream.",
            describe_lag(lag)
        ),
    }
}

fn empty_reads_message(count: u64, lag: Lag) -> String {
    match lag {
        Lag::CaughtUp => format!("{} empty reads, caught up with the stream.", count),
        Lag::Behind(_) => format!(
            "{} empty reads, {} behind the tip of the stream.",
            count,
            describe_lag(lag)
        ),
    }
}
