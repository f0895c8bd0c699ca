//! Output formatting utilities for spur
//!
//! Supports multiple output formats:
//! - Table: ASCII tables with borders (default)
//! - JSON: Machine-readable JSON
//! - YAML: Human-readable YAML
//! - Text: Plain text, one item per line

use crate::config::OutputFormat;
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;
use spur_client::{Record, StreamDescription};
use std::io::Write;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 +0000`.
const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Format and print output based on configured format
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print a list of items
    pub fn print_list<T: Serialize + Tabled>(&self, items: Vec<T>) -> Result<()> {
        match self.format {
            OutputFormat::Table => self.print_table(items),
            OutputFormat::Json => self.print_json(&items),
            OutputFormat::Yaml => self.print_yaml(&items),
            OutputFormat::Text => self.print_text(items),
        }
    }

    /// Print a single item
    pub fn print_single<T: Serialize + Tabled>(&self, item: T) -> Result<()> {
        match self.format {
            OutputFormat::Table => self.print_table(vec![item]),
            OutputFormat::Json => self.print_json(&item),
            OutputFormat::Yaml => self.print_yaml(&item),
            OutputFormat::Text => self.print_text(vec![item]),
        }
    }

    /// Print one consumed record to stdout.
    pub fn print_record(&self, index: u64, record: &Record, verbose: bool) -> Result<()> {
        let mut out = std::io::stdout().lock();
        self.write_record(&mut out, index, record, verbose)
    }

    /// Write one consumed record.
    ///
    /// JSON output is one object per line so it can be piped; every other
    /// format writes the payload, preceded by its metadata when `verbose`.
    pub fn write_record<W: Write>(
        &self,
        out: &mut W,
        index: u64,
        record: &Record,
        verbose: bool,
    ) -> Result<()> {
        let data = String::from_utf8_lossy(&record.data);

        if self.format == OutputFormat::Json {
            let line = RecordLine {
                index,
                partition_key: &record.partition_key,
                sequence_number: &record.sequence_number,
                data: &data,
            };
            writeln!(out, "{}", serde_json::to_string(&line)?)?;
            return Ok(());
        }

        if verbose {
            writeln!(out, "Data record: {}", index + 1)?;
            writeln!(out, "Partition: {}", record.partition_key)?;
            writeln!(out, "SequenceNumber: {}", record.sequence_number)?;
            write!(out, "Data: ")?;
        }
        writeln!(out, "{}", data)?;
        Ok(())
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) {
        if self.colored {
            println!("{} {}", "✅".green(), message);
        } else {
            println!("✅ {}", message);
        }
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "❌".red(), message.red());
        } else {
            eprintln!("❌ {}", message);
        }
    }

    /// Print a warning message
    pub fn print_warning(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "⚠️".yellow(), message.yellow());
        } else {
            eprintln!("⚠️  {}", message);
        }
    }

    /// Print an info message
    ///
    /// Goes to stderr so that consumed records on stdout stay clean.
    pub fn print_info(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "ℹ️".blue(), message);
        } else {
            eprintln!("ℹ️  {}", message);
        }
    }

    /// Print table format
    fn print_table<T: Tabled>(&self, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            println!("No items found");
            return Ok(());
        }

        let mut table = Table::new(items);
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        println!("{}", table);
        Ok(())
    }

    /// Print JSON format
    fn print_json<T: Serialize + ?Sized>(&self, items: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        println!("{}", json);
        Ok(())
    }

    /// Print YAML format
    fn print_yaml<T: Serialize + ?Sized>(&self, items: &T) -> Result<()> {
        let yaml = serde_yaml::to_string(items)?;
        print!("{}", yaml);
        Ok(())
    }

    /// Print text format (tab-separated fields, one item per line)
    fn print_text<T: Tabled>(&self, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            println!("No items found");
            return Ok(());
        }

        for item in items {
            println!("{}", text_line(&item));
        }
        Ok(())
    }
}

fn text_line<T: Tabled>(item: &T) -> String {
    item.fields().join("\t")
}

#[derive(Serialize)]
struct RecordLine<'a> {
    index: u64,
    partition_key: &'a str,
    sequence_number: &'a str,
    data: &'a str,
}

/// One stream in `list`/`describe` output.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StreamRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Shards")]
    pub shard_count: usize,
    #[tabled(rename = "Shard IDs")]
    pub shard_ids: String,
    #[tabled(rename = "ARN")]
    pub arn: String,
}

impl StreamRow {
    /// A row for a stream that has not been described yet.
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: "-".to_string(),
            shard_count: 0,
            shard_ids: String::new(),
            arn: String::new(),
        }
    }
}

impl From<&StreamDescription> for StreamRow {
    fn from(description: &StreamDescription) -> Self {
        Self {
            name: description.name.clone(),
            status: description.status.to_string(),
            shard_count: description.shards.len(),
            shard_ids: description
                .shards
                .iter()
                .map(|s| s.shard_id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            arn: description.arn.clone(),
        }
    }
}

/// Render a lag in milliseconds for humans.
///
/// Hours win over minutes, minutes over seconds; anything under a second is
/// shown in milliseconds.
pub fn format_lag(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis % 60_000) as f64 / 1000.0;

    if hours > 0 {
        format!("{} hours {} minutes", hours, minutes)
    } else if minutes > 0 {
        format!("{} minutes and {} seconds", minutes, seconds)
    } else if seconds >= 1.0 {
        format!("{} seconds", seconds)
    } else {
        format!("{} milliseconds", millis)
    }
}

/// Prefix a log line with its UTC timestamp: `[ <RFC1123Z> ] line`.
pub fn decorate_log_line(line: &str, now: DateTime<Utc>) -> String {
    format!("[ {} ] {}", now.format(RFC1123Z), line)
}

/// Display key-value pairs
pub fn print_key_value(pairs: Vec<(String, String)>, colored: bool) {
    for (key, value) in pairs {
        if colored {
            println!("  {}: {}", key.bold(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use spur_client::{ShardInfo, StreamStatus};

    /// A stdout whose reader went away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Serialize, Tabled)]
    struct TestItem {
        name: String,
        count: u32,
    }

    fn description() -> StreamDescription {
        StreamDescription {
            name: "orders".to_string(),
            status: StreamStatus::Active,
            arn: "arn:aws:kinesis:us-west-1:000000000000:stream/orders".to_string(),
            shards: vec![
                ShardInfo {
                    shard_id: "shardId-000000000000".to_string(),
                },
                ShardInfo {
                    shard_id: "shardId-000000000001".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_format_lag_milliseconds() {
        assert_eq!(format_lag(0), "0 milliseconds");
        assert_eq!(format_lag(999), "999 milliseconds");
    }

    #[test]
    fn test_format_lag_seconds() {
        assert_eq!(format_lag(1000), "1 seconds");
        assert_eq!(format_lag(1500), "1.5 seconds");
        assert_eq!(format_lag(59_999), "59.999 seconds");
    }

    #[test]
    fn test_format_lag_minutes() {
        assert_eq!(format_lag(60_000), "1 minutes and 0 seconds");
        assert_eq!(format_lag(90_500), "1 minutes and 30.5 seconds");
    }

    #[test]
    fn test_format_lag_hours() {
        assert_eq!(format_lag(3_600_000), "1 hours 0 minutes");
        assert_eq!(format_lag(2 * 3_600_000 + 5 * 60_000 + 7), "2 hours 5 minutes");
    }

    #[test]
    fn test_decorate_log_line() {
        let now = Utc.with_ymd_and_hms(2015, 7, 16, 17, 8, 3).unwrap();
        assert_eq!(
            decorate_log_line("disk full", now),
            "[ Thu, 16 Jul 2015 17:08:03 +0000 ] disk full"
        );
    }

    #[test]
    fn test_stream_row_from_description() {
        let row = StreamRow::from(&description());
        assert_eq!(row.name, "orders");
        assert_eq!(row.status, "ACTIVE");
        assert_eq!(row.shard_count, 2);
        assert_eq!(row.shard_ids, "shardId-000000000000, shardId-000000000001");
    }

    #[test]
    fn test_text_line_joins_fields() {
        let row = StreamRow::from(&description());
        assert!(text_line(&row).starts_with("orders\tACTIVE\t2\t"));
        assert_eq!(text_line(&StreamRow::pending("new")), "new\t-\t0\t\t");
    }

    #[test]
    fn test_stream_row_json() {
        let json = serde_json::to_value(StreamRow::from(&description())).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["shard_count"], 2);
    }

    #[test]
    fn test_all_formats_print() {
        for format in [
            OutputFormat::Table,
            OutputFormat::Json,
            OutputFormat::Yaml,
            OutputFormat::Text,
        ] {
            let formatter = Formatter::new(format, false);
            formatter
                .print_list(vec![TestItem {
                    name: "test".to_string(),
                    count: 42,
                }])
                .unwrap();
            formatter
                .print_single(StreamRow::from(&description()))
                .unwrap();
        }
    }

    #[test]
    fn test_empty_list_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let items: Vec<TestItem> = vec![];
        formatter.print_list(items).unwrap();
    }

    fn record() -> Record {
        Record {
            data: Bytes::from_static(b"hello"),
            partition_key: "p1".to_string(),
            sequence_number: "00000000000000000001".to_string(),
        }
    }

    #[test]
    fn test_write_record_plain_and_verbose() {
        let formatter = Formatter::new(OutputFormat::Table, false);

        let mut out = Vec::new();
        formatter.write_record(&mut out, 0, &record(), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n");

        let mut out = Vec::new();
        formatter.write_record(&mut out, 4, &record(), true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Data record: 5\nPartition: p1\nSequenceNumber: 00000000000000000001\nData: hello\n"
        );
    }

    #[test]
    fn test_write_record_json_line() {
        let mut out = Vec::new();
        Formatter::new(OutputFormat::Json, false)
            .write_record(&mut out, 2, &record(), false)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let json: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["partition_key"], "p1");
        assert_eq!(json["data"], "hello");
    }

    #[test]
    fn test_write_record_reports_closed_pipe() {
        let err = Formatter::new(OutputFormat::Text, false)
            .write_record(&mut ClosedPipe, 0, &record(), false)
            .unwrap_err();
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_formatter_messages() {
        for colored in [true, false] {
            let formatter = Formatter::new(OutputFormat::Table, colored);
            formatter.print_success("Operation succeeded");
            formatter.print_error("Something failed");
            formatter.print_warning("Careful");
            formatter.print_info("Informational message");
        }
    }

    #[test]
    fn test_print_key_value() {
        let pairs = vec![
            ("key1".to_string(), "value1".to_string()),
            ("key2".to_string(), "value2".to_string()),
        ];
        print_key_value(pairs.clone(), true);
        print_key_value(pairs, false);
    }
}
