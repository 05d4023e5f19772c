// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Command line front end over [`bucketwalk::StorageClient`].
//!
//! Examples:
//! ```bash
//! bucketwalk buckets s3://
//! bucketwalk ls s3://bucket/prefix/
//! bucketwalk ls s3://bucket/prefix/ -r --name '*.csv' --size '>1M' -n 100
//! bucketwalk ls file:///data/lake -r --mtime '<2d' --json
//! bucketwalk get s3://bucket/prefix/key.json -o key.json
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::StreamExt;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bucketwalk::{CancellationToken, FilterSpec, ListItem, ListOptions, StorageClient};

/// Print a line, exiting quietly when stdout is a closed pipe.
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List buckets visible through a scheme-only URI (s3:// or file://).
    Buckets {
        #[arg(default_value = "s3://")]
        uri: String,
    },

    /// List objects under a URI.
    Ls {
        /// Storage URI (e.g. s3://bucket/prefix/)
        uri: String,

        /// Descend into every sub-prefix
        #[arg(short, long)]
        recursive: bool,

        /// Stop after this many entries
        #[arg(short = 'n', long = "max-files")]
        max_files: Option<u64>,

        /// Basename, exact or glob (e.g. '*.parquet')
        #[arg(long)]
        name: Option<String>,

        /// Size predicate (e.g. '>1M', '<=512K', '1M-5M')
        #[arg(long)]
        size: Option<String>,

        /// Age predicate (e.g. '>1d', '<2h30m')
        #[arg(long)]
        mtime: Option<String>,

        /// Case-insensitive name matching
        #[arg(short = 'i', long = "ignore-case")]
        ignore_case: bool,

        /// One JSON document per entry
        #[arg(long)]
        json: bool,
    },

    /// Download one object to a file, or to stdout when no file is given.
    Get {
        uri: String,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let client = StorageClient::from_env();

    match cli.cmd {
        Command::Buckets { uri } => buckets_cmd(&client, &uri).await?,

        Command::Ls {
            uri,
            recursive,
            max_files,
            name,
            size,
            mtime,
            ignore_case,
            json,
        } => {
            let mut spec = FilterSpec::new().with_case_insensitive(ignore_case);
            if let Some(name) = name {
                spec = spec.with_name(name);
            }
            if let Some(size) = size {
                spec = spec.with_size(size);
            }
            if let Some(mtime) = mtime {
                spec = spec.with_mtime(mtime);
            }

            let mut options = ListOptions::new().recursive(recursive).filter(spec);
            if let Some(max) = max_files {
                options = options.max_files(max);
            }
            ls_cmd(&client, &uri, options, json).await?
        }

        Command::Get { uri, output } => get_cmd(&client, &uri, output).await?,
    }

    Ok(())
}

async fn buckets_cmd(client: &StorageClient, uri: &str) -> Result<()> {
    let buckets = client
        .list_buckets(uri)
        .await
        .with_context(|| format!("listing buckets for {}", uri))?;

    for bucket in &buckets {
        match bucket.creation_time {
            Some(created) => safe_println!("{}\t{}", bucket.name, created.to_rfc3339()),
            None => safe_println!("{}", bucket.name),
        }
    }
    info!(count = buckets.len(), "buckets listed");
    Ok(())
}

async fn ls_cmd(client: &StorageClient, uri: &str, options: ListOptions, json: bool) -> Result<()> {
    // Ctrl-C stops the walk before its next backend request
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping listing");
            on_signal.cancel();
        }
    });

    let mut stream = client.list_stream(uri, options.cancel(cancel))?;
    let mut count = 0u64;
    while let Some(item) = stream.next().await {
        let item = item.with_context(|| format!("listing {} after {} entries", uri, count))?;
        if json {
            safe_println!("{}", serde_json::to_string(&item)?);
        } else {
            safe_println!("{}", format_item(&item));
        }
        count += 1;
    }

    if !json {
        safe_println!("\nTotal entries: {}", count);
    }
    Ok(())
}

fn format_item(item: &ListItem) -> String {
    match item {
        ListItem::Bucket(bucket) => bucket.name.clone(),
        ListItem::Object(entry) if entry.is_common_prefix() => format!("{:>12}  {:<25}  {}", "PRE", "", entry.key),
        ListItem::Object(entry) => {
            let mtime = entry
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            format!("{:>12}  {:<25}  {}", entry.size, mtime, entry.key)
        }
    }
}

async fn get_cmd(client: &StorageClient, uri: &str, output: Option<PathBuf>) -> Result<()> {
    let data = client
        .get_object(uri)
        .await
        .with_context(|| format!("fetching {}", uri))?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(uri, bytes = data.len(), path = %path.display(), "object saved");
        }
        None => {
            let mut out = io::stdout().lock();
            match out.write_all(&data) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
                other => other?,
            }
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketwalk::ObjectEntry;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ls_flags_parse() {
        let cli = Cli::try_parse_from([
            "bucketwalk", "-vv", "ls", "s3://b/p/", "-r", "-n", "5", "--name", "*.csv", "-i",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Command::Ls {
                uri,
                recursive,
                max_files,
                name,
                ignore_case,
                json,
                ..
            } => {
                assert_eq!(uri, "s3://b/p/");
                assert!(recursive && ignore_case && !json);
                assert_eq!(max_files, Some(5));
                assert_eq!(name.as_deref(), Some("*.csv"));
            }
            _ => panic!("expected ls"),
        }
    }

    #[test]
    fn test_format_prefix_and_object() {
        let prefix = ListItem::Object(ObjectEntry::common_prefix("logs/"));
        assert!(format_item(&prefix).ends_with("  logs/"));
        assert!(format_item(&prefix).contains("PRE"));

        let object = ListItem::Object(ObjectEntry::object("a.txt", 42, chrono::Utc::now()));
        let line = format_item(&object);
        assert!(line.trim_start().starts_with("42"));
        assert!(line.ends_with("a.txt"));
    }
}
