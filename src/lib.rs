//! This crate exposes the internal functionality of the webscan HTTP prober.
//!
//! webscan sends a single GET request to every `address:port` entry of a
//! list, optionally once per virtual host, and appends everything it
//! observed (headers, body, or the error that stopped it) to a JSON-lines
//! file. It is meant for surveying which addresses answer for which names
//! behind shared IPs.
//!
//! ## Architecture Overview
//!
//! The scanning behaviour is managed by
//! [`Scanner`](crate::scanner::Scanner), which consumes a
//! [`TargetIterator`](crate::target::TargetIterator):
//!
//! 1. **Target expansion**: entries and hosts are expanded lazily into targets
//! 2. **Dispatch**: one task hands targets over a capacity-one channel
//! 3. **Probing**: a pool of workers runs one GET per target, with TLS
//!    verification off and a timeout covering the whole exchange
//! 4. **Recording**: every outcome is appended and synced to the result file
//!    under a single lock
//! 5. **Archival**: optionally, the result file is zipped
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use webscan::scanner::{HttpProber, Reporter, ResultSink, Scanner};
//! use webscan::target::TargetIterator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let entries = vec!["203.0.113.1:443".to_owned()];
//!     let hosts = vec!["example.com".to_owned()];
//!     let targets = TargetIterator::new(entries, hosts, true);
//!
//!     let prober = HttpProber::new(Duration::from_secs(10))?;
//!     let sink = ResultSink::open(Path::new("result.json")).await?;
//!     let reporter = Reporter::new(targets.total() as u64, true, false);
//!
//!     let summary = Scanner::new(targets, 4, prober, sink, reporter, false)
//!         .run()
//!         .await;
//!     println!("{} records written", summary.recorded);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Nothing that happens to a single target stops the scan. Unsupported
//! ports, DNS, connection, TLS and timeout failures end up in the record's
//! `error` field. Only setup problems (unreadable lists, an output file that
//! cannot be opened) are fatal.
#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]

pub mod tui;

pub mod input;

pub mod target;

pub mod scanner;

pub mod archive;
