//! Parallel file uploads over the tus concatenation extension.
//!
//! A file is split into chunks, every chunk is uploaded as its own partial
//! upload, and a final request asks the server to stitch the partial uploads
//! together in file order.
//!
//! ```no_run
//! use std::fs::File;
//! use tusc::{TusClient, UploadOptions};
//! use url::Url;
//!
//! # async fn example() -> tusc::Result<()> {
//! let client = TusClient::new(UploadOptions::default())?;
//! let target = Url::parse("https://tus.example.com/files/").unwrap();
//! let location = client.upload(File::open("dataset.jsonl")?, &target).await?;
//! println!("uploaded to {location}");
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod client;
pub mod error;
pub mod headers;
pub mod serde_utils;
pub mod summary;

pub use chunk::{ChunkReader, DEFAULT_CHUNK_SIZE, chunk_reader};
pub use client::{TusClient, UploadOptions};
pub use error::{Error, Result};
pub use summary::{PartOutcome, TransferResult, UploadReport, UploadSummary};
