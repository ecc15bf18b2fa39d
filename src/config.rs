//! Configuration for reading, writing and running engine operations.
//!
//! All option structs are plain values with `Default` impls and
//! `with_*` builder methods.
//!
//! # Example
//!
//! ```
//! use minitools_pdf::config::{EngineConfig, ReaderOptions, WriterOptions};
//!
//! let config = EngineConfig::default()
//!     .with_reader(ReaderOptions::default().with_max_nesting(64))
//!     .with_writer(WriterOptions::default().with_compress_streams(false));
//! assert_eq!(config.reader.max_nesting, 64);
//! assert!(!config.writer.compress_streams);
//! ```

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Options controlling the binary reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Maximum array/dictionary nesting depth
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: usize,

    /// Maximum number of xref sections followed through `/Prev`
    pub max_xref_chain: usize,

    /// Maximum decompressed size of a single stream in bytes (0 = unlimited)
    ///
    /// Protects against decompression bombs in object and xref streams.
    pub max_decompressed_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_nesting: 100,
            max_xref_chain: 100,
            max_decompressed_size: 256 * 1024 * 1024, // 256 MiB
        }
    }
}

impl ReaderOptions {
    /// Set the nesting limit.
    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Set the `/Prev` chain limit.
    pub fn with_max_xref_chain(mut self, sections: usize) -> Self {
        self.max_xref_chain = sections;
        self
    }

    /// Set the decompression limit.
    pub fn with_max_decompressed_size(mut self, bytes: usize) -> Self {
        self.max_decompressed_size = bytes;
        self
    }
}

/// Options controlling the binary writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Flate-compress streams that carry no filter yet
    pub compress_streams: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compress_streams: true,
        }
    }
}

impl WriterOptions {
    /// Enable or disable stream compression.
    pub fn with_compress_streams(mut self, compress: bool) -> Self {
        self.compress_streams = compress;
        self
    }
}

/// Cooperative cancellation flag shared between a caller and a running operation.
///
/// Operations poll it between page-level steps; a cancelled call fails with
/// [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            log::debug!("Operation cancelled");
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Reader options
    pub reader: ReaderOptions,
    /// Writer options
    pub writer: WriterOptions,
    /// Cancellation flag polled by long-running operations
    pub cancel: CancellationToken,
}

impl EngineConfig {
    /// Replace reader options.
    pub fn with_reader(mut self, reader: ReaderOptions) -> Self {
        self.reader = reader;
        self
    }

    /// Replace writer options.
    pub fn with_writer(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_defaults() {
        let opts = ReaderOptions::default();
        assert_eq!(opts.max_nesting, 100);
        assert_eq!(opts.max_xref_chain, 100);
        assert_eq!(opts.max_decompressed_size, 256 * 1024 * 1024);
    }

    #[test]
    fn test_writer_defaults() {
        assert!(WriterOptions::default().compress_streams);
    }

    #[test]
    fn test_cancellation_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_engine_config_builder() {
        let cancel = CancellationToken::new();
        let config = EngineConfig::default()
            .with_reader(ReaderOptions::default().with_max_xref_chain(5))
            .with_cancellation(cancel.clone());
        assert_eq!(config.reader.max_xref_chain, 5);
        cancel.cancel();
        assert!(config.cancel.is_cancelled());
    }
}
