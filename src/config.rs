//! Parser configuration
//!
//! Defaults follow the values the engine has always used: 8 KiB file reads,
//! entity decoding on, whitespace-only character data discarded.

use crate::error::ConfigError;

/// Bytes read from a file per `feed` call.
pub const DEFAULT_READ_BUFFER: usize = 8192;

/// Number of distinct document paths whose registration lookup is memoized.
///
/// Documents usually repeat a small set of paths (`/feed/entry/title` over and
/// over), so a few hundred entries cover the hot set.
pub const DEFAULT_MATCH_CACHE_CAPACITY: usize = 256;

/// Runtime options for a [`Parser`](crate::Parser)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Chunk size used by `feed_file`
    pub read_buffer: usize,
    /// Decode predefined and numeric entities in text and attribute values
    pub decode_entities: bool,
    /// Drop character data that is only whitespace
    pub skip_whitespace: bool,
    /// LRU capacity for path lookups, 0 disables the cache
    pub match_cache_capacity: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            read_buffer: DEFAULT_READ_BUFFER,
            decode_entities: true,
            skip_whitespace: true,
            match_cache_capacity: DEFAULT_MATCH_CACHE_CAPACITY,
        }
    }
}

impl ParserConfig {
    /// Bytes read per chunk in [`crate::Parser::feed_file`]
    pub fn with_read_buffer(mut self, read_buffer: usize) -> Self {
        self.read_buffer = read_buffer;
        self
    }

    /// Decode entity references in text and attributes
    pub fn with_decode_entities(mut self, decode: bool) -> Self {
        self.decode_entities = decode;
        self
    }

    /// Drop whitespace-only text chunks
    pub fn with_skip_whitespace(mut self, skip: bool) -> Self {
        self.skip_whitespace = skip;
        self
    }

    /// Capacity of the path match cache
    pub fn with_match_cache_capacity(mut self, capacity: usize) -> Self {
        self.match_cache_capacity = capacity;
        self
    }

    /// Reject settings the parser cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer < 1 {
            return Err(ConfigError::InvalidReadBuffer(self.read_buffer));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.read_buffer, 8192);
        assert!(config.decode_entities);
        assert!(config.skip_whitespace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_read_buffer_rejected() {
        let config = ParserConfig::default().with_read_buffer(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidReadBuffer(0)));
    }

    #[test]
    fn test_builder_setters() {
        let config = ParserConfig::default()
            .with_read_buffer(16)
            .with_decode_entities(false)
            .with_skip_whitespace(false)
            .with_match_cache_capacity(0);
        assert_eq!(config.read_buffer, 16);
        assert!(!config.decode_entities);
        assert!(!config.skip_whitespace);
        assert_eq!(config.match_cache_capacity, 0);
    }
}
