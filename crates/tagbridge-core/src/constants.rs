//! Constants shared across the tag pipeline.
//!
//! Values here bound buffers and configuration fields. Crates that need a
//! limit import it from this module rather than redeclaring it.

// ============================================================================
// Card identity
// ============================================================================

/// Maximum UID length in bytes held by the debounce buffer.
///
/// ISO 14443-A cards report 4 (single size) or 7 (double size) byte UIDs.
pub const MAX_UID_BYTES: usize = 8;

/// Minimum UID length in bytes.
pub const MIN_UID_BYTES: usize = 1;

// ============================================================================
// Poll configuration
// ============================================================================

/// Configuration key for the poll interval.
pub const TAG_READ_INTERVAL_KEY: &str = "tagReadIntervalMs";

/// Default delay between polling ticks in milliseconds.
pub const DEFAULT_TAG_READ_INTERVAL_MS: u64 = 200;

/// Smallest accepted poll interval in milliseconds.
pub const MIN_TAG_READ_INTERVAL_MS: u64 = 0;

/// Largest accepted poll interval in milliseconds.
pub const MAX_TAG_READ_INTERVAL_MS: u64 = 60_000;

/// Default upper bound on a single presence poll in milliseconds.
///
/// Kept in single-digit milliseconds so the run loop stays responsive to
/// config pushes between ticks.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5;

/// JSON schema dialect advertised with the config schema.
pub const JSON_SCHEMA_VERSION: &str = "http://json-schema.org/draft-07/schema#";
