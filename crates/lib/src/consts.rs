//! Crate-wide constants.

/// Environment variable overriding the worker count for realization and fingerprinting.
pub const ENV_PARALLELISM: &str = "KILN_PARALLELISM";

/// Environment variable holding the build-wide abort deadline, in seconds.
pub const ENV_UNIT_TIMEOUT_SECS: &str = "KILN_UNIT_TIMEOUT_SECS";

/// Environment variable enabling informational logging of fingerprint fallbacks.
pub const ENV_VERBOSE_FALLBACK: &str = "KILN_VERBOSE_FALLBACK";

/// Domain tag mixed into every overall fingerprint.
pub const FINGERPRINT_VERSION_TAG: &str = "kiln-fingerprint-v1";

/// Byte combined in place of an absent optional hash component.
pub const ABSENT_SENTINEL: u8 = 0xff;

/// Byte combined ahead of a present optional hash component.
pub const PRESENT_MARKER: u8 = 0x01;

/// Delimiter used when parsing a model path from a string.
pub const PATH_DELIMITER: char = '.';
