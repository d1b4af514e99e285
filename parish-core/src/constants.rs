/// Store collection holding event documents
pub const DEFAULT_COLLECTION: &str = "events";

/// Number of calendar months ahead to keep recurring instances materialized
pub const DEFAULT_HORIZON_MONTHS: u32 = 6;

/// Longest sync horizon accepted from configuration, about ten years
pub const MAX_HORIZON_MONTHS: u32 = 120;
pub const MAX_HORIZON_DAYS: u32 = 3660;

/// Where the file store keeps its documents
pub const DEFAULT_DATA_DIR: &str = "~/.local/share/parish";

/// Prefix for configuration environment variables (e.g. PARISH_TIMEZONE)
pub const ENV_PREFIX: &str = "PARISH";
