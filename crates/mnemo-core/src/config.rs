//! Engine-wide configuration (spec §4.11).
//!
//! Defaults mirror the thresholds used throughout `analysis`; every field
//! can be overridden with an `MNEMO_*` environment variable via
//! [`Config::from_env`].

use directories::ProjectDirs;
use std::path::PathBuf;

/// Tunable engine configuration.
///
/// Constructed once by the caller (CLI `main` or an embedding
/// application) and passed down explicitly — there is no global
/// `get_config()` singleton.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database file and vector index sidecar.
    pub data_dir: PathBuf,
    /// Database file name within `data_dir`.
    pub db_name: String,

    /// Similarity above which `store_memory` suggests a link (§4.5).
    pub link_suggestion_threshold: f64,
    /// Similarity above which two memories are flagged as duplicates (§4.5, §4.6).
    pub duplicate_detection_threshold: f64,
    /// Similarity above which opposite-outcome memories are flagged as
    /// contradictions (§4.5).
    pub contradiction_check_threshold: f64,

    /// Hard cap on stored tags per memory (§3 invariant 3).
    pub max_tags_per_memory: usize,
    /// A memory untouched for this many days is considered stale by the
    /// health analyzer (§4.6).
    pub stale_memory_days: i64,
    /// Target length, in characters, for generated summaries (§4.1).
    pub max_summary_length: usize,

    /// How long the dream worker waits to acquire its advisory lock
    /// before giving up for this run (§4.11).
    pub dream_lock_timeout_secs: u64,
    /// Hard ceiling on a single dream run's wall-clock time (§4.11).
    pub dream_max_runtime_secs: u64,
    /// Initial delay before the first write-lock retry, doubling by ×1.5
    /// on each subsequent attempt (spec §4.2 write acquisition protocol).
    pub write_retry_delay_ms: u64,
    /// Maximum write-lock acquisition attempts before raising `LockTimeout`
    /// (spec §4.2, §6.3).
    pub write_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_name: "mnemo.db".to_string(),
            link_suggestion_threshold: 0.65,
            duplicate_detection_threshold: 0.90,
            contradiction_check_threshold: 0.70,
            max_tags_per_memory: 20,
            stale_memory_days: 90,
            max_summary_length: 200,
            dream_lock_timeout_secs: 5,
            dream_max_runtime_secs: 300,
            write_retry_delay_ms: 500,
            write_max_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("MNEMO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            data_dir,
            db_name: env_or("MNEMO_DB_NAME", defaults.db_name),
            link_suggestion_threshold: env_parsed_or(
                "MNEMO_LINK_THRESHOLD",
                defaults.link_suggestion_threshold,
            ),
            duplicate_detection_threshold: env_parsed_or(
                "MNEMO_DUPLICATE_THRESHOLD",
                defaults.duplicate_detection_threshold,
            ),
            contradiction_check_threshold: env_parsed_or(
                "MNEMO_CONTRADICTION_THRESHOLD",
                defaults.contradiction_check_threshold,
            ),
            max_tags_per_memory: env_parsed_or("MNEMO_MAX_TAGS", defaults.max_tags_per_memory),
            stale_memory_days: env_parsed_or("MNEMO_STALE_DAYS", defaults.stale_memory_days),
            max_summary_length: env_parsed_or(
                "MNEMO_MAX_SUMMARY_LENGTH",
                defaults.max_summary_length,
            ),
            dream_lock_timeout_secs: env_parsed_or(
                "MNEMO_DREAM_LOCK_TIMEOUT_SECS",
                defaults.dream_lock_timeout_secs,
            ),
            dream_max_runtime_secs: env_parsed_or(
                "MNEMO_DREAM_MAX_RUNTIME_SECS",
                defaults.dream_max_runtime_secs,
            ),
            write_retry_delay_ms: env_parsed_or(
                "MNEMO_WRITE_RETRY_DELAY_MS",
                defaults.write_retry_delay_ms,
            ),
            write_max_retries: env_parsed_or("MNEMO_WRITE_MAX_RETRIES", defaults.write_max_retries),
        }
    }

    /// Full path to the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }

    /// Full path to the vector index sidecar file.
    pub fn vector_index_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.usearch", self.db_name))
    }

    /// Full path to the dream worker's advisory lock file.
    pub fn dream_lock_path(&self) -> PathBuf {
        self.data_dir.join("dream.lock")
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "mnemo", "mnemo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mnemo"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_thresholds_used_throughout_analysis() {
        let cfg = Config::default();
        assert_eq!(cfg.link_suggestion_threshold, 0.65);
        assert_eq!(cfg.duplicate_detection_threshold, 0.90);
        assert_eq!(cfg.contradiction_check_threshold, 0.70);
        assert_eq!(cfg.max_tags_per_memory, 20);
        assert_eq!(cfg.stale_memory_days, 90);
    }

    #[test]
    fn db_path_joins_data_dir_and_name() {
        let cfg = Config {
            data_dir: PathBuf::from("/tmp/x"),
            db_name: "test.db".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/x/test.db"));
    }
}
