//! Dream worker — background consolidation (spec §4.10, C9).
//!
//! Runs as a detached process that waits for a cross-process advisory
//! lock (so it only acts while the foreground process is idle), then
//! performs deduplication flagging and orphan rescue against the same
//! storage the foreground process uses. Safety checks are warning-only:
//! this worker never refuses to run, it just logs when conditions look
//! risky.

use crate::config::Config;
use crate::error::Result;
use crate::model::RelationType;
use crate::service::MemoryService;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

/// Outcome of a single dream run, returned for the CLI to report.
#[derive(Debug, Default, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamReport {
    pub lock_acquired: bool,
    pub duplicates_flagged: usize,
    pub orphans_rescued: usize,
    pub elapsed_ms: u128,
}

/// Minimum similarity for two memories to be flagged as potential
/// duplicates (spec §4.10).
const DUPLICATE_THRESHOLD: f64 = 0.95;
/// Minimum similarity for an orphan rescue link (spec §4.10).
const ORPHAN_RESCUE_THRESHOLD: f64 = 0.5;

pub struct DreamWorker<'a> {
    config: &'a Config,
    lock_timeout: Duration,
    max_runtime: Duration,
}

impl<'a> DreamWorker<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            lock_timeout: Duration::from_secs(config.dream_lock_timeout_secs),
            max_runtime: Duration::from_secs(config.dream_max_runtime_secs),
            config,
        }
    }

    pub fn with_timeouts(mut self, lock_timeout: Duration, max_runtime: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self.max_runtime = max_runtime;
        self
    }

    /// Run one consolidation pass. Warns (never fails) if the database
    /// looks like it's in active use, then attempts to acquire the dream
    /// lock within `lock_timeout`; on timeout this returns successfully
    /// with `lock_acquired: false` so the caller treats "busy" as routine.
    pub fn run(&self, service: &MemoryService) -> Result<DreamReport> {
        let start = Instant::now();
        tracing::info!(data_dir = ?self.config.data_dir, "dream worker starting");

        if is_port_listening(8765) {
            tracing::warn!(
                "a server process may be running on port 8765; database access conflicts are possible"
            );
        }

        if storage_lock_present(&self.config.db_path()) {
            tracing::warn!(
                "the database's own WAL lock sidecar is present; a foreground writer may be active"
            );
        }

        std::fs::create_dir_all(&self.config.data_dir)?;
        let lock_path = self.config.dream_lock_path();
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        let mut rw_lock = fd_lock::RwLock::new(lock_file);

        let guard = match acquire_with_timeout(&mut rw_lock, self.lock_timeout) {
            Some(guard) => guard,
            None => {
                tracing::info!("could not acquire dream lock (database in use); will retry next time");
                return Ok(DreamReport {
                    lock_acquired: false,
                    ..Default::default()
                });
            }
        };

        tracing::info!("dream lock acquired, starting consolidation");
        let duplicates_flagged = task_deduplication(service, self.max_runtime, start)?;
        let orphans_rescued = task_orphan_rescue(service, self.max_runtime, start)?;
        drop(guard);

        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(elapsed_ms, "consolidation complete");

        Ok(DreamReport {
            lock_acquired: true,
            duplicates_flagged,
            orphans_rescued,
            elapsed_ms,
        })
    }
}

fn acquire_with_timeout<'f>(
    lock: &'f mut fd_lock::RwLock<std::fs::File>,
    timeout: Duration,
) -> Option<fd_lock::RwLockWriteGuard<'f, std::fs::File>> {
    let start = Instant::now();
    loop {
        match lock.try_write() {
            Ok(guard) => return Some(guard),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() >= timeout {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                tracing::warn!("dream lock acquisition error: {e}");
                return None;
            }
        }
    }
}

/// Flag highly similar memory pairs with a `related` link carrying a
/// human-review reason, rather than asserting `supersedes` automatically
/// (spec §4.10 safety note — never silently restructure the graph).
fn task_deduplication(service: &MemoryService, max_runtime: Duration, start: Instant) -> Result<usize> {
    tracing::info!("task 1: checking for duplicates");
    let repo = service.repository();
    let (memories, total, _) = repo.list_memories(1000, 0, None, None, None)?;
    tracing::info!(total, "memories scanned for duplicates");

    let mut processed_pairs: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
    let mut flagged = 0;

    for memory in &memories {
        if start.elapsed() >= max_runtime {
            break;
        }

        let embedding = repo.embed_for_consolidation(&memory.content)?;
        let similar = repo.search_similar_by_embedding(&embedding, 5, Some(&memory.id))?;

        for (other_id, _, similarity, _, _) in similar {
            if similarity < DUPLICATE_THRESHOLD {
                continue;
            }

            let pair = ordered_pair(&memory.id, &other_id);
            if !processed_pairs.insert(pair) {
                continue;
            }

            let Some(other) = repo.get_by_id(&other_id)? else {
                continue;
            };

            let (newer_id, older_id) = if memory.created_at > other.created_at {
                (memory.id.as_str(), other.id.as_str())
            } else {
                (other.id.as_str(), memory.id.as_str())
            };

            // The link always runs newer -> older, so the reason's direction
            // label is constant regardless of which side `memory` was.
            let reason = format!(
                "⚠️ POTENTIAL_DUPLICATE (similarity: {:.0}%, newer→older). \
                 Review and consider using 'supersedes' if this is truly a duplicate.",
                similarity * 100.0
            );

            match service.link_memories(newer_id, older_id, RelationType::Related, Some(&reason)) {
                Ok(()) => {
                    flagged += 1;
                    tracing::info!(newer_id, older_id, similarity, "flagged potential duplicate");
                }
                Err(e) => tracing::debug!("could not link duplicates: {e}"),
            }
        }
    }

    tracing::info!(flagged, "deduplication complete");
    Ok(flagged)
}

/// Find memories with neither tags nor links and suggest a weak `related`
/// link to their most similar non-orphan neighbor (spec §4.10). Only the
/// single best match is linked per orphan.
fn task_orphan_rescue(service: &MemoryService, max_runtime: Duration, start: Instant) -> Result<usize> {
    tracing::info!("task 2: rescuing orphan memories");
    let repo = service.repository();
    let orphans = repo.get_orphan_memories(1000)?;
    tracing::info!(count = orphans.len(), "orphan memories found");

    let mut rescued = 0;

    for (orphan_id, _summary) in orphans {
        if start.elapsed() >= max_runtime {
            break;
        }

        // get_orphan_memories only checks for an absence of tags (spec
        // §4.4.11); §4.10's orphan-rescue candidate is stricter ("no tags
        // and no links"), so skip anything that already has an edge.
        if !repo.get_links(&orphan_id)?.is_empty() || !repo.get_incoming_links(&orphan_id, None)?.is_empty() {
            continue;
        }

        let Some(memory) = repo.get_by_id(&orphan_id)? else {
            continue;
        };

        let embedding = repo.embed_for_consolidation(&memory.content)?;
        let similar = repo.search_similar_by_embedding(&embedding, 3, Some(&orphan_id))?;

        for (other_id, _, similarity, _, _) in similar {
            if similarity < ORPHAN_RESCUE_THRESHOLD {
                continue;
            }

            let reason = format!("Auto-rescued orphan (similarity: {:.0}%)", similarity * 100.0);
            match service.link_memories(&orphan_id, &other_id, RelationType::Related, Some(&reason)) {
                Ok(()) => {
                    rescued += 1;
                    tracing::info!(orphan_id, other_id, "rescued orphan");
                    break;
                }
                Err(e) => tracing::debug!("could not rescue orphan: {e}"),
            }
        }
    }

    tracing::info!(rescued, "orphan rescue complete");
    Ok(rescued)
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Hint-only TCP listener probe (spec §4.10 safety check 1). A false
/// negative/positive here never blocks the worker — it only decides
/// whether to emit a warning.
fn is_port_listening(port: u16) -> bool {
    std::net::TcpStream::connect_timeout(
        &std::net::SocketAddr::from(([127, 0, 0, 1], port)),
        Duration::from_secs(1),
    )
    .is_ok()
}

/// Hint-only check for the graph store's own internal lock sidecar (spec
/// §4.10 safety check 2). SQLite in WAL mode leaves a `-wal`/`-shm` pair
/// behind while a connection is open; their presence just means "someone
/// else may have the database open", not a hard conflict — the actual
/// serialization is still `storage::Manager`'s writer-connection retry.
fn storage_lock_present(db_path: &std::path::Path) -> bool {
    let wal = std::path::PathBuf::from(format!("{}-wal", db_path.display()));
    let shm = std::path::PathBuf::from(format!("{}-shm", db_path.display()));
    wal.exists() || shm.exists()
}

/// Spawn the dream worker as a detached background process (spec §4.10
/// "Detached spawn"). Returns immediately without waiting for the child.
pub fn spawn_detached(exe: &std::path::Path, data_dir: &std::path::Path, log_path: Option<&std::path::Path>) -> std::io::Result<bool> {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new(exe);
    cmd.arg("dream").arg("--data-dir").arg(data_dir);

    if let Some(log_path) = log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
        cmd.stdout(log_file.try_clone()?);
        cmd.stderr(log_file);
    } else {
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
    }
    cmd.stdin(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    match cmd.spawn() {
        Ok(_child) => {
            tracing::info!("dream worker spawned");
            Ok(true)
        }
        Err(e) => {
            tracing::error!("failed to spawn dream worker: {e}");
            Err(e)
        }
    }
}

/// True if a dream worker currently holds the lock at `lock_path`.
pub fn is_dreamer_running(lock_path: &std::path::Path) -> bool {
    if !lock_path.exists() {
        return false;
    }
    let Ok(file) = std::fs::OpenOptions::new().write(true).open(lock_path) else {
        return false;
    };
    let mut rw_lock = fd_lock::RwLock::new(file);
    match rw_lock.try_write() {
        Ok(_guard) => false,
        Err(e) if e.kind() == ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_is_stable_regardless_of_argument_order() {
        assert_eq!(ordered_pair("b", "a"), ordered_pair("a", "b"));
    }

    #[test]
    fn unreachable_port_is_reported_as_not_listening() {
        assert!(!is_port_listening(59999));
    }
}
