//! Startup storage selection.
//!
//! The database is probed exactly once, before the server starts accepting
//! requests. If SQLite cannot be opened within the probe window the process
//! runs against [`MemoryStore`] for its whole lifetime and reports itself as
//! degraded on `/health`. There is no hot-swap: a storage failure after
//! startup surfaces to the caller of the failing operation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{error, info, warn};

use formline_session::FormIndex;
use formline_store::{FormsRepository, MemoryStore, SqliteStore, UserStore};

/// How long the startup probe may spend opening the database.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Which storage backend was selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStatus {
    /// Backend label, `"sqlite"` or `"memory"`.
    pub backend: &'static str,

    /// True when SQLite was requested but unreachable and the process fell
    /// back to in-memory storage.
    pub degraded: bool,
}

/// The storage binding for the process lifetime.
///
/// Both handles point at the same backend object; they exist separately so
/// the serving path can depend on the narrower trait it needs.
pub struct Backends {
    pub forms: Arc<dyn FormsRepository>,
    pub users: Arc<dyn UserStore>,
    pub status: StorageStatus,
}

impl Backends {
    fn sqlite(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        Self {
            forms: store.clone(),
            users: store,
            status: StorageStatus {
                backend: "sqlite",
                degraded: false,
            },
        }
    }

    fn memory(index: FormIndex, degraded: bool) -> Self {
        let store = Arc::new(MemoryStore::new(index));
        Self {
            forms: store.clone(),
            users: store,
            status: StorageStatus {
                backend: "memory",
                degraded,
            },
        }
    }
}

/// Probe the database and select the storage backend.
///
/// `db_path: None` means the operator asked for in-memory storage; that is
/// not a degraded state. With a path, the open (which also runs migrations)
/// happens on a blocking thread under `timeout`.
pub async fn select_backends(
    db_path: Option<PathBuf>,
    index: FormIndex,
    timeout: Duration,
) -> Backends {
    let Some(path) = db_path else {
        info!("no database path configured, using in-memory storage");
        return Backends::memory(index, false);
    };

    let probe_index = index.clone();
    let probe = task::spawn_blocking(move || SqliteStore::open(&path, probe_index));

    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(Ok(store))) => Backends::sqlite(store),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "database unreachable, falling back to in-memory storage");
            Backends::memory(index, true)
        }
        Ok(Err(e)) => {
            error!(error = %e, "database probe panicked, falling back to in-memory storage");
            Backends::memory(index, true)
        }
        Err(_) => {
            warn!(timeout = ?timeout, "database probe timed out, falling back to in-memory storage");
            Backends::memory(index, true)
        }
    }
}
