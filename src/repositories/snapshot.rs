use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;

use crate::models::ledger::Ledger;

/// Persistence seam of the ledger store. The whole state is one
/// serialized document; there is no partial write.
pub trait SnapshotBackend: Send {
    fn load(&self) -> Result<Option<Ledger>, anyhow::Error>;
    fn save(&self, ledger: &Ledger) -> Result<(), anyhow::Error>;
}

/// JSON snapshot in a single file, written atomically via a temp file
/// and rename.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend { path: path.into() }
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> Result<Option<Ledger>, anyhow::Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("could not read snapshot {}", self.path.display()))?;
        let ledger = serde_json::from_str(&data)
            .with_context(|| format!("could not parse snapshot {}", self.path.display()))?;
        Ok(Some(ledger))
    }

    fn save(&self, ledger: &Ledger) -> Result<(), anyhow::Error> {
        let data = serde_json::to_string(ledger)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .with_context(|| format!("could not write snapshot {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("could not replace snapshot {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory backend for tests. Clones share the same slot so a test can
/// keep a handle and inspect what the repository persisted.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().expect("snapshot slot poisoned").is_none()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Ledger>, anyhow::Error> {
        let slot = self.slot.lock().expect("snapshot slot poisoned");
        match slot.as_deref() {
            Some(data) => Ok(Some(serde_json::from_str(data)?)),
            None => Ok(None),
        }
    }

    fn save(&self, ledger: &Ledger) -> Result<(), anyhow::Error> {
        let data = serde_json::to_string(ledger)?;
        *self.slot.lock().expect("snapshot slot poisoned") = Some(data);
        Ok(())
    }
}
