//! Module and resolution caches
//!
//! One [`ModuleCaches`] is meant to live for the whole process and be handed
//! to every manager. Read-check-then-insert sequences run under the shared
//! re-entrant build lock so that a module name is built once and never
//! observed half built.

use super::resolver::FileLocation;
use crate::error::ResolutionError;
use crate::tree::Module;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Process-wide caches shared by every [`AstManager`](super::AstManager)
#[derive(Debug, Default)]
pub struct ModuleCaches {
    pub modules: ModuleCache,
    pub resolutions: ResolutionCache,
    build_lock: ReentrantMutex<()>,
}

impl ModuleCaches {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serialize builds; the owning thread may re-enter
    pub fn lock_builds(&self) -> ReentrantMutexGuard<'_, ()> {
        self.build_lock.lock()
    }

    pub fn clear(&self) {
        self.modules.clear();
        self.resolutions.clear();
    }
}

#[derive(Debug)]
struct CachedModule {
    module: Arc<Module>,
    path: Option<PathBuf>,
}

/// Built modules by name, remembering the path each was built from
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: Mutex<HashMap<String, CachedModule>>,
}

impl ModuleCache {
    /// Cached module for `name`, a miss when it was built from another path
    pub fn get(&self, name: &str, path: Option<&Path>) -> Option<Arc<Module>> {
        let entries = self.entries.lock();
        let entry = entries.get(name)?;
        if entry.path.as_deref() != path {
            debug!(
                "Cache entry for {} was built from {:?}, requested {:?}",
                name, entry.path, path
            );
            return None;
        }
        Some(Arc::clone(&entry.module))
    }

    /// Cached module for `name` whatever path it came from
    pub fn get_any(&self, name: &str) -> Option<Arc<Module>> {
        self.entries.lock().get(name).map(|entry| Arc::clone(&entry.module))
    }

    pub fn insert(&self, module: Arc<Module>) {
        let path = module.file().map(Path::to_path_buf);
        self.entries
            .lock()
            .insert(module.name().to_string(), CachedModule { module, path });
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
        self.entries.lock().remove(name).map(|entry| entry.module)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

type ResolutionKey = (String, Option<PathBuf>);

/// Outcomes of mapping `(module name, importing file)` to a file.
///
/// Failures are recorded too and replayed without retrying.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<ResolutionKey, Result<FileLocation, ResolutionError>>>,
}

impl ResolutionCache {
    pub fn get_or_resolve<F>(&self, name: &str, context_file: Option<&Path>, resolve: F) -> Result<FileLocation, ResolutionError>
    where
        F: FnOnce() -> Result<FileLocation, ResolutionError>,
    {
        let key = (name.to_string(), context_file.map(Path::to_path_buf));
        if let Some(outcome) = self.entries.lock().get(&key) {
            debug!("Resolution cache hit for {}", name);
            return outcome.clone();
        }
        let outcome = resolve();
        self.entries.lock().entry(key).or_insert(outcome).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
