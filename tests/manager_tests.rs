use pysense_core::error::ResolutionError;
use pysense_core::manager::{FileLocation, FsResolver, ModuleResolver};
use pysense_core::{AstManager, ImportError, ManagerConfig, ModuleCaches, NodeRef};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Delegates to the filesystem resolver and counts lookups
struct CountingResolver {
    inner: FsResolver,
    calls: Arc<AtomicUsize>,
}

impl ModuleResolver for CountingResolver {
    fn find(&self, name: &str, context_file: Option<&Path>) -> Result<FileLocation, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find(name, context_file)
    }
}

fn counting_manager(search_paths: Vec<PathBuf>) -> (Arc<AstManager>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = CountingResolver {
        inner: FsResolver::new(search_paths),
        calls: Arc::clone(&calls),
    };
    let mgr = AstManager::builder(ManagerConfig::default())
        .resolver(Box::new(resolver))
        .build();
    (mgr, calls)
}

#[test]
fn test_cache_is_path_sensitive() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a/m.py");
    let b = dir.path().join("b/m.py");
    fs::create_dir_all(a.parent().unwrap()).unwrap();
    fs::create_dir_all(b.parent().unwrap()).unwrap();
    fs::write(&a, "FROM_A = 1\n").unwrap();
    fs::write(&b, "FROM_B = 1\n").unwrap();

    let mgr = AstManager::new(ManagerConfig::default());
    let first = mgr.get_or_build("m", &a).unwrap();
    let again = mgr.get_or_build("m", &a).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let second = mgr.get_or_build("m", &b).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.file(), Some(b.as_path()));
    assert!(NodeRef::root(&second).has_local("FROM_B"));
    assert!(!NodeRef::root(&second).has_local("FROM_A"));
}

#[test]
fn test_failed_resolution_is_replayed_without_retry() {
    let dir = TempDir::new().unwrap();
    let (mgr, calls) = counting_manager(vec![dir.path().to_path_buf()]);

    let first = mgr.module_from_name("missing_module").unwrap_err();
    // the file appearing later does not matter: the failure is recorded
    fs::write(dir.path().join("missing_module.py"), "x = 1\n").unwrap();
    let second = mgr.module_from_name("missing_module").unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match (first, second) {
        (ImportError::Resolution(a), ImportError::Resolution(b)) => assert_eq!(a, b),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_resolution_keyed_by_importing_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("one")).unwrap();
    fs::create_dir_all(dir.path().join("two")).unwrap();
    fs::write(dir.path().join("one/dep.py"), "ONE = 1\n").unwrap();
    fs::write(dir.path().join("two/dep.py"), "TWO = 2\n").unwrap();
    let (mgr, calls) = counting_manager(Vec::new());

    let one = mgr.import_module("dep", Some(&dir.path().join("one/main.py"))).unwrap();
    let two = mgr.import_module("dep", Some(&dir.path().join("two/main.py"))).unwrap();
    assert!(NodeRef::root(&one).has_local("ONE"));
    assert!(NodeRef::root(&two).has_local("TWO"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    mgr.import_module("dep", Some(&dir.path().join("one/main.py"))).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_managers_share_caches() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shared.py"), "S = 1\n").unwrap();
    let caches = ModuleCaches::new();
    let config = ManagerConfig::default().with_search_path(dir.path());
    let first = AstManager::builder(config.clone()).caches(Arc::clone(&caches)).build();
    let second = AstManager::builder(config).caches(Arc::clone(&caches)).build();

    let a = first.module_from_name("shared").unwrap();
    let b = second.module_from_name("shared").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(caches.modules.contains("shared"));
}

#[test]
fn test_concurrent_imports_build_once() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("busy.py"), "def work():\n    return 1\n").unwrap();
    let mgr = AstManager::new(ManagerConfig::default().with_search_path(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || mgr.module_from_name("busy").unwrap())
        })
        .collect();
    let modules: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for module in &modules[1..] {
        assert!(Arc::ptr_eq(&modules[0], module));
    }
}

#[test]
fn test_clear_cache_forces_rebuild() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fresh.py"), "V = 1\n").unwrap();
    let mgr = AstManager::new(ManagerConfig::default().with_search_path(dir.path()));

    let before = mgr.module_from_name("fresh").unwrap();
    mgr.clear_cache();
    assert!(mgr.caches().modules.is_empty());
    assert!(mgr.caches().resolutions.is_empty());
    let after = mgr.module_from_name("fresh").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn test_builtins_built_once_and_cached() {
    let mgr = AstManager::new(ManagerConfig::default());
    let first = mgr.builtins_module().unwrap();
    let second = mgr.module_from_name("builtins").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.file().is_none());
    assert!(NodeRef::root(&first).has_local("object"));
}

#[test]
fn test_config_budget_reaches_contexts() {
    let config = ManagerConfig {
        max_inferred: 7,
        ..ManagerConfig::default()
    };
    let mgr = AstManager::new(config);
    assert_eq!(mgr.new_context().max_inferred(), 7);
}
