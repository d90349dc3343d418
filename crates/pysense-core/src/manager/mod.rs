//! Build coordination
//!
//! [`AstManager`] turns names, files, source text and live modules into
//! finished [`Module`]s: build, cache, run deferred resolution, apply
//! transforms, cache again. It also owns what inference needs at run time
//! (builtins, call tips, the configured budget).

pub mod cache;
pub mod resolver;

pub use cache::{ModuleCache, ModuleCaches, ResolutionCache};
pub use resolver::{FileLocation, FsResolver, ModuleKind, ModuleResolver};

use crate::builder::{
    self, build_members, build_source, BuiltModule, LiveModule, LiveObject, RustPythonAdapter, SourceInfo, SyntaxAdapter,
};
use crate::builtins::{BuiltinsModule, BUILTINS_MODNAME};
use crate::config::ManagerConfig;
use crate::error::{BuildError, ImportError, InferenceError};
use crate::inference::{self, CallTip, CallTipRegistry, InferIter, InferenceContext, Value};
use crate::transforms::{Action, Predicate, TransformId, TransformRegistry};
use crate::tree::{Module, NodeKind, NodeRef};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synthesizes a module for a name that could not be resolved
pub type FailedImportHook = Arc<dyn Fn(&Arc<AstManager>, &str) -> Option<Arc<Module>> + Send + Sync>;

pub struct AstManager {
    config: ManagerConfig,
    caches: Arc<ModuleCaches>,
    resolver: Box<dyn ModuleResolver>,
    adapter: Box<dyn SyntaxAdapter>,
    transforms: RwLock<TransformRegistry>,
    call_tips: RwLock<Arc<CallTipRegistry>>,
    failed_import_hooks: RwLock<Vec<FailedImportHook>>,
}

/// Assembles an [`AstManager`] with non-default collaborators
pub struct ManagerBuilder {
    config: ManagerConfig,
    caches: Option<Arc<ModuleCaches>>,
    resolver: Option<Box<dyn ModuleResolver>>,
    adapter: Option<Box<dyn SyntaxAdapter>>,
}

impl ManagerBuilder {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            caches: None,
            resolver: None,
            adapter: None,
        }
    }

    /// Share caches with other managers
    pub fn caches(mut self, caches: Arc<ModuleCaches>) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn resolver(mut self, resolver: Box<dyn ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn adapter(mut self, adapter: Box<dyn SyntaxAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn build(self) -> Arc<AstManager> {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Box::new(FsResolver::new(self.config.search_paths.clone())));
        Arc::new(AstManager {
            caches: self.caches.unwrap_or_else(ModuleCaches::new),
            resolver,
            adapter: self.adapter.unwrap_or_else(|| Box::new(RustPythonAdapter::new())),
            transforms: RwLock::new(TransformRegistry::new()),
            call_tips: RwLock::new(Arc::new(CallTipRegistry::new())),
            failed_import_hooks: RwLock::new(Vec::new()),
            config: self.config,
        })
    }
}

impl AstManager {
    pub fn new(config: ManagerConfig) -> Arc<Self> {
        ManagerBuilder::new(config).build()
    }

    pub fn builder(config: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder::new(config)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<ModuleCaches> {
        &self.caches
    }

    /// Fresh inference session using the configured budget
    pub fn new_context(&self) -> InferenceContext {
        InferenceContext::with_max_inferred(self.config.max_inferred)
    }

    /// Parse `text` as module `modname`, applying transforms per the config
    pub fn parse_source(self: &Arc<Self>, text: &str, modname: &str, path: Option<&Path>) -> Result<Arc<Module>, BuildError> {
        self.parse_source_with(text, modname, path, self.config.apply_transforms)
    }

    pub fn parse_source_with(
        self: &Arc<Self>,
        text: &str,
        modname: &str,
        path: Option<&Path>,
        apply_transforms: bool,
    ) -> Result<Arc<Module>, BuildError> {
        let info = SourceInfo {
            path: path.map(Path::to_path_buf),
            bytes: Some(text.as_bytes().to_vec()),
            encoding: Some("utf-8".to_string()),
        };
        let _guard = self.caches.lock_builds();
        let built = build_source(self.adapter.as_ref(), text, modname, info, self.config.type_comments)?;
        Ok(self.post_build(built, apply_transforms))
    }

    /// Build the module stored at `path`; the name defaults to the file stem
    pub fn build_from_file(self: &Arc<Self>, path: &Path, modname: Option<&str>) -> Result<Arc<Module>, BuildError> {
        let modname = modname
            .map(str::to_string)
            .unwrap_or_else(|| builder::modname_from_path(path));
        let _guard = self.caches.lock_builds();
        let source = builder::source::read_source(path, &modname)?;
        let info = SourceInfo {
            path: Some(path.to_path_buf()),
            bytes: Some(source.bytes),
            encoding: Some(source.encoding),
        };
        let built = build_source(self.adapter.as_ref(), &source.text, &modname, info, self.config.type_comments)?;
        Ok(self.post_build(built, self.config.apply_transforms))
    }

    /// Build from an already-loaded module: its loader's source, then the
    /// file it reports, then introspection of its members
    pub fn build_from_live_module(
        self: &Arc<Self>,
        live: &dyn LiveModule,
        modname: Option<&str>,
    ) -> Result<Arc<Module>, BuildError> {
        let modname = modname.unwrap_or_else(|| live.name()).to_string();
        let file = live.file();
        if let Some(text) = live.source() {
            let _guard = self.caches.lock_builds();
            let info = SourceInfo {
                bytes: Some(text.as_bytes().to_vec()),
                encoding: Some("utf-8".to_string()),
                path: file,
            };
            let built = build_source(self.adapter.as_ref(), &text, &modname, info, self.config.type_comments)?;
            return Ok(self.post_build(built, self.config.apply_transforms));
        }
        if let Some(path) = file.filter(|path| path.extension().is_some_and(|ext| ext == "py") && path.is_file()) {
            return self.build_from_file(&path, Some(&modname));
        }
        debug!("Introspecting live module {}", modname);
        let _guard = self.caches.lock_builds();
        let built = build_members(&modname, &live.members());
        Ok(self.post_build(built, self.config.apply_transforms))
    }

    /// Cached module `name` built from `path`, building it when missing
    pub fn get_or_build(self: &Arc<Self>, name: &str, path: &Path) -> Result<Arc<Module>, BuildError> {
        let _guard = self.caches.lock_builds();
        if let Some(module) = self.caches.modules.get(name, Some(path)) {
            debug!("Module cache hit for {}", name);
            return Ok(module);
        }
        self.build_from_file(path, Some(name))
    }

    /// Package module `name` for the namespace directory at `path`
    pub fn build_namespace_module(self: &Arc<Self>, name: &str, path: &Path) -> Arc<Module> {
        let _guard = self.caches.lock_builds();
        if let Some(module) = self.caches.modules.get(name, None).filter(|module| module.is_package()) {
            return module;
        }
        debug!("Namespace package {} at {}", name, path.display());
        let built = builder::build_namespace_package(name);
        self.post_build(built, self.config.apply_transforms)
    }

    /// Cache, resolve deferred nodes, transform, cache the final module
    fn post_build(self: &Arc<Self>, built: BuiltModule, apply_transforms: bool) -> Arc<Module> {
        let BuiltModule { parts, deferred } = built;
        let module = Arc::new(Module::new(parts));
        self.caches.modules.insert(Arc::clone(&module));
        builder::deferred::run(self, &module, &deferred);
        if !apply_transforms {
            return module;
        }
        let transforms = self.transforms.read().clone();
        let module = transforms.visit(&module);
        self.caches.modules.insert(Arc::clone(&module));
        info!("Built module {} from {}", module.name(), module.file_display());
        module
    }

    /// Import `name` as seen from `context_file`
    pub fn import_module(self: &Arc<Self>, name: &str, context_file: Option<&Path>) -> Result<Arc<Module>, ImportError> {
        if name == BUILTINS_MODNAME {
            return Ok(self.builtins_module_or_build()?);
        }
        let _guard = self.caches.lock_builds();
        let resolved = self
            .caches
            .resolutions
            .get_or_resolve(name, context_file, || self.resolver.find(name, context_file));
        match resolved {
            Ok(location) if location.kind == ModuleKind::Namespace => {
                Ok(self.build_namespace_module(name, &location.path))
            }
            Ok(location) => Ok(self.get_or_build(name, &location.path)?),
            Err(err) => {
                if let Some(module) = self.caches.modules.get_any(name).filter(|m| m.file().is_none()) {
                    return Ok(module);
                }
                let hooks = self.failed_import_hooks.read().clone();
                for hook in hooks {
                    if let Some(module) = hook(self, name) {
                        debug!("Failed import hook supplied {}", name);
                        return Ok(module);
                    }
                }
                Err(err.into())
            }
        }
    }

    pub fn module_from_name(self: &Arc<Self>, name: &str) -> Result<Arc<Module>, ImportError> {
        self.import_module(name, None)
    }

    fn builtins_module_or_build(self: &Arc<Self>) -> Result<Arc<Module>, BuildError> {
        let _guard = self.caches.lock_builds();
        if let Some(module) = self.caches.modules.get(BUILTINS_MODNAME, None) {
            return Ok(module);
        }
        self.build_from_live_module(&BuiltinsModule, None)
    }

    /// The `builtins` module, built on first use
    pub fn builtins_module(self: &Arc<Self>) -> Option<Arc<Module>> {
        match self.builtins_module_or_build() {
            Ok(module) => Some(module),
            Err(err) => {
                warn!("Builtins unavailable: {}", err);
                None
            }
        }
    }

    /// Class definition `name` of module `modname`
    pub fn ast_from_class(self: &Arc<Self>, modname: &str, name: &str) -> Result<NodeRef, InferenceError> {
        let module = self.module_from_name(modname)?;
        let root = NodeRef::root(&module);
        let defs = root.local_defs(name);
        if defs.is_empty() {
            return Err(InferenceError::AttributeNotFound {
                owner: modname.to_string(),
                attr: name.to_string(),
            });
        }
        defs.into_iter()
            .rev()
            .find(|def| matches!(def.kind(), NodeKind::ClassDef { .. }))
            .ok_or_else(|| InferenceError::NotAClass {
                modname: modname.to_string(),
                name: name.to_string(),
            })
    }

    /// Values for a loaded class, or for an instance of it
    pub fn infer_ast_from_something(self: &Arc<Self>, object: &LiveObject, ctx: Option<InferenceContext>) -> InferIter {
        let (modname, name) = object.class_path();
        let module = match self.module_from_name(modname) {
            Ok(module) => module,
            Err(err) => return inference::fail(err.into()),
        };
        let ctx = ctx.unwrap_or_else(|| self.new_context());
        let values = inference::igetattr(self, &Value::Module(NodeRef::root(&module)), name, ctx);
        match object {
            LiveObject::Class { .. } => values,
            LiveObject::Instance { .. } => Box::new(values.map(|value| match value {
                Ok(Value::Class(class)) => Ok(Value::Instance(class)),
                other => other,
            })),
        }
    }

    /// Root of the `builtins` module
    pub fn builtins(self: &Arc<Self>) -> Option<NodeRef> {
        self.builtins_module().map(|module| NodeRef::root(&module))
    }

    /// Class `name` defined in `builtins`
    pub fn builtin_class(self: &Arc<Self>, name: &str) -> Option<NodeRef> {
        self.builtins()?
            .local_defs(name)
            .into_iter()
            .rev()
            .find(|def| matches!(def.kind(), NodeKind::ClassDef { .. }))
    }

    pub fn register_transform(&self, predicate: Predicate, action: Action) -> TransformId {
        self.transforms.write().register(predicate, action)
    }

    pub fn unregister_transform(&self, id: TransformId) -> bool {
        self.transforms.write().unregister(id)
    }

    /// Run the registered transforms over `module` now
    pub fn visit_transforms(&self, module: &Arc<Module>) -> Arc<Module> {
        let transforms = self.transforms.read().clone();
        transforms.visit(module)
    }

    pub fn register_failed_import_hook(&self, hook: FailedImportHook) {
        self.failed_import_hooks.write().push(hook);
    }

    pub fn register_call_tip(&self, tip: Arc<dyn CallTip>) {
        let mut tips = self.call_tips.write();
        Arc::make_mut(&mut *tips).register(tip);
    }

    pub fn call_tips(&self) -> Arc<CallTipRegistry> {
        self.call_tips.read().clone()
    }

    /// Infer `node`, in a fresh session when `ctx` is `None`
    pub fn infer(self: &Arc<Self>, node: &NodeRef, ctx: Option<InferenceContext>) -> InferIter {
        inference::infer(self, node, ctx)
    }

    /// Drop every cached module and resolution outcome
    pub fn clear_cache(&self) {
        self.caches.clear();
    }
}
