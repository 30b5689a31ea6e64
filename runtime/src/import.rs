//! The import engine: loading, translating and caching modules.
//!
//! Importing a file is the only way transpiled code crosses module
//! boundaries. The engine canonicalises the requested path, redirects
//! directories to their `default.nix`, and evaluates every file at
//! most once per process: results (and failures) are memoised in a
//! process-wide cache keyed by absolute path.
//!
//! Cycle breaking works by inserting a placeholder into the cache
//! *before* translation begins. A module that transitively imports
//! itself receives the placeholder, a thunk which reads the final
//! cache entry when forced. As long as the cyclic reference is only
//! used inside a later-forced thunk, both modules load; forcing the
//! placeholder while the outer import is still settling reports the
//! cycle instead of looping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::builtins::Builtins;
use crate::errors::Error;
use crate::io::{FileType, SourceIO};
use crate::nix_search_path::{canonicalise, NixSearchPath};
use crate::runtime::{Runtime, Translator};
use crate::value::Value;

#[derive(Clone)]
enum ModuleState {
    /// Translation and evaluation of this module has begun but not
    /// settled; the contained value is the placeholder handed to
    /// cyclic importers.
    InProgress(Value),

    /// The module settled to this value.
    Evaluated(Value),

    /// The module failed to load; repeated imports report the same
    /// failure without re-reading or re-translating the file.
    Failed(String),
}

pub struct ImportEngine {
    io: Rc<dyn SourceIO>,
    translator: Rc<dyn Translator>,
    search_path: NixSearchPath,
    builtins: Rc<Builtins>,
    cache: RefCell<HashMap<PathBuf, ModuleState>>,

    /// Needed to hand out handles to this engine from within
    /// placeholder thunks and per-module facades.
    self_ref: Weak<ImportEngine>,
}

impl ImportEngine {
    /// Create an engine with the search path taken from the `NIX_PATH`
    /// environment variable.
    pub fn new(io: Rc<dyn SourceIO>, translator: Rc<dyn Translator>) -> Rc<Self> {
        let search_path = std::env::var("NIX_PATH")
            .unwrap_or_default()
            .parse()
            .unwrap_or_default();
        Self::with_search_path(io, translator, search_path)
    }

    pub fn with_search_path(
        io: Rc<dyn SourceIO>,
        translator: Rc<dyn Translator>,
        search_path: NixSearchPath,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| ImportEngine {
            io,
            translator,
            search_path,
            builtins: Rc::new(Builtins::new()),
            cache: RefCell::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub(crate) fn io(&self) -> &dyn SourceIO {
        self.io.as_ref()
    }

    pub(crate) fn search_path(&self) -> &NixSearchPath {
        &self.search_path
    }

    /// The number of modules the cache currently holds, settled or
    /// not.
    pub fn cached_modules(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Import the module at `path`, evaluating it if this is the first
    /// request for it.
    pub fn import(&self, path: &Path) -> Result<Value, Error> {
        let mut path = canonicalise(path.to_path_buf())?;

        // Directories are imported through their default.nix.
        if let Ok(FileType::Directory) = self.io.file_type(&path) {
            path.push("default.nix");
        }

        if let Some(state) = self.cache.borrow().get(&path) {
            trace!(path = %path.display(), "import cache hit");
            return match state {
                ModuleState::Evaluated(value) | ModuleState::InProgress(value) => {
                    Ok(value.clone())
                }
                ModuleState::Failed(message) => Err(Error::ImportFailed {
                    path: path.clone(),
                    message: message.clone(),
                }),
            };
        }

        debug!(path = %path.display(), "importing module");

        // The placeholder must be cached before translation begins, so
        // that cyclic imports hit it instead of re-entering.
        let placeholder = self.placeholder(&path);
        self.cache
            .borrow_mut()
            .insert(path.clone(), ModuleState::InProgress(placeholder));

        match self.load(&path) {
            Ok(value) => {
                self.cache
                    .borrow_mut()
                    .insert(path.clone(), ModuleState::Evaluated(value.clone()));
                Ok(value)
            }

            Err(cause) => {
                let message = cause.to_string();
                debug!(path = %path.display(), %message, "import failed");
                self.cache
                    .borrow_mut()
                    .insert(path.clone(), ModuleState::Failed(message.clone()));
                Err(Error::ImportFailed { path, message })
            }
        }
    }

    fn load(&self, path: &Path) -> Result<Value, Error> {
        let source = self.io.read_to_string(path).map_err(|error| Error::Io {
            path: Some(path.to_path_buf()),
            error: error.into(),
        })?;

        let module = self.translator.translate(&source, path)?;
        trace!(path = %path.display(), "module translated");

        let module_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let engine = self
            .self_ref
            .upgrade()
            .expect("import engine dropped while still in use");
        let runtime = Rc::new(Runtime::new(engine, module_dir));

        (module.init)(runtime, self.builtins.clone())
    }

    /// Construct the placeholder value cached for a module while it is
    /// being evaluated. It defers to the final cache entry, so it must
    /// only be forced after the outer import has settled.
    fn placeholder(&self, path: &Path) -> Value {
        let weak = self.self_ref.clone();
        let path = path.to_path_buf();

        Value::lazy(move || {
            let engine = weak.upgrade().ok_or_else(|| Error::ImportCycle {
                path: path.clone(),
            })?;

            let state = engine.cache.borrow().get(&path).cloned();
            match state {
                Some(ModuleState::Evaluated(value)) => Ok(value),
                Some(ModuleState::Failed(message)) => Err(Error::ImportFailed {
                    path: path.clone(),
                    message,
                }),
                _ => Err(Error::ImportCycle { path: path.clone() }),
            }
        })
    }
}
