//! The per-module runtime facade and the translator contract.
//!
//! Every instantiated module receives exactly two capabilities: a
//! [`Runtime`] scoped to the directory of its source file, and the
//! shared [`Builtins`] table. The facade is deliberately small —
//! resolving anchored paths, importing other modules and probing for
//! file existence is everything a module can do to the outside world.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::builtins::Builtins;
use crate::errors::Error;
use crate::import::ImportEngine;
use crate::nix_search_path::canonicalise;
use crate::value::Value;

/// Classifier attached to an unresolved path at the transpiler
/// boundary, deciding which base it is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// Relative to the directory of the module being evaluated.
    Relative,
    /// An absolute path, normalised but otherwise taken as-is.
    Absolute,
    /// Relative to the user's home directory (`~/…` literals).
    Home,
    /// Resolved against the `NIX_PATH`-style search path (`<…>`
    /// literals).
    Store,
}

/// A module produced by the external translator: a callable that
/// evaluates the module body when given its runtime facade and the
/// builtins table, plus the source map the translator generated
/// alongside (carried opaquely; debuggers consume it out-of-band).
pub struct TranslatedModule {
    pub init: ModuleInit,
    pub source_map: Option<String>,
}

pub type ModuleInit = Box<dyn Fn(Rc<Runtime>, Rc<Builtins>) -> Result<Value, Error>>;

/// The external translator invoked by the import engine. Given the
/// source text of a Nix file and its origin path, it produces the
/// instantiable module.
pub trait Translator {
    fn translate(&self, source: &str, origin: &Path) -> Result<TranslatedModule, Error>;
}

/// The runtime facade handed to a single module.
pub struct Runtime {
    engine: Rc<ImportEngine>,
    module_dir: PathBuf,
}

impl Runtime {
    pub(crate) fn new(engine: Rc<ImportEngine>, module_dir: PathBuf) -> Self {
        Runtime { engine, module_dir }
    }

    /// The directory of the module this facade belongs to.
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Resolve an anchored path literal to an absolute path.
    pub fn export(&self, anchor: Anchor, payload: &str) -> Result<PathBuf, Error> {
        match anchor {
            Anchor::Relative => canonicalise(self.module_dir.join(payload)),
            Anchor::Absolute => canonicalise(PathBuf::from(payload)),

            Anchor::Home => {
                let home = dirs::home_dir().ok_or_else(|| {
                    Error::PathResolution("home directory is not available".into())
                })?;
                canonicalise(home.join(payload))
            }

            Anchor::Store => self.engine.search_path().resolve(self.engine.io(), payload),
        }
    }

    /// Import the module at `path`, relative paths resolving against
    /// this module's directory. The result is cached process-wide.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let path = path.as_ref();
        if path.is_absolute() {
            self.engine.import(path)
        } else {
            self.engine.import(&self.module_dir.join(path))
        }
    }

    /// Whether a file exists at `path`. Never fails; inaccessible
    /// paths read as absent.
    pub fn path_exists(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.module_dir.join(path)
        };

        self.engine.io().path_exists(&resolved).unwrap_or(false)
    }
}
