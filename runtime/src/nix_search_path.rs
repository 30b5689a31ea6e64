//! Implementation of the format and path resolution rules of the
//! `NIX_PATH` environment variable, which backs the store anchor of
//! the runtime facade.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use path_clean::PathClean;

use crate::errors::Error;
use crate::io::SourceIO;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NixSearchPathEntry {
    /// Resolve payloads as subdirectories of this path. This
    /// corresponds to bare paths within the `NIX_PATH` environment
    /// variable, e.g. `/example` resolving `subdir/grandchild` to
    /// `/example/subdir/grandchild`.
    Path(PathBuf),

    /// Resolve payloads starting with `prefix` as subdirectories of
    /// `path`. This corresponds to `prefix=path` entries, e.g.
    /// `nixpkgs=/my/nixpkgs` resolving `nixpkgs/lib` to
    /// `/my/nixpkgs/lib`.
    Prefix { prefix: PathBuf, path: PathBuf },
}

pub(crate) fn canonicalise(path: PathBuf) -> Result<PathBuf, Error> {
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|e| Error::Io {
                path: Some(path.clone()),
                error: e.into(),
            })?
            .join(path)
    }
    .clean();

    Ok(absolute)
}

impl NixSearchPathEntry {
    /// Determine whether this path entry matches the given lookup path.
    ///
    /// For bare paths, an entry is considered to match if a file
    /// exists under the resolved location. For prefixed paths, an
    /// entry matches if the prefix does.
    fn resolve(&self, io: &dyn SourceIO, lookup_path: &Path) -> Result<Option<PathBuf>, Error> {
        let path = match self {
            NixSearchPathEntry::Path(parent) => canonicalise(parent.join(lookup_path))?,

            NixSearchPathEntry::Prefix { prefix, path } => {
                if let Ok(child_path) = lookup_path.strip_prefix(prefix) {
                    canonicalise(path.join(child_path))?
                } else {
                    return Ok(None);
                }
            }
        };

        if io.path_exists(&path).map_err(|e| Error::Io {
            path: Some(path.clone()),
            error: e.into(),
        })? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

impl FromStr for NixSearchPathEntry {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((prefix, path)) => Ok(Self::Prefix {
                prefix: prefix.into(),
                path: path.into(),
            }),
            None => Ok(Self::Path(s.into())),
        }
    }
}

/// Struct implementing the format and path resolution rules of the
/// `NIX_PATH` environment variable.
///
/// This struct can be constructed by parsing a string using the
/// [`FromStr`] impl, or via [`str::parse`]. Payloads can then be
/// resolved using [`NixSearchPath::resolve`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct NixSearchPath {
    entries: Vec<NixSearchPathEntry>,
}

impl NixSearchPath {
    /// Attempt to resolve the given `path` within this search path,
    /// returning the first entry under which an existing file is
    /// found.
    pub fn resolve<P>(&self, io: &dyn SourceIO, path: P) -> Result<PathBuf, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        for entry in &self.entries {
            if let Some(p) = entry.resolve(io, path)? {
                return Ok(p);
            }
        }

        Err(Error::PathResolution(format!(
            "path '{}' was not found in the search path",
            path.display()
        )))
    }
}

impl FromStr for NixSearchPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(':')
            .filter(|e| !e.is_empty())
            .map(|s| s.parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NixSearchPath { entries })
    }
}
