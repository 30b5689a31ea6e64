//! Interface for injecting filesystem access into the runtime.
//!
//! The import engine and the path anchors need to read module sources
//! and probe for file existence, but the runtime does not depend on
//! any particular filesystem interaction model. This module provides
//! a trait that callers implement to supply the functionality they
//! desire: plain `std` I/O, a mocked in-memory tree for tests, or a
//! bridge into an async host (which blocks its worker while the
//! single-threaded evaluation is suspended on a read).

use std::io;
use std::path::Path;

/// Types of files the runtime distinguishes when resolving imports.
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    Directory,
    Regular,
    Symlink,
    Unknown,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_as_str = match &self {
            FileType::Directory => "directory",
            FileType::Regular => "regular",
            FileType::Symlink => "symlink",
            FileType::Unknown => "unknown",
        };

        write!(f, "{}", type_as_str)
    }
}

/// All filesystem interactions the runtime performs. Everything that
/// can suspend evaluation goes through here; pure operations never do.
pub trait SourceIO {
    /// Verify whether the file at the specified path exists. Used by
    /// `pathExists` and by search-path resolution, and expected not to
    /// fail: an inaccessible path reads as absent.
    fn path_exists(&self, path: &Path) -> io::Result<bool>;

    /// Read the full contents of the given file as a string. Used by
    /// the import engine for module sources.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Return the [FileType] of the given path, or an error if it
    /// does not exist. Used to redirect directory imports to their
    /// `default.nix`.
    fn file_type(&self, path: &Path) -> io::Result<FileType>;
}

/// Implementation of [`SourceIO`] that uses the equivalent standard
/// library functions, i.e. does local file-IO.
pub struct StdIO;

impl SourceIO for StdIO {
    fn path_exists(&self, path: &Path) -> io::Result<bool> {
        // an IO error here indicates the path is not usable, which is
        // the same as it not existing
        Ok(path.try_exists().unwrap_or(false))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn file_type(&self, path: &Path) -> io::Result<FileType> {
        let metadata = std::fs::symlink_metadata(path)?;

        Ok(if metadata.is_dir() {
            FileType::Directory
        } else if metadata.is_file() {
            FileType::Regular
        } else if metadata.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::Unknown
        })
    }
}

/// Dummy implementation of [`SourceIO`], can be used in contexts
/// where I/O is not available but code should "pretend" that it is.
pub struct DummyIO;

impl SourceIO for DummyIO {
    fn path_exists(&self, _: &Path) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "I/O methods are not implemented in DummyIO",
        ))
    }

    fn read_to_string(&self, _: &Path) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "I/O methods are not implemented in DummyIO",
        ))
    }

    fn file_type(&self, _: &Path) -> io::Result<FileType> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "I/O methods are not implemented in DummyIO",
        ))
    }
}
