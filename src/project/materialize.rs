// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Archive materialization.
//!
//! Turn a downloaded source archive into a project directory on disk. The
//! archive holds a single top-level directory named after the remote
//! repository and ref, e.g., "demo-master". Its manifest declares the module
//! path the source tree was written against, i.e., the __original module__.
//!
//! # Module Rewrite
//!
//! When the requested module differs from the original module, every file
//! gets all literal occurrences of the original module replaced with the
//! requested module before it is written. Nothing smarter than a byte
//! substitution happens, so import paths, documentation, and build files
//! all follow along.
//!
//! # Commit
//!
//! Entries are extracted under the archive's own top-level directory name.
//! Only once every entry is written does that directory get renamed to the
//! final project name. A failure part way through leaves whatever was
//! written so far in place. Nothing is rolled back.

use crate::{
    config::Project,
    decl::{module_path, MANIFEST_FILE},
    path::{base_of, is_safe_identity, join_within, normalize, PathError, Workspace},
};

use std::{
    fs::{create_dir_all, remove_dir_all, rename, OpenOptions},
    io::{copy, Cursor, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use zip::{read::ZipFile, result::ZipError, ZipArchive};

/// Extract source archives into project directories.
#[derive(Debug, Clone)]
pub struct Materializer<'a> {
    workspace: &'a Workspace,
}

impl<'a> Materializer<'a> {
    /// Construct new materializer for target workspace.
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// Materialize archive into project directory.
    ///
    /// Fills in the module and destination of `project` when they are empty,
    /// extracts every archive entry beneath the destination, rewriting the
    /// original module along the way when needed, and finally renames the
    /// extracted tree to the base name of the module. Any existing directory
    /// by that name is removed first, as is any leftover extraction from an
    /// earlier failed run. Returns path to that final directory.
    ///
    /// Concurrent calls that target the same destination are not
    /// synchronized, and will trample each other's output.
    ///
    /// # Errors
    ///
    /// - Return [`MaterializeError::Archive`] if archive cannot be read.
    /// - Return [`MaterializeError::ReadManifest`] if manifest cannot be read.
    /// - Return [`MaterializeError::UnresolvedModule`] if no module was given,
    ///   and the archive does not declare one.
    /// - Return [`MaterializeError::UnsafeModule`] if module is not a plain
    ///   relative path, e.g., it ends in `..` or is `/`.
    /// - Return [`MaterializeError::PathTraversal`] if an entry would land
    ///   outside of the destination.
    /// - Return any other [`MaterializeError`] variant if file system
    ///   operations fail.
    #[instrument(skip(self, archive, project), level = "debug")]
    pub fn materialize(&self, archive: &[u8], project: &mut Project) -> Result<PathBuf> {
        let archive_root = project.archive_root();
        let mut archive = ZipArchive::new(Cursor::new(archive))?;

        let original = find_original_module(&mut archive, &archive_root)?;
        if project.module.is_empty() {
            project.module = String::from_utf8_lossy(&original).into_owned();
        }

        // INVARIANT: Module must be known before anything touches the disk.
        if project.module.is_empty() {
            return Err(MaterializeError::UnresolvedModule(archive_root));
        }

        // INVARIANT: Module names the final directory, and may come straight
        // from the archive, so it must not point outside the destination.
        if !is_safe_identity(&project.module) {
            return Err(MaterializeError::UnsafeModule(project.module.clone()));
        }

        let rewrite = Rewrite::new(original, project.module.as_bytes().to_vec());
        if rewrite.is_enabled() {
            info!(
                "rewrite module {:?} to {:?}",
                String::from_utf8_lossy(&rewrite.from),
                project.module
            );
        }

        let dest = self
            .workspace
            .resolve_destination(&project.dest, &project.module)?;
        project.dest = dest.to_string_lossy().into_owned();

        let extracted =
            join_within(&dest, &archive_root).ok_or_else(|| MaterializeError::PathTraversal {
                entry: archive_root.clone(),
                dest: dest.clone(),
            })?;
        let target = join_within(&dest, base_of(&project.module))
            .ok_or_else(|| MaterializeError::UnsafeModule(project.module.clone()))?;

        // INVARIANT: Every install starts from a clean extraction directory.
        if remove_existing(&extracted)? {
            warn!("discard leftover extraction {:?}", extracted.display());
        }

        info!("extract {:?} into {:?}", archive_root, dest.display());
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            extract_entry(&dest, &mut entry, &rewrite)?;
        }

        commit(&extracted, target)
    }
}

/// Identity substitution applied to extracted file content.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Rewrite {
    from: Vec<u8>,
    to: Vec<u8>,
}

impl Rewrite {
    /// Construct new rewrite of module `from` into module `to`.
    pub fn new(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Check if content needs rewriting at all.
    pub fn is_enabled(&self) -> bool {
        self.from != self.to
    }

    /// Replace every non-overlapping occurrence of original module.
    ///
    /// An empty original module matches nothing.
    pub fn apply(&self, contents: &[u8]) -> Vec<u8> {
        if self.from.is_empty() {
            return contents.to_vec();
        }

        let mut out = Vec::with_capacity(contents.len());
        let mut rest = contents;
        while let Some(idx) = rest
            .windows(self.from.len())
            .position(|window| window == self.from.as_slice())
        {
            out.extend_from_slice(&rest[..idx]);
            out.extend_from_slice(&self.to);
            rest = &rest[idx + self.from.len()..];
        }
        out.extend_from_slice(rest);

        out
    }
}

fn find_original_module(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    archive_root: &str,
) -> Result<Vec<u8>> {
    let manifest = Path::new(archive_root).join(MANIFEST_FILE);

    // INVARIANT: Last entry of a given name wins.
    for idx in (0..archive.len()).rev() {
        let mut entry = archive.by_index(idx)?;
        if normalize(entry.name()) != manifest {
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| MaterializeError::ReadManifest {
                source: err,
                path: manifest.clone(),
            })?;

        return match module_path(&contents) {
            Some(module) => {
                debug!("found module {:?}", String::from_utf8_lossy(&module));
                Ok(module)
            }
            None => {
                warn!("no module declared in {:?}", manifest.display());
                Ok(Vec::new())
            }
        };
    }

    warn!("archive has no {:?}", manifest.display());
    Ok(Vec::new())
}

fn extract_entry(dest: &Path, entry: &mut ZipFile<'_>, rewrite: &Rewrite) -> Result<()> {
    let path = join_within(dest, entry.name()).ok_or_else(|| MaterializeError::PathTraversal {
        entry: entry.name().to_string(),
        dest: dest.to_path_buf(),
    })?;

    if entry.is_dir() {
        debug!("create directory {:?}", path.display());
        return create_dir_all(&path).map_err(|err| MaterializeError::CreateDir { source: err, path });
    }

    // INVARIANT: Archives are not required to list parent directories.
    if let Some(parent) = path.parent() {
        create_dir_all(parent).map_err(|err| MaterializeError::CreateDir {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    debug!("write file {:?}", path.display());
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = entry.unix_mode() {
            options.mode(mode & 0o777);
        }
    }
    let mut file = options
        .open(&path)
        .map_err(|err| MaterializeError::CreateFile {
            source: err,
            path: path.clone(),
        })?;

    if rewrite.is_enabled() {
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| MaterializeError::ReadEntry {
                source: err,
                entry: entry.name().to_string(),
            })?;
        file.write_all(&rewrite.apply(&contents))
            .map_err(|err| MaterializeError::WriteFile { source: err, path })?;
    } else {
        copy(entry, &mut file).map_err(|err| MaterializeError::WriteFile { source: err, path })?;
    }

    Ok(())
}

fn commit(extracted: &Path, target: PathBuf) -> Result<PathBuf> {
    if extracted == target.as_path() {
        return Ok(target);
    }

    if remove_existing(&target)? {
        info!("replace existing {:?}", target.display());
    }

    rename(extracted, &target).map_err(|err| MaterializeError::Rename {
        source: err,
        from: extracted.to_path_buf(),
        to: target.clone(),
    })?;
    info!("project ready at {:?}", target.display());

    Ok(target)
}

fn remove_existing(path: &Path) -> Result<bool> {
    match remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(MaterializeError::RemoveDir {
            source: err,
            path: path.to_path_buf(),
        }),
    }
}

/// Archive materialization error types.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// Archive is malformed or cannot be read.
    #[error(transparent)]
    Archive(#[from] ZipError),

    /// Manifest entry cannot be read.
    #[error("failed to read manifest {:?}", path.display())]
    ReadManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// No module given, and archive does not declare one.
    #[error("cannot determine module of {0:?}")]
    UnresolvedModule(String),

    /// Module would name a directory outside of the destination.
    #[error("module {0:?} is not a plain relative path")]
    UnsafeModule(String),

    /// Archive entry escapes destination directory.
    #[error("illegal path {entry:?} escapes {:?}", dest.display())]
    PathTraversal { entry: String, dest: PathBuf },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be created.
    #[error("failed to create file {:?}", path.display())]
    CreateFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archive entry content cannot be read.
    #[error("failed to read archive entry {entry:?}")]
    ReadEntry {
        #[source]
        source: std::io::Error,
        entry: String,
    },

    /// File cannot be written to.
    #[error("failed to write file {:?}", path.display())]
    WriteFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Existing project directory cannot be removed.
    #[error("failed to remove directory {:?}", path.display())]
    RemoveDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Extracted directory cannot be renamed to its final name.
    #[error("failed to rename {:?} to {:?}", from.display(), to.display())]
    Rename {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Destination cannot be resolved.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Friendly result alias :3
pub type Result<T, E = MaterializeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case(b"import \"github.com/old/demo/pkg\"", b"import \"github.com/new/app/pkg\""; "single")]
    #[test_case(b"github.com/old/demogithub.com/old/demo", b"github.com/new/appgithub.com/new/app"; "adjacent")]
    #[test_case(b"nothing to see", b"nothing to see"; "absent")]
    #[test_case(b"", b""; "empty")]
    #[test]
    fn rewrite_replaces_all_occurrences(input: &[u8], expect: &[u8]) {
        use pretty_assertions::assert_eq;
        let rewrite = Rewrite::new("github.com/old/demo", "github.com/new/app");
        assert_eq!(rewrite.apply(input), expect.to_vec());
    }

    #[test]
    fn rewrite_is_not_overlapping() {
        let rewrite = Rewrite::new("aa", "b");
        assert_eq!(rewrite.apply(b"aaaaa"), b"bba".to_vec());
    }

    #[test]
    fn rewrite_with_empty_original_is_passthrough() {
        let rewrite = Rewrite::new("", "github.com/new/app");
        assert!(rewrite.is_enabled());
        assert_eq!(rewrite.apply(b"package main"), b"package main".to_vec());
    }

    #[test]
    fn rewrite_disabled_for_same_module() {
        let rewrite = Rewrite::new("github.com/old/demo", "github.com/old/demo");
        assert!(!rewrite.is_enabled());
    }

    #[test]
    fn materialize_rejects_garbage() {
        let workspace = Workspace::default();
        let mut project = Project::new("/tmp/nowhere", "github.com/old/demo");
        let result = Materializer::new(&workspace).materialize(b"not a zip archive", &mut project);
        assert!(matches!(result, Err(MaterializeError::Archive(_))));
    }
}
