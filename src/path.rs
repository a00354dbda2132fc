// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where a project should be materialized, and keep archive
//! entries from escaping that location.
//!
//! # Workspace Root
//!
//! Projects are placed relative to a __workspace root__, i.e., the classic
//! `$GOPATH` layout where a module `github.com/foo/bar` lives at
//! `$GOPATH/src/github.com/foo/bar`. The workspace root is never read from
//! the process environment here. Callers construct a [`Workspace`] up front,
//! usually through [`Workspace::from_env`], and pass it along.

use std::{
    env::{current_dir, var_os},
    path::{absolute, Component, Path, PathBuf},
};

/// Environment variable holding the workspace root.
pub const WORKSPACE_ROOT_VAR: &str = "GOPATH";

/// Placeholder in a destination path that stands for the workspace root.
pub const WORKSPACE_ROOT_PLACEHOLDER: &str = "${GOPATH}";

/// Workspace configuration used to resolve default destinations.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Workspace {
    root: Option<PathBuf>,
}

impl Workspace {
    /// Construct new workspace configuration.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Construct workspace configuration from `$GOPATH`.
    ///
    /// An empty variable counts as unset.
    pub fn from_env() -> Self {
        let root = var_os(WORKSPACE_ROOT_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self { root }
    }

    /// Workspace root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resolve absolute destination directory for a project.
    ///
    /// An empty `dest` resolves to `<root>/src/<dir(identity)>`, or to the
    /// current working directory when no workspace root is configured.
    /// Otherwise, the first [`WORKSPACE_ROOT_PLACEHOLDER`] in `dest` is
    /// substituted, and the result made absolute.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::WorkingDir`] if the current working directory
    ///   cannot be determined.
    /// - Return [`PathError::UnsafeIdentity`] if `dest` is empty, and
    ///   `identity` is not a plain relative path.
    pub fn resolve_destination(&self, dest: &str, identity: &str) -> Result<PathBuf> {
        if dest.is_empty() {
            // INVARIANT: Identity must not steer the destination out of the workspace.
            if !is_safe_identity(identity) {
                return Err(PathError::UnsafeIdentity(identity.to_string()));
            }

            return match &self.root {
                Some(root) => Ok(normalize(root.join("src").join(parent_of(identity)))),
                None => current_dir().map_err(PathError::WorkingDir),
            };
        }

        let root = self
            .root
            .as_deref()
            .map(|root| root.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dest = dest.replacen(WORKSPACE_ROOT_PLACEHOLDER, &root, 1);
        let dest = absolute(&dest).map_err(PathError::WorkingDir)?;

        Ok(normalize(dest))
    }
}

/// Final path segment of a slash separated identity.
///
/// Mirrors `path.Base` semantics: trailing slashes are ignored, and an empty
/// identity yields `"."`.
pub fn base_of(identity: &str) -> &str {
    let trimmed = identity.trim_end_matches('/');
    if trimmed.is_empty() {
        return if identity.is_empty() { "." } else { "/" };
    }

    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Everything but the final path segment of a slash separated identity.
pub fn parent_of(identity: &str) -> &str {
    let trimmed = identity.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Check that identity is a plain relative path.
///
/// Every segment must be a normal name, so neither the identity nor its
/// base name can point at a parent directory or a file system root.
pub fn is_safe_identity(identity: &str) -> bool {
    !identity.is_empty()
        && Path::new(identity)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Lexically normalize a path.
///
/// Removes `.` components and folds `..` into its parent without touching
/// the file system. A `..` that would climb above the root of an absolute
/// path is dropped, while leading `..` of a relative path are kept.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => continue,
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Join `name` onto `root`, requiring the result to stay strictly inside it.
///
/// Both sides are normalized lexically. Returns `None` if the joined path
/// escapes `root`, or is `root` itself.
pub fn join_within(root: impl AsRef<Path>, name: impl AsRef<Path>) -> Option<PathBuf> {
    let root = normalize(root);
    let joined = normalize(root.join(name));

    (joined != root && joined.starts_with(&root)).then_some(joined)
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Current working directory cannot be determined.
    #[error("cannot determine current working directory")]
    WorkingDir(#[source] std::io::Error),

    /// Identity contains parent, root, or current directory segments.
    #[error("identity {0:?} is not a plain relative path")]
    UnsafeIdentity(String),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
