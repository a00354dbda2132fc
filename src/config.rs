// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of project descriptor files that Oxistrap uses to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Branch used when a project does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Project descriptor.
///
/// Identifies a remote source tree to bootstrap from, and the local target
/// it should become. A descriptor is built fresh for each install, and its
/// empty fields get resolved in place as the install progresses.
///
/// # General Layout
///
/// ```toml
/// repo = "github.com/foo/starter"
/// branch = "main"
/// dest = "${GOPATH}/src/github.com/me"
/// module = "github.com/me/app"
/// ```
///
/// Only `repo` is required. An empty `dest` is derived from the workspace
/// root and module, and an empty `module` defaults to whatever module the
/// remote source tree declares.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Project {
    /// Remote location of source tree, e.g., "github.com/foo/starter".
    pub repo: String,

    /// Branch or tag of remote source tree to fetch.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Local directory to place project into.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest: String,

    /// Module path of local project.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
}

impl Project {
    /// Construct new project descriptor on the default branch.
    pub fn new(dest: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            branch: DEFAULT_BRANCH.into(),
            dest: dest.into(),
            module: String::new(),
        }
    }

    /// Name of the top-level directory inside the remote source archive.
    ///
    /// Code hosts name it after the repository and the ref, e.g.,
    /// "starter-main" for "github.com/foo/starter" at "main".
    pub fn archive_root(&self) -> String {
        format!("{}-{}", crate::path::base_of(&self.repo), self.branch)
    }
}

impl FromStr for Project {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut project: Project = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Expand home directory, but leave workspace placeholder be.
        project.dest = shellexpand::tilde(&project.dest).into_owned();

        if project.branch.is_empty() {
            project.branch = DEFAULT_BRANCH.into();
        }

        Ok(project)
    }
}

impl Display for Project {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn default_branch() -> String {
    DEFAULT_BRANCH.into()
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}
