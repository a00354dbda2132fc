// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project installation.
//!
//! A project is bootstrapped from a remote __starter__ repository in two
//! steps. First, a zip snapshot of the starter at the requested branch is
//! fetched. Second, that snapshot is materialized on disk under the
//! requested module path, with every reference to the starter's own module
//! path rewritten along the way. Each install is a full fetch and replace.
//! There is no incremental update.
//!
//! # See Also
//!
//! 1. [`fetch`]
//! 2. [`materialize`]

pub mod fetch;
pub mod materialize;

use crate::{
    config::Project,
    path::Workspace,
    project::{fetch::Fetch, materialize::Materializer},
};

use std::path::PathBuf;
use tracing::{info, instrument};

impl Project {
    /// Install project from its remote source archive.
    ///
    /// Resolves empty module and destination fields in place. Returns path
    /// to the finished project directory. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - Return [`ProjectError::Fetch`] if source archive cannot be fetched.
    /// - Return [`ProjectError::Materialize`] if source archive cannot be
    ///   written out to disk.
    #[instrument(skip(self, fetcher, workspace), level = "debug")]
    pub async fn install(&mut self, fetcher: &impl Fetch, workspace: &Workspace) -> Result<PathBuf> {
        info!("fetch {} at {}", self.repo, self.branch);
        let archive = fetcher.fetch(&self.repo, &self.branch).await?;

        Ok(Materializer::new(workspace).materialize(&archive, self)?)
    }
}

/// Project installation error types.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Source archive cannot be fetched.
    #[error(transparent)]
    Fetch(#[from] crate::project::fetch::FetchError),

    /// Source archive cannot be materialized.
    #[error(transparent)]
    Materialize(#[from] crate::project::materialize::MaterializeError),
}

/// Friendly result alias :3
pub type Result<T, E = ProjectError> = std::result::Result<T, E>;
