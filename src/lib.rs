// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap local projects from remote starter repositories.
//!
//! Oxistrap downloads a snapshot of a remote repository, rewrites the
//! starter's module path to the module path of the new project, and places
//! the result on disk.

pub mod config;
pub mod decl;
pub mod path;
pub mod project;

pub use config::Project;
pub use path::Workspace;
pub use project::{
    fetch::{Fetch, HttpFetcher},
    materialize::Materializer,
    ProjectError,
};
