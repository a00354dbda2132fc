// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{demo_archive, ArchiveFixture, StaticFetcher};

use anyhow::Result;
use oxistrap::{
    project::materialize::{MaterializeError, Materializer},
    Project, ProjectError, Workspace,
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    env::current_dir,
    fs::{create_dir_all, read, read_to_string, write},
    path::Path,
};

fn target_project(module: &str) -> Project {
    let mut project = Project::new("out", "github.com/old/demo");
    project.module = module.into();
    project
}

#[sealed_test]
fn materialize_rewrites_module() -> Result<()> {
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    let path = Materializer::new(&workspace).materialize(&demo_archive()?, &mut project)?;

    assert_eq!(path, current_dir()?.join("out/app"));
    assert_eq!(project.dest, current_dir()?.join("out").to_string_lossy());
    assert_eq!(
        read_to_string("out/app/main.go")?,
        "package main // module github.com/new/app is great"
    );
    assert_eq!(
        read_to_string("out/app/go.mod")?,
        "module github.com/new/app\n\ngo 1.21\n"
    );
    assert_eq!(
        read_to_string("out/app/pkg/pkg.go")?,
        "package pkg\n\nimport _ \"github.com/new/app/internal\"\n"
    );
    assert!(!Path::new("out/demo-master").exists());

    Ok(())
}

#[sealed_test]
fn materialize_same_module_is_untouched() -> Result<()> {
    let workspace = Workspace::default();
    let mut project = target_project("github.com/old/demo");

    let path = Materializer::new(&workspace).materialize(&demo_archive()?, &mut project)?;

    assert_eq!(path, current_dir()?.join("out/demo"));
    assert_eq!(
        read("out/demo/main.go")?,
        b"package main // module github.com/old/demo is great".to_vec()
    );

    Ok(())
}

#[sealed_test]
fn materialize_defaults_module_and_destination() -> Result<()> {
    let gopath = current_dir()?.join("gopath");
    let workspace = Workspace::new(Some(gopath.clone()));
    let mut project = Project::new("", "github.com/old/demo");

    let path = Materializer::new(&workspace).materialize(&demo_archive()?, &mut project)?;

    assert_eq!(project.module, "github.com/old/demo");
    assert_eq!(path, gopath.join("src/github.com/old/demo"));
    assert!(path.join("go.mod").is_file());

    Ok(())
}

#[sealed_test]
fn materialize_rejects_path_traversal() -> Result<()> {
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/go.mod", "module github.com/old/demo")?
        .file("demo-master/../../evil.txt", "gotcha")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = Project::new("out/inner", "github.com/old/demo");

    let result = Materializer::new(&workspace).materialize(&archive, &mut project);

    assert!(matches!(result, Err(MaterializeError::PathTraversal { .. })));
    assert!(!Path::new("out/evil.txt").exists());
    assert!(!Path::new("evil.txt").exists());

    Ok(())
}

#[sealed_test]
fn materialize_rejects_manifest_module_naming_parent() -> Result<()> {
    create_dir_all("home")?;
    write("home/precious.txt", "keep me")?;
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/go.mod", "module github.com/evil/..")?
        .file("demo-master/main.go", "package main")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = Project::new("home/dest", "github.com/old/demo");

    let result = Materializer::new(&workspace).materialize(&archive, &mut project);

    assert!(matches!(result, Err(MaterializeError::UnsafeModule(_))));
    assert_eq!(read_to_string("home/precious.txt")?, "keep me");
    assert!(!Path::new("home/dest").exists());

    Ok(())
}

#[sealed_test]
fn materialize_rejects_manifest_module_naming_root() -> Result<()> {
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/go.mod", "module /")?
        .file("demo-master/main.go", "package main")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = Project::new("out", "github.com/old/demo");

    let result = Materializer::new(&workspace).materialize(&archive, &mut project);

    assert!(matches!(result, Err(MaterializeError::UnsafeModule(_))));
    assert!(!Path::new("out").exists());

    Ok(())
}

#[sealed_test]
fn materialize_rejects_module_escaping_workspace() -> Result<()> {
    let workspace = Workspace::new(Some(current_dir()?.join("gopath")));
    let mut project = Project::new("", "github.com/old/demo");
    project.module = "../../x".into();

    let result = Materializer::new(&workspace).materialize(&demo_archive()?, &mut project);

    assert!(matches!(result, Err(MaterializeError::UnsafeModule(_))));
    assert!(!Path::new("gopath").exists());

    Ok(())
}

#[sealed_test]
fn materialize_discards_leftover_extraction() -> Result<()> {
    create_dir_all("out/demo-master")?;
    write("out/demo-master/leftover.txt", "from a failed install")?;
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    Materializer::new(&workspace).materialize(&demo_archive()?, &mut project)?;

    assert!(!Path::new("out/app/leftover.txt").exists());
    assert!(Path::new("out/app/main.go").is_file());
    assert!(!Path::new("out/demo-master").exists());

    Ok(())
}

#[sealed_test]
fn materialize_replaces_existing_project() -> Result<()> {
    create_dir_all("out/app")?;
    write("out/app/stale.txt", "old install")?;
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    Materializer::new(&workspace).materialize(&demo_archive()?, &mut project)?;

    assert!(!Path::new("out/app/stale.txt").exists());
    assert!(Path::new("out/app/main.go").is_file());

    Ok(())
}

#[sealed_test]
fn materialize_without_manifest_uses_given_module() -> Result<()> {
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/README.md", "github.com/old/demo")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    Materializer::new(&workspace).materialize(&archive, &mut project)?;

    assert_eq!(read_to_string("out/app/README.md")?, "github.com/old/demo");

    Ok(())
}

#[sealed_test]
fn materialize_malformed_manifest_is_not_fatal() -> Result<()> {
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/go.mod", "module \"github.com/old/demo")?
        .file("demo-master/main.go", "package main")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    Materializer::new(&workspace).materialize(&archive, &mut project)?;

    assert_eq!(read_to_string("out/app/main.go")?, "package main");

    Ok(())
}

#[sealed_test]
fn materialize_without_any_module_fails_early() -> Result<()> {
    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/main.go", "package main")?
        .build()?;
    let workspace = Workspace::default();
    let mut project = Project::new("out", "github.com/old/demo");

    let result = Materializer::new(&workspace).materialize(&archive, &mut project);

    assert!(matches!(result, Err(MaterializeError::UnresolvedModule(_))));
    assert!(!Path::new("out").exists());

    Ok(())
}

#[cfg(unix)]
#[sealed_test]
fn materialize_preserves_permissions() -> Result<()> {
    use std::{fs::metadata, os::unix::fs::PermissionsExt};

    let archive = ArchiveFixture::new()
        .dir("demo-master/")?
        .file("demo-master/go.mod", "module github.com/old/demo")?
        .file_with_mode("demo-master/run.sh", "#!/bin/sh\n", 0o755)?
        .file_with_mode("demo-master/secret.txt", "shh", 0o600)?
        .build()?;
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    Materializer::new(&workspace).materialize(&archive, &mut project)?;

    assert_eq!(metadata("out/app/run.sh")?.permissions().mode() & 0o777, 0o755);
    assert_eq!(metadata("out/app/secret.txt")?.permissions().mode() & 0o777, 0o600);

    Ok(())
}

#[sealed_test]
fn install_fetches_then_materializes() -> Result<()> {
    let fetcher = StaticFetcher::new(demo_archive()?);
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    let path = tokio::runtime::Runtime::new()?
        .block_on(project.install(&fetcher, &workspace))?;

    assert_eq!(
        fetcher.requests(),
        vec![("github.com/old/demo".to_string(), "master".to_string())]
    );
    assert_eq!(path, current_dir()?.join("out/app"));
    assert!(path.join("pkg/pkg.go").is_file());

    Ok(())
}

#[sealed_test]
fn install_surfaces_archive_errors() -> Result<()> {
    let fetcher = StaticFetcher::new(b"definitely not a zip".to_vec());
    let workspace = Workspace::default();
    let mut project = target_project("github.com/new/app");

    let result = tokio::runtime::Runtime::new()?.block_on(project.install(&fetcher, &workspace));

    assert!(matches!(
        result,
        Err(ProjectError::Materialize(MaterializeError::Archive(_)))
    ));

    Ok(())
}
