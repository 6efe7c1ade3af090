//! Prune phase: remove replica entries that no longer exist in the source.

use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::error::MirrorError;
use crate::fs::{delete_dir, delete_file, snapshot};
use crate::sync::context::CycleContext;

pub(crate) async fn prune(ctx: Arc<CycleContext>) -> Result<()> {
    let entries = snapshot(ctx.config.replica_root())
        .await
        .with_context(|| format!("Failed to scan replica directory {}", ctx.config.replica_display()))?;

    // Symlinks are pruned like files: removing one never touches its target
    let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_dir());

    let mut units = JoinSet::new();
    for entry in files {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let ctx = Arc::clone(&ctx);
        units.spawn(async move { prune_file(&ctx, &entry.relative).await });
    }
    ctx.join_units(units).await;

    // Deepest first, so children go before their parents are checked.
    let mut dirs: Vec<PathBuf> = dirs.into_iter().map(|e| e.relative).collect();
    dirs.sort_by(|a, b| b.as_os_str().len().cmp(&a.as_os_str().len()));

    for relative in dirs {
        if ctx.cancel.is_cancelled() {
            break;
        }
        ctx.report(prune_dir(&ctx, &relative).await);
    }

    Ok(())
}

async fn prune_file(ctx: &CycleContext, relative: &Path) -> Result<()> {
    if source_exists(ctx, relative).await? {
        return Ok(());
    }

    let target = ctx.config.in_replica(relative);
    if delete_file(&target, &ctx.config.retry).await? {
        ctx.counters.record_file_deleted();
        ctx.logger.log(format!("Deleted {}", target.display()));
    }
    Ok(())
}

async fn prune_dir(ctx: &CycleContext, relative: &Path) -> Result<()> {
    if source_exists(ctx, relative).await? {
        return Ok(());
    }

    let target = ctx.config.in_replica(relative);
    if delete_dir(&target, &ctx.config.retry).await? {
        ctx.counters.record_dir_deleted();
        ctx.logger.log(format!("Deleted directory {}", target.display()));
    }
    Ok(())
}

async fn source_exists(ctx: &CycleContext, relative: &Path) -> Result<bool> {
    let source = ctx.config.in_source(relative);
    match tokio::fs::symlink_metadata(&source).await {
        Ok(_) => Ok(true),
        // A file where a parent directory used to be means the entry is gone too
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => Ok(false),
        Err(e) => Err(MirrorError::from_io_error(e, "checking", Some(source)).into()),
    }
}
