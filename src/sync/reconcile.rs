//! Reconcile phase: bring new and changed source entries into the replica.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::compare::files_equal_async;
use crate::error::MirrorError;
use crate::fs::{copy_file, delete_dir, delete_file, ensure_dir, snapshot, TreeEntry};
use crate::sync::context::CycleContext;

pub(crate) async fn reconcile(ctx: Arc<CycleContext>) -> Result<()> {
    let entries = snapshot(ctx.config.source_root())
        .await
        .with_context(|| format!("Failed to scan source directory {}", ctx.config.source_display()))?;

    for dir in entries.iter().filter(|e| e.is_dir()) {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        ctx.report(create_replica_dir(&ctx, &dir.relative).await);
    }

    let mut units = JoinSet::new();
    for entry in entries.into_iter().filter(|e| e.is_file()) {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let ctx = Arc::clone(&ctx);
        units.spawn(async move { reconcile_file(&ctx, &entry).await });
    }
    ctx.join_units(units).await;

    Ok(())
}

async fn create_replica_dir(ctx: &CycleContext, relative: &Path) -> Result<()> {
    let target = ctx.config.in_replica(relative);

    // A file stands where the directory belongs
    if let Ok(meta) = tokio::fs::symlink_metadata(&target).await {
        if !meta.is_dir() && delete_file(&target, &ctx.config.retry).await? {
            ctx.counters.record_file_deleted();
        }
    }

    if ensure_dir(&target).await? {
        ctx.counters.record_dir_created();
        ctx.logger.log(format!("Created directory {}", target.display()));
    }
    Ok(())
}

async fn reconcile_file(ctx: &CycleContext, entry: &TreeEntry) -> Result<()> {
    let source = ctx.config.in_source(&entry.relative);
    let target = ctx.config.in_replica(&entry.relative);

    if !should_copy(ctx, entry, &source, &target).await? {
        return Ok(());
    }

    let bytes = copy_file(&source, &target, &ctx.config.retry).await?;
    ctx.counters.record_copy(bytes);
    ctx.logger
        .log(format!("Copied {} to {}", source.display(), target.display()));
    Ok(())
}

/// Missing target, a directory or symlink in the way, newer source,
/// different size, or different content.
async fn should_copy(ctx: &CycleContext, entry: &TreeEntry, source: &Path, target: &Path) -> Result<bool> {
    let target_meta = match tokio::fs::symlink_metadata(target).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => {
            return Err(MirrorError::from_io_error(e, "reading metadata of", Some(target.to_path_buf())).into())
        }
    };

    if target_meta.is_dir() {
        if delete_dir(target, &ctx.config.retry).await? {
            ctx.counters.record_dir_deleted();
        }
        return Ok(true);
    }

    // Replace the link itself; copying through it would write outside the replica
    if target_meta.file_type().is_symlink() {
        if delete_file(target, &ctx.config.retry).await? {
            ctx.counters.record_file_deleted();
        }
        return Ok(true);
    }

    let target_modified = target_meta.modified().ok().map(DateTime::<Utc>::from);
    if let (Some(source_modified), Some(target_modified)) = (entry.modified, target_modified) {
        if source_modified > target_modified {
            return Ok(true);
        }
    }

    if entry.size != target_meta.len() {
        return Ok(true);
    }

    let equal = files_equal_async(ctx.config.comparator, source.to_path_buf(), target.to_path_buf())
        .await
        .with_context(|| {
            format!(
                "Failed to compare {} with {} ({})",
                source.display(),
                target.display(),
                ctx.config.comparator
            )
        })?;
    Ok(!equal)
}
