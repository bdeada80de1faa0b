use anyhow::{Context, Result};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Removes files in `dst` whose modification time is more than `days` whole
/// days in the past. A negative `days` disables removal.
///
/// Only direct entries that are regular files are considered; subdirectories
/// are left alone. Returns the removed paths. The first failure aborts the
/// sweep.
pub fn delete_old_backups(dst: &Path, days: i64) -> Result<Vec<PathBuf>> {
    delete_old_backups_at(dst, days, SystemTime::now())
}

fn delete_old_backups_at(dst: &Path, days: i64, now: SystemTime) -> Result<Vec<PathBuf>> {
    let Ok(max_age) = u64::try_from(days) else {
        info!("Retention disabled, keeping all backups");
        return Ok(Vec::new());
    };

    let mut removed = Vec::new();
    let entries = fs::read_dir(dst)
        .with_context(|| format!("cannot read destination directory {}", dst.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("cannot read entry in {}", dst.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if !file_type.is_file() {
            debug!("skipping {}", path.display());
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("cannot read modification time of {}", path.display()))?;
        let age = age_in_days(modified, now);
        if age > max_age {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            println!("Removed backup: {}", path.display());
            removed.push(path);
        } else {
            debug!("keeping {} ({} days old)", path.display(), age);
        }
    }

    Ok(removed)
}

/// Whole days elapsed between `modified` and `now`, truncated. Times in the
/// future count as zero days old.
pub fn age_in_days(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .map(|age| age.as_secs() / SECONDS_PER_DAY)
        .unwrap_or(0)
}
