use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use log::{debug, info, warn};
use std::{
    fs::{self, File, Metadata, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

// Fixed width so that lexical order of archive names is chronological order.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// Entries at least this large need ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Creates a zip archive of `src` inside `dst` and returns the archive path.
///
/// The archive is named `<src basename><YYYYMMDDHHMMSS>.zip` using the current
/// local time. An archive with the same name is never overwritten; a `_N`
/// suffix is added instead. `dst` is created if it does not exist.
pub fn create_backup(src: &Path, dst: &Path, method: CompressionMethod) -> Result<PathBuf> {
    create_backup_at(src, dst, method, Local::now())
}

fn create_backup_at(
    src: &Path,
    dst: &Path,
    method: CompressionMethod,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let metadata = fs::metadata(src)
        .with_context(|| format!("cannot read source directory {}", src.display()))?;
    if !metadata.is_dir() {
        bail!("source {} is not a directory", src.display());
    }
    let src = src
        .canonicalize()
        .with_context(|| format!("cannot resolve source directory {}", src.display()))?;

    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create destination directory {}", dst.display()))?;

    let stem = backup_stem(&src, now);
    let (path, file) = create_archive_file(dst, &stem)?;
    info!("Archiving {} into {}", src.display(), path.display());

    if let Err(e) = write_archive(&src, file, &path, method) {
        if let Err(remove_err) = fs::remove_file(&path) {
            warn!(
                "could not remove partial archive {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(e);
    }

    println!("Backup created: {}", path.display());
    Ok(path)
}

fn backup_stem(src: &Path, now: DateTime<Local>) -> String {
    let name = src
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}", name, now.format(TIMESTAMP_FORMAT))
}

fn create_archive_file(dst: &Path, stem: &str) -> Result<(PathBuf, File)> {
    let mut attempt: u32 = 0;
    loop {
        let name = match attempt {
            0 => format!("{stem}.zip"),
            n => format!("{stem}_{n}.zip"),
        };
        let path = dst.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists", path.display());
                attempt += 1;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to create archive {}", path.display()))
            }
        }
    }
}

fn write_archive(src: &Path, file: File, archive: &Path, method: CompressionMethod) -> Result<()> {
    // Set when the destination lives inside the source tree.
    let own_path = archive.canonicalize().ok();

    let mut zip = ZipWriter::new(BufWriter::new(file));
    let base_options = FileOptions::default().compression_method(method);

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let path = entry.path();
        if own_path.as_deref() == Some(path) {
            debug!("skipping {}", path.display());
            continue;
        }

        let metadata = if entry.path_is_symlink() {
            match fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("skipping dangling symlink {}: {}", path.display(), e);
                    continue;
                }
            }
        } else {
            entry
                .metadata()
                .with_context(|| format!("cannot read metadata of {}", path.display()))?
        };

        let name = entry_name(src, path)?;
        let options = entry_options(base_options, &metadata);

        if metadata.is_dir() {
            debug!("adding directory {name}/");
            zip.add_directory(format!("{name}/"), options)
                .with_context(|| format!("failed to add directory {}", path.display()))?;
        } else if metadata.is_file() {
            debug!("adding {name}");
            let options = options.large_file(metadata.len() >= ZIP64_THRESHOLD);
            zip.start_file(name, options)
                .with_context(|| format!("failed to add {}", path.display()))?;
            let mut input =
                File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            io::copy(&mut input, &mut zip)
                .with_context(|| format!("failed to archive {}", path.display()))?;
        } else {
            warn!("skipping special file {}", path.display());
        }
    }

    let mut writer = zip
        .finish()
        .with_context(|| format!("failed to finish archive {}", archive.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write archive {}", archive.display()))?;
    Ok(())
}

/// Archive entry name of `path`: relative to `root`, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn entry_options(base: FileOptions, metadata: &Metadata) -> FileOptions {
    let mut options = base;
    if let Some(time) = metadata.modified().ok().and_then(zip_time) {
        options = options.last_modified_time(time);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode() & 0o7777);
    }
    options
}

// None outside the 1980..=2107 range zip can represent.
fn zip_time(time: SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}
