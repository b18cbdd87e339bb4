use anyhow::{anyhow, Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{
    collections::HashSet,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use tracing::debug;
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

/// Adds files and directory trees to an archive on disk.
pub trait Archiver {
    /// Adds each source under its own file name, recursing into directories.
    /// Entries already in the archive with the same name are replaced.
    fn add(&mut self, archive: &Path, sources: &[PathBuf]) -> Result<()>;
}

/// Deflate-compressed zip archives, the container format the SMPC tool reads.
#[derive(Debug, Default)]
pub struct ZipArchiver;

/// Removes a half-written archive unless the write completed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

struct PendingEntry {
    name: String,
    source: Option<PathBuf>,
}

impl Archiver for ZipArchiver {
    fn add(&mut self, archive: &Path, sources: &[PathBuf]) -> Result<()> {
        let mut pending = Vec::new();
        for source in sources {
            collect_entries(source, &mut pending)?;
        }
        let names: HashSet<&str> = pending.iter().map(|entry| entry.name.as_str()).collect();

        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent).context("create archive dir")?;
        }
        let temp = temp_archive_path(archive);
        let out = File::create(&temp).context("create archive temp")?;
        let mut temp_guard = TempFileGuard::new(temp.clone());
        let mut writer = ZipWriter::new(out);

        if archive.exists() {
            let existing = File::open(archive).context("open archive")?;
            let mut reader = ZipArchive::new(existing).context("read archive")?;
            for idx in 0..reader.len() {
                let entry = reader.by_index_raw(idx).context("archive entry")?;
                if names.contains(entry.name()) {
                    continue;
                }
                writer.raw_copy_file(entry).context("copy archive entry")?;
            }
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &pending {
            match &entry.source {
                Some(path) => {
                    writer
                        .start_file(entry.name.as_str(), options)
                        .with_context(|| format!("start archive entry {}", entry.name))?;
                    let mut file =
                        File::open(path).with_context(|| format!("open {}", path.display()))?;
                    io::copy(&mut file, &mut writer).context("compress archive entry")?;
                }
                None => {
                    writer
                        .add_directory(entry.name.as_str(), options)
                        .with_context(|| format!("add archive dir {}", entry.name))?;
                }
            }
        }
        writer.finish().context("finish archive")?;

        fs::rename(&temp, archive).context("finalize archive")?;
        temp_guard.disarm();
        debug!(archive = %archive.display(), entries = pending.len(), "archive updated");
        Ok(())
    }
}

fn collect_entries(source: &Path, pending: &mut Vec<PendingEntry>) -> Result<()> {
    let base = source.parent().unwrap_or_else(|| Path::new(""));
    if source.is_file() {
        pending.push(PendingEntry {
            name: entry_name(source, base)?,
            source: Some(source.to_path_buf()),
        });
        return Ok(());
    }
    if !source.is_dir() {
        return Err(anyhow!("archive source missing: {}", source.display()));
    }
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let name = entry_name(entry.path(), base)?;
        if entry.file_type().is_dir() {
            pending.push(PendingEntry {
                name: format!("{name}/"),
                source: None,
            });
        } else if entry.file_type().is_file() {
            pending.push(PendingEntry {
                name,
                source: Some(entry.path().to_path_buf()),
            });
        }
    }
    Ok(())
}

fn entry_name(path: &Path, base: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).context("archive entry path")?;
    let parts: Vec<String> = rel
        .components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect();
    Ok(parts.join("/"))
}

fn temp_archive_path(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    archive.with_file_name(name)
}

/// Unpacks a zip, 7z or rar archive. The system `7z` is preferred when present.
pub fn extract(path: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).context("create extraction dir")?;
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "7z" => extract_7z(path, dest),
        "rar" => match extract_with_7z(path, dest)? {
            Some(()) => Ok(()),
            None => Err(anyhow!("rar archives need the 7z executable")),
        },
        _ => extract_zip(path, dest),
    }
}

fn extract_zip(path: &Path, dest: &Path) -> Result<()> {
    match extract_with_7z(path, dest) {
        Ok(Some(())) => return Ok(()),
        Ok(None) => {}
        Err(err) => return Err(err),
    }

    let file = File::open(path).context("open zip")?;
    let mut archive = ZipArchive::new(file).context("read zip")?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("zip entry")?;
        let Some(out_path) = file.enclosed_name() else {
            continue;
        };

        let out_path = dest.join(out_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path).context("create zip dir")?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).context("create zip dir")?;
        }

        let mut out_file = File::create(&out_path).context("write zip entry")?;
        io::copy(&mut file, &mut out_file).context("extract zip entry")?;
        if let Some(mtime) = file.last_modified().and_then(zip_time_to_unix) {
            let _ = set_file_mtime(&out_path, FileTime::from_unix_time(mtime, 0));
        }
    }

    Ok(())
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}

fn extract_7z(path: &Path, dest: &Path) -> Result<()> {
    match extract_with_7z(path, dest)? {
        Some(()) => Ok(()),
        None => sevenz_rust::decompress_file(path, dest)
            .with_context(|| format!("extract 7z archive {path:?}")),
    }
}

fn extract_with_7z(path: &Path, dest: &Path) -> Result<Option<()>> {
    let output = Command::new("7z")
        .arg("x")
        .arg("-y")
        .arg(format!("-o{}", dest.display()))
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).context("launch 7z"),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("7z extraction failed: {}", stderr.trim()));
    }

    Ok(Some(()))
}

/// Entry names of a zip archive, in archive order.
pub fn list_zip_entries(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).context("open zip")?;
    let archive = ZipArchive::new(file).context("read zip")?;
    Ok(archive.file_names().map(|name| name.to_string()).collect())
}
