use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use tar::{Builder, Header};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::UpgradeError;

/// Writes `source` as a gzip'd tar at `output`. Entry paths are relative to
/// `source` and carry the file mode. A failed backup leaves `output` partial.
pub fn backup(output: &Path, source: &Path) -> Result<(), UpgradeError> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(UpgradeError::fs("create", parent))?;
    }
    let file = File::create(output).map_err(UpgradeError::fs("create", output))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut entries = 0usize;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| UpgradeError::archive(source, err))?;
        let path = entry.path();
        let name = path
            .strip_prefix(source)
            .map_err(|err| UpgradeError::archive(path, err))?;
        if name.as_os_str().is_empty() {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder
                .append_dir(name, path)
                .map_err(UpgradeError::fs("archive", path))?;
        } else if file_type.is_file() {
            let mut file = File::open(path).map_err(UpgradeError::fs("open", path))?;
            builder
                .append_file(name, &mut file)
                .map_err(UpgradeError::fs("archive", path))?;
        } else {
            append_header_only(&mut builder, name, path)?;
        }
        entries += 1;
    }

    let encoder = builder
        .into_inner()
        .map_err(UpgradeError::fs("finish", output))?;
    encoder
        .finish()
        .and_then(|mut writer| io::Write::flush(&mut writer))
        .map_err(UpgradeError::fs("finish", output))?;
    tracing::info!(source = %source.display(), output = %output.display(), entries, "backup written");
    Ok(())
}

/// Symlinks, fifos and friends: metadata only, no content.
fn append_header_only<W: io::Write>(
    builder: &mut Builder<W>,
    name: &Path,
    path: &Path,
) -> Result<(), UpgradeError> {
    let meta = fs::symlink_metadata(path).map_err(UpgradeError::fs("stat", path))?;
    let mut header = Header::new_gnu();
    header.set_metadata(&meta);
    header.set_size(0);
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path).map_err(UpgradeError::fs("read link", path))?;
        builder
            .append_link(&mut header, name, target)
            .map_err(UpgradeError::fs("archive", path))
    } else {
        builder
            .append_data(&mut header, name, io::empty())
            .map_err(UpgradeError::fs("archive", path))
    }
}

/// Unpacks the zip at `archive` into `dest`, creating directories as needed.
/// A failed extraction leaves whatever was already written in place.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize, UpgradeError> {
    let file = File::open(archive).map_err(UpgradeError::fs("open", archive))?;
    let mut zip = ZipArchive::new(file).map_err(|err| UpgradeError::archive(archive, err))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| UpgradeError::archive(archive, err))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            UpgradeError::archive(
                archive,
                format!("entry '{}' escapes the target directory", entry.name()),
            )
        })?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(UpgradeError::fs("create", &target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(UpgradeError::fs("create", parent))?;
        }
        let mut out = File::create(&target).map_err(UpgradeError::fs("create", &target))?;
        io::copy(&mut entry, &mut out).map_err(UpgradeError::fs("write", &target))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(UpgradeError::fs("chmod", &target))?;
            }
        }
    }

    tracing::info!(archive = %archive.display(), dest = %dest.display(), entries = zip.len(), "archive extracted");
    Ok(zip.len())
}
