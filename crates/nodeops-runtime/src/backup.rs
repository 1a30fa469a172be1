//! Node root archives written by `backup` and consumed by `restore`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::info;

use nodeops_core::config::NodePaths;

fn archive_name() -> String {
    format!("backup-{}.tar.gz", chrono::Utc::now().format("%Y-%m-%d-%H-%M-%S"))
}

/// What a backup leaves out of the node root.
struct Exclusions {
    /// Backup destination, when it lives under the root.
    dest_dir: PathBuf,
    /// Initialization witness; only a completed restore may write it.
    witness: PathBuf,
}

impl Exclusions {
    fn skips(&self, path: &Path) -> bool {
        if path.extension().is_some_and(|ext| ext == "lock") || path == self.witness {
            return true;
        }
        path.is_dir() && fs::canonicalize(path).is_ok_and(|p| p == self.dest_dir)
    }
}

fn append_dir(
    builder: &mut tar::Builder<GzEncoder<File>>,
    root: &Path,
    dir: &Path,
    skip: &Exclusions,
) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if skip.skips(&path) {
            continue;
        }
        let rel = path.strip_prefix(root)?;
        if path.is_dir() {
            builder.append_dir(rel, &path)?;
            append_dir(builder, root, &path, skip)?;
        } else {
            builder
                .append_path_with_name(&path, rel)
                .with_context(|| format!("Failed to archive {}", path.display()))?;
        }
    }
    Ok(())
}

/// Archive the node root into `dest_dir`. Lock files, the allocation
/// witness and the destination directory itself are left out.
pub fn create_backup(paths: &NodePaths, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
    let skip = Exclusions {
        dest_dir: fs::canonicalize(dest_dir)
            .with_context(|| format!("Failed to resolve {}", dest_dir.display()))?,
        witness: paths.resource_allocation(),
    };
    let archive = dest_dir.join(archive_name());
    let file = File::create(&archive)
        .with_context(|| format!("Failed to create {}", archive.display()))?;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    append_dir(&mut builder, &paths.root, &paths.root, &skip)?;
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .with_context(|| format!("Failed to finish {}", archive.display()))?;

    info!(archive = %archive.display(), "backup written");
    Ok(archive)
}

/// Unpack `archive` over the node root.
pub fn unpack_backup(archive: &Path, paths: &NodePaths) -> Result<()> {
    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    fs::create_dir_all(&paths.root)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(&paths.root)
        .with_context(|| format!("Failed to unpack {}", archive.display()))?;
    info!(archive = %archive.display(), root = %paths.root.display(), "backup unpacked");
    Ok(())
}
