//! Local archive discovery.
//!
//! Scans the top level of the source directory, keeps the files that follow
//! the archive naming convention and groups them into sets by base name.

use super::{base_name, is_archive_name, parse_volume, ArchiveSet, IgnoreList, Volume, VolumeFile};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Resolve an entry to its file size.
///
/// Symlinks are followed; links to directories and broken links yield `None`.
fn file_size(entry: &DirEntry) -> std::io::Result<Option<u64>> {
    let raw_metadata = entry.metadata()?;

    if raw_metadata.is_symlink() {
        return match std::fs::metadata(entry.path()) {
            Ok(resolved) if resolved.is_file() => Ok(Some(resolved.len())),
            _ => Ok(None),
        };
    }

    if raw_metadata.is_file() {
        Ok(Some(raw_metadata.len()))
    } else {
        Ok(None)
    }
}

/// Locate all archive sets in `root`.
///
/// The result is keyed by base name, so iteration order does not depend on
/// the order the directory is read in.
///
/// # Example
/// ```no_run
/// use archive_mirror::archive::{locate_archive_sets, IgnoreList};
/// use std::path::Path;
///
/// let sets = locate_archive_sets(Path::new("/var/backups"), &IgnoreList::default()).unwrap();
/// println!("Found {} archive sets", sets.len());
/// ```
pub fn locate_archive_sets(
    root: &Path,
    ignore: &IgnoreList,
) -> std::io::Result<BTreeMap<String, ArchiveSet>> {
    let mut sets: BTreeMap<String, ArchiveSet> = BTreeMap::new();

    let walker = WalkDir::new(root).min_depth(1).max_depth(1);

    for entry in walker {
        let entry = entry?;

        let Some(filename) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 filename: {}", entry.path().display());
            continue;
        };

        if !is_archive_name(filename) || ignore.matches(filename) {
            continue;
        }

        let Some(base) = base_name(filename) else {
            debug!("Not an archive volume: {}", filename);
            continue;
        };

        let Some(size) = file_size(&entry)? else {
            continue;
        };

        let volume = parse_volume(filename);
        if volume == Volume::Unparseable {
            warn!(
                file = %filename,
                "Volume suffix is not a valid volume number, treating it as volume 0"
            );
        }

        sets.entry(base.to_string())
            .or_insert_with(|| ArchiveSet::new(base))
            .push(VolumeFile {
                path: entry.path().to_path_buf(),
                name: filename.to_string(),
                size,
                volume: volume.number(),
            });
    }

    for set in sets.values() {
        let duplicates = set.duplicate_volumes();
        if !duplicates.is_empty() {
            warn!(
                base_name = %set.base_name,
                volumes = ?duplicates,
                "Archive set has colliding volume numbers"
            );
        }
    }

    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let sets = locate_archive_sets(temp_dir.path(), &IgnoreList::default())?;
        assert!(sets.is_empty());
        Ok(())
    }

    #[test]
    fn test_groups_volumes() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("db_20260101_000000_full_a.tar.2"), b"cc")?;
        fs::write(temp_dir.path().join("db_20260101_000000_full_a.tar"), b"a")?;
        fs::write(temp_dir.path().join("db_20260101_000000_full_a.tar.1"), b"bbbb")?;
        fs::write(temp_dir.path().join("db_20260102_000000_full_b.tar"), b"x")?;
        fs::write(temp_dir.path().join("notes.txt"), b"not an archive")?;
        fs::write(temp_dir.path().join("db.tar.1.bak"), b"not a volume")?;

        let sets = locate_archive_sets(temp_dir.path(), &IgnoreList::default())?;
        assert_eq!(sets.len(), 2);

        let first = &sets["db_20260101_000000_full_a.tar"];
        let volumes: Vec<u32> = first.volumes.iter().map(|v| v.volume).collect();
        assert_eq!(volumes, vec![0, 1, 2]);
        assert_eq!(first.volumes[1].size, 4);
        assert!(first.timestamp.is_some());

        assert_eq!(sets["db_20260102_000000_full_b.tar"].len(), 1);
        Ok(())
    }

    #[test]
    fn test_ignore_list_applied() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("db_20260101_000000_full.tar"), b"a")?;
        fs::write(temp_dir.path().join("db_20260101_000000_full.tar.1"), b"b")?;
        fs::write(temp_dir.path().join("tmp_20260101_000000_full.tar"), b"c")?;

        let ignore = IgnoreList::new(["*.tar.1", "tmp_"]);
        let sets = locate_archive_sets(temp_dir.path(), &ignore)?;

        assert_eq!(sets.len(), 1);
        assert_eq!(sets["db_20260101_000000_full.tar"].len(), 1);
        Ok(())
    }

    #[test]
    fn test_subdirectories_not_scanned() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("old.tar"))?;
        fs::create_dir(temp_dir.path().join("nested"))?;
        fs::write(temp_dir.path().join("nested/db_20260101_000000_full.tar"), b"a")?;

        let sets = locate_archive_sets(temp_dir.path(), &IgnoreList::default())?;
        assert!(sets.is_empty());
        Ok(())
    }

    #[test]
    fn test_unparseable_suffix_collides_with_volume_zero() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("db_20260101_000000_full.tar"), b"a")?;
        fs::write(temp_dir.path().join("db_20260101_000000_full.tar.gz"), b"b")?;

        let sets = locate_archive_sets(temp_dir.path(), &IgnoreList::default())?;
        let set = &sets["db_20260101_000000_full.tar"];

        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicate_volumes(), vec![0]);
        Ok(())
    }

    #[test]
    fn test_deterministic_grouping() -> std::io::Result<()> {
        let first = TempDir::new()?;
        let second = TempDir::new()?;
        let names = [
            "b_20260102_000000_full.tar.1",
            "a_20260101_000000_full.tar",
            "b_20260102_000000_full.tar",
        ];

        for name in names {
            fs::write(first.path().join(name), b"x")?;
        }
        for name in names.iter().rev() {
            fs::write(second.path().join(name), b"x")?;
        }

        let collect = |dir: &Path| -> std::io::Result<Vec<(String, Vec<String>)>> {
            Ok(locate_archive_sets(dir, &IgnoreList::default())?
                .into_values()
                .map(|s| (s.base_name.clone(), s.volume_names().map(String::from).collect()))
                .collect())
        };

        assert_eq!(collect(first.path())?, collect(second.path())?);
        Ok(())
    }
}
