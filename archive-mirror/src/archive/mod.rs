//! Archive sets: naming rules, volume ordering and timestamps.
//!
//! An archive file is named `<base>.tar` (volume 0, the sole or first
//! volume) or `<base>.tar.<N>` (volume N). The base name, including the
//! `.tar`, identifies the set; by convention it embeds the creation time as
//! `_YYYYMMDD_HHMMSS_`.

pub mod ignore;
pub mod locator;

pub use ignore::IgnoreList;
pub use locator::locate_archive_sets;

use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

const TAR_EXT: &str = ".tar";
const TAR_VOLUME_MARK: &str = ".tar.";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A single archive volume on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFile {
    /// Full path to the file
    pub path: PathBuf,

    /// File name, also used as the remote file name
    pub name: String,

    /// File size in bytes
    pub size: u64,

    /// Volume number (0 for the sole or first volume)
    pub volume: u32,
}

/// Outcome of a set within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetStatus {
    #[default]
    Unknown,
    Uploaded,
    Failed,
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetStatus::Unknown => "unknown",
            SetStatus::Uploaded => "uploaded",
            SetStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One logical backup: all volumes sharing a base name.
#[derive(Debug, Clone)]
pub struct ArchiveSet {
    pub base_name: String,

    /// Volumes, ascending by volume number
    pub volumes: Vec<VolumeFile>,

    /// Creation time embedded in the base name, if any
    pub timestamp: Option<NaiveDateTime>,

    pub status: SetStatus,
}

impl ArchiveSet {
    pub fn new(base_name: impl Into<String>) -> Self {
        let base_name = base_name.into();
        let timestamp = parse_timestamp(&base_name);
        Self {
            base_name,
            volumes: Vec::new(),
            timestamp,
            status: SetStatus::Unknown,
        }
    }

    /// Add a volume, keeping the volume order.
    pub fn push(&mut self, volume: VolumeFile) {
        self.volumes.push(volume);
        // Name breaks ties so colliding volume numbers still order deterministically.
        self.volumes
            .sort_by(|a, b| a.volume.cmp(&b.volume).then_with(|| a.name.cmp(&b.name)));
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.volumes.iter().map(|v| v.size).sum()
    }

    pub fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().map(|v| v.name.as_str())
    }

    /// Volume numbers that occur more than once in this set.
    pub fn duplicate_volumes(&self) -> Vec<u32> {
        let mut dups: Vec<u32> = self
            .volumes
            .windows(2)
            .filter(|w| w[0].volume == w[1].volume)
            .map(|w| w[0].volume)
            .collect();
        dups.dedup();
        dups
    }
}

/// Parsed volume suffix of an archive filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volume {
    /// `<base>.tar`
    First,
    /// `<base>.tar.<N>`
    Numbered(u32),
    /// `<base>.tar.<suffix>` where the suffix is not a number; counts as volume 0
    Unparseable,
}

impl Volume {
    pub fn number(self) -> u32 {
        match self {
            Volume::First | Volume::Unparseable => 0,
            Volume::Numbered(n) => n,
        }
    }
}

/// Returns true if the filename looks like an archive file (`*.tar` or `*.tar.*`).
pub fn is_archive_name(filename: &str) -> bool {
    filename.ends_with(TAR_EXT) || filename.contains(TAR_VOLUME_MARK)
}

/// Derive the set identity from an archive filename.
///
/// Returns `None` when the name is not an archive volume, e.g. when
/// stripping the trailing `.N` does not leave a name ending in `.tar`.
pub fn base_name(filename: &str) -> Option<&str> {
    if filename.ends_with(TAR_EXT) {
        return Some(filename);
    }
    if !filename.contains(TAR_VOLUME_MARK) {
        return None;
    }
    let (base, _) = filename.rsplit_once('.')?;
    base.ends_with(TAR_EXT).then_some(base)
}

/// Parse the volume suffix following the last `.tar.`.
pub fn parse_volume(filename: &str) -> Volume {
    if filename.ends_with(TAR_EXT) {
        return Volume::First;
    }
    match filename.rfind(TAR_VOLUME_MARK) {
        Some(idx) => match filename[idx + TAR_VOLUME_MARK.len()..].parse::<u32>() {
            Ok(n) => Volume::Numbered(n),
            Err(_) => Volume::Unparseable,
        },
        None => Volume::First,
    }
}

/// Volume number of an archive filename; unparseable suffixes yield 0.
pub fn volume_number(filename: &str) -> u32 {
    parse_volume(filename).number()
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(\d{8}_\d{6})_").expect("timestamp pattern is valid"))
}

/// Extract the `_YYYYMMDD_HHMMSS_` creation time from a base name.
pub fn parse_timestamp(base_name: &str) -> Option<NaiveDateTime> {
    let captures = timestamp_regex().captures(base_name)?;
    NaiveDateTime::parse_from_str(&captures[1], TIMESTAMP_FORMAT).ok()
}

/// Group bare filenames (e.g. a remote listing) by base name.
///
/// Names that are not archive volumes are skipped. Each group is sorted by
/// volume number.
pub fn group_names<'a, I>(names: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in names {
        if let Some(base) = base_name(name) {
            groups.entry(base.to_string()).or_default().push(name.to_string());
        }
    }
    for files in groups.values_mut() {
        files.sort_by(|a, b| volume_number(a).cmp(&volume_number(b)).then_with(|| a.cmp(b)));
    }
    groups
}
