//! Plugin archive extraction
//!
//! Plugins arrive as zip bundles. GitHub branch archives wrap everything in
//! a `<repo>-<branch>/` folder, so the manifest may sit one level down.

use sdk::errors::{ParseFailure, PluginError};
use sdk::manifest::FileContent;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

pub const MANIFEST_NAME: &str = "plugin.json";

/// Install pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    LoadArchive,
    Decompress,
    Validate,
    ExtractFiles,
    Persist,
    Complete,
}

impl InstallPhase {
    /// Percentage reported when the phase starts
    pub fn percent(self) -> u8 {
        match self {
            Self::LoadArchive => 10,
            Self::Decompress => 30,
            Self::Validate => 50,
            Self::ExtractFiles => 60,
            Self::Persist => 95,
            Self::Complete => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LoadArchive => "Loading archive",
            Self::Decompress => "Decompressing",
            Self::Validate => "Validating plugin.json",
            Self::ExtractFiles => "Extracting files",
            Self::Persist => "Saving",
            Self::Complete => "Complete",
        }
    }
}

/// One progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallProgress {
    pub phase: InstallPhase,
    pub percent: u8,
}

impl InstallProgress {
    pub fn at(phase: InstallPhase) -> Self {
        Self {
            phase,
            percent: phase.percent(),
        }
    }

    /// File-extraction progress, spanning 60 to 90
    pub fn extracting(processed: usize, total: usize) -> Self {
        let span = if total == 0 {
            30
        } else {
            (processed.min(total) * 30 / total) as u8
        };

        Self {
            phase: InstallPhase::ExtractFiles,
            percent: InstallPhase::ExtractFiles.percent() + span,
        }
    }
}

/// Progress callback handed through the install pipeline
pub type ProgressFn<'a> = &'a mut dyn FnMut(InstallProgress);

/// Everything an install needs from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    pub manifest_text: String,
    pub files: BTreeMap<String, FileContent>,
}

/// An opened plugin zip
pub struct PluginArchive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> PluginArchive<'a> {
    /// Read the zip container
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidArchive`] when `bytes` is not a zip.
    pub fn open(bytes: &'a [u8], progress: ProgressFn<'_>) -> Result<Self, PluginError> {
        progress(InstallProgress::at(InstallPhase::LoadArchive));

        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| PluginError::InvalidArchive(e.to_string()))?;

        progress(InstallProgress::at(InstallPhase::Decompress));
        debug!("Opened plugin archive with {} entries", zip.len());

        Ok(Self { zip })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Text of the manifest
    ///
    /// A root `plugin.json` wins; otherwise the first file in archive order
    /// whose path ends with `plugin.json`.
    pub fn manifest_text(&mut self) -> Result<String, PluginError> {
        let index = self.manifest_index().ok_or(PluginError::ManifestMissing)?;

        let mut entry = self
            .zip
            .by_index(index)
            .map_err(|e| PluginError::InvalidArchive(e.to_string()))?;

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| PluginError::ManifestParse {
                reason: ParseFailure::Syntax,
                detail: format!("plugin.json is not UTF-8 text: {}", e),
            })?;

        debug!("Manifest found at {}", entry.name());
        Ok(text)
    }

    fn manifest_index(&mut self) -> Option<usize> {
        let mut fallback = None;

        for i in 0..self.zip.len() {
            let Ok(entry) = self.zip.by_index_raw(i) else {
                continue;
            };
            if entry.is_dir() {
                continue;
            }
            if entry.name() == MANIFEST_NAME {
                return Some(i);
            }
            if fallback.is_none() && entry.name().ends_with(MANIFEST_NAME) {
                fallback = Some(i);
            }
        }

        fallback
    }

    /// Decode every file entry, in archive order
    ///
    /// Entries that cannot be read or are not UTF-8 are kept as binary
    /// placeholders.
    pub fn extract_files(&mut self, progress: ProgressFn<'_>) -> BTreeMap<String, FileContent> {
        let indices: Vec<usize> = (0..self.zip.len())
            .filter(|&i| self.zip.by_index_raw(i).is_ok_and(|entry| !entry.is_dir()))
            .collect();
        let total = indices.len();

        progress(InstallProgress::at(InstallPhase::ExtractFiles));

        let mut files = BTreeMap::new();
        for (processed, i) in indices.into_iter().enumerate() {
            if let Some((name, content)) = self.read_entry(i) {
                files.insert(name, content);
            }
            progress(InstallProgress::extracting(processed + 1, total));
        }

        if total == 0 {
            progress(InstallProgress::extracting(0, 0));
        }

        files
    }

    fn read_entry(&mut self, index: usize) -> Option<(String, FileContent)> {
        let mut entry = match self.zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable archive entry #{}: {}", index, e);
                return None;
            }
        };
        let name = entry.name().to_string();

        let mut bytes = Vec::new();
        if let Err(e) = entry.read_to_end(&mut bytes) {
            warn!("Failed to read {}, storing as binary: {}", name, e);
            return Some((name, FileContent::binary()));
        }

        let content = match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(_) => {
                warn!("{} is not UTF-8 text, storing as binary", name);
                FileContent::binary()
            }
        };

        Some((name, content))
    }
}

/// Open an archive, read its manifest, and decode its files
pub fn extract(bytes: &[u8], progress: ProgressFn<'_>) -> Result<ExtractedArchive, PluginError> {
    let mut archive = PluginArchive::open(bytes, &mut *progress)?;
    let manifest_text = archive.manifest_text()?;
    let files = archive.extract_files(progress);

    Ok(ExtractedArchive {
        manifest_text,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_root_manifest_wins() {
        let bytes = build_zip(&[
            ("nested/plugin.json", b"{\"id\":\"nested\"}"),
            ("plugin.json", b"{\"id\":\"root\"}"),
        ]);
        let mut archive = PluginArchive::open(&bytes, &mut |_| {}).unwrap();
        assert_eq!(archive.manifest_text().unwrap(), "{\"id\":\"root\"}");
    }

    #[test]
    fn test_first_nested_manifest_in_archive_order() {
        let bytes = build_zip(&[
            ("repo-main/", b""),
            ("repo-main/b/plugin.json", b"{\"id\":\"b\"}"),
            ("repo-main/a/plugin.json", b"{\"id\":\"a\"}"),
        ]);
        let mut archive = PluginArchive::open(&bytes, &mut |_| {}).unwrap();
        assert_eq!(archive.manifest_text().unwrap(), "{\"id\":\"b\"}");
    }

    #[test]
    fn test_missing_manifest() {
        let bytes = build_zip(&[("main.js", b"api.info();")]);
        let mut archive = PluginArchive::open(&bytes, &mut |_| {}).unwrap();
        assert!(matches!(
            archive.manifest_text(),
            Err(PluginError::ManifestMissing)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            PluginArchive::open(b"definitely not a zip", &mut |_| {}),
            Err(PluginError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_binary_entries_become_placeholders() {
        let bytes = build_zip(&[
            ("plugin.json", b"{}"),
            ("icon.png", &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]),
            ("dir/", b""),
        ]);
        let extracted = extract(&bytes, &mut |_| {}).unwrap();

        assert_eq!(extracted.files.len(), 2);
        assert!(extracted.files["icon.png"].is_binary());
        assert_eq!(extracted.files["plugin.json"].as_text(), Some("{}"));
    }

    #[test]
    fn test_progress_is_non_decreasing_and_bounded() {
        let bytes = build_zip(&[
            ("plugin.json", b"{}"),
            ("a.js", b"1"),
            ("b.js", b"2"),
            ("c.js", b"3"),
        ]);

        let mut seen = Vec::new();
        extract(&bytes, &mut |p| seen.push(p)).unwrap();

        assert_eq!(seen[0], InstallProgress::at(InstallPhase::LoadArchive));
        assert_eq!(seen[1], InstallProgress::at(InstallPhase::Decompress));
        assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));

        let extracting: Vec<u8> = seen
            .iter()
            .filter(|p| p.phase == InstallPhase::ExtractFiles)
            .map(|p| p.percent)
            .collect();
        assert_eq!(extracting, vec![60, 67, 75, 82, 90]);
    }

    #[test]
    fn test_extracting_percent_formula() {
        assert_eq!(InstallProgress::extracting(0, 10).percent, 60);
        assert_eq!(InstallProgress::extracting(5, 10).percent, 75);
        assert_eq!(InstallProgress::extracting(10, 10).percent, 90);
        assert_eq!(InstallProgress::extracting(0, 0).percent, 90);
    }
}
