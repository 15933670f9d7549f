//! Output file naming and missing-frame detection.
//!
//! Rendered frames are named `{prefix}_{frame:04}.{ext}`; the averaged image
//! is `{prefix}_average.{ext}`. A file whose name contains `seed` after the
//! `{prefix}_` part is an intermediate sample and never counts as a finished
//! frame. Markers are never matched against the prefix itself.

use std::fs;
use std::io;
use std::path::Path;

use super::types::FrameSet;

/// Marker carried by intermediate sample files.
pub const SEED_MARKER: &str = "seed";

/// Marker carried by the averaged result.
pub const AVERAGE_MARKER: &str = "average";

/// File name of a finished frame.
pub fn frame_file_name(prefix: &str, frame: u32, extension: &str) -> String {
    format!("{}_{:04}.{}", prefix, frame, extension)
}

/// File name of the averaged image for a prefix.
pub fn average_file_name(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, AVERAGE_MARKER, extension)
}

/// Part of `name` after `{prefix}_`, if `name` belongs to `prefix`.
fn strip_output_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)?.strip_prefix('_')
}

/// Whether the part after `{prefix}_` names the averaged image, whatever its
/// extension.
fn is_average_file(rest: &str) -> bool {
    rest.split('.').next() == Some(AVERAGE_MARKER)
}

/// Whether a file name is an intermediate sample of `prefix`.
pub fn is_sample_file(name: &str, prefix: &str) -> bool {
    match strip_output_prefix(name, prefix) {
        Some(rest) => rest.contains(SEED_MARKER) && !is_average_file(rest),
        None => false,
    }
}

/// Frame number encoded in a finished-frame file name, if it is one.
///
/// The name must start with `{prefix}_` followed by digits up to the first
/// `.`; sample and average files never match.
pub fn frame_number(name: &str, prefix: &str) -> Option<u32> {
    let rest = strip_output_prefix(name, prefix)?;
    let digits = rest.split('.').next()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Frames present among `names` for the given prefix.
pub fn present_frames<'a>(names: impl IntoIterator<Item = &'a str>, prefix: &str) -> FrameSet {
    names
        .into_iter()
        .filter_map(|name| frame_number(name, prefix))
        .collect()
}

/// Frames of `expected` with no matching file among `names`.
pub fn missing<'a>(
    expected: &FrameSet,
    names: impl IntoIterator<Item = &'a str>,
    prefix: &str,
) -> FrameSet {
    expected.difference(&present_frames(names, prefix))
}

/// Regular file names directly inside `dir`.
///
/// A directory that does not exist yet is treated as empty.
pub fn list_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn names_follow_output_grammar() {
        assert_eq!(frame_file_name("shot", 7, "png"), "shot_0007.png");
        assert_eq!(frame_file_name("shot", 12345, "exr"), "shot_12345.exr");
        assert_eq!(average_file_name("shot", "tga"), "shot_average.tga");
    }

    #[test]
    fn frame_number_skips_samples_and_average() {
        assert_eq!(frame_number("shot_0012.png", "shot"), Some(12));
        assert_eq!(frame_number("shot_seed-3_0012.png", "shot"), None);
        assert_eq!(frame_number("shot_average.png", "shot"), None);
        assert_eq!(frame_number("other_0012.png", "shot"), None);
        assert_eq!(frame_number("shot_12a.png", "shot"), None);
        assert_eq!(frame_number("shot_.png", "shot"), None);
    }

    #[test]
    fn markers_inside_the_prefix_are_ignored() {
        assert_eq!(frame_number("average_shot_0001.png", "average_shot"), Some(1));
        let names = ["average_shot_0001.png", "average_shot_0002.png"];
        assert!(missing(&FrameSet::span(1, 2).unwrap(), names, "average_shot").is_empty());

        assert!(is_sample_file("seedling_seed-1_0001.png", "seedling"));
        assert!(!is_sample_file("seedling_0001.png", "seedling"));
        assert!(!is_sample_file("seedling_average.png", "seedling"));
        assert!(!is_sample_file("other_seed-1_0001.png", "seedling"));
    }

    #[test]
    fn missing_returns_absent_frames() {
        let expected = FrameSet::span(1, 4).unwrap();
        let names = ["shot_0001.png", "shot_0003.png", "shot_seed-1_0002.png"];
        assert_eq!(
            missing(&expected, names, "shot"),
            FrameSet::from(vec![2, 4])
        );
    }

    #[test]
    fn lists_only_regular_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b_0002.png"), b"x").unwrap();
        fs::write(dir.path().join("a_0001.png"), b"x").unwrap();
        fs::create_dir(dir.path().join("backups")).unwrap();

        let names = list_file_names(dir.path()).unwrap();
        assert_eq!(names, vec!["a_0001.png", "b_0002.png"]);

        let absent = list_file_names(&dir.path().join("nope")).unwrap();
        assert!(absent.is_empty());
    }
}
