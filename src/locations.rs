//! Library file counts per major folder location.

use rustc_hash::FxHashMap;

/// Major location of a file: its first four `/`-separated parts, or its
/// parent folder for shallow paths.
///
/// `/Users/dj/Music/House/a.mp3` → `/Users/dj/Music`
pub fn major_location(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 3 {
        parts[..4].join("/")
    } else {
        parts[..parts.len().saturating_sub(1)].join("/")
    }
}

/// Count files per major location, smallest count first.
pub fn count_locations<S: AsRef<str>>(paths: &[S]) -> Vec<(String, usize)> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for path in paths {
        *counts.entry(major_location(path.as_ref())).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
