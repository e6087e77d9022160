//! C3: VFX frame-sequence parsing, shot grouping, and per-shot stride
//! sampling. The frame regex and the grouping-then-sampling pipeline are
//! ported from the reference implementation's `pathmap.py` (reduce mode)
//! and `filein.py` (`log_sequences`), which apply the identical pattern.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;

/// A parsed VFX frame filename: `stem`, `frame`, and `extension` (with dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMatch {
    pub stem: String,
    pub separator: char,
    pub frame: i64,
    pub extension: String,
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)([._])(\d+)(\.[A-Za-z0-9]+)$").unwrap())
}

/// Matches a basename (no directory component) against the frame-filename
/// pattern. Returns `None` for non-sequence files, which form singleton
/// shots.
pub fn match_frame(basename: &str) -> Option<FrameMatch> {
    let caps = frame_re().captures(basename)?;
    Some(FrameMatch {
        stem: caps[1].to_string(),
        separator: caps[2].chars().next().unwrap(),
        frame: caps[3].parse().ok()?,
        extension: caps[4].to_string(),
    })
}

/// Groups a list of paths into shots, preserving first-seen order of both
/// shots and members within a shot. The key is `(directory, stem,
/// extension)`; non-matching paths become singleton shots keyed by the
/// whole path.
pub fn group_by_shot(paths: &[String]) -> Vec<Vec<usize>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut first_seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for (i, path) in paths.iter().enumerate() {
        let basename = std::path::Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let dir = std::path::Path::new(path)
            .parent()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let key = match match_frame(&basename) {
            Some(m) => format!("{dir}\u{0}{}\u{0}{}", m.stem, m.extension),
            None => format!("singleton\u{0}{path}"),
        };

        if !first_seen.contains_key(&key) {
            first_seen.insert(key.clone(), order.len());
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(i);
    }

    order.into_iter().map(|k| groups.remove(&k).unwrap()).collect()
}

/// Rounds half to even (banker's rounding), matching the source
/// implementation's use of Python's `round()`.
fn round_half_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}

/// Computes the indices (into a shot of size `n`, in original order) kept by
/// stride sampling at `file_amount`. `k = max(min(2, n), floor(n *
/// file_amount))`, clamped to `n`; picks `round(j * (n-1) / (k-1))` for `j`
/// in `0..k`, deduplicated, in ascending order.
pub fn stride_indices(n: usize, file_amount: f64) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let k_raw = (n as f64 * file_amount).floor() as usize;
    let k = k_raw.max(n.min(2)).min(n);
    if k == 0 {
        return Vec::new();
    }
    if k == 1 {
        return vec![0];
    }

    let mut indices: Vec<usize> = (0..k)
        .map(|j| round_half_even(j as f64 * (n - 1) as f64 / (k - 1) as f64) as usize)
        .unique()
        .collect();
    indices.sort_unstable();
    indices
}

/// Every-Nth decimation over an already-sampled list of length `n`: keeps
/// indices `0, every_nth, 2*every_nth, ...`.
pub fn every_nth_indices(n: usize, every_nth: usize) -> Vec<usize> {
    if every_nth == 0 {
        return (0..n).collect();
    }
    (0..n).step_by(every_nth).collect()
}

/// Collapses a (not necessarily sorted) list of frame numbers into a
/// human-readable range summary, e.g. `1001-1005, 1007`.
pub fn format_ranges(frames: &[i64]) -> String {
    if frames.is_empty() {
        return String::new();
    }
    let mut sorted = frames.to_vec();
    sorted.sort_unstable();

    let mut ranges = Vec::new();
    let mut start = sorted[0];
    let mut prev = sorted[0];
    for &f in &sorted[1..] {
        if f == prev + 1 {
            prev = f;
        } else {
            ranges.push(format_range(start, prev));
            start = f;
            prev = f;
        }
    }
    ranges.push(format_range(start, prev));
    ranges.join(", ")
}

fn format_range(start: i64, end: i64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn matches_dot_and_underscore_separators() {
        let m = match_frame("shot.1001.exr").unwrap();
        assert_eq!(m.stem, "shot");
        assert_eq!(m.frame, 1001);
        assert_eq!(m.extension, ".exr");

        let m = match_frame("shot_1001.exr").unwrap();
        assert_eq!(m.separator, '_');
    }

    #[test]
    fn non_sequence_file_does_not_match() {
        assert!(match_frame("readme.txt").is_none());
    }

    #[test]
    fn groups_two_shots_in_first_seen_order() {
        let paths: Vec<String> = vec![
            "/in/shotA.1001.exr",
            "/in/shotB.1001.exr",
            "/in/shotA.1002.exr",
            "/in/shotB.1002.exr",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let groups = group_by_shot(&paths);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![0, 2]);
        assert_eq!(groups[1], vec![1, 3]);
    }

    #[test]
    fn stride_sampling_matches_scenario() {
        assert_eq!(stride_indices(10, 0.3), vec![0, 4, 9]);
    }

    #[test]
    fn stride_keeps_all_at_full_amount() {
        assert_eq!(stride_indices(10, 1.0), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn stride_keeps_minimum_two_frames() {
        assert_eq!(stride_indices(5, 0.1).len(), 2);
    }

    #[test]
    fn single_frame_shot_clamped_to_one() {
        assert_eq!(stride_indices(1, 0.5), vec![0]);
    }

    #[test]
    fn every_nth_after_full_sample() {
        let sampled = stride_indices(10, 1.0);
        let picked = every_nth_indices(sampled.len(), 3);
        assert_eq!(picked, vec![0, 3, 6, 9]);
    }

    #[test]
    fn format_ranges_collapses_contiguous_runs() {
        assert_eq!(format_ranges(&[1001, 1002, 1003, 1004, 1005, 1007]), "1001-1005, 1007");
    }
}
