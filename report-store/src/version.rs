/// Packs a version title like "v1.17.1-231-g1234abcd" into a single
/// monotonic integer so versions can be compared numerically. Used for the
/// ingest noise filter (`min_version_value`) and stored alongside the
/// canonical version row.
///
/// Layout: major/minor/patch get three decimal digits each, the dev build
/// number five. A title with no leading number maps to 0, which always
/// fails a configured minimum.
pub fn version_value(title: &str) -> i64 {
    let trimmed = title.trim().trim_start_matches('v');

    let mut parts = [0i64; 4];
    let mut idx = 0;
    let mut current: Option<i64> = None;

    for c in trimmed.chars() {
        if let Some(d) = c.to_digit(10) {
            // Client strings can carry arbitrarily long digit runs;
            // saturate instead of overflowing (the segment caps below
            // clamp the result anyway).
            current = Some(
                current
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(d as i64),
            );
        } else {
            if let Some(v) = current.take() {
                parts[idx] = v;
                idx += 1;
                if idx == parts.len() {
                    break;
                }
            }
            // Anything but a separator ends the numeric segments, including
            // a git hash suffix ("-g1234ab").
            if c != '.' && c != '-' && c != '_' {
                break;
            }
        }
    }
    if idx < parts.len() {
        if let Some(v) = current {
            parts[idx] = v;
        }
    }

    let [major, minor, patch, build] = parts;
    ((major.min(999) * 1000 + minor.min(999)) * 1000 + patch.min(999)) * 100_000
        + build.min(99_999)
}
