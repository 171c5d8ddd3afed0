//! Output file naming and size statistics for batch jobs.

const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "image_{index}";

/// Replace characters filesystems reject with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Drop the final `.ext`, if any.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => &name[..pos],
        _ => name,
    }
}

/// Expand `{index}`, `{name}` and `{ext}` in `pattern`. The index is
/// zero-padded to `pad_digits`; `.ext` is appended unless the expanded
/// name already has a dot.
pub fn build_file_name(pattern: &str, index: usize, original_name: &str, ext: &str, pad_digits: usize) -> String {
    let ext = ext.to_lowercase();
    let base = strip_extension(original_name);
    let padded = format!("{index:0>width$}", width = pad_digits.max(1));
    let pattern = if pattern.is_empty() { DEFAULT_PATTERN } else { pattern };

    let replaced = pattern
        .replace("{index}", &padded)
        .replace("{name}", base)
        .replace("{ext}", &ext);
    let trimmed = replaced.trim();
    let stem = if trimmed.is_empty() {
        format!("{base}_{padded}")
    } else {
        trimmed.to_string()
    };
    let with_ext = if stem.contains('.') {
        stem
    } else {
        format!("{stem}.{ext}")
    };
    sanitize_name(&with_ext)
}

/// Percentage saved, rounded. Negative when the output grew.
pub fn compression_ratio(original_bytes: u64, output_bytes: u64) -> i64 {
    if original_bytes == 0 {
        return 0;
    }
    let saved = original_bytes as f64 - output_bytes as f64;
    (saved / original_bytes as f64 * 100.0).round() as i64
}

/// Rough output size guess for a lossy encode at `quality` (0-1).
pub fn estimate_size(original_bytes: u64, quality: f64) -> u64 {
    (original_bytes as f64 * quality.clamp(0.0, 1.0)).round() as u64
}
