use std::path::Path;

/// Truncate `value` to at most `width` characters, as a fixed-width attribute field would
pub fn truncate_to_width(value: &str, width: usize) -> String {
    match value.char_indices().nth(width) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Output folder for a satellite run: `water_level_<product>` where `<product>` is the
/// archive file name with its last two extensions (`.SAFE.zip`) removed
pub fn output_folder_name(archive_path: &Path) -> String {
    let file_name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut stem = file_name.as_str();
    for _ in 0..2 {
        if let Some((head, _)) = stem.rsplit_once('.') {
            stem = head;
        }
    }

    format!("water_level_{}", stem)
}
