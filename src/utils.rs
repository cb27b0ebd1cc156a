//! Utility functions

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// File name of the preview image for a global slice index
pub fn preview_file_name(slice: usize) -> String {
    format!("{:06}.tif", slice)
}

/// CRC32 of a chunk payload
pub fn calculate_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
