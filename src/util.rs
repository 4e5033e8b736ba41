/// Shared date/time calculation from system clock.
///
/// Returns `(year, month, day, hour, minute, second)` based on the current
/// system time. Used by both `format_iso8601` and `format_iso8601_date` so
/// the crate needs no `chrono` dependency for two timestamp formats.
fn now_components() -> (u64, u64, u64, u64, u64, u64) {
    let now = std::time::SystemTime::now();
    let secs = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days = secs / 86400;
    let years = (days * 400) / 146097;
    let year_start = (years * 146097) / 400;
    let remaining = days - year_start;
    let year = 1970 + years;
    let is_leap =
        (year.is_multiple_of(4) && !year.is_multiple_of(100)) || year.is_multiple_of(400);
    let month_days: &[u64] = if is_leap {
        &[31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        &[31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };
    let mut month = 0u64;
    let mut day_of_year = remaining;
    for (i, &md) in month_days.iter().enumerate() {
        if day_of_year < md {
            month = i as u64 + 1;
            break;
        }
        day_of_year -= md;
    }
    if month == 0 {
        month = 12;
    }
    let day = day_of_year + 1;
    let day_secs = secs % 86400;
    let hour = day_secs / 3600;
    let min = (day_secs % 3600) / 60;
    let sec = day_secs % 60;
    (year, month, day, hour, min, sec)
}

/// Current UTC timestamp in ISO 8601 format: `YYYY-MM-DDThh:mm:ssZ`.
///
/// Used for the `dcterms:modified` meta element required by EPUB 3.
pub fn format_iso8601() -> String {
    let (year, month, day, hour, min, sec) = now_components();
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// Current UTC date in ISO 8601 format: `YYYY-MM-DD`.
///
/// Used as the default `dc:date` when a publication is constructed without one.
pub fn format_iso8601_date() -> String {
    let (year, month, day, ..) = now_components();
    format!("{year:04}-{month:02}-{day:02}")
}

/// Sanitize a filename stem by slugifying it, falling back to `"untitled"`
/// when the result is empty (e.g. an all-punctuation title).
pub fn sanitize_filename_stem(raw: &str) -> String {
    let slugged = slug::slugify(raw);
    if slugged.is_empty() {
        "untitled".to_string()
    } else {
        slugged
    }
}

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

/// Extensions accepted by `add_image` at build time (spec §4.1). bmp/tiff are
/// recognized for MIME lookup (§6) but not accepted as new additions.
const ADD_IMAGE_ALLOWLIST: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "webp"];

/// Look up the MIME type for a file extension (case-insensitive, no leading dot).
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    let lower = ext.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == lower)
        .map(|(_, m)| *m)
}

/// Whether an extension is accepted by `add_image` at build time.
pub fn is_addable_image_extension(ext: &str) -> bool {
    let lower = ext.to_lowercase();
    ADD_IMAGE_ALLOWLIST.contains(&lower.as_str())
}

/// MIME type for any resource extension, falling back to
/// `application/octet-stream` for unrecognized ones (spec §6).
pub fn mime_type_for_any_extension(ext: &str) -> &'static str {
    mime_type_for_extension(ext).unwrap_or("application/octet-stream")
}
