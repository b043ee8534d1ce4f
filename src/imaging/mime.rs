/// Declared when the payload header matches nothing we recognize. The
/// normalizer re-encodes to JPEG, so this is the most likely truth.
pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" || brand == b"mif1" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_image_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/heif" => "image/heic".to_string(),
        _ => lowered,
    }
}

/// Reports the image encoding actually present in `data`. Only payloads whose
/// header is unknown or not an image get [`FALLBACK_IMAGE_MIME`].
pub fn detect_encoding(data: &[u8]) -> String {
    detect_mime_type(data)
        .map(|mime| normalize_image_mime_type(&mime))
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string())
}
