//! Object key conventions for photo blobs.
//!
//! Keys are `{event_id}/{stem}-{timestamp_ms}-{token}.{ext}`. The event id is
//! always the first segment so cleanup can recover it from the key alone.

use chrono::{DateTime, Utc};

use super::ValidationError;

const MAX_STEM_LEN: usize = 50;
const MAX_EVENT_ID_LEN: usize = 64;
const TOKEN_LEN: usize = 12;

/// Event ids become a key segment, so they are limited to `[A-Za-z0-9_-]`.
pub fn validate_event_id(event_id: &str) -> Result<&str, ValidationError> {
    let valid = !event_id.is_empty()
        && event_id.len() <= MAX_EVENT_ID_LEN
        && event_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(event_id)
    } else {
        Err(ValidationError::InvalidEventId(event_id.to_string()))
    }
}

/// Reduce an original file name to a short lowercase slug, dropping its extension.
pub fn sanitize_stem(original: Option<&str>) -> String {
    let name = original.unwrap_or_default();
    // Browsers on Windows may send full paths.
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    let mut slug = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_matches('-').chars().take(MAX_STEM_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "photo".to_string()
    } else {
        slug.to_string()
    }
}

/// File extension for an allowed image type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/avif" => "avif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// Pick a MIME type from the multipart content type, or guess from the file
/// name, or fall back to `application/octet-stream`.
pub fn resolve_mime_type(content_type: Option<&str>, file_name: Option<&str>) -> String {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| {
            file_name
                .and_then(|n| mime_guess::from_path(n).first())
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Collision-resistant file name: slug, millisecond timestamp, random token.
pub fn generate_file_name(original: Option<&str>, mime_type: &str, now: DateTime<Utc>) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}.{}",
        sanitize_stem(original),
        now.timestamp_millis(),
        &token[..TOKEN_LEN],
        extension_for(mime_type)
    )
}

/// Blob key for a file inside an event's folder.
pub fn object_key(event_id: &str, file_name: &str) -> Result<String, ValidationError> {
    let event_id = validate_event_id(event_id)?;
    Ok(format!("{event_id}/{file_name}"))
}

/// Recover the owning event id from a blob key.
pub fn event_id_from_key(key: &str) -> Option<&str> {
    let (event_id, rest) = key.split_once('/')?;
    if rest.is_empty() || validate_event_id(event_id).is_err() {
        return None;
    }
    Some(event_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::validate_object_key;

    #[test]
    fn sanitize_stem_slugifies() {
        assert_eq!(sanitize_stem(Some("My Beach Day.JPG")), "my-beach-day");
        assert_eq!(sanitize_stem(Some("IMG_0042.heic")), "img_0042");
        assert_eq!(sanitize_stem(Some("C:\\Users\\me\\party pic.png")), "party-pic");
        assert_eq!(sanitize_stem(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_stem(Some("fête 🎉.png")), "f-te");
    }

    #[test]
    fn sanitize_stem_falls_back_to_photo() {
        assert_eq!(sanitize_stem(None), "photo");
        assert_eq!(sanitize_stem(Some("")), "photo");
        assert_eq!(sanitize_stem(Some("🎉🎉.jpg")), "photo");
        assert_eq!(sanitize_stem(Some(".jpg")), "jpg");
    }

    #[test]
    fn sanitize_stem_truncates() {
        let long = format!("{}.png", "a".repeat(200));
        assert_eq!(sanitize_stem(Some(&long)).len(), MAX_STEM_LEN);
    }

    #[test]
    fn generated_names_are_unique_and_valid_keys() {
        let now = Utc::now();
        let a = generate_file_name(Some("party.jpg"), "image/jpeg", now);
        let b = generate_file_name(Some("party.jpg"), "image/jpeg", now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("party-{}-", now.timestamp_millis())));
        assert!(a.ends_with(".jpg"));

        let key = object_key("evt-1", &a).unwrap();
        assert!(validate_object_key(&key).is_ok());
        assert_eq!(event_id_from_key(&key), Some("evt-1"));
    }

    #[test]
    fn object_key_rejects_bad_event_ids() {
        assert!(object_key("../evt", "x.jpg").is_err());
        assert!(object_key("", "x.jpg").is_err());
        assert!(object_key("a/b", "x.jpg").is_err());
    }

    #[test]
    fn event_id_from_key_requires_a_file_segment() {
        assert_eq!(event_id_from_key("evt-1/"), None);
        assert_eq!(event_id_from_key("no-slash"), None);
    }

    #[test]
    fn resolve_mime_type_prefers_declared_type() {
        assert_eq!(resolve_mime_type(Some("image/PNG"), Some("x.jpg")), "image/png");
        assert_eq!(
            resolve_mime_type(Some("image/jpeg; charset=binary"), None),
            "image/jpeg"
        );
        assert_eq!(
            resolve_mime_type(Some("application/octet-stream"), Some("x.webp")),
            "image/webp"
        );
        assert_eq!(resolve_mime_type(None, None), "application/octet-stream");
    }

    #[test]
    fn extensions_follow_mime_type() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/heic"), "heic");
    }
}
