use std::path::Path;

/// Cache-Control applied to every uploaded object.
///
/// CloudFront caching is disabled for the site, so edges and browsers must
/// always revalidate.
pub const CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Web asset types that the generic MIME database may not know
const WEB_ASSET_TYPES: &[(&str, &str)] = &[
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("css", "text/css"),
    ("html", "text/html"),
    ("json", "application/json"),
    ("svg", "image/svg+xml"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
];

/// MIME type for `path`, never failing.
pub fn content_type(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return mime.to_string();
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    extension
        .as_deref()
        .and_then(|ext| {
            WEB_ASSET_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

pub fn cache_control(_path: &Path) -> &'static str {
    CACHE_CONTROL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_web_types() {
        assert_eq!(content_type(Path::new("index.html")), "text/html");
        assert_eq!(content_type(Path::new("assets/site.css")), "text/css");
        assert_eq!(content_type(Path::new("data.json")), "application/json");
        assert_eq!(content_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("photo.PNG")), "image/png");
    }

    #[test]
    fn test_javascript_is_classified() {
        let mime = content_type(Path::new("assets/app.js"));
        assert!(mime.contains("javascript"), "got {}", mime);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_binary() {
        assert_eq!(content_type(Path::new("blob.zzzunknown")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type(Path::new("LICENSE")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type(Path::new("")), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_deterministic() {
        for name in ["a.woff2", "b.avif", "c.map", "d", "e.tar.gz"] {
            let path = Path::new(name);
            assert_eq!(content_type(path), content_type(path));
            assert_eq!(cache_control(path), cache_control(path));
        }
    }

    #[test]
    fn test_cache_control_is_constant() {
        assert_eq!(cache_control(Path::new("index.html")), CACHE_CONTROL);
        assert_eq!(cache_control(Path::new("assets/app.js")), CACHE_CONTROL);
    }
}
