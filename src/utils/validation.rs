use std::path::Path;
use thiserror::Error;

/// Longest accepted filename, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".rar", ".7z", ".tar.gz", ".tar"];

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "document",
        &[
            "pdf", "doc", "docx", "txt", "rtf", "odt", "pages", "epub", "odf", "ods", "xls",
            "xlsx", "csv", "ppt", "pptx", "odp",
        ],
    ),
    (
        "image",
        &[
            "png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "ico", "tiff", "psd", "ai", "raw",
            "heic", "jfif", "tif",
        ],
    ),
    (
        "video",
        &[
            "mp4", "avi", "mkv", "mov", "webm", "flv", "wmv", "m4v", "mpg", "mpeg", "3gp", "h264",
            "h265", "rm", "swf", "vob",
        ],
    ),
    (
        "audio",
        &[
            "mp3", "wav", "ogg", "flac", "m4a", "wma", "aac", "mid", "midi", "aif", "aifc", "aiff",
            "au", "pcm",
        ],
    ),
    (
        "archive",
        &[
            "zip", "rar", "7z", "tar", "gz", "bz2", "iso", "dmg", "pkg", "deb", "rpm", "xz", "tgz",
            "z",
        ],
    ),
    (
        "code",
        &[
            "py", "java", "c", "cpp", "h", "hpp", "html", "css", "scss", "json", "xml", "yaml",
            "yml", "sql", "php", "rb", "go", "rs", "ts", "jsx", "tsx",
        ],
    ),
    ("font", &["ttf", "otf", "woff", "woff2", "eot"]),
    ("model", &["obj", "fbx", "3ds", "blend", "stl", "dae", "max"]),
];

pub const DEFAULT_CATEGORY: &str = "other";

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

/// Sanitizes a user-supplied filename for use on disk.
///
/// Keeps only the final path component, replaces reserved and control
/// characters with `_` and truncates on a char boundary. Empty names and
/// dotfiles are rejected.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Browsers on Windows may send the full client path.
    let last = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            c if c.is_control() => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';' => '_',
            c => c,
        })
        .collect();

    let sanitized = if sanitized.len() > MAX_FILENAME_BYTES {
        let mut end = MAX_FILENAME_BYTES;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files are not allowed".to_string(),
        });
    }

    Ok(sanitized)
}

/// Lowercase extension without the dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Category derived from the extension, `other` when unknown.
pub fn categorize(filename: &str) -> &'static str {
    let Some(ext) = extension_of(filename) else {
        return DEFAULT_CATEGORY;
    };
    CATEGORIES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

pub fn is_known_category(category: &str) -> bool {
    category == DEFAULT_CATEGORY || CATEGORIES.iter().any(|(c, _)| *c == category)
}

pub fn is_archive(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Audio and video objects get adaptive chunk sizing on partial requests.
pub fn is_media(filename: &str) -> bool {
    matches!(categorize(filename), "video" | "audio")
}

pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") | Some("log") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") | Some("jfif") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("zip") => "application/zip",
        Some("7z") => "application/x-7z-compressed",
        Some("rar") => "application/vnd.rar",
        Some("tar") => "application/x-tar",
        Some("gz") | Some("tgz") => "application/gzip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_filename("C:\\Users\\bob\\report.pdf").unwrap(),
            "report.pdf"
        );
    }

    #[test]
    fn test_sanitize_replaces_reserved() {
        assert_eq!(
            sanitize_filename("what?:*<now>.txt").unwrap(),
            "what____now_.txt"
        );
        assert_eq!(sanitize_filename("tab\there.txt").unwrap(), "tab_here.txt");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_hidden() {
        assert_eq!(sanitize_filename("").unwrap_err().code, "INVALID_FILENAME");
        assert_eq!(sanitize_filename("dir/").unwrap_err().code, "INVALID_FILENAME");
        assert_eq!(sanitize_filename(".env").unwrap_err().code, "HIDDEN_FILE");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = format!("{}.txt", "é".repeat(200));
        let out = sanitize_filename(&long).unwrap();
        assert!(out.len() <= MAX_FILENAME_BYTES);
        assert!(out.is_char_boundary(out.len()));
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("movie.MKV"), "video");
        assert_eq!(categorize("song.flac"), "audio");
        assert_eq!(categorize("main.rs"), "code");
        assert_eq!(categorize("noext"), "other");
        assert_eq!(categorize("weird.qqq"), "other");
        assert!(is_known_category("font"));
        assert!(!is_known_category("secret"));
    }

    #[test]
    fn test_archive_and_media() {
        assert!(is_archive("backup.tar.gz"));
        assert!(is_archive("photos.ZIP"));
        assert!(!is_archive("notes.gz.txt"));
        assert!(is_media("clip.mp4"));
        assert!(!is_media("clip.txt"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
