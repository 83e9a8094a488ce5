use anyhow::{Result, anyhow};

/// Maximum length of a roll number
pub const MAX_ROLL_NO_LEN: usize = 32;

/// Maximum length of a student name after sanitization
pub const MAX_NAME_LEN: usize = 120;

/// Maximum length of a batch tag after sanitization
pub const MAX_BATCH_LEN: usize = 64;

/// Maximum length of a file extension (without the leading dot)
pub const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a roll number and returns its canonical form.
///
/// Roll numbers double as blob file stems, so the charset is restricted to
/// characters that are safe in a path component. Dots are rejected outright:
/// a roll number containing one would collide with another student's
/// roll-number-plus-extension blob name.
pub fn validate_roll_no(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_ROLL_NO",
            message: "Roll number cannot be empty".to_string(),
        }));
    }

    if trimmed.len() > MAX_ROLL_NO_LEN {
        return Err(anyhow!(ValidationError {
            code: "ROLL_NO_TOO_LONG",
            message: format!(
                "Roll number exceeds maximum length of {} characters",
                MAX_ROLL_NO_LEN
            ),
        }));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(anyhow!(ValidationError {
            code: "INVALID_ROLL_NO",
            message: format!(
                "Roll number '{}' contains invalid characters. Only letters, digits, '_' and '-' are allowed.",
                trimmed
            ),
        }));
    }

    Ok(trimmed.to_string())
}

/// Sanitizes a student name: trims, collapses control characters to spaces
/// and truncates at a safe UTF-8 boundary. Empty names are rejected.
pub fn validate_name(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim().to_string();

    if cleaned.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_NAME",
            message: "Name cannot be empty".to_string(),
        }));
    }

    Ok(truncate_on_boundary(cleaned, MAX_NAME_LEN))
}

/// Sanitizes the optional batch tag. A missing or blank batch becomes the
/// empty string rather than an error.
pub fn normalize_batch(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    truncate_on_boundary(cleaned.trim().to_string(), MAX_BATCH_LEN)
}

/// Extracts the extension of an uploaded filename, leading dot included,
/// mirroring how the blob name is later assembled as roll number + extension.
///
/// Only plain ASCII alphanumeric extensions are kept. Anything else (no dot,
/// hidden-file names, trailing dots, exotic characters, overlong suffixes)
/// yields the empty string so the blob is stored without an extension.
pub fn file_extension(filename: &str) -> String {
    // Look at the final path component only; clients sometimes send full paths
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");

    let Some(dot) = name.rfind('.') else {
        return String::new();
    };
    if dot == 0 {
        return String::new();
    }

    let ext = &name[dot + 1..];
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }

    format!(".{}", ext)
}

/// Validates a blob filename requested over HTTP before it is resolved
/// against the upload directory. Rejects anything that is not a plain
/// single-component name produced by this service.
pub fn validate_blob_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if name.starts_with('.') || name.contains("..") {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: format!("Filename '{}' is not allowed", name),
        }));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: format!("Filename '{}' contains invalid characters", name),
        }));
    }

    Ok(())
}

fn truncate_on_boundary(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_roll_no() {
        assert_eq!(validate_roll_no("101").unwrap(), "101");
        assert_eq!(validate_roll_no("  CS-21_04  ").unwrap(), "CS-21_04");

        assert!(validate_roll_no("").is_err());
        assert!(validate_roll_no("   ").is_err());
        assert!(validate_roll_no("101.py").is_err());
        assert!(validate_roll_no("../etc").is_err());
        assert!(validate_roll_no("roll no").is_err());
        assert!(validate_roll_no(&"9".repeat(MAX_ROLL_NO_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Ada Lovelace").unwrap(), "Ada Lovelace");
        assert_eq!(validate_name("  spaced  ").unwrap(), "spaced");
        assert_eq!(validate_name("line\nbreak").unwrap(), "line break");
        assert!(validate_name("").is_err());
        assert!(validate_name(" \t ").is_err());
    }

    #[test]
    fn test_normalize_batch() {
        assert_eq!(normalize_batch("2024"), "2024");
        assert_eq!(normalize_batch("  "), "");
        assert_eq!(normalize_batch(""), "");
        assert_eq!(normalize_batch("A\tB"), "A B");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("solution.py"), ".py");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("UPPER.PDF"), ".PDF");
        assert_eq!(file_extension("C:\\work\\report.docx"), ".docx");
        assert_eq!(file_extension("/tmp/notes.txt"), ".txt");

        assert_eq!(file_extension("noextension"), "");
        assert_eq!(file_extension(".gitignore"), "");
        assert_eq!(file_extension("trailing."), "");
        assert_eq!(file_extension("weird.t@r"), "");
        assert_eq!(file_extension(""), "");
    }

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("101.py").is_ok());
        assert!(validate_blob_name("CS-21_04").is_ok());

        assert!(validate_blob_name("").is_err());
        assert!(validate_blob_name(".hidden").is_err());
        assert!(validate_blob_name("a/../b").is_err());
        assert!(validate_blob_name("dir/file.py").is_err());
        assert!(validate_blob_name("sp ace.py").is_err());
    }
}
