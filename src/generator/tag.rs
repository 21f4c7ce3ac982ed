//! Deployment tag computation.
//!
//! A template may carry a `.deployment-tag` file whose first non-comment line
//! is a tag pattern. Supported placeholders: `{version}`, `{major}`, `{minor}`,
//! `{patch}`, `{template}` (template directory name) and `{date}` (UTC,
//! `YYYYMMDD`). Without the file the pattern is `v{version}`.

use crate::error::CodeGenerationError;
use crate::text_files::apply_tokens;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const TAG_TEMPLATE_FILE: &str = ".deployment-tag";
pub const DEFAULT_TAG_PATTERN: &str = "v{version}";

/// Turns `(version, template path)` into a deployment tag.
pub trait TagTemplateProcessor: Send + Sync {
    fn process_tag_template(
        &self,
        version: &str,
        template_path: &Path,
    ) -> Result<String, CodeGenerationError>;
}

/// Reads the pattern from [`TAG_TEMPLATE_FILE`] in the template directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTagTemplateProcessor;

impl FileTagTemplateProcessor {
    fn pattern(template_path: &Path) -> Result<String, CodeGenerationError> {
        let file = template_path.join(TAG_TEMPLATE_FILE);
        if !file.is_file() {
            return Ok(DEFAULT_TAG_PATTERN.to_string());
        }
        let content = fs::read_to_string(&file).map_err(|e| {
            CodeGenerationError::with_source(format!("Failed to read {}", file.display()), e)
        })?;
        Ok(content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .unwrap_or(DEFAULT_TAG_PATTERN)
            .to_string())
    }
}

impl TagTemplateProcessor for FileTagTemplateProcessor {
    fn process_tag_template(
        &self,
        version: &str,
        template_path: &Path,
    ) -> Result<String, CodeGenerationError> {
        let pattern = Self::pattern(template_path)?;
        let template = template_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(render_tag(&pattern, version, &template, Utc::now()))
    }
}

/// Fill a tag pattern. Unknown placeholders are left as written.
pub fn render_tag(pattern: &str, version: &str, template: &str, now: DateTime<Utc>) -> String {
    let version = version.trim();
    let core = version.trim_start_matches(['v', 'V']);
    let core = core.split(['-', '+']).next().unwrap_or(core);
    let mut parts = core.split('.');
    let mut next = || parts.next().filter(|p| !p.is_empty()).unwrap_or("0").to_string();
    let (major, minor, patch) = (next(), next(), next());

    let tokens: HashMap<String, String> = [
        ("version", version.to_string()),
        ("major", major),
        ("minor", minor),
        ("patch", patch),
        ("template", template.to_string()),
        ("date", now.format("%Y%m%d").to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    apply_tokens(pattern, &tokens)
}

/// Tag rewritten as an identifier: every character outside `[A-Za-z0-9_]`
/// becomes `_`, with a leading `_` when it would start with a digit.
pub fn safe_tag(tag: &str) -> String {
    let mut safe: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() || safe.starts_with(|c: char| c.is_ascii_digit()) {
        safe.insert(0, '_');
    }
    safe
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_default_pattern() {
        assert_eq!(render_tag(DEFAULT_TAG_PATTERN, "1.4.2", "go-gcp", fixed_now()), "v1.4.2");
    }

    #[test]
    fn test_all_placeholders() {
        let tag = render_tag(
            "{template}-{major}.{minor}-p{patch}-{date}-{unknown}",
            "v2.7.1-rc.1",
            "java-aws",
            fixed_now(),
        );
        assert_eq!(tag, "java-aws-2.7-p1-20240309-{unknown}");
    }

    #[test]
    fn test_short_version_defaults_missing_parts() {
        assert_eq!(render_tag("{major}.{minor}.{patch}", "3", "", fixed_now()), "3.0.0");
    }

    #[test]
    fn test_pattern_file_first_meaningful_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("python-azure");
        fs::create_dir_all(&dir).unwrap();
        let processor = FileTagTemplateProcessor;
        assert_eq!(processor.process_tag_template("1.0.0", &dir).unwrap(), "v1.0.0");

        fs::write(dir.join(TAG_TEMPLATE_FILE), "# tag pattern\n\n{template}-{version}\n").unwrap();
        assert_eq!(
            processor.process_tag_template("1.0.0", &dir).unwrap(),
            "python-azure-1.0.0"
        );
    }

    #[test]
    fn test_safe_tag() {
        assert_eq!(safe_tag("v1.2.3"), "v1_2_3");
        assert_eq!(safe_tag("2024.1"), "_2024_1");
        assert_eq!(safe_tag(""), "_");
    }
}
