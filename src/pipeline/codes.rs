//! Diagnosis code normalization and the HCC reference code set.
//!
//! Every code that enters the pipeline passes through [`normalize_code`] exactly
//! once: at extraction time for model output, and at load time for the
//! reference CSV. Set membership is then a plain string lookup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::DEFAULT_CODE_COLUMN;

// ═══════════════════════════════════════════
// Normalizer
// ═══════════════════════════════════════════

/// Canonical comparison key for a diagnosis code.
///
/// Uppercases, removes every `.` and trims surrounding whitespace, so
/// `"e11.9 "`, `"E11.9"` and `"E119"` all map to `"E119"`. An empty result
/// means "no code".
pub fn normalize_code(code: &str) -> String {
    code.to_uppercase().replace('.', "").trim().to_string()
}

// ═══════════════════════════════════════════
// Reference code set
// ═══════════════════════════════════════════

/// Set of normalized HCC-relevant codes. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCodes {
    codes: HashSet<String>,
}

impl ReferenceCodes {
    /// Membership test against an already-normalized code.
    pub fn contains(&self, normalized_code: &str) -> bool {
        self.codes.contains(normalized_code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ReferenceCodes {
    /// Normalizes every entry; blanks are skipped and duplicates collapse.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let codes = iter
            .into_iter()
            .map(|c| normalize_code(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { codes }
    }
}

#[derive(Error, Debug)]
pub enum CodeSetError {
    #[error("Reference code source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Reference code source {} is malformed: {reason}", path.display())]
    SourceFormat { path: PathBuf, reason: String },
}

/// Where the reference code set comes from. Injected so callers own the
/// lifecycle of the underlying resource.
pub trait CodeSetSource: Send + Sync {
    fn load(&self) -> Result<ReferenceCodes, CodeSetError>;

    /// Human-readable location, used in log records.
    fn describe(&self) -> String;
}

/// CSV file with a header row and a named code column.
#[derive(Debug, Clone)]
pub struct CsvCodeSource {
    path: PathBuf,
    column: String,
}

impl CsvCodeSource {
    pub fn new(path: impl Into<PathBuf>, column: &str) -> Self {
        Self {
            path: path.into(),
            column: column.to_string(),
        }
    }

    /// Source using the standard `ICD-10-CM Codes` column.
    pub fn with_default_column(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DEFAULT_CODE_COLUMN)
    }
}

impl CodeSetSource for CsvCodeSource {
    fn load(&self) -> Result<ReferenceCodes, CodeSetError> {
        load_reference_codes(&self.path, &self.column)
    }

    fn describe(&self) -> String {
        format!("{} [{}]", self.path.display(), self.column)
    }
}

/// Load and normalize the code column of a CSV file.
///
/// Fails with [`CodeSetError::SourceNotFound`] when the file is missing and
/// [`CodeSetError::SourceFormat`] when the column is absent or a record
/// cannot be read.
pub fn load_reference_codes(path: &Path, column: &str) -> Result<ReferenceCodes, CodeSetError> {
    if !path.exists() {
        tracing::error!(path = %path.display(), "HCC code file not found");
        return Err(CodeSetError::SourceNotFound(path.to_path_buf()));
    }

    let format_err = |reason: String| CodeSetError::SourceFormat {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| format_err(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| format_err(format!("cannot read header row: {e}")))?
        .clone();

    let code_idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| format_err(format!("missing column '{column}'")))?;

    let mut raw = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format_err(format!("row {}: {e}", row + 2)))?;
        if let Some(value) = record.get(code_idx) {
            raw.push(value.to_string());
        }
    }

    let codes: ReferenceCodes = raw.iter().collect();
    tracing::info!(
        path = %path.display(),
        rows = raw.len(),
        codes = codes.len(),
        "Loaded HCC reference codes"
    );
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn normalize_uppercases_strips_dots_and_trims() {
        assert_eq!(normalize_code("E11.9"), "E119");
        assert_eq!(normalize_code("e119"), "E119");
        assert_eq!(normalize_code("  i10 \n"), "I10");
        assert_eq!(normalize_code("z.79.4"), "Z794");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["E11.9", " e11.65 ", "I10", "", "  ", "..", "n18.30", "Ünïcode.1"] {
            let once = normalize_code(raw);
            assert_eq!(normalize_code(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn normalize_empty_and_dot_only_inputs_are_empty() {
        assert_eq!(normalize_code(""), "");
        assert_eq!(normalize_code(" . "), "");
    }

    #[test]
    fn reference_codes_collapse_duplicates_and_skip_blanks() {
        let codes: ReferenceCodes = ["E11.9", "e119", "I10", "  ", ""].into_iter().collect();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("E119"));
        assert!(codes.contains("I10"));
    }

    #[test]
    fn loads_and_normalizes_csv_column() {
        let file = write_csv("Description,ICD-10-CM Codes\nDiabetes,E11.9\nHTN,i10\nDup,E119\n");
        let codes = load_reference_codes(file.path(), DEFAULT_CODE_COLUMN).unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains("E119"));
        assert!(codes.contains("I10"));
    }

    #[test]
    fn custom_column_name() {
        let file = write_csv("code\nN18.30\n");
        let codes = CsvCodeSource::new(file.path(), "code").load().unwrap();
        assert!(codes.contains("N1830"));
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let err = load_reference_codes(Path::new("/nonexistent/hcc.csv"), DEFAULT_CODE_COLUMN)
            .unwrap_err();
        assert!(matches!(err, CodeSetError::SourceNotFound(_)));
    }

    #[test]
    fn missing_column_is_source_format() {
        let file = write_csv("Description,Other\nDiabetes,E11.9\n");
        let err = load_reference_codes(file.path(), DEFAULT_CODE_COLUMN).unwrap_err();
        match err {
            CodeSetError::SourceFormat { reason, .. } => assert!(reason.contains("ICD-10-CM Codes")),
            other => panic!("expected SourceFormat, got {other:?}"),
        }
    }

    #[test]
    fn csv_source_describes_path_and_column() {
        let source = CsvCodeSource::with_default_column("data/codes.csv");
        assert!(source.describe().contains("data/codes.csv"));
        assert!(source.describe().contains(DEFAULT_CODE_COLUMN));
    }
}
