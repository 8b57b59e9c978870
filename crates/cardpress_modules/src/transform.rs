//! Source transformation: imports out, annotations off, export rewritten.
//!
//! The output body is a plain function body whose `return` yields the
//! module's default value. Import statements are captured so the graph can
//! bind their values as parameters.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ModuleError;
use crate::specifier::decode_specifier;

static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import[ \t]+(.+?)[ \t]+from[ \t]+(?:'((?:\\.|[^'\\])+)'|"((?:\\.|[^"\\])+)")[ \t]*;?[ \t]*\r?$"#,
    )
    .expect("import pattern is valid")
});

static BARE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

static DECLARATION_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*:\s*[^=]+=")
        .expect("annotation pattern is valid")
});

static DEFAULT_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s+default\s+").expect("export pattern is valid"));

/// One `import <clause> from '<specifier>'` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub clause: String,
    pub specifier: String,
}

impl ImportStatement {
    /// The single identifier this import binds, if it is a default import.
    ///
    /// Destructuring (`{ a, b }`) and namespace (`* as x`) clauses bind
    /// nothing.
    pub fn binding(&self) -> Option<&str> {
        if self.clause.starts_with('{') {
            return None;
        }
        let symbol = self.clause.split(',').next().unwrap_or_default().trim();
        BARE_IDENTIFIER.is_match(symbol).then_some(symbol)
    }
}

/// A module body ready to be executed as a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedModule {
    pub imports: Vec<ImportStatement>,
    pub body: String,
}

/// Given declaration text, return the bare assignable form.
pub trait AnnotationStripper: Send + Sync {
    fn strip(&self, source: &str) -> String;
}

/// Pattern-based stripper for `const name: Type = value`.
///
/// Approximate: an annotation containing `=` (such as a default type
/// argument) is cut short.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexAnnotationStripper;

impl AnnotationStripper for RegexAnnotationStripper {
    fn strip(&self, source: &str) -> String {
        DECLARATION_ANNOTATION
            .replace_all(source, "${1} ${2} =")
            .into_owned()
    }
}

pub struct SourceTransformer {
    stripper: Box<dyn AnnotationStripper>,
}

impl Default for SourceTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SourceTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTransformer").finish_non_exhaustive()
    }
}

impl SourceTransformer {
    pub fn new() -> Self {
        Self::with_stripper(Box::new(RegexAnnotationStripper))
    }

    pub fn with_stripper(stripper: Box<dyn AnnotationStripper>) -> Self {
        Self { stripper }
    }

    /// Transform the raw text of the module at `path`.
    pub fn transform(&self, path: &Path, source: &str) -> Result<TransformedModule, ModuleError> {
        let imports = extract_imports(path, source)?;
        let without_imports = IMPORT_LINE.replace_all(source, "");
        let stripped = self.stripper.strip(&without_imports);

        if !DEFAULT_EXPORT.is_match(&stripped) {
            return Err(ModuleError::MissingDefaultExport {
                path: path.to_path_buf(),
            });
        }
        let body = DEFAULT_EXPORT.replace(&stripped, "return ").into_owned();

        Ok(TransformedModule { imports, body })
    }
}

fn extract_imports(path: &Path, source: &str) -> Result<Vec<ImportStatement>, ModuleError> {
    IMPORT_LINE
        .captures_iter(source)
        .map(|caps| {
            let raw = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let specifier =
                decode_specifier(raw).map_err(|reason| ModuleError::InvalidSpecifier {
                    path: path.to_path_buf(),
                    raw: raw.to_string(),
                    reason,
                })?;
            Ok(ImportStatement {
                clause: caps[1].trim().to_string(),
                specifier,
            })
        })
        .collect()
}
