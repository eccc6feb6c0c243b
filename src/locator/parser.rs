//! Tree-sitter parsing for JavaScript/TypeScript test files.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tree_sitter::{Language, Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageVariant {
    JavaScript,
    TypeScript,
    Tsx,
}

impl LanguageVariant {
    /// Pick the grammar from a file extension. JSX and unknown extensions
    /// use the JavaScript grammar, which already understands JSX.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") | Some("mts") | Some("cts") => LanguageVariant::TypeScript,
            Some("tsx") => LanguageVariant::Tsx,
            _ => LanguageVariant::JavaScript,
        }
    }

    fn language(self) -> Language {
        match self {
            LanguageVariant::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            LanguageVariant::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            LanguageVariant::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Source text together with its syntax tree. The tree is never mutated.
pub struct ParsedSource {
    text: String,
    tree: Tree,
    variant: LanguageVariant,
}

impl ParsedSource {
    /// Returns `None` if the grammar cannot be loaded or parsing is aborted.
    /// Syntax errors still produce a tree (with error nodes).
    pub fn parse(text: impl Into<String>, variant: LanguageVariant) -> Option<Self> {
        let text = text.into();
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&variant.language()) {
            tracing::warn!("Failed to load {:?} grammar: {}", variant, e);
            return None;
        }
        let tree = parser.parse(&text, None)?;
        if tree.root_node().has_error() {
            tracing::debug!("{:?} source has syntax errors, locating anyway", variant);
        }
        Some(Self { text, tree, variant })
    }

    pub fn read(path: &Path) -> crate::Result<Option<Self>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(text, LanguageVariant::from_path(path)))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn variant(&self) -> LanguageVariant {
        self.variant
    }
}

/// A cursor position written as `FILE:LINE[:COL]`, 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Zero-based character offset of this position in `text`.
    /// Columns past the end of the line clamp to the line end.
    pub fn char_offset(&self, text: &str) -> Option<usize> {
        if self.line == 0 {
            return None;
        }
        let mut offset = 0usize;
        for (index, line) in text.split('\n').enumerate() {
            if index + 1 == self.line {
                let width = line.trim_end_matches('\r').chars().count();
                return Some(offset + self.column.saturating_sub(1).min(width));
            }
            offset += line.chars().count() + 1;
        }
        None
    }
}

impl FromStr for Location {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidLocation(s.to_string());
        let mut parts = s.rsplitn(3, ':');
        let last = parts.next().ok_or_else(invalid)?;
        let middle = parts.next().ok_or_else(invalid)?;
        let rest = parts.next();

        let (file, line, column) = match (rest, middle.parse::<usize>(), last.parse::<usize>()) {
            (Some(file), Ok(line), Ok(column)) => (file.to_string(), line, column),
            (Some(file), Err(_), Ok(line)) => (format!("{}:{}", file, middle), line, 1),
            (None, _, Ok(line)) => (middle.to_string(), line, 1),
            _ => return Err(invalid()),
        };
        if file.is_empty() || line == 0 || column == 0 {
            return Err(invalid());
        }
        Ok(Location { file: PathBuf::from(file), line, column })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_from_path() {
        assert_eq!(LanguageVariant::from_path(Path::new("a.test.js")), LanguageVariant::JavaScript);
        assert_eq!(LanguageVariant::from_path(Path::new("a.test.jsx")), LanguageVariant::JavaScript);
        assert_eq!(LanguageVariant::from_path(Path::new("a.spec.ts")), LanguageVariant::TypeScript);
        assert_eq!(LanguageVariant::from_path(Path::new("a.spec.mts")), LanguageVariant::TypeScript);
        assert_eq!(LanguageVariant::from_path(Path::new("Button.test.tsx")), LanguageVariant::Tsx);
        assert_eq!(LanguageVariant::from_path(Path::new("Makefile")), LanguageVariant::JavaScript);
    }

    #[test]
    fn test_parse_typescript() {
        let parsed = ParsedSource::parse(
            "const add = (a: number, b: number): number => a + b;",
            LanguageVariant::TypeScript,
        ).unwrap();
        assert!(!parsed.tree().root_node().has_error());
        assert_eq!(parsed.variant(), LanguageVariant::TypeScript);
    }

    #[test]
    fn test_location_with_column() {
        let loc: Location = "src/a.test.js:12:5".parse().unwrap();
        assert_eq!(loc.file, PathBuf::from("src/a.test.js"));
        assert_eq!(loc.line, 12);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn test_location_without_column() {
        let loc: Location = "src/a.test.js:7".parse().unwrap();
        assert_eq!(loc.file, PathBuf::from("src/a.test.js"));
        assert_eq!(loc.line, 7);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn test_location_rejects_garbage() {
        assert!("src/a.test.js".parse::<Location>().is_err());
        assert!("src/a.test.js:x:y".parse::<Location>().is_err());
        assert!(":3".parse::<Location>().is_err());
        assert!("a.js:0".parse::<Location>().is_err());
    }

    #[test]
    fn test_char_offset() {
        let text = "ab\ncdé\nf";
        let at = |line, column| Location { file: PathBuf::new(), line, column }.char_offset(text);
        assert_eq!(at(1, 1), Some(0));
        assert_eq!(at(2, 1), Some(3));
        assert_eq!(at(2, 3), Some(5));
        assert_eq!(at(2, 99), Some(6)); // clamped to end of line
        assert_eq!(at(3, 1), Some(7));
        assert_eq!(at(4, 1), None);
    }
}
