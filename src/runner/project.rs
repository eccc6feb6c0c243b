use std::path::{Path, PathBuf};
use regex::Regex;
use serde::Deserialize;
use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &[
    "node_modules", "build", "dist", ".git", ".next", ".nuxt",
    "coverage", ".cache", ".turbo", ".svelte-kit",
];

const JS_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "mjs", "cjs", "mts", "cts"];

const TEST_SUFFIXES: &[&str] = &["test", "spec"];

/// A JavaScript project: the directory Jest runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub display_name: String,
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
}

impl Project {
    /// Nearest ancestor of `start` (a file or directory) holding a
    /// `package.json`. Falls back to the starting directory.
    pub fn discover(start: &Path) -> Self {
        let start_dir = if start.is_file() {
            start.parent().unwrap_or(start)
        } else {
            start
        };

        let root = start_dir
            .ancestors()
            .find(|dir| dir.join("package.json").is_file())
            .unwrap_or_else(|| {
                tracing::warn!("No package.json above {}, using it as project root", start_dir.display());
                start_dir
            })
            .to_path_buf();

        let display_name = package_name(&root).unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string())
        });

        Self { root, display_name }
    }
}

fn package_name(root: &Path) -> Option<String> {
    let content = std::fs::read_to_string(root.join("package.json")).ok()?;
    match serde_json::from_str::<PackageJson>(&content) {
        Ok(pkg) => pkg.name.filter(|n| !n.trim().is_empty()),
        Err(e) => {
            tracing::warn!("Unreadable package.json in {}: {}", root.display(), e);
            None
        }
    }
}

fn test_file_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\.(?:test|spec)\.[cm]?[jt]sx?$").expect("test file pattern is valid")
    })
}

fn has_js_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| JS_EXTENSIONS.contains(&ext))
}

/// `*.test.*`, `*.spec.*`, or any JS file under a `__tests__` directory.
pub fn is_test_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if test_file_pattern().is_match(name) {
        return true;
    }
    has_js_extension(path)
        && path.components().any(|c| c.as_os_str() == "__tests__")
}

/// Test file belonging to `source`. Looks next to the source, then in a
/// sibling `__tests__` directory, then anywhere in the project.
pub fn find_test_file(project: &Project, source: &Path) -> Option<PathBuf> {
    if is_test_file(source) {
        return Some(source.to_path_buf());
    }
    let stem = source.file_stem()?.to_str()?;
    let dir = source.parent()?;

    let mut candidates = Vec::new();
    for ext in JS_EXTENSIONS {
        for suffix in TEST_SUFFIXES {
            candidates.push(dir.join(format!("{}.{}.{}", stem, suffix, ext)));
            candidates.push(dir.join("__tests__").join(format!("{}.{}.{}", stem, suffix, ext)));
        }
        candidates.push(dir.join("__tests__").join(format!("{}.{}", stem, ext)));
    }
    if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
        return Some(found);
    }

    let mut matches: Vec<PathBuf> = WalkDir::new(&project.root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.file_type().is_dir() {
                let name = e.file_name().to_str().unwrap_or("");
                return !SKIP_DIRS.contains(&name);
            }
            true
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_test_file(p) && test_stem(p) == Some(stem))
        .collect();
    matches.sort_by_key(|p| (p.components().count(), p.clone()));
    matches.into_iter().next()
}

/// `calc` for `calc.test.ts` and `__tests__/calc.ts`.
fn test_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let base = name.split('.').next()?;
    Some(base)
}
