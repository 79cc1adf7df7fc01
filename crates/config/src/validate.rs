//! Config validation: syntax, unknown fields with suggestions, type errors
//! and semantic checks.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{
    env_subst::{substitute_env, unresolved_placeholders},
    loader::{Format, find_config_file, parse_config, parse_value},
    schema::{ContextBackend, ParleyConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "type-error", "env" or "semantic"
    pub category: &'static str,
    /// Dotted path, e.g. `context.backend`.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, category: &'static str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message,
        });
    }
}

/// Known keys per section.
const SECTIONS: &[(&str, &[&str])] = &[
    ("context", &["backend", "database_url"]),
    ("routing", &["wait_timeout_secs"]),
    ("agent", &["label"]),
];

const ONE_DAY_SECS: u64 = 24 * 60 * 60;

/// Validate the config at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let Some(path) = path.map(Path::to_path_buf).or_else(find_config_file) else {
        let mut result = ValidationResult::default();
        result.push(
            Severity::Info,
            "syntax",
            "",
            "no config file found; using defaults".into(),
        );
        return result;
    };

    let mut result = match (std::fs::read_to_string(&path), Format::from_path(&path)) {
        (Ok(raw), Ok(format)) => validate_str(&raw, format),
        (Err(e), _) => {
            let mut result = ValidationResult::default();
            result.push(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            );
            result
        },
        (_, Err(e)) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "syntax", "", e.to_string());
            result
        },
    };
    result.config_path = Some(path);
    result
}

/// Validate raw config text in the given format.
#[must_use]
pub fn validate_str(raw: &str, format: Format) -> ValidationResult {
    let mut result = ValidationResult::default();
    let raw = substitute_env(raw);

    for name in unresolved_placeholders(&raw) {
        result.push(
            Severity::Warning,
            "env",
            "",
            format!("environment variable `{name}` is not set"),
        );
    }

    let tree = match parse_value(&raw, format) {
        Ok(tree) => tree,
        Err(e) => {
            result.push(Severity::Error, "syntax", "", e.to_string());
            return result;
        },
    };
    check_unknown_fields(&tree, &mut result);

    match parse_config(&raw, format) {
        Ok(config) => check_semantics(&config, &mut result),
        Err(e) => result.push(Severity::Error, "type-error", "", e.to_string()),
    }
    result
}

fn check_unknown_fields(tree: &Value, result: &mut ValidationResult) {
    let Some(root) = tree.as_object() else {
        // Empty YAML documents parse to null.
        if !tree.is_null() {
            result.push(
                Severity::Error,
                "type-error",
                "",
                "config root must be a table".into(),
            );
        }
        return;
    };

    let section_names: Vec<&str> = SECTIONS.iter().map(|(name, _)| *name).collect();
    for (section, body) in root {
        let Some((_, fields)) = SECTIONS.iter().find(|(name, _)| *name == section.as_str()) else {
            result.push(
                Severity::Error,
                "unknown-field",
                section,
                unknown_message(section, &section_names),
            );
            continue;
        };
        let Some(body) = body.as_object() else {
            continue;
        };
        for key in body.keys() {
            if !fields.contains(&key.as_str()) {
                result.push(
                    Severity::Error,
                    "unknown-field",
                    &format!("{section}.{key}"),
                    unknown_message(key, fields),
                );
            }
        }
    }
}

fn unknown_message(key: &str, known: &[&str]) -> String {
    match suggest(key, known, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".into(),
    }
}

fn check_semantics(config: &ParleyConfig, result: &mut ValidationResult) {
    let url = config.context.database_url.as_deref().map(str::trim);
    match (config.context.backend, url) {
        (ContextBackend::Sqlite, None | Some("")) => result.push(
            Severity::Error,
            "semantic",
            "context.database_url",
            "sqlite backend requires a database_url".into(),
        ),
        (ContextBackend::Sqlite, Some(url)) if !url.starts_with("sqlite:") => result.push(
            Severity::Error,
            "semantic",
            "context.database_url",
            format!("`{url}` is not a sqlite: URL"),
        ),
        (ContextBackend::Memory, Some(_)) => result.push(
            Severity::Warning,
            "semantic",
            "context.database_url",
            "database_url is ignored by the memory backend".into(),
        ),
        _ => {},
    }

    match config.routing.wait_timeout_secs {
        0 => result.push(
            Severity::Info,
            "semantic",
            "routing.wait_timeout_secs",
            "waits never time out".into(),
        ),
        secs if secs > ONE_DAY_SECS => result.push(
            Severity::Warning,
            "semantic",
            "routing.wait_timeout_secs",
            format!("{secs}s is longer than a day; abandoned waits hold their slot until then"),
        ),
        _ => {},
    }

    if config.agent.label.trim().is_empty() {
        result.push(
            Severity::Warning,
            "semantic",
            "agent.label",
            "empty agent label".into(),
        );
    }
}

/// Levenshtein edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (diag + usize::from(ca != *cb))
                .min(above + 1)
                .min(row[j] + 1);
            diag = above;
        }
    }
    row[b.len()]
}

/// Closest candidate within `max_distance` edits, excluding exact matches.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| (1..=max_distance).contains(d))
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}
