//! Field capture from a user-written structure template.
//!
//! A structure template is a regular expression in which fields are written
//! between delimiters, by default parentheses:
//!
//! - `(Mouse)` captures anything (`.*`) as the `Mouse` field;
//! - `(Group:WT|MU_C(x|X))` captures the `Group` field with the given
//!   sub-pattern, which may itself contain balanced parentheses.
//!
//! Everything else in the template is ordinary regex syntax.
//!
//! ```
//! use runfiler::field::FieldSet;
//! use runfiler::regex_capture::{RegexDelimiters, StructurePattern};
//!
//! let fields = FieldSet::default();
//! let pattern =
//!     StructurePattern::compile("(Group)_(Mouse)", &fields, &RegexDelimiters::default()).unwrap();
//! let capture = pattern.capture("WT_M3.csv");
//! assert!(capture.matched);
//! assert_eq!(capture.fields.unwrap().get("Mouse"), Some("M3"));
//! ```

use crate::field::{FieldSet, FieldValues};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while turning a structure template into a regex.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unbalanced brackets in the structure of field '{field}' (starting at byte {position})")]
    Unbalanced { field: String, position: usize },
    #[error("invalid regular expression: {0}")]
    Syntax(#[from] regex::Error),
    #[error("field delimiters must not be empty")]
    EmptyDelimiter,
}

/// Delimiters marking fields inside a structure template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexDelimiters {
    pub open: String,
    pub close: String,
    /// Separates a field name from its sub-pattern.
    pub struct_sep: String,
}

impl Default for RegexDelimiters {
    fn default() -> Self {
        Self {
            open: "(".to_string(),
            close: ")".to_string(),
            struct_sep: ":".to_string(),
        }
    }
}

/// Result of matching one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub matched: bool,
    /// Filename without directory and extension.
    pub basename: String,
    /// `None` when the filename does not match.
    pub fields: Option<FieldValues>,
}

impl Capture {
    /// The captured fields, or every field set to the whole basename.
    pub fn fields_or_fallback(&self, fields: &FieldSet) -> FieldValues {
        self.fields
            .clone()
            .unwrap_or_else(|| FieldValues::uniform(fields, &self.basename))
    }
}

/// A compiled structure template.
#[derive(Debug, Clone)]
pub struct StructurePattern {
    regex: Regex,
    field_names: Vec<String>,
}

impl StructurePattern {
    /// Compiles `template` for the given fields.
    ///
    /// # Errors
    ///
    /// `PatternError` if a structured field's brackets are unbalanced or if
    /// the resulting expression is not a valid regex.
    pub fn compile(
        template: &str,
        fields: &FieldSet,
        delimiters: &RegexDelimiters,
    ) -> Result<Self, PatternError> {
        let expression = build_regex(template, fields, delimiters)?;
        Ok(Self {
            regex: Regex::new(&expression)?,
            field_names: fields.names().into_iter().map(str::to_string).collect(),
        })
    }

    /// The regex the template was turned into.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Searches the pattern anywhere in the basename of `filename`.
    ///
    /// A field whose group did not take part in the match takes the whole
    /// basename.
    pub fn capture(&self, filename: &str) -> Capture {
        let basename = basename(filename);

        let Some(captures) = self.regex.captures(&basename) else {
            tracing::warn!(filename = %basename, "filename does not match the structure");
            return Capture {
                matched: false,
                basename,
                fields: None,
            };
        };

        let fields = FieldValues::new(self.field_names.iter().map(|name| {
            let value = captures
                .name(name)
                .map_or(basename.as_str(), |m| m.as_str());
            (name.as_str(), value)
        }));

        Capture {
            matched: true,
            basename,
            fields: Some(fields),
        }
    }
}

/// Rewrites field markers of `template` into named capture groups.
///
/// For each field, in field-set order, only the first marker is replaced:
/// `(Name)` becomes `(?<Name>.*)` and `(Name:SUB)` becomes `(?<Name>SUB)`.
pub fn build_regex(
    template: &str,
    fields: &FieldSet,
    delimiters: &RegexDelimiters,
) -> Result<String, PatternError> {
    if [&delimiters.open, &delimiters.close, &delimiters.struct_sep]
        .iter()
        .any(|d| d.is_empty())
    {
        return Err(PatternError::EmptyDelimiter);
    }

    let mut expression = template.to_string();
    for field in fields.iter() {
        let name = &field.name;
        let literal = format!("{}{}{}", delimiters.open, name, delimiters.close);
        let structured = format!("{}{}{}", delimiters.open, name, delimiters.struct_sep);

        let literal_at = expression.find(&literal);
        let structured_at = expression.find(&structured);

        match (literal_at, structured_at) {
            (Some(at), None) => {
                expression.replace_range(at..at + literal.len(), &format!("(?<{name}>.*)"));
            }
            (Some(at), Some(structured_at)) if at < structured_at => {
                expression.replace_range(at..at + literal.len(), &format!("(?<{name}>.*)"));
            }
            (_, Some(at)) => {
                let body_start = at + structured.len();
                let scanner = BracketScanner::new(&expression, delimiters);
                let body_end =
                    scanner
                        .group_end(body_start)
                        .ok_or_else(|| PatternError::Unbalanced {
                            field: name.clone(),
                            position: at,
                        })?;
                let group = format!("(?<{name}>{})", &expression[body_start..body_end]);
                expression.replace_range(at..body_end + delimiters.close.len(), &group);
            }
            (None, None) => {}
        }
    }

    Ok(expression)
}

fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Finds the end of a delimited group, honouring nesting.
///
/// Escaped characters and character classes are skipped, so `\)` or `[)]`
/// never close a group.
struct BracketScanner<'a> {
    text: &'a str,
    open: &'a str,
    close: &'a str,
}

impl<'a> BracketScanner<'a> {
    fn new(text: &'a str, delimiters: &'a RegexDelimiters) -> Self {
        Self {
            text,
            open: &delimiters.open,
            close: &delimiters.close,
        }
    }

    /// Index of the delimiter closing the group whose body starts at `index`.
    fn group_end(&self, mut index: usize) -> Option<usize> {
        while index < self.text.len() {
            let rest = &self.text[index..];
            if rest.starts_with(self.close) {
                return Some(index);
            }
            if rest.starts_with(self.open) {
                let inner_end = self.group_end(index + self.open.len())?;
                index = inner_end + self.close.len();
                continue;
            }
            index += atom_len(rest)?;
        }
        None
    }
}

/// Length of the regex atom at the start of `rest` that cannot hold a
/// delimiter: an escape sequence, a character class, or a single char.
fn atom_len(rest: &str) -> Option<usize> {
    let mut chars = rest.chars();
    match chars.next()? {
        '\\' => Some(1 + chars.next().map_or(0, char::len_utf8)),
        '[' => class_len(rest),
        c => Some(c.len_utf8()),
    }
}

fn class_len(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut i = 1;
    if bytes.get(i) == Some(&b'^') {
        i += 1;
    }
    // a leading ']' is a literal
    if bytes.get(i) == Some(&b']') {
        i += 1;
    }

    let mut depth = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'[' => {
                depth += 1;
                i += 1;
            }
            b']' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(template: &str) -> Result<StructurePattern, PatternError> {
        StructurePattern::compile(template, &FieldSet::default(), &RegexDelimiters::default())
    }

    #[test]
    fn test_simple_fields() {
        let pattern = compile("(Group)_(Mouse)").unwrap();
        let capture = pattern.capture("WT_M3");

        assert!(capture.matched);
        assert_eq!(capture.basename, "WT_M3");
        let fields = capture.fields.unwrap();
        assert_eq!(fields.get("Group"), Some("WT"));
        assert_eq!(fields.get("Mouse"), Some("M3"));
    }

    #[test]
    fn test_missing_field_takes_whole_basename() {
        let pattern = compile("(Group)_(Mouse)").unwrap();
        let fields = pattern.capture("WT_M3").fields.unwrap();
        assert_eq!(fields.get("Run"), Some("WT_M3"));
        assert_eq!(fields.get("Timepoint"), Some("WT_M3"));
    }

    #[test]
    fn test_structured_field() {
        let pattern = compile("(Group:[^_]*)_(Run)").unwrap();
        assert_eq!(pattern.as_str(), "(?<Group>[^_]*)_(?<Run>.*)");

        let fields = pattern.capture("WT_7").fields.unwrap();
        assert_eq!(fields.get("Group"), Some("WT"));
        assert_eq!(fields.get("Run"), Some("7"));
    }

    #[test]
    fn test_nested_parentheses_in_structure() {
        let pattern = compile(
            "Dual_side_and_ventral_(Mouse)_Post_(Group:(WT|MU_C(x|X)|MU_Saline|.*))_(Batch)_Run(Run:[0-9])",
        )
        .unwrap();
        let capture = pattern.capture("Dual_side_and_ventral_Mouse2Cage1_Post_MU_Cx_Batch_Run5.csv");

        assert!(capture.matched);
        let fields = capture.fields.unwrap();
        assert_eq!(fields.get("Mouse"), Some("Mouse2Cage1"));
        assert_eq!(fields.get("Group"), Some("MU_Cx"));
        assert_eq!(fields.get("Run"), Some("5"));
        assert_eq!(
            fields.get("Timepoint"),
            Some("Dual_side_and_ventral_Mouse2Cage1_Post_MU_Cx_Batch_Run5")
        );
    }

    #[test]
    fn test_escaped_and_class_brackets_do_not_close_group() {
        let pattern = compile(r"(Group:[)(]?\)x)_(Mouse)").unwrap();
        assert_eq!(pattern.as_str(), r"(?<Group>[)(]?\)x)_(?<Mouse>.*)");

        let fields = pattern.capture("()x_M1").fields.unwrap();
        assert_eq!(fields.get("Group"), Some("()x"));
        assert_eq!(fields.get("Mouse"), Some("M1"));
    }

    #[test]
    fn test_only_first_marker_is_replaced() {
        let result = build_regex(
            "(Mouse)_(Mouse)",
            &FieldSet::default(),
            &RegexDelimiters::default(),
        )
        .unwrap();
        assert_eq!(result, "(?<Mouse>.*)_(Mouse)");
    }

    #[test]
    fn test_unbalanced_structure_rejected() {
        let result = compile("(Group:([^_]*)_(Run)");
        assert!(matches!(
            result,
            Err(PatternError::Unbalanced { ref field, position: 0 }) if field == "Group"
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = compile("(Group)_[a-");
        assert!(matches!(result, Err(PatternError::Syntax(_))));
    }

    #[test]
    fn test_no_match_falls_back_to_basename() {
        let pattern = compile("(Group)_Run(Run:[0-9]+)").unwrap();
        let capture = pattern.capture("data/WT_M3.csv");

        assert!(!capture.matched);
        assert_eq!(capture.basename, "WT_M3");
        assert!(capture.fields.is_none());
        assert_eq!(
            capture.fields_or_fallback(&FieldSet::default()).tuple(),
            vec!["WT_M3"; 4]
        );
    }

    #[test]
    fn test_search_is_not_anchored() {
        let pattern = compile("Run(Run:[0-9]+)").unwrap();
        let fields = pattern.capture("WT_M3_Run12_filtered").fields.unwrap();
        assert_eq!(fields.get("Run"), Some("12"));
    }

    #[test]
    fn test_custom_delimiters() {
        let delimiters = RegexDelimiters {
            open: "{".to_string(),
            close: "}".to_string(),
            struct_sep: "=".to_string(),
        };
        let pattern = StructurePattern::compile(
            "{Group=[A-Z]+}_{Mouse}",
            &FieldSet::default(),
            &delimiters,
        )
        .unwrap();
        let fields = pattern.capture("WT_M3").fields.unwrap();
        assert_eq!(fields.get("Group"), Some("WT"));
        assert_eq!(fields.get("Mouse"), Some("M3"));
    }

    #[test]
    fn test_empty_delimiters_rejected() {
        let delimiters = RegexDelimiters {
            open: String::new(),
            ..RegexDelimiters::default()
        };
        let result = StructurePattern::compile("(Group)", &FieldSet::default(), &delimiters);
        assert!(matches!(result, Err(PatternError::EmptyDelimiter)));

        let delimiters = RegexDelimiters {
            struct_sep: String::new(),
            ..RegexDelimiters::default()
        };
        let result = StructurePattern::compile("(Group)", &FieldSet::default(), &delimiters);
        assert!(matches!(result, Err(PatternError::EmptyDelimiter)));
    }

    #[test]
    fn test_literal_marker_before_structured_marker() {
        let result = build_regex(
            "(Mouse)_(Mouse:M[0-9])",
            &FieldSet::default(),
            &RegexDelimiters::default(),
        )
        .unwrap();
        assert_eq!(result, "(?<Mouse>.*)_(Mouse:M[0-9])");

        let result = build_regex(
            "(Mouse:M[0-9])_(Mouse)",
            &FieldSet::default(),
            &RegexDelimiters::default(),
        )
        .unwrap();
        assert_eq!(result, "(?<Mouse>M[0-9])_(Mouse)");
    }
}
