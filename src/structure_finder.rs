//! Structure inference by approximate alignment against a template.
//!
//! Given a template (an example filename cut into elements) and a selection
//! of the elements that carry fields, every filename is aligned element by
//! element: each selected element is matched, left to right, to the
//! contiguous token range with the smallest edit distance that starts after
//! the previous match. Unselected elements are then filled in from the gaps
//! between the matched ones.
//!
//! The alignment is greedy and per element. It does not search all possible
//! subdivisions of a filename, which would grow combinatorially with the
//! number of tokens, so filenames whose fields drift far from the template
//! can be mis-aligned.

use crate::distance::levenshtein;
use crate::field::{FieldSet, FieldValues};
use crate::regex_capture::RegexDelimiters;
use crate::template::{FieldSelection, Template, usable_separators};
use crate::tokenizer::{Tokenized, split_with_separators};
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;

/// Errors raised by invalid structure configuration.
///
/// These are returned before any state is touched, so a caller can keep
/// using its previous finder or template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("no separator given")]
    NoSeparators,
    #[error("expected one template position per field ({expected}), got {got}")]
    FieldCountMismatch { expected: usize, got: usize },
    #[error("no filename to infer a structure from")]
    NoData,
    #[error("{tags} tags given for only {tokens} tokens")]
    TagCountMismatch { tokens: usize, tags: usize },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' is assigned to tokens that are not adjacent")]
    NonAdjacentField(String),
}

/// The part of a filename aligned to one template element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Tokens covered, as a half-open range of token indices.
    pub tokens: Range<usize>,
    /// Bytes covered in the filename.
    pub bytes: Range<usize>,
}

impl Segment {
    fn covering(example: &Tokenized, first: usize, last: usize) -> Self {
        let spans = example.spans();
        Self {
            tokens: first..last + 1,
            bytes: spans[first].start..spans[last].end,
        }
    }

    /// An empty segment sitting just before token `token` (or at the end).
    fn empty_at(example: &Tokenized, token: usize) -> Self {
        let offset = example
            .spans()
            .get(token)
            .map_or(example.text().len(), |span| span.start);
        Self {
            tokens: token..token,
            bytes: offset..offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The alignment of one filename against a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    text: String,
    segments: Vec<Segment>,
    /// Selected positions past the end of the template.
    overflow: Vec<(usize, Segment)>,
}

impl Alignment {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// One segment per template element.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, position: usize) -> Option<&Segment> {
        self.segments.get(position).or_else(|| {
            self.overflow
                .iter()
                .find(|(p, _)| *p == position)
                .map(|(_, segment)| segment)
        })
    }

    /// Substring aligned to `position`.
    pub fn value(&self, position: usize) -> Option<&str> {
        self.segment(position)
            .map(|segment| &self.text[segment.bytes.clone()])
    }
}

/// Aligns a set of filenames against example templates.
///
/// A finder is immutable: it owns the filenames and their tokenization for
/// one separator list. Changing separators yields a new finder.
#[derive(Debug, Clone)]
pub struct StructureFinder {
    separators: Vec<String>,
    examples: Vec<Tokenized>,
}

impl StructureFinder {
    /// Tokenizes every filename with `separators`.
    ///
    /// Empty separators are ignored; if none is left, `NoSeparators` is
    /// returned.
    pub fn new<D: AsRef<str>, S: AsRef<str>>(
        data: &[D],
        separators: &[S],
    ) -> Result<Self, StructureError> {
        let separators = usable_separators(separators)?;
        let examples = data
            .iter()
            .map(|name| split_with_separators(name.as_ref(), &separators))
            .collect();
        Ok(Self {
            separators,
            examples,
        })
    }

    /// A finder over the same filenames with other separators.
    pub fn with_separators<S: AsRef<str>>(&self, separators: &[S]) -> Result<Self, StructureError> {
        let names: Vec<&str> = self.examples.iter().map(Tokenized::text).collect();
        Self::new(&names, separators)
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    pub fn examples(&self) -> &[Tokenized] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The tokenized filename with the most tokens.
    ///
    /// Ties go to the first filename. `None` if there is no filename.
    pub fn representative(&self) -> Option<&Tokenized> {
        let mut best: Option<&Tokenized> = None;
        for example in &self.examples {
            if best.is_none_or(|b| example.len() > b.len()) {
                best = Some(example);
            }
        }
        best
    }

    /// The filename with the most tokens, and its token count.
    pub fn best_representative(&self) -> Option<(&str, usize)> {
        self.representative()
            .map(|example| (example.text(), example.len()))
    }

    /// Aligns every filename against `template`.
    ///
    /// `positions` are the template positions matched explicitly; if empty,
    /// every template position is matched. Positions past the end of the
    /// template take whatever remains of the filename.
    pub fn align(&self, template: &Template, positions: &[usize]) -> Vec<Alignment> {
        let mut interested: Vec<usize> = if positions.is_empty() {
            (0..template.len()).collect()
        } else {
            positions.to_vec()
        };
        interested.sort_unstable();
        interested.dedup();

        self.examples
            .iter()
            .map(|example| align_example(example, template, &interested))
            .collect()
    }

    /// Field values of every filename.
    ///
    /// Each field takes the substring aligned to its selected template
    /// position. A field with no position takes the whole filename.
    ///
    /// # Errors
    ///
    /// `FieldCountMismatch` if `selection` does not hold one entry per field.
    pub fn find_structure(
        &self,
        template: &Template,
        selection: &FieldSelection,
        fields: &FieldSet,
    ) -> Result<Vec<FieldValues>, StructureError> {
        if selection.len() != fields.len() {
            return Err(StructureError::FieldCountMismatch {
                expected: fields.len(),
                got: selection.len(),
            });
        }

        let alignments = self.align(template, &selection.assigned_positions());
        Ok(alignments
            .iter()
            .map(|alignment| field_values(alignment, selection, fields))
            .collect())
    }

    /// Builds a structure template string reproducing the alignments.
    ///
    /// Every template position becomes an alternation of the values seen at
    /// that position (longest first). Positions carrying a field become
    /// `(Name:...)` groups, the others non-capturing groups, and positions
    /// are joined by one or more separators (any number before a position
    /// that was empty in some filename). The result can be compiled with
    /// [`crate::regex_capture::StructurePattern`].
    pub fn structure_template(
        &self,
        alignments: &[Alignment],
        template: &Template,
        selection: &FieldSelection,
        fields: &FieldSet,
        delimiters: &RegexDelimiters,
    ) -> String {
        let escaped: Vec<String> = self.separators.iter().map(|s| regex::escape(s)).collect();
        let separators = escaped.join("|");
        let names = fields.names();

        let mut structure = String::new();
        for (position, values) in candidate_values(alignments, template.len())
            .iter()
            .enumerate()
        {
            // A position that can be empty may share its separator with
            // the previous one.
            if position > 0 {
                let repeat = if values.iter().any(String::is_empty) { '*' } else { '+' };
                structure.push_str(&format!("(?:{separators}){repeat}"));
            }

            let alternatives: Vec<String> = values.iter().map(|v| regex::escape(v)).collect();
            let field_id = selection
                .positions()
                .iter()
                .position(|p| *p == Some(position));

            match field_id {
                Some(field_id) => {
                    structure.push_str(&delimiters.open);
                    structure.push_str(names[field_id]);
                    structure.push_str(&delimiters.struct_sep);
                    structure.push_str(&alternatives.join("|"));
                    structure.push_str(&delimiters.close);
                }
                None => {
                    structure.push_str("(?:");
                    structure.push_str(&alternatives.join("|"));
                    structure.push(')');
                }
            }
        }
        structure
    }
}

/// Distinct values aligned to each of the first `template_len` positions.
///
/// Values are sorted by decreasing length, then alphabetically.
pub fn candidate_values(alignments: &[Alignment], template_len: usize) -> Vec<Vec<String>> {
    (0..template_len)
        .map(|position| {
            let mut seen = HashSet::new();
            let mut values: Vec<String> = alignments
                .iter()
                .filter_map(|alignment| alignment.value(position))
                .filter(|value| seen.insert(*value))
                .map(str::to_string)
                .collect();
            values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            values
        })
        .collect()
}

/// Finds the token range of `example` closest to `sub_str`, at or after
/// token `min_start_id`.
///
/// For each start token, the end token is chosen by length: the first token
/// whose end reaches `sub_str`'s length, and the one before it. The edit
/// distance of both candidates is computed and the overall closest range is
/// kept, the earliest one winning ties. Returns `(first, last)` token
/// indices, inclusive, or `None` when no token is left.
pub fn best_match(sub_str: &str, example: &Tokenized, min_start_id: usize) -> Option<(usize, usize)> {
    let spans = example.spans();
    let text = example.text();
    let mut best: Option<(usize, usize, usize)> = None;

    for start_id in min_start_id..spans.len() {
        let target_end = spans[start_id].start + sub_str.len();
        let mut end_id = start_id;
        while end_id + 1 < spans.len() && spans[end_id].end < target_end {
            end_id += 1;
        }

        let shorter = end_id.checked_sub(1).filter(|&id| id >= start_id);
        for candidate_end in shorter.into_iter().chain(std::iter::once(end_id)) {
            let candidate = &text[spans[start_id].start..spans[candidate_end].end];
            let distance = levenshtein(sub_str, candidate);
            if best.is_none_or(|(best_distance, _, _)| distance < best_distance) {
                best = Some((distance, start_id, candidate_end));
            }
        }
    }

    best.map(|(_, first, last)| (first, last))
}

fn align_example(example: &Tokenized, template: &Template, interested: &[usize]) -> Alignment {
    let token_count = example.len();
    let mut matched: Vec<Option<Segment>> = vec![None; template.len()];
    let mut overflow = Vec::new();

    // Explicit matches, left to right.
    let mut cursor = 0;
    for &position in interested {
        let segment = match template.get(position) {
            _ if cursor >= token_count => Segment::empty_at(example, token_count),
            Some(element) => match best_match(element, example, cursor) {
                Some((first, last)) => Segment::covering(example, first, last),
                None => Segment::empty_at(example, token_count),
            },
            None => Segment::covering(example, cursor, token_count - 1),
        };
        cursor = segment.tokens.end;

        if position < template.len() {
            matched[position] = Some(segment);
        } else {
            overflow.push((position, segment));
        }
    }

    // Fill the gaps between explicit matches.
    let mut segments = Vec::with_capacity(template.len());
    let mut cursor = 0;
    for position in 0..template.len() {
        if let Some(segment) = matched[position].take() {
            cursor = segment.tokens.end;
            segments.push(segment);
            continue;
        }

        let segment = if cursor >= token_count {
            Segment::empty_at(example, token_count)
        } else {
            // Never run into the next explicit match.
            let next_start = matched[position + 1..]
                .iter()
                .flatten()
                .map(|next| next.tokens.start)
                .next()
                .unwrap_or(token_count);
            let end = if position + 1 == template.len() || matched[position + 1].is_some() {
                next_start
            } else {
                (cursor + 1).min(next_start)
            };
            if end > cursor {
                Segment::covering(example, cursor, end - 1)
            } else {
                Segment::empty_at(example, cursor)
            }
        };
        cursor = segment.tokens.end;
        segments.push(segment);
    }

    tracing::debug!(filename = example.text(), ?segments, "aligned filename");

    Alignment {
        text: example.text().to_string(),
        segments,
        overflow,
    }
}

fn field_values(alignment: &Alignment, selection: &FieldSelection, fields: &FieldSet) -> FieldValues {
    FieldValues::new(fields.iter().enumerate().map(|(field_id, field)| {
        let value = match selection.position_of(field_id) {
            Some(position) => alignment.value(position).unwrap_or_default(),
            None => alignment.text(),
        };
        (field.name.as_str(), value)
    }))
}
