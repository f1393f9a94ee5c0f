//! Example templates and field selections.
//!
//! A template is a representative filename cut into ordered elements. Each
//! field of interest points at one element; the structure finder then looks
//! for the closest match of that element in every other filename.

use crate::field::FieldSet;
use crate::structure_finder::StructureError;
use crate::tokenizer::split_with_separators;

/// Ordered decomposition of a representative filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    elements: Vec<String>,
}

impl Template {
    pub fn new<S: Into<String>>(elements: impl IntoIterator<Item = S>) -> Self {
        Self {
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.elements.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Builds a template by fusing adjacent tokens that carry the same tag.
    ///
    /// `tags[i]` names the field token `i` belongs to, or `None` when the
    /// token is not of interest. Missing trailing tags count as `None`.
    /// Adjacent untagged tokens are fused together as well, so every element
    /// of the returned template is either one field or one untagged run.
    ///
    /// # Errors
    ///
    /// * `NoSeparators` if no non-empty separator is given
    /// * `TagCountMismatch` if there are more tags than tokens
    /// * `UnknownField` if a tag is not a field of `fields`
    /// * `NonAdjacentField` if a field tags two separate runs of tokens
    ///
    /// # Examples
    ///
    /// ```
    /// use runfiler::field::FieldSet;
    /// use runfiler::template::Template;
    ///
    /// let (template, selection) = Template::from_tags(
    ///     "Dual_M8_Post_WT_Run6",
    ///     &["_"],
    ///     &[None, Some("Mouse"), Some("Timepoint"), Some("Group"), Some("Run")],
    ///     &FieldSet::default(),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(template.elements(), &["Dual", "M8", "Post", "WT", "Run6"]);
    /// assert_eq!(selection.positions(), &[Some(3), Some(2), Some(1), Some(4)]);
    /// ```
    pub fn from_tags<S: AsRef<str>>(
        text: &str,
        separators: &[S],
        tags: &[Option<&str>],
        fields: &FieldSet,
    ) -> Result<(Template, FieldSelection), StructureError> {
        let separators = usable_separators(separators)?;
        let tokenized = split_with_separators(text, &separators);

        if tags.len() > tokenized.len() {
            return Err(StructureError::TagCountMismatch {
                tokens: tokenized.len(),
                tags: tags.len(),
            });
        }

        let mut field_ids = Vec::with_capacity(tokenized.len());
        for token_id in 0..tokenized.len() {
            let field_id = match tags.get(token_id).copied().flatten() {
                Some(name) => Some(
                    fields
                        .index_of(name)
                        .ok_or_else(|| StructureError::UnknownField(name.to_string()))?,
                ),
                None => None,
            };
            field_ids.push(field_id);
        }

        // (first token, last token, tag) of each run of equal tags
        let mut runs: Vec<(usize, usize, Option<usize>)> = Vec::new();
        for (token_id, field_id) in field_ids.iter().enumerate() {
            match runs.last_mut() {
                Some(run) if run.2 == *field_id => run.1 = token_id,
                _ => runs.push((token_id, token_id, *field_id)),
            }
        }

        let mut positions = vec![None; fields.len()];
        for (position, (_, _, field_id)) in runs.iter().enumerate() {
            if let Some(field_id) = *field_id {
                if positions[field_id].is_some() {
                    let name = fields.names()[field_id].to_string();
                    return Err(StructureError::NonAdjacentField(name));
                }
                positions[field_id] = Some(position);
            }
        }

        let template = Template::new(
            runs.iter()
                .map(|(first, last, _)| tokenized.slice_tokens(*first, *last)),
        );

        Ok((template, FieldSelection::new(positions)))
    }
}

/// For each field (in field-set order), the template position realising it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSelection {
    positions: Vec<Option<usize>>,
}

impl FieldSelection {
    pub fn new(positions: Vec<Option<usize>>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[Option<usize>] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Template position chosen for the field at `field_index`.
    pub fn position_of(&self, field_index: usize) -> Option<usize> {
        self.positions.get(field_index).copied().flatten()
    }

    /// Assigned positions, sorted and deduplicated.
    pub fn assigned_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.positions.iter().flatten().copied().collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

/// Drops empty separators, failing if none is left.
pub(crate) fn usable_separators<S: AsRef<str>>(
    separators: &[S],
) -> Result<Vec<String>, StructureError> {
    let separators: Vec<String> = separators
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if separators.is_empty() {
        return Err(StructureError::NoSeparators);
    }
    Ok(separators)
}
