/// Semantic fields carried by recording filenames.
///
/// A filename is described by an ordered set of fields (by default Group,
/// Timepoint, Mouse and Run). Each field has a role that tells the organizer
/// how it is used when building the output hierarchy; custom fields can be
/// added through configuration and take the `Other` role.
///
/// # Examples
///
/// ```
/// use runfiler::field::{FieldRole, FieldSet};
///
/// let fields = FieldSet::default();
/// assert_eq!(fields.names(), vec!["Group", "Timepoint", "Mouse", "Run"]);
/// assert_eq!(fields.index_of_role(FieldRole::Mouse), Some(2));
/// ```
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// How a field is used by the organizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    /// Top-level output folder (falls back to the default group name when empty).
    Group,
    /// Second-level output folder, the dataset.
    Timepoint,
    /// Animal identifier.
    Mouse,
    /// Run identifier within a session.
    Run,
    /// Any other field; only used for association.
    Other,
}

impl FieldRole {
    /// Infers the role from a conventional field name.
    ///
    /// ```
    /// use runfiler::field::FieldRole;
    ///
    /// assert_eq!(FieldRole::from_name("Dataset"), FieldRole::Timepoint);
    /// assert_eq!(FieldRole::from_name("batch"), FieldRole::Group);
    /// assert_eq!(FieldRole::from_name("Cage"), FieldRole::Other);
    /// ```
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "group" | "batch" => FieldRole::Group,
            "timepoint" | "dataset" => FieldRole::Timepoint,
            "mouse" | "animal" => FieldRole::Mouse,
            "run" | "trial" => FieldRole::Run,
            _ => FieldRole::Other,
        }
    }
}

/// A single configured field: its name, a human description and its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Inferred from the name when omitted.
    #[serde(default)]
    pub role: Option<FieldRole>,
}

impl FieldSpec {
    pub fn new(name: &str, description: &str, role: FieldRole) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            role: Some(role),
        }
    }

    pub fn role(&self) -> FieldRole {
        self.role.unwrap_or_else(|| FieldRole::from_name(&self.name))
    }
}

/// Errors raised when validating a field set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldSetError {
    #[error("at least one field is required")]
    Empty,
    #[error("duplicate field name '{0}'")]
    DuplicateName(String),
    #[error("invalid field name '{0}': use letters, digits and '_' only, not starting with a digit")]
    InvalidName(String),
    #[error("more than one field has the {0:?} role")]
    DuplicateRole(FieldRole),
}

/// The ordered list of fields every filename is decomposed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
}

impl FieldSet {
    /// Validates and wraps an ordered list of fields.
    ///
    /// Names must be usable as regex group names, since the regex capturer
    /// turns each field into a named capture group.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, FieldSetError> {
        if fields.is_empty() {
            return Err(FieldSetError::Empty);
        }

        let mut names = HashSet::new();
        let mut roles = HashSet::new();
        for field in &fields {
            if !is_valid_name(&field.name) {
                return Err(FieldSetError::InvalidName(field.name.clone()));
            }
            if !names.insert(field.name.as_str()) {
                return Err(FieldSetError::DuplicateName(field.name.clone()));
            }
            let role = field.role();
            if role != FieldRole::Other && !roles.insert(role) {
                return Err(FieldSetError::DuplicateRole(role));
            }
        }

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn index_of_role(&self, role: FieldRole) -> Option<usize> {
        self.fields.iter().position(|f| f.role() == role)
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("Group", "Experimental group or batch", FieldRole::Group),
                FieldSpec::new("Timepoint", "Dataset or timepoint", FieldRole::Timepoint),
                FieldSpec::new("Mouse", "Animal identifier", FieldRole::Mouse),
                FieldSpec::new("Run", "Run identifier", FieldRole::Run),
            ],
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Per-filename field values, in field-set order.
///
/// Two files are associated when their `tuple()`s are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldValues {
    entries: Vec<(String, String)>,
}

impl FieldValues {
    /// Builds values from `(field name, value)` pairs, keeping their order.
    pub fn new<I, N, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    /// Every field set to `value`: the "no structure information" fallback.
    pub fn uniform(fields: &FieldSet, value: &str) -> Self {
        Self::new(fields.iter().map(|f| (f.name.as_str(), value)))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value at the given field-set position.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, value)| value.as_str())
    }

    /// Ordered values, the key used for association.
    pub fn tuple(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, value)| value.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FieldValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The three kinds of files a run is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    /// Side-view tracking data.
    Side,
    /// Ventral-view tracking data.
    Ventral,
    /// Raw or overlay video.
    Video,
}

impl FileClass {
    pub const ALL: [FileClass; 3] = [FileClass::Side, FileClass::Ventral, FileClass::Video];

    pub fn label(&self) -> &'static str {
        match self {
            FileClass::Side => "side",
            FileClass::Ventral => "ventral",
            FileClass::Video => "video",
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
