use serde::Deserialize;

use crate::error::{ConversionError, Result};

fn default_vocabulary() -> String {
    "/vocabularies/1".into()
}

fn default_source() -> String {
    "ingest".into()
}

fn default_skip() -> Vec<String> {
    // descriptions of related material carry their own containers, titles and
    // notes, none of which describe the component they appear in
    ["archref/container", "archref/physdesc", "archref/unittitle", "archref/note"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
/// Which rule set to convert with
pub enum Profile {
    /// The plain EAD rules: one record per recognised element
    Stock,
    /// Stock rules overridden with list flattening, merged index entries,
    /// physical description decomposition, container hierarchies and
    /// synthesized digital object titles
    #[default]
    Extended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteShape {
    Singlepart,
    #[default]
    Multipart,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
/// Maps an element (by path pattern) to a note of the given type
pub struct NoteConfig {
    pub path: String,

    #[serde(rename = "type")]
    pub note_type: String,

    #[serde(default)]
    pub shape: NoteShape,
}

#[derive(Clone, Debug, Deserialize)]
/// Holds the configuration of a conversion
pub struct ConversionConfig {
    #[serde(default)]
    profile: Profile,

    #[serde(default = "default_vocabulary")]
    /// Vocabulary uri assigned to subjects and their terms
    vocabulary: String,

    #[serde(default = "default_source")]
    /// Source assigned to subjects and agents without a `source` attribute
    source: String,

    #[serde(default = "default_skip")]
    /// Path patterns whose elements (and everything below them) produce nothing
    skip: Vec<String>,

    #[serde(default)]
    /// Additional elements to convert into notes
    notes: Vec<NoteConfig>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionConfig {
    pub fn new() -> Self {
        Self {
            profile: Profile::default(),
            vocabulary: default_vocabulary(),
            source: default_source(),
            skip: default_skip(),
            notes: Vec::new(),
        }
    }

    /// Parse the configuration from a TOML string (load the data from file yourself).
    pub fn from_toml_str(tomlstr: &str) -> Result<Self> {
        let config: Self = toml::from_str(tomlstr)?;
        for note in config.notes.iter() {
            if note.path.trim().is_empty() || note.note_type.is_empty() {
                return Err(ConversionError::Config(format!(
                    "note mapping needs a path and a type (got path '{}', type '{}')",
                    note.path, note.note_type
                )));
            }
        }
        Ok(config)
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: impl Into<String>) -> Self {
        self.vocabulary = vocabulary.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Produce nothing for elements matching this pattern
    pub fn with_skip(mut self, pattern: impl Into<String>) -> Self {
        self.skip.push(pattern.into());
        self
    }

    /// Convert elements matching this pattern into notes of the given type
    pub fn with_note(
        mut self,
        pattern: impl Into<String>,
        note_type: impl Into<String>,
        shape: NoteShape,
    ) -> Self {
        self.notes.push(NoteConfig {
            path: pattern.into(),
            note_type: note_type.into(),
            shape,
        });
        self
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn vocabulary(&self) -> &str {
        self.vocabulary.as_str()
    }

    pub fn source(&self) -> &str {
        self.source.as_str()
    }

    pub fn skip(&self) -> &[String] {
        &self.skip
    }

    pub fn notes(&self) -> &[NoteConfig] {
        &self.notes
    }
}
