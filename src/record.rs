//! Typed archival records and the arena they are built in.
//!
//! Records are allocated in a [`RecordStore`] while the document is walked
//! and only turned into JSON values (the shape the persistence layer expects,
//! tagged with `jsonmodel_type`) once the whole document has been converted.
//! That is also where the required-field schema is enforced.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ConversionError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Resource,
    ArchivalObject,
    NoteSinglepart,
    NoteMultipart,
    NoteText,
    NoteIndex,
    NoteIndexItem,
    NoteOrderedList,
    NoteDefinedList,
    NoteChronology,
    Extent,
    Subject,
    AgentPerson,
    AgentFamily,
    AgentCorporateEntity,
    LinkedAgentReference,
    Instance,
    DigitalObject,
    Container,
    Date,
    RightsStatement,
}

/// A constraint a finished record must satisfy
#[derive(Clone, Copy, Debug)]
pub enum Requirement {
    /// Present and non-empty
    Field(&'static str),
    /// Present, but may be empty
    Present(&'static str),
    /// At least one of these is present and non-empty
    AnyOf(&'static [&'static str]),
}

use Requirement::{AnyOf, Field as Required, Present};

impl RecordKind {
    pub fn jsonmodel_type(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::ArchivalObject => "archival_object",
            Self::NoteSinglepart => "note_singlepart",
            Self::NoteMultipart => "note_multipart",
            Self::NoteText => "note_text",
            Self::NoteIndex => "note_index",
            Self::NoteIndexItem => "note_index_item",
            Self::NoteOrderedList => "note_orderedlist",
            Self::NoteDefinedList => "note_definedlist",
            Self::NoteChronology => "note_chronology",
            Self::Extent => "extent",
            Self::Subject => "subject",
            Self::AgentPerson => "agent_person",
            Self::AgentFamily => "agent_family",
            Self::AgentCorporateEntity => "agent_corporate_entity",
            Self::LinkedAgentReference => "linked_agent",
            Self::Instance => "instance",
            Self::DigitalObject => "digital_object",
            Self::Container => "container",
            Self::Date => "date",
            Self::RightsStatement => "rights_statement",
        }
    }

    /// The uri collection of records that stand on their own (and can thus be referenced)
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            Self::Resource => Some("resources"),
            Self::ArchivalObject => Some("archival_objects"),
            Self::Subject => Some("subjects"),
            Self::AgentPerson => Some("agents/people"),
            Self::AgentFamily => Some("agents/families"),
            Self::AgentCorporateEntity => Some("agents/corporate_entities"),
            Self::DigitalObject => Some("digital_objects"),
            _ => None,
        }
    }

    pub fn requirements(&self) -> &'static [Requirement] {
        match self {
            Self::Resource => &[Required("title"), Required("level")],
            Self::ArchivalObject => &[Required("level"), AnyOf(&["title", "dates"])],
            Self::NoteSinglepart => &[Required("type"), Required("content")],
            Self::NoteMultipart => &[Required("type")],
            Self::NoteText => &[Required("content")],
            Self::NoteIndex => &[Required("type")],
            Self::NoteIndexItem => &[Required("type"), Required("value")],
            Self::NoteOrderedList | Self::NoteDefinedList | Self::NoteChronology => &[],
            Self::Extent => &[
                Required("number"),
                Required("extent_type"),
                Required("portion"),
            ],
            Self::Subject => &[
                Required("terms"),
                Required("vocabulary"),
                Required("source"),
            ],
            Self::AgentPerson | Self::AgentFamily | Self::AgentCorporateEntity => {
                &[Required("names")]
            }
            Self::LinkedAgentReference => &[Required("ref"), Required("role")],
            Self::Instance => &[
                Required("instance_type"),
                AnyOf(&["container", "digital_object"]),
            ],
            // a synthesized title may legitimately come out empty
            Self::DigitalObject => &[Required("digital_object_id"), Present("title")],
            Self::Container => &[Required("type_1"), Required("indicator_1")],
            Self::Date => &[
                Required("date_type"),
                Required("label"),
                AnyOf(&["expression", "begin"]),
            ],
            Self::RightsStatement => &[Required("rights_type")],
        }
    }

    /// Fields that hold at most one link
    pub fn is_singular(&self, field: &str) -> bool {
        matches!(
            (self, field),
            (Self::Instance, "container") | (Self::Instance, "digital_object")
        )
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.jsonmodel_type())
    }
}

#[derive(Clone, Debug, PartialEq)]
/// What a record field links to
pub enum Link {
    /// An owned child record
    Record(RecordId),
    /// A reference by uri, to a record in this batch or elsewhere
    Ref(String),
    /// A plain value (list items, chronology items, subject references with extra data)
    Value(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Scalar(Value),
    One(Link),
    Many(Vec<Link>),
}

#[derive(Clone, Debug)]
pub struct Record {
    kind: RecordKind,
    uri: Option<String>,
    /// Markup path of the node this record was begun at
    origin: String,
    fields: BTreeMap<&'static str, Field>,
    attached: bool,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Scalar string value of a field
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(Field::Scalar(Value::String(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Links of a field, in insertion order
    pub fn links(&self, name: &str) -> &[Link] {
        match self.fields.get(name) {
            Some(Field::Many(links)) => links.as_slice(),
            Some(Field::One(link)) => std::slice::from_ref(link),
            _ => &[],
        }
    }

    /// Child records of a field, in insertion order
    pub fn children<'s>(&'s self, name: &str) -> impl Iterator<Item = RecordId> + 's {
        self.links(name).iter().filter_map(|link| match link {
            Link::Record(id) => Some(*id),
            _ => None,
        })
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        self.fields.insert(name, Field::Scalar(value.into()));
    }

    /// Sets the field only if a value is given
    pub fn set_opt(&mut self, name: &'static str, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    pub fn has(&self, name: &str) -> bool {
        match self.fields.get(name) {
            None => false,
            Some(Field::Scalar(value)) => !is_empty_value(value),
            Some(Field::Many(links)) => !links.is_empty(),
            Some(Field::One(_)) => true,
        }
    }

    /// Appends a link to a list field, or sets a singular field
    fn link(&mut self, name: &'static str, link: Link) -> Result<()> {
        if self.kind.is_singular(name) {
            if self.fields.contains_key(name) {
                return Err(ConversionError::SlotOccupied {
                    kind: self.kind,
                    field: name,
                });
            }
            self.fields.insert(name, Field::One(link));
        } else {
            match self.fields.entry(name).or_insert_with(|| Field::Many(Vec::new())) {
                Field::Many(links) => links.push(link),
                _ => {
                    return Err(ConversionError::SlotOccupied {
                        kind: self.kind,
                        field: name,
                    })
                }
            }
        }
        Ok(())
    }

    /// The last plain value of a list field, for rules that complete an item in several steps
    pub fn last_value_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self.fields.get_mut(name) {
            Some(Field::Many(links)) => match links.last_mut() {
                Some(Link::Value(value)) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Scalar fields to begin a record with
#[derive(Clone, Debug, Default)]
pub struct Fields(Vec<(&'static str, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.0.push((name, value.into()));
        self
    }

    /// Adds the field only if a value is given
    pub fn with_opt(self, name: &'static str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }
}

#[derive(Debug, Default)]
/// Arena holding every record of one conversion
pub struct RecordStore {
    records: Vec<Record>,
    /// Records that stand on their own next to the resource (agents, subjects)
    batch: Vec<RecordId>,
    root: Option<RecordId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, kind: RecordKind, fields: Fields, origin: &str) -> RecordId {
        let id = RecordId(self.records.len());
        let uri = kind
            .collection()
            .map(|collection| format!("/{}/import_{}", collection, id.0 + 1));
        let mut record = Record {
            kind,
            uri,
            origin: origin.to_string(),
            fields: BTreeMap::new(),
            attached: false,
        };
        for (name, value) in fields.0 {
            record.set(name, value);
        }
        self.records.push(record);
        id
    }

    pub fn get(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: RecordId) -> &mut Record {
        &mut self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in the order they were begun
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Marks a record as the root of the graph (the first resource)
    pub fn set_root(&mut self, id: RecordId) {
        if self.root.is_none() {
            self.root = Some(id);
            self.records[id.0].attached = true;
        }
    }

    /// Adds a record that stands on its own next to the root
    pub fn add_to_batch(&mut self, id: RecordId) {
        self.records[id.0].attached = true;
        self.batch.push(id);
    }

    /// Links `link` into `field` of `owner`
    pub fn attach(&mut self, owner: RecordId, field: &'static str, link: Link) -> Result<()> {
        if let Link::Record(child) = link {
            self.records[child.0].attached = true;
        }
        self.records[owner.0].link(field, link)
    }

    /// Validates every record and materializes the graph
    pub fn finish(self) -> Result<(Value, Vec<Value>)> {
        for record in self.records.iter() {
            if !record.attached {
                return Err(ConversionError::Orphan {
                    kind: record.kind,
                    path: record.origin.clone(),
                });
            }
        }
        let root = self.root.ok_or(ConversionError::NoResource)?;
        let resource = self.materialize(root)?;
        let mut batch = Vec::with_capacity(self.batch.len());
        for id in self.batch.iter() {
            batch.push(self.materialize(*id)?);
        }
        Ok((resource, batch))
    }

    fn materialize(&self, id: RecordId) -> Result<Value> {
        let record = self.get(id);
        validate(record)?;
        let mut out = Map::new();
        out.insert(
            "jsonmodel_type".into(),
            Value::String(record.kind.jsonmodel_type().into()),
        );
        if let Some(uri) = record.uri.as_ref() {
            out.insert("uri".into(), Value::String(uri.clone()));
        }
        for (name, field) in record.fields.iter() {
            let value = match field {
                Field::Scalar(value) => value.clone(),
                Field::One(link) => self.materialize_link(link)?,
                Field::Many(links) => Value::Array(
                    links
                        .iter()
                        .map(|link| self.materialize_link(link))
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            out.insert(name.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    fn materialize_link(&self, link: &Link) -> Result<Value> {
        match link {
            Link::Record(id) => self.materialize(*id),
            Link::Ref(uri) => {
                let mut reference = Map::new();
                reference.insert("ref".into(), Value::String(uri.clone()));
                Ok(Value::Object(reference))
            }
            Link::Value(value) => Ok(value.clone()),
        }
    }
}

fn validate(record: &Record) -> Result<()> {
    let missing = |field: String| ConversionError::MissingRequiredField {
        kind: record.kind,
        field,
        path: record.origin.clone(),
    };
    for requirement in record.kind.requirements().iter().copied() {
        match requirement {
            Required(field) => {
                if !record.has(field) {
                    return Err(missing(field.to_string()));
                }
            }
            Present(field) => {
                if !matches!(record.get(field), Some(Field::Scalar(Value::String(_)))) {
                    return Err(missing(field.to_string()));
                }
            }
            AnyOf(fields) => {
                if !fields.iter().any(|field| record.has(field)) {
                    return Err(missing(fields.join("|")));
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Agent,
    Subject,
    DigitalObject,
    Container,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// A reference that did not resolve within the converted document. These are
/// handed to the persistence layer, which knows about previously imported records.
pub struct DanglingReference {
    pub kind: ReferenceKind,
    pub identifier: String,
    pub path: String,
}

#[derive(Clone, Debug, Serialize)]
/// The finished output of one conversion
pub struct RecordGraph {
    pub resource: Value,
    pub records: Vec<Value>,
    pub dangling_references: Vec<DanglingReference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_nested() -> Result<()> {
        let mut store = RecordStore::new();
        let resource = store.begin(
            RecordKind::Resource,
            Fields::new().with("title", "Papers").with("level", "collection"),
            "/ead",
        );
        store.set_root(resource);
        let note = store.begin(
            RecordKind::NoteMultipart,
            Fields::new().with("type", "scopecontent"),
            "/ead/archdesc/scopecontent",
        );
        store.attach(resource, "notes", Link::Record(note))?;
        let text = store.begin(
            RecordKind::NoteText,
            Fields::new().with("content", "Letters."),
            "/ead/archdesc/scopecontent",
        );
        store.attach(note, "subnotes", Link::Record(text))?;
        let (value, batch) = store.finish()?;
        assert!(batch.is_empty());
        assert_eq!(value["jsonmodel_type"], "resource");
        assert_eq!(value["uri"], "/resources/import_1");
        assert_eq!(value["notes"][0]["type"], "scopecontent");
        assert_eq!(value["notes"][0]["subnotes"][0]["content"], "Letters.");
        Ok(())
    }

    #[test]
    fn test_missing_required_field() {
        let mut store = RecordStore::new();
        let resource = store.begin(
            RecordKind::Resource,
            Fields::new().with("title", "Papers").with("level", "collection"),
            "/ead",
        );
        store.set_root(resource);
        let extent = store.begin(
            RecordKind::Extent,
            Fields::new().with("number", "3").with("portion", "whole"),
            "/ead/archdesc/did/physdesc",
        );
        store
            .attach(resource, "extents", Link::Record(extent))
            .expect("attach");
        match store.finish() {
            Err(ConversionError::MissingRequiredField { kind, field, .. }) => {
                assert_eq!(kind, RecordKind::Extent);
                assert_eq!(field, "extent_type");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let mut store = RecordStore::new();
        let resource = store.begin(
            RecordKind::Resource,
            Fields::new().with("title", "").with("level", "collection"),
            "/ead",
        );
        store.set_root(resource);
        assert!(matches!(
            store.finish(),
            Err(ConversionError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn test_present_allows_empty() -> Result<()> {
        let mut store = RecordStore::new();
        let resource = store.begin(
            RecordKind::Resource,
            Fields::new().with("title", "Papers").with("level", "collection"),
            "/ead",
        );
        store.set_root(resource);
        let instance = store.begin(
            RecordKind::Instance,
            Fields::new().with("instance_type", "digital_object"),
            "/ead/archdesc/dao",
        );
        store.attach(resource, "instances", Link::Record(instance))?;
        let object = store.begin(
            RecordKind::DigitalObject,
            Fields::new().with("digital_object_id", "x").with("title", ""),
            "/ead/archdesc/dao",
        );
        store.attach(instance, "digital_object", Link::Record(object))?;
        let (value, _) = store.finish()?;
        assert_eq!(value["instances"][0]["digital_object"]["title"], "");
        Ok(())
    }

    #[test]
    fn test_singular_field_set_once() -> Result<()> {
        let mut store = RecordStore::new();
        let instance = store.begin(
            RecordKind::Instance,
            Fields::new().with("instance_type", "mixed_materials"),
            "/c",
        );
        store.attach(instance, "container", Link::Ref("/containers/1".into()))?;
        assert!(matches!(
            store.attach(instance, "container", Link::Ref("/containers/2".into())),
            Err(ConversionError::SlotOccupied { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_orphan() {
        let mut store = RecordStore::new();
        let resource = store.begin(
            RecordKind::Resource,
            Fields::new().with("title", "Papers").with("level", "collection"),
            "/ead",
        );
        store.set_root(resource);
        store.begin(RecordKind::Extent, Fields::new(), "/ead/extent");
        assert!(matches!(
            store.finish(),
            Err(ConversionError::Orphan { .. })
        ));
    }

    #[test]
    fn test_no_resource() {
        let store = RecordStore::new();
        assert!(matches!(store.finish(), Err(ConversionError::NoResource)));
    }
}
