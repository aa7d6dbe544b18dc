//! The traversal engine and the per-document conversion session.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::ConversionConfig;
use crate::context::{ContextStack, Zone};
use crate::dispatch::RuleRegistry;
use crate::document::{parse, Element};
use crate::ead;
use crate::error::{ConversionError, Result};
use crate::normalize::normalize;
use crate::path::NodePath;
use crate::record::{
    DanglingReference, Fields, Link, Record, RecordGraph, RecordId, RecordKind, RecordStore,
    ReferenceKind,
};

/// Converts finding aids with one fixed rule set. A converter holds no
/// per-document state and can be reused for any number of documents.
pub struct Converter {
    config: ConversionConfig,
    registry: RuleRegistry,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        let mut registry = RuleRegistry::new();
        ead::register(&mut registry, &config);
        Self { config, registry }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts a complete EAD document
    pub fn convert(&self, markup: &str) -> Result<RecordGraph> {
        let root = parse(markup)?;
        self.convert_element(root)
    }

    /// Converts an already parsed document
    pub fn convert_element(&self, root: Element) -> Result<RecordGraph> {
        let root = ead::prepare(root);
        let mut session = Session::new(self.config.clone());
        self.visit(&root, &mut session)?;
        session.finish()
    }

    fn visit(&self, element: &Element, session: &mut Session) -> Result<()> {
        session.enter(element.tag());
        let outcome = self.registry.dispatch(element, session)?;
        if outcome.descends() {
            for child in element.elements() {
                self.visit(child, session)?;
            }
        }
        session.leave()
    }
}

/// Note text from serialized markup of the prepared document
fn note_text(markup: &str) -> String {
    normalize(&ead::restore_nested_lists(markup))
}

/// Which open record a link is attached to
#[derive(Clone, Copy, Debug)]
pub enum Owner<'a> {
    /// The nearest open record of any of these kinds
    Nearest(&'a [RecordKind]),
    Record(RecordId),
}

/// State of one conversion: the context stack, the records built so far,
/// the container index and the references that did not resolve.
pub struct Session {
    config: ConversionConfig,
    context: ContextStack,
    store: RecordStore,
    /// Containers by the markup id of the fragment that introduced them
    containers: HashMap<String, RecordId>,
    /// Note text not yet emitted as a text subnote, flushed when the note closes
    pending: BTreeMap<RecordId, String>,
    /// The full text of each multipart note
    content: HashMap<RecordId, String>,
    dangling: Vec<DanglingReference>,
}

impl Session {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            context: ContextStack::new(),
            store: RecordStore::new(),
            containers: HashMap::new(),
            pending: BTreeMap::new(),
            content: HashMap::new(),
            dangling: Vec::new(),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn enter(&mut self, tag: &str) {
        self.context.enter(tag);
    }

    /// Leaves the current node. Multipart notes begun at it get their
    /// remaining text as a final text subnote.
    pub fn leave(&mut self) -> Result<()> {
        let origin = self.context.path().to_string();
        for id in self.context.leave() {
            self.content.remove(&id);
            if let Some(text) = self.pending.remove(&id) {
                let text = note_text(&text);
                if !text.is_empty() {
                    let subnote = self.store.begin(
                        RecordKind::NoteText,
                        Fields::new().with("content", text),
                        &origin,
                    );
                    self.store.attach(id, "subnotes", Link::Record(subnote))?;
                }
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &NodePath {
        self.context.path()
    }

    pub fn push_zone(&mut self, zone: Zone) {
        self.context.push_zone(zone);
    }

    pub fn within(&self, zone: Zone) -> bool {
        self.context.within(zone)
    }

    /// Is the node part of the content of a list?
    pub fn in_list(&self) -> bool {
        self.within(Zone::OrderedList) || self.within(Zone::DefinedList)
    }

    pub fn innermost_record(&self) -> Option<(RecordId, RecordKind)> {
        self.context.innermost_record()
    }

    pub fn current(&self, kind: RecordKind) -> Option<RecordId> {
        self.context.current(kind)
    }

    pub fn nearest(&self, kinds: &[RecordKind]) -> Option<RecordId> {
        self.context.nearest(kinds)
    }

    pub fn record(&self, id: RecordId) -> &Record {
        self.store.get(id)
    }

    pub fn record_mut(&mut self, id: RecordId) -> &mut Record {
        self.store.get_mut(id)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Begins a record that stays open until the current node is left
    pub fn begin_record(&mut self, kind: RecordKind, fields: Fields) -> RecordId {
        let id = self.store.begin(kind, fields, &self.context.path().to_string());
        debug!(kind = %kind, path = %self.context.path(), "begin record");
        self.context.push_record(id, kind);
        id
    }

    /// Begins the record at the root of the graph
    pub fn begin_root(&mut self, kind: RecordKind, fields: Fields) -> RecordId {
        let id = self.begin_record(kind, fields);
        self.store.set_root(id);
        id
    }

    /// Builds a record that stands on its own next to the root (agents, subjects)
    pub fn batch(&mut self, kind: RecordKind, fields: Fields) -> RecordId {
        let id = self.store.begin(kind, fields, &self.context.path().to_string());
        debug!(kind = %kind, path = %self.context.path(), "batch record");
        self.store.add_to_batch(id);
        id
    }

    fn resolve(&self, owner: Owner, field: &'static str) -> Result<RecordId> {
        match owner {
            Owner::Record(id) => Ok(id),
            Owner::Nearest(kinds) => {
                self.context
                    .nearest(kinds)
                    .ok_or_else(|| ConversionError::NoOwner {
                        wanted: kinds
                            .iter()
                            .map(|kind| kind.to_string())
                            .collect::<Vec<_>>()
                            .join("|"),
                        field,
                        path: self.context.path().to_string(),
                    })
            }
        }
    }

    /// Links into a field of an owner record, returns the owner
    pub fn attach(&mut self, owner: Owner, field: &'static str, link: Link) -> Result<RecordId> {
        let owner = self.resolve(owner, field)?;
        self.store.attach(owner, field, link)?;
        Ok(owner)
    }

    /// Builds a complete record and attaches it to its owner right away
    pub fn make(
        &mut self,
        kind: RecordKind,
        fields: Fields,
        owner: Owner,
        field: &'static str,
    ) -> Result<RecordId> {
        let owner = self.resolve(owner, field)?;
        let id = self.store.begin(kind, fields, &self.context.path().to_string());
        debug!(kind = %kind, path = %self.context.path(), "make record");
        self.store.attach(owner, field, Link::Record(id))?;
        Ok(id)
    }

    /// Begins a record, attaches it to its owner and keeps it open until the current node is left
    pub fn open(
        &mut self,
        kind: RecordKind,
        fields: Fields,
        owner: Owner,
        field: &'static str,
    ) -> Result<RecordId> {
        let owner = self.resolve(owner, field)?;
        let id = self.begin_record(kind, fields);
        self.store.attach(owner, field, Link::Record(id))?;
        Ok(id)
    }

    /// Holds note text back until the note closes (or a list in it claims part of it)
    pub fn defer_text(&mut self, note: RecordId, text: String) {
        self.content.insert(note, note_text(&text));
        self.pending.insert(note, text);
    }

    pub fn pending_text(&self, note: RecordId) -> Option<&str> {
        self.pending.get(&note).map(|s| s.as_str())
    }

    pub fn set_pending_text(&mut self, note: RecordId, text: String) {
        self.pending.insert(note, text);
    }

    /// The normalized full text of an open multipart note
    pub fn note_content(&self, note: RecordId) -> Option<&str> {
        self.content.get(&note).map(|s| s.as_str())
    }

    pub fn container(&self, id: &str) -> Option<RecordId> {
        self.containers.get(id).copied()
    }

    pub fn index_container(&mut self, id: impl Into<String>, container: RecordId) {
        self.containers.insert(id.into(), container);
    }

    /// Notes a reference that does not resolve within this document
    pub fn dangling(&mut self, kind: ReferenceKind, identifier: impl Into<String>) {
        let identifier = identifier.into();
        let path = self.context.path().to_string();
        warn!(?kind, identifier = %identifier, path = %path, "unresolved reference");
        self.dangling.push(DanglingReference {
            kind,
            identifier,
            path,
        });
    }

    pub fn dangling_references(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Validates and materializes everything that was built
    pub fn finish(self) -> Result<RecordGraph> {
        let (resource, records) = self.store.finish()?;
        Ok(RecordGraph {
            resource,
            records,
            dangling_references: self.dangling,
        })
    }
}
