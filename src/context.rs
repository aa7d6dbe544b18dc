//! The live context of a conversion: one frame per markup node being visited.

use crate::path::NodePath;
use crate::record::{RecordId, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Structurally special zones a handler can mark for its subtree
pub enum Zone {
    OrderedList,
    DefinedList,
    Chronology,
    Index,
    Items,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker {
    Zone(Zone),
    Record(RecordId, RecordKind),
}

#[derive(Debug, Default)]
struct Frame {
    markers: Vec<Marker>,
}

#[derive(Debug, Default)]
/// Ancestor chain of the node being visited, with the named zones and the
/// records begun along the way. Frames are pushed when a node is entered and
/// popped once its subtree has been visited.
pub struct ContextStack {
    path: NodePath,
    frames: Vec<Frame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, tag: &str) {
        self.path.push(tag);
        self.frames.push(Frame::default());
    }

    /// Leaves the current node, returns the records that were begun at it
    pub fn leave(&mut self) -> Vec<RecordId> {
        self.path.pop();
        self.frames
            .pop()
            .map(|frame| {
                frame
                    .markers
                    .into_iter()
                    .filter_map(|marker| match marker {
                        Marker::Record(id, _) => Some(id),
                        Marker::Zone(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Marks the current node as opening a zone
    pub fn push_zone(&mut self, zone: Zone) {
        if let Some(frame) = self.frames.last_mut() {
            frame.markers.push(Marker::Zone(zone));
        }
    }

    /// Registers a record as open for the remainder of the current node
    pub fn push_record(&mut self, id: RecordId, kind: RecordKind) {
        if let Some(frame) = self.frames.last_mut() {
            frame.markers.push(Marker::Record(id, kind));
        }
    }

    fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.markers.iter().rev())
    }

    /// Is any enclosing node marking this zone?
    pub fn within(&self, zone: Zone) -> bool {
        self.markers().any(|marker| *marker == Marker::Zone(zone))
    }

    /// Nearest open record of the given kind
    pub fn current(&self, kind: RecordKind) -> Option<RecordId> {
        self.nearest(&[kind])
    }

    /// Nearest open record of any of the given kinds
    pub fn nearest(&self, kinds: &[RecordKind]) -> Option<RecordId> {
        self.markers().find_map(|marker| match marker {
            Marker::Record(id, kind) if kinds.contains(kind) => Some(*id),
            _ => None,
        })
    }

    /// The innermost open record
    pub fn innermost_record(&self) -> Option<(RecordId, RecordKind)> {
        self.markers().find_map(|marker| match marker {
            Marker::Record(id, kind) => Some((*id, *kind)),
            Marker::Zone(_) => None,
        })
    }
}
