//! The EAD rule library.
//!
//! [`register()`] installs the stock rules, then (for the extended profile)
//! overrides part of them by registering new handlers under the same
//! patterns, and finally adds what the configuration declares.

mod agents;
mod containers;
mod dao;
mod index;
mod lists;
mod notes;
mod physdesc;
mod structure;

use crate::config::{ConversionConfig, Profile};
use crate::convert::Session;
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::RecordKind;

pub use dao::synthesize_title;
pub use index::IndexCategory;
pub use lists::{demote_nested_lists, restore_nested_lists};

/// Records that notes, extents, instances, dates and agent links are attached to
pub(crate) const DESCRIBED: &[RecordKind] = &[RecordKind::ArchivalObject, RecordKind::Resource];

/// Priority of configured skips, above every built-in rule
const SKIP_PRIORITY: i32 = 10;

pub fn register(registry: &mut RuleRegistry, config: &ConversionConfig) {
    structure::register(registry);
    notes::register(registry);
    lists::register(registry);
    index::register(registry);
    physdesc::register(registry);
    containers::register(registry);
    dao::register(registry);
    agents::register(registry);

    if config.profile() == Profile::Extended {
        structure::register_extended(registry);
        notes::register_extended(registry);
        lists::register_extended(registry);
        index::register_extended(registry);
        physdesc::register_extended(registry);
        containers::register_extended(registry);
        dao::register_extended(registry);
    }

    for note in config.notes() {
        notes::register_mapping(registry, note);
    }
    for pattern in config.skip() {
        registry.skip(pattern, SKIP_PRIORITY);
    }
}

/// Rewrites the document before conversion
pub fn prepare(root: Element) -> Element {
    demote_nested_lists(root)
}

/// Normalized content of an element, leaving out its heading
pub(crate) fn content_of(element: &Element) -> String {
    normalize(&restore_nested_lists(
        &element.inner_markup_without(&["head"]),
    ))
}

/// The heading of an element, if it has a non-empty one
pub(crate) fn label_of(element: &Element) -> Option<String> {
    element
        .element("head")
        .map(|head| normalize(&head.inner_markup()))
        .filter(|label| !label.is_empty())
}

/// Wraps a handler so it produces nothing for nodes that are part of list content
pub(crate) fn outside_lists<F>(
    handler: F,
) -> impl Fn(&Element, &mut Session) -> Result<Outcome> + Send + Sync + 'static
where
    F: Fn(&Element, &mut Session) -> Result<Outcome> + Send + Sync + 'static,
{
    move |element: &Element, session: &mut Session| {
        if session.in_list() {
            Ok(Outcome::Skipped)
        } else {
            handler(element, session)
        }
    }
}

/// Is the innermost open record a note? Elements quoted in note text
/// (titles, dates) don't describe the component the note belongs to.
pub(crate) fn in_note(session: &Session) -> bool {
    matches!(
        session.innermost_record(),
        Some((
            _,
            RecordKind::NoteMultipart
                | RecordKind::NoteSinglepart
                | RecordKind::NoteOrderedList
                | RecordKind::NoteDefinedList
                | RecordKind::NoteChronology
                | RecordKind::NoteIndex
        ))
    )
}
