//! Lists and chronologies, flattened into the subnotes of the note they appear in.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use serde_json::{json, Value};

use super::DESCRIBED;
use crate::context::Zone;
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::{Element, Node};
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::{Fields, Link, RecordId, RecordKind};

static DEMOTED_TAGS: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(["<sublist", "</sublist>", "<subitem", "</subitem>"])
        .expect("list tag patterns must compile")
});

const RESTORED_TAGS: [&str; 4] = ["<list", "</list>", "<item", "</item>"];

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("list", |element, session| list(element, session, false), 0);
    registry.register("chronlist", |element, session| chronlist(element, session, false), 0);
    registry.register("list/head", list_head, 0);
    registry.register("chronlist/head", list_head, 0);
    registry.register("list/item", item, 0);
    registry.register("defitem", definition, 0);
    registry.register("defitem/label", |element, session| definition_part(element, session, "label"), 0);
    registry.register("defitem/item", |element, session| definition_part(element, session, "value"), 0);
    registry.register("chronitem", chronology_item, 0);
    registry.register("chronitem/date", event_date, 0);
    registry.register("chronitem/event", event, 0);
    registry.register("eventgrp/event", event, 0);
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("list", |element, session| list(element, session, true), 0);
    registry.register("chronlist", |element, session| chronlist(element, session, true), 0);
}

/// Lists nested in list items are renamed (`list` to `sublist`, `item` to
/// `subitem`) so the list rules only ever see the outermost list. The nested
/// list stays part of its item's content.
pub fn demote_nested_lists(root: Element) -> Element {
    demote(root, false)
}

fn demote(element: Element, in_item: bool) -> Element {
    let (tag, attributes, children) = element.into_parts();
    let tag = match tag.as_str() {
        "list" if in_item => "sublist".to_string(),
        "item" if in_item => "subitem".to_string(),
        _ => tag,
    };
    let in_item = in_item || tag == "item";
    let children = children
        .into_iter()
        .map(|child| match child {
            Node::Element(element) => Node::Element(demote(element, in_item)),
            text => text,
        })
        .collect();
    Element::new(tag, attributes, children)
}

/// Undoes [`demote_nested_lists()`] in serialized item content
pub fn restore_nested_lists(markup: &str) -> String {
    DEMOTED_TAGS.replace_all(markup, &RESTORED_TAGS)
}

/// The multipart note a list belongs to. A list outside of any note gets a note of its own.
fn enclosing_note(element: &Element, session: &mut Session) -> Result<RecordId> {
    match session.current(RecordKind::NoteMultipart) {
        Some(note) => Ok(note),
        None => session.open(
            RecordKind::NoteMultipart,
            Fields::new()
                .with("type", "odd")
                .with_opt("persistent_id", element.attribute("id")),
            Owner::Nearest(DESCRIBED),
            "notes",
        ),
    }
}

/// Splits serialized markup around the first element with the given tag
fn split_at_element<'m>(markup: &'m str, tag: &str) -> Option<(&'m str, &'m str)> {
    let open = format!("<{}", tag);
    let mut from = 0;
    let start = loop {
        let at = from + markup[from..].find(&open)?;
        match markup[at + open.len()..].chars().next() {
            Some(' ') | Some('>') | Some('/') => break at,
            _ => from = at + open.len(),
        }
    };
    let tag_end = start + markup[start..].find('>')?;
    let end = if markup[..tag_end].ends_with('/') {
        tag_end + 1
    } else {
        let close = format!("</{}>", tag);
        start + markup[start..].find(&close)? + close.len()
    };
    Some((&markup[..start], &markup[end..]))
}

/// Emits the note text preceding the structured subnote as a text subnote of
/// its own. What follows stays pending, to be emitted after the structured
/// subnote.
fn split_pending_text(session: &mut Session, note: RecordId, tag: &str) -> Result<()> {
    let Some(pending) = session.pending_text(note).map(|s| s.to_string()) else {
        return Ok(());
    };
    let Some((before, after)) = split_at_element(&pending, tag) else {
        return Ok(());
    };
    let before = normalize(before);
    session.set_pending_text(note, after.to_string());
    if !before.is_empty() {
        session.make(
            RecordKind::NoteText,
            Fields::new().with("content", before),
            Owner::Record(note),
            "subnotes",
        )?;
    }
    Ok(())
}

fn is_definition_list(element: &Element, detect: bool) -> bool {
    match element.attribute("type") {
        Some(list_type) => list_type == "deflist",
        None if detect => {
            let markup = element.inner_markup();
            markup.contains("<defitem") || markup.contains("<deflist")
        }
        None => false,
    }
}

/// Lists in an index are not notes, lists in list items are part of the item text
fn nested_in_content(session: &Session) -> bool {
    session.within(Zone::Index) || session.within(Zone::Items)
}

fn list(element: &Element, session: &mut Session, flatten: bool) -> Result<Outcome> {
    if nested_in_content(session) {
        return Ok(Outcome::Skipped);
    }
    let note = enclosing_note(element, session)?;
    if flatten {
        split_pending_text(session, note, "list")?;
    }
    if is_definition_list(element, flatten) {
        session.open(
            RecordKind::NoteDefinedList,
            Fields::new(),
            Owner::Record(note),
            "subnotes",
        )?;
        session.push_zone(Zone::DefinedList);
    } else {
        session.open(
            RecordKind::NoteOrderedList,
            Fields::new().with_opt("enumeration", element.attribute("numeration")),
            Owner::Record(note),
            "subnotes",
        )?;
        session.push_zone(Zone::OrderedList);
    }
    Ok(Outcome::Handled)
}

fn chronlist(element: &Element, session: &mut Session, flatten: bool) -> Result<Outcome> {
    if nested_in_content(session) {
        return Ok(Outcome::Skipped);
    }
    let note = enclosing_note(element, session)?;
    if flatten {
        split_pending_text(session, note, "chronlist")?;
    }
    session.open(
        RecordKind::NoteChronology,
        Fields::new(),
        Owner::Record(note),
        "subnotes",
    )?;
    session.push_zone(Zone::Chronology);
    Ok(Outcome::Handled)
}

fn list_head(element: &Element, session: &mut Session) -> Result<Outcome> {
    let list = session.nearest(&[
        RecordKind::NoteOrderedList,
        RecordKind::NoteDefinedList,
        RecordKind::NoteChronology,
    ]);
    let title = normalize(&element.inner_markup());
    if let Some(list) = list {
        if !title.is_empty() {
            session.record_mut(list).set("title", title);
        }
    }
    Ok(Outcome::Consumed)
}

fn item(element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(list) = session.current(RecordKind::NoteOrderedList) else {
        return Ok(Outcome::DeferToDefault);
    };
    let content = normalize(&restore_nested_lists(&element.inner_markup()));
    if !content.is_empty() {
        session.attach(Owner::Record(list), "items", Link::Value(Value::String(content)))?;
    }
    session.push_zone(Zone::Items);
    Ok(Outcome::Handled)
}

fn definition(_element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(list) = session.current(RecordKind::NoteDefinedList) else {
        return Ok(Outcome::DeferToDefault);
    };
    session.attach(Owner::Record(list), "items", Link::Value(json!({})))?;
    session.push_zone(Zone::Items);
    Ok(Outcome::Handled)
}

fn definition_part(element: &Element, session: &mut Session, key: &str) -> Result<Outcome> {
    let content = normalize(&restore_nested_lists(&element.inner_markup()));
    if let Some(list) = session.current(RecordKind::NoteDefinedList) {
        if let Some(definition) = session.record_mut(list).last_value_mut("items") {
            definition[key] = Value::String(content);
        }
    }
    Ok(Outcome::Consumed)
}

fn chronology_item(_element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(chronology) = session.current(RecordKind::NoteChronology) else {
        return Ok(Outcome::DeferToDefault);
    };
    session.attach(Owner::Record(chronology), "items", Link::Value(json!({})))?;
    session.push_zone(Zone::Items);
    Ok(Outcome::Handled)
}

fn event_date(element: &Element, session: &mut Session) -> Result<Outcome> {
    let date = normalize(&element.inner_markup());
    if let Some(chronology) = session.current(RecordKind::NoteChronology) {
        if let Some(item) = session.record_mut(chronology).last_value_mut("items") {
            item["event_date"] = Value::String(date);
        }
    }
    Ok(Outcome::Consumed)
}

fn event(element: &Element, session: &mut Session) -> Result<Outcome> {
    let text = normalize(&element.inner_markup());
    if let Some(chronology) = session.current(RecordKind::NoteChronology) {
        if let Some(Value::Object(item)) = session.record_mut(chronology).last_value_mut("items") {
            match item.entry("events").or_insert_with(|| json!([])) {
                Value::Array(events) => events.push(Value::String(text)),
                other => *other = json!([text]),
            }
        }
    }
    Ok(Outcome::Consumed)
}
