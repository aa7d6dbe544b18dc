//! Back-of-document indexes.

use serde_json::Value;
use tracing::warn;

use super::DESCRIBED;
use crate::context::Zone;
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::{Fields, Link, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What an index entry names
pub enum IndexCategory {
    Name,
    Person,
    Family,
    CorporateEntity,
    Subject,
    Function,
    Occupation,
    GenreForm,
    Title,
    GeographicName,
}

impl IndexCategory {
    pub const TAGS: [&'static str; 10] = [
        "name",
        "persname",
        "famname",
        "corpname",
        "subject",
        "function",
        "occupation",
        "genreform",
        "title",
        "geogname",
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "name" => Some(Self::Name),
            "persname" => Some(Self::Person),
            "famname" => Some(Self::Family),
            "corpname" => Some(Self::CorporateEntity),
            "subject" => Some(Self::Subject),
            "function" => Some(Self::Function),
            "occupation" => Some(Self::Occupation),
            "genreform" => Some(Self::GenreForm),
            "title" => Some(Self::Title),
            "geogname" => Some(Self::GeographicName),
            _ => None,
        }
    }

    /// The index item type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Person => "person",
            Self::Family => "family",
            Self::CorporateEntity => "corporate_entity",
            Self::Subject => "subject",
            Self::Function => "function",
            Self::Occupation => "occupation",
            Self::GenreForm => "genre_form",
            Self::Title => "title",
            Self::GeographicName => "geographic_name",
        }
    }
}

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("index", open_index, 0);
    registry.register("index/head", index_head, 0);
    registry.register("index/p", index_paragraph, 0);
    for tag in IndexCategory::TAGS {
        registry.register(&format!("indexentry/{}", tag), entry_term, 0);
    }
    registry.register("indexentry/ref", entry_reference, 0);
}

/// One item per index entry instead of one per term and reference
pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("indexentry", merged_entry, 0);
    for tag in IndexCategory::TAGS {
        registry.register(&format!("indexentry/{}", tag), |_, _| Ok(Outcome::Skipped), 0);
    }
    registry.register("indexentry/ref", |_, _| Ok(Outcome::Skipped), 0);
}

fn open_index(element: &Element, session: &mut Session) -> Result<Outcome> {
    session.open(
        RecordKind::NoteIndex,
        Fields::new()
            .with("type", "index")
            .with_opt("persistent_id", element.attribute("id")),
        Owner::Nearest(DESCRIBED),
        "notes",
    )?;
    session.push_zone(Zone::Index);
    Ok(Outcome::Handled)
}

fn index_head(element: &Element, session: &mut Session) -> Result<Outcome> {
    let label = normalize(&element.inner_markup());
    if let Some(index) = session.current(RecordKind::NoteIndex) {
        if !label.is_empty() {
            session.record_mut(index).set("label", label);
        }
    }
    Ok(Outcome::Consumed)
}

fn index_paragraph(element: &Element, session: &mut Session) -> Result<Outcome> {
    let paragraph = normalize(&element.inner_markup());
    if !paragraph.is_empty() {
        session.attach(
            Owner::Nearest(&[RecordKind::NoteIndex]),
            "content",
            Link::Value(Value::String(paragraph)),
        )?;
    }
    Ok(Outcome::Consumed)
}

fn entry_term(element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(category) = IndexCategory::from_tag(element.tag()) else {
        return Ok(Outcome::DeferToDefault);
    };
    let Some(index) = session.current(RecordKind::NoteIndex) else {
        return Ok(Outcome::DeferToDefault);
    };
    session.make(
        RecordKind::NoteIndexItem,
        Fields::new()
            .with("type", category.as_str())
            .with("value", normalize(&element.inner_markup())),
        Owner::Record(index),
        "items",
    )?;
    Ok(Outcome::Consumed)
}

fn entry_reference(element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(index) = session.current(RecordKind::NoteIndex) else {
        return Ok(Outcome::DeferToDefault);
    };
    let text = normalize(&element.inner_markup());
    session.make(
        RecordKind::NoteIndexItem,
        Fields::new()
            .with("type", "name")
            .with("value", text.clone())
            .with("reference_text", text)
            .with_opt("reference", element.attribute("target")),
        Owner::Record(index),
        "items",
    )?;
    Ok(Outcome::Consumed)
}

/// The terms of an entry make up the value, its references the reference text
fn merged_entry(element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(index) = session.current(RecordKind::NoteIndex) else {
        return Ok(Outcome::DeferToDefault);
    };
    let mut category: Option<IndexCategory> = None;
    let mut value = String::new();
    let mut reference_text = String::new();
    let mut reference: Option<&str> = None;
    for child in element.elements() {
        if child.tag() == "ref" {
            reference_text += &child.inner_text();
            if reference.is_none() {
                reference = child.attribute("target");
            }
        } else if let Some(child_category) = IndexCategory::from_tag(child.tag()) {
            category.get_or_insert(child_category);
            value += &child.inner_text();
        }
    }
    // a reference alone is indexed by its text, as a plain name
    let category = category.unwrap_or(IndexCategory::Name);
    if value.is_empty() {
        value = reference_text.clone();
    }
    if value.trim().is_empty() {
        warn!(path = %session.path(), "index entry without text, skipped");
        return Ok(Outcome::Skipped);
    }
    session.make(
        RecordKind::NoteIndexItem,
        Fields::new()
            .with("type", category.as_str())
            .with("value", value)
            .with_opt(
                "reference_text",
                Some(reference_text).filter(|text| !text.is_empty()),
            )
            .with_opt("reference", reference),
        Owner::Record(index),
        "items",
    )?;
    // the children are part of this item
    Ok(Outcome::Handled)
}
