//! Descriptive notes and rights statements.

use serde_json::json;

use super::{content_of, label_of, outside_lists, DESCRIBED};
use crate::config::{NoteConfig, NoteShape};
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::{normalize, strip_enclosing};
use crate::record::{Fields, RecordKind};

/// Notes consisting of a single block of content
const SINGLEPART: [&str; 5] = ["abstract", "langmaterial", "materialspec", "physfacet", "physloc"];

/// Notes with headings, paragraphs and structured subnotes
const MULTIPART: [&str; 20] = [
    "accessrestrict",
    "accessrestrict/legalstatus",
    "accruals",
    "acqinfo",
    "altformavail",
    "appraisal",
    "arrangement",
    "bioghist",
    "custodhist",
    "fileplan",
    "odd",
    "otherfindaid",
    "originalsloc",
    "phystech",
    "prefercite",
    "processinfo",
    "relatedmaterial",
    "scopecontent",
    "separatedmaterial",
    "userestrict",
];

/// The note type of a pattern is its last tag
fn note_type(pattern: &'static str) -> &'static str {
    pattern.rsplit('/').next().unwrap_or(pattern)
}

pub(super) fn register(registry: &mut RuleRegistry) {
    for pattern in SINGLEPART {
        let note_type = note_type(pattern);
        registry.register(
            pattern,
            move |element, session| singlepart(element, session, note_type),
            0,
        );
    }
    for pattern in MULTIPART {
        let note_type = note_type(pattern);
        registry.register(
            pattern,
            move |element, session| multipart(element, session, note_type),
            0,
        );
    }
    registry.register(
        "dimensions",
        |element, session| multipart(element, session, "dimensions"),
        0,
    );
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    // lists and indexes quote all sorts of descriptive elements in their items
    for pattern in SINGLEPART {
        let note_type = note_type(pattern);
        registry.register(
            pattern,
            outside_lists(move |element: &Element, session: &mut Session| {
                singlepart(element, session, note_type)
            }),
            0,
        );
    }
    registry.register("dimensions", outside_lists(dimensions), 0);
    registry.register("accessrestrict/date", rights_statement, 0);
    registry.register("accessrestrict/p/date", rights_statement, 0);
}

/// Notes declared in the configuration
pub(super) fn register_mapping(registry: &mut RuleRegistry, note: &NoteConfig) {
    let note_type = note.note_type.clone();
    match note.shape {
        NoteShape::Singlepart => registry.register(
            &note.path,
            move |element, session| singlepart(element, session, &note_type),
            0,
        ),
        NoteShape::Multipart => registry.register(
            &note.path,
            move |element, session| multipart(element, session, &note_type),
            0,
        ),
    }
}

fn singlepart(element: &Element, session: &mut Session, note_type: &str) -> Result<Outcome> {
    let content = match element.tag() {
        "langmaterial" => language_content(element),
        "physfacet" => strip_enclosing(&content_of(element)).to_string(),
        _ => content_of(element),
    };
    if content.is_empty() {
        return Ok(Outcome::Skipped);
    }
    make_singlepart(element, session, note_type, content)?;
    Ok(Outcome::Consumed)
}

pub(super) fn make_singlepart(
    element: &Element,
    session: &mut Session,
    note_type: &str,
    content: String,
) -> Result<()> {
    session.make(
        RecordKind::NoteSinglepart,
        Fields::new()
            .with("type", note_type)
            .with("content", json!([content]))
            .with_opt("label", label_of(element))
            .with_opt("persistent_id", element.attribute("id")),
        Owner::Nearest(DESCRIBED),
        "notes",
    )?;
    Ok(())
}

/// A language note that only wraps one language element is reduced to that
/// language's text. A bare language code carries nothing to show.
fn language_content(element: &Element) -> String {
    let mut languages = element.elements().filter(|e| e.tag() == "language");
    let only_languages = element
        .elements()
        .all(|e| e.tag() == "language" || e.tag() == "head");
    match (languages.next(), languages.next()) {
        (Some(language), None) if only_languages && element.own_text().trim().is_empty() => {
            normalize(&language.inner_markup())
        }
        _ => content_of(element),
    }
}

fn multipart(element: &Element, session: &mut Session, note_type: &str) -> Result<Outcome> {
    let note = session.open(
        RecordKind::NoteMultipart,
        Fields::new()
            .with("type", note_type)
            .with_opt("label", label_of(element))
            .with_opt("persistent_id", element.attribute("id")),
        Owner::Nearest(DESCRIBED),
        "notes",
    )?;
    // emitted as text subnotes once lists in it had their say
    session.defer_text(note, element.inner_markup_without(&["head"]));
    Ok(Outcome::Handled)
}

/// Dimensions outside of a physical description
fn dimensions(element: &Element, session: &mut Session) -> Result<Outcome> {
    let content = content_of(element);
    make_dimensions(element, session, strip_enclosing(&content).to_string())?;
    Ok(Outcome::Consumed)
}

pub(super) fn make_dimensions(
    element: &Element,
    session: &mut Session,
    content: String,
) -> Result<()> {
    let note = session.make(
        RecordKind::NoteMultipart,
        Fields::new()
            .with("type", "dimensions")
            .with_opt("label", label_of(element))
            .with_opt("persistent_id", element.attribute("id")),
        Owner::Nearest(DESCRIBED),
        "notes",
    )?;
    if !content.is_empty() {
        session.make(
            RecordKind::NoteText,
            Fields::new().with("content", content),
            Owner::Record(note),
            "subnotes",
        )?;
    }
    Ok(())
}

/// A dated access restriction is also an institutional rights statement
fn rights_statement(element: &Element, session: &mut Session) -> Result<Outcome> {
    let restrictions = session
        .current(RecordKind::NoteMultipart)
        .and_then(|note| session.note_content(note))
        .map(|content| content.to_string());
    session.make(
        RecordKind::RightsStatement,
        Fields::new()
            .with("rights_type", "institutional_policy")
            .with_opt("restrictions", restrictions)
            .with_opt("restriction_end_date", element.attribute("normal")),
        Owner::Nearest(DESCRIBED),
        "rights_statements",
    )?;
    Ok(Outcome::Consumed)
}
