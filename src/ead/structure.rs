//! The collection, its components and their identification.

use std::sync::LazyLock;

use regex::Regex;

use super::{in_note, outside_lists, DESCRIBED};
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::{Fields, RecordKind};

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}(-(1[0-2]|0[1-9])(-(0[1-9]|[12][0-9]|3[01]))?)?$")
        .expect("date pattern must compile")
});

const COMPONENTS: [&str; 13] = [
    "c", "c01", "c02", "c03", "c04", "c05", "c06", "c07", "c08", "c09", "c10", "c11", "c12",
];

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("ead", open_resource, 0);
    registry.register("archdesc", describe_collection, 0);
    registry.register("eadid", ead_id, 0);
    registry.register("titleproper", title_proper, 0);
    for tag in COMPONENTS {
        registry.register(tag, open_component, 0);
    }
    registry.register("unittitle", unit_title, 0);
    registry.register("did/unitid", unit_id, 0);
    registry.register("unitdate", unit_date, 0);
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("unittitle", outside_lists(unit_title), 0);
    registry.register("unitdate", outside_lists(unit_date), 0);
}

fn open_resource(_element: &Element, session: &mut Session) -> Result<Outcome> {
    if session.current(RecordKind::Resource).is_none() {
        session.begin_root(RecordKind::Resource, Fields::new());
    }
    Ok(Outcome::Handled)
}

fn describe_collection(element: &Element, session: &mut Session) -> Result<Outcome> {
    let resource = match session.current(RecordKind::Resource) {
        Some(resource) => resource,
        // a bare archdesc as document root
        None => session.begin_root(RecordKind::Resource, Fields::new()),
    };
    let level = element.attribute("level").unwrap_or("otherlevel");
    let record = session.record_mut(resource);
    record.set("level", level);
    if level == "otherlevel" {
        record.set(
            "other_level",
            element.attribute("otherlevel").unwrap_or("unspecified"),
        );
    }
    Ok(Outcome::Handled)
}

fn ead_id(element: &Element, session: &mut Session) -> Result<Outcome> {
    let id = element.inner_text().trim().to_string();
    if let Some(resource) = session.current(RecordKind::Resource) {
        if !id.is_empty() {
            session.record_mut(resource).set("ead_id", id);
        }
    }
    Ok(Outcome::Consumed)
}

fn title_proper(element: &Element, session: &mut Session) -> Result<Outcome> {
    let field = match element.attribute("type") {
        Some("filing") => "finding_aid_filing_title",
        _ => "finding_aid_title",
    };
    let title = normalize(&element.inner_text());
    if let Some(resource) = session.current(RecordKind::Resource) {
        let record = session.record_mut(resource);
        // the title statement comes first, a title page may repeat it
        if !title.is_empty() && !record.has(field) {
            record.set(field, title);
        }
    }
    Ok(Outcome::Consumed)
}

fn open_component(element: &Element, session: &mut Session) -> Result<Outcome> {
    let level = element.attribute("level").unwrap_or("otherlevel");
    let other_level = (level == "otherlevel")
        .then(|| element.attribute("otherlevel").unwrap_or("unspecified"));
    session.open(
        RecordKind::ArchivalObject,
        Fields::new()
            .with("level", level)
            .with_opt("other_level", other_level)
            .with_opt("ref_id", element.attribute("id")),
        Owner::Nearest(DESCRIBED),
        "children",
    )?;
    Ok(Outcome::Handled)
}

fn unit_title(element: &Element, session: &mut Session) -> Result<Outcome> {
    if in_note(session) {
        return Ok(Outcome::Skipped);
    }
    let Some(owner) = session.nearest(DESCRIBED) else {
        return Ok(Outcome::DeferToDefault);
    };
    let title = normalize(&element.inner_markup_without(&["unitdate"]));
    if !title.is_empty() {
        session.record_mut(owner).set("title", title);
    }
    // nested dates are dates of the unit
    Ok(Outcome::Handled)
}

fn unit_id(element: &Element, session: &mut Session) -> Result<Outcome> {
    let Some(owner) = session.nearest(DESCRIBED) else {
        return Ok(Outcome::DeferToDefault);
    };
    let id = element.inner_text().trim().to_string();
    let record = session.record_mut(owner);
    let field = match record.kind() {
        RecordKind::Resource => "id_0",
        _ => "component_id",
    };
    if !id.is_empty() && !record.has(field) {
        record.set(field, id);
    }
    Ok(Outcome::Consumed)
}

fn unit_date(element: &Element, session: &mut Session) -> Result<Outcome> {
    if in_note(session) {
        return Ok(Outcome::Skipped);
    }
    let (begin, end) = normal_dates(element.attribute("normal").unwrap_or(""));
    let expression = normalize(&element.inner_markup());
    session.make(
        RecordKind::Date,
        Fields::new()
            .with("date_type", element.attribute("type").unwrap_or("inclusive"))
            .with("label", "creation")
            .with_opt("expression", Some(expression).filter(|e| !e.is_empty()))
            .with_opt("begin", begin)
            .with_opt("end", end)
            .with_opt("calendar", element.attribute("calendar"))
            .with_opt("era", element.attribute("era"))
            .with_opt("certainty", element.attribute("certainty")),
        Owner::Nearest(DESCRIBED),
        "dates",
    )?;
    Ok(Outcome::Consumed)
}

/// Begin and end of a normalized date like `1920/1925` or `1920-03-01`. A
/// single date is both begin and end. Sides that are not ISO dates are dropped.
pub(crate) fn normal_dates(normal: &str) -> (Option<String>, Option<String>) {
    let mut sides = normal.trim().split('/').map(str::trim);
    let begin = sides.next();
    let end = sides.next().or(begin);
    let valid = |date: Option<&str>| {
        date.filter(|date| ISO_DATE.is_match(date))
            .map(|date| date.to_string())
    };
    (valid(begin), valid(end))
}
