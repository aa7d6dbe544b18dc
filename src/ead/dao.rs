//! Digital objects.

use serde_json::json;
use uuid::Uuid;

use super::{outside_lists, DESCRIBED};
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::record::{Fields, Link, RecordKind, ReferenceKind};

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register(
        "dao",
        |element, session| {
            let title = element.attribute("title").unwrap_or("").to_string();
            make_digital_object(element, session, title)
        },
        0,
    );
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("dao", outside_lists(digital_object), 0);
}

/// Title for a digital object from the title and date expressions of the
/// component it belongs to: `"<title>, <dates>"`, either part alone, or empty.
pub fn synthesize_title(title: Option<&str>, dates: &[String]) -> String {
    let dates = dates
        .iter()
        .map(|date| date.as_str())
        .filter(|date| !date.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    match title.filter(|title| !title.is_empty()) {
        Some(title) if !dates.is_empty() => format!("{}, {}", title, dates),
        Some(title) => title.to_string(),
        None => dates,
    }
}

fn digital_object(element: &Element, session: &mut Session) -> Result<Outcome> {
    if let Some(reference) = element.attribute("ref") {
        // an existing digital object, only the instance is new
        let instance = session.make(
            RecordKind::Instance,
            Fields::new().with("instance_type", "digital_object"),
            Owner::Nearest(DESCRIBED),
            "instances",
        )?;
        session.attach(
            Owner::Record(instance),
            "digital_object",
            Link::Ref(reference.to_string()),
        )?;
        session.dangling(ReferenceKind::DigitalObject, reference);
        return Ok(Outcome::Consumed);
    }
    let title = match element.attribute("title") {
        Some(title) => title.to_string(),
        None => component_title(session),
    };
    make_digital_object(element, session, title)
}

fn component_title(session: &Session) -> String {
    let Some(component) = session.current(RecordKind::ArchivalObject) else {
        return String::new();
    };
    let record = session.record(component);
    let dates: Vec<String> = record
        .children("dates")
        .filter_map(|date| session.record(date).str("expression"))
        .map(|expression| expression.to_string())
        .collect();
    synthesize_title(record.str("title"), &dates)
}

fn make_digital_object(element: &Element, session: &mut Session, title: String) -> Result<Outcome> {
    let instance = session.make(
        RecordKind::Instance,
        Fields::new().with("instance_type", "digital_object"),
        Owner::Nearest(DESCRIBED),
        "instances",
    )?;
    session.make(
        RecordKind::DigitalObject,
        Fields::new()
            .with("digital_object_id", Uuid::new_v4().to_string())
            .with("title", title)
            .with(
                "file_versions",
                json!([{
                    "use_statement": element.attribute("role"),
                    "file_uri": element.attribute("href"),
                    "xlink_actuate_attribute": element.attribute("actuate"),
                    "xlink_show_attribute": element.attribute("show"),
                }]),
            ),
        Owner::Record(instance),
        "digital_object",
    )?;
    Ok(Outcome::Consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionConfig, Profile};
    use crate::convert::Converter;
    use crate::record::RecordGraph;

    fn convert(component: &str, profile: Profile) -> std::result::Result<RecordGraph, String> {
        let markup = format!(
            r#"<ead><archdesc level="collection"><did><unittitle>Papers</unittitle></did>
<dsc><c01 level="file">{}</c01></dsc></archdesc></ead>"#,
            component
        );
        Converter::new(ConversionConfig::new().with_profile(profile))
            .convert(&markup)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_synthesize_title() {
        let dates = vec!["1920-1925".to_string()];
        assert_eq!(synthesize_title(Some("Letters"), &dates), "Letters, 1920-1925");
        assert_eq!(synthesize_title(Some("Letters"), &[]), "Letters");
        assert_eq!(synthesize_title(None, &dates), "1920-1925");
        assert_eq!(synthesize_title(None, &[]), "");
        assert_eq!(
            synthesize_title(
                Some("Letters"),
                &["1920".to_string(), String::new(), "1931".to_string()]
            ),
            "Letters, 1920, 1931"
        );
    }

    #[test]
    fn test_title_attribute_wins() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<did><unittitle>Letters</unittitle><dao href="http://example.org/1" title="Scans" show="new" actuate="onrequest"/></did>"#,
            Profile::Extended,
        )?;
        let object = &graph.resource["children"][0]["instances"][0]["digital_object"];
        assert_eq!(object["title"], "Scans");
        assert_eq!(object["jsonmodel_type"], "digital_object");
        assert_eq!(object["file_versions"][0]["xlink_show_attribute"], "new");
        assert_eq!(object["file_versions"][0]["xlink_actuate_attribute"], "onrequest");
        let id = object["digital_object_id"].as_str().ok_or("no id")?;
        assert!(Uuid::parse_str(id).is_ok());
        Ok(())
    }

    #[test]
    fn test_title_from_dates_or_nothing() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<did><unitdate normal="1920">1920</unitdate></did><dao href="http://example.org/2"/>"#,
            Profile::Extended,
        )?;
        let object = &graph.resource["children"][0]["instances"][0]["digital_object"];
        assert_eq!(object["title"], "1920");

        let graph = Converter::new(ConversionConfig::new())
            .convert(
                r#"<ead><archdesc level="collection"><did><unittitle>Papers</unittitle><dao href="http://example.org/3"/></did></archdesc></ead>"#,
            )
            .map_err(|e| e.to_string())?;
        // outside of any component there is nothing to build a title from
        assert_eq!(graph.resource["instances"][0]["digital_object"]["title"], "");
        Ok(())
    }

    #[test]
    fn test_reference_to_existing_object() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<did><unittitle>Letters</unittitle><dao ref="/digital_objects/4"/></did>"#,
            Profile::Extended,
        )?;
        let instance = &graph.resource["children"][0]["instances"][0];
        assert_eq!(instance["instance_type"], "digital_object");
        assert_eq!(instance["digital_object"]["ref"], "/digital_objects/4");
        assert_eq!(graph.dangling_references.len(), 1);
        assert_eq!(graph.dangling_references[0].kind, ReferenceKind::DigitalObject);
        Ok(())
    }
}
