//! Subjects and agents from access points and origination.
//!
//! Names carrying a `ref` link to records imported earlier, everything else
//! becomes a new record in the batch next to the resource.

use serde_json::{json, Map, Value};

use super::DESCRIBED;
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::{parse_fragment, Element};
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::{Fields, Link, RecordKind, ReferenceKind};

/// Access point tags and the term type of the subject they create
const SUBJECTS: [(&str, &str); 5] = [
    ("function", "function"),
    ("genreform", "genre_form"),
    ("geogname", "geographic"),
    ("occupation", "occupation"),
    ("subject", "topical"),
];

const NAMES: [&str; 3] = ["persname", "famname", "corpname"];

pub(super) fn register(registry: &mut RuleRegistry) {
    for (tag, term_type) in SUBJECTS {
        registry.register(
            &format!("controlaccess/{}", tag),
            move |element, session| subject(element, session, term_type),
            0,
        );
    }
    for tag in NAMES {
        registry.register(
            &format!("origination/{}", tag),
            |element, session| agent(element, session, "creator"),
            0,
        );
        registry.register(
            &format!("controlaccess/{}", tag),
            |element, session| agent(element, session, "subject"),
            0,
        );
    }
}

fn subject(element: &Element, session: &mut Session, term_type: &str) -> Result<Outcome> {
    let link = match element.attribute("ref") {
        Some(reference) => {
            session.dangling(ReferenceKind::Subject, reference);
            Link::Ref(reference.to_string())
        }
        None => {
            let vocabulary = session.config().vocabulary().to_string();
            let source = element
                .attribute("source")
                .unwrap_or(session.config().source())
                .to_string();
            let subject = session.batch(
                RecordKind::Subject,
                Fields::new()
                    .with(
                        "terms",
                        json!([{
                            "term": normalize(&element.inner_markup()),
                            "term_type": term_type,
                            "vocabulary": vocabulary,
                        }]),
                    )
                    .with("vocabulary", vocabulary)
                    .with("source", source)
                    .with_opt("authority_id", element.attribute("authfilenumber")),
            );
            Link::Ref(session.record(subject).uri().unwrap_or_default().to_string())
        }
    };
    session.attach(Owner::Nearest(DESCRIBED), "subjects", link)?;
    Ok(Outcome::Consumed)
}

/// A name split into the name proper and the subdivisions tagged as `<term>`
struct Heading {
    name: String,
    terms: Vec<Value>,
}

impl Heading {
    fn parse(element: &Element, vocabulary: &str) -> Result<Self> {
        let fragment = parse_fragment(&element.inner_markup())?;
        let terms = fragment
            .elements()
            .filter(|child| child.tag() == "term")
            .map(|term| {
                json!({
                    "term": term.inner_text().trim(),
                    "term_type": term.attribute("type"),
                    "vocabulary": vocabulary,
                })
            })
            .collect();
        let name = if fragment.elements().any(|child| child.tag() == "term") {
            normalize(&fragment.own_text())
        } else {
            normalize(&element.inner_markup())
        };
        Ok(Self { name, terms })
    }
}

fn agent(element: &Element, session: &mut Session, role: &str) -> Result<Outcome> {
    let heading = Heading::parse(element, session.config().vocabulary())?;
    let reference = match element.attribute("ref") {
        Some(reference) => {
            session.dangling(ReferenceKind::Agent, reference);
            reference.to_string()
        }
        None => {
            let (kind, name) = agent_name(element, session, &heading.name);
            let agent = session.batch(kind, Fields::new().with("names", json!([name])));
            session.record(agent).uri().unwrap_or_default().to_string()
        }
    };
    let terms = (!heading.terms.is_empty()).then(|| Value::Array(heading.terms));
    session.make(
        RecordKind::LinkedAgentReference,
        Fields::new()
            .with("ref", reference)
            .with("role", role)
            .with_opt("terms", terms),
        Owner::Nearest(DESCRIBED),
        "linked_agents",
    )?;
    Ok(Outcome::Consumed)
}

/// Agent kind and name record for a name element
fn agent_name(element: &Element, session: &Session, name: &str) -> (RecordKind, Value) {
    let mut fields = Map::new();
    let kind = match element.tag() {
        "persname" => {
            // inverted personal names: `Smith, John, 1850-1920`
            let (primary, rest) = match name.split_once(", ") {
                Some((primary, rest)) => (primary, Some(rest)),
                None => (name, None),
            };
            fields.insert("primary_name".into(), json!(primary));
            if let Some(rest) = rest {
                fields.insert("rest_of_name".into(), json!(rest));
            }
            fields.insert("name_order".into(), json!("inverted"));
            RecordKind::AgentPerson
        }
        "famname" => {
            fields.insert("family_name".into(), json!(name));
            RecordKind::AgentFamily
        }
        _ => {
            fields.insert("primary_name".into(), json!(name));
            RecordKind::AgentCorporateEntity
        }
    };
    fields.insert(
        "source".into(),
        json!(element.attribute("source").unwrap_or(session.config().source())),
    );
    if let Some(rules) = element.attribute("rules") {
        fields.insert("rules".into(), json!(rules));
    }
    if let Some(authority) = element.attribute("authfilenumber") {
        fields.insert("authority_id".into(), json!(authority));
    }
    fields.insert("sort_name_auto_generate".into(), json!(true));
    (kind, Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::convert::Converter;
    use crate::record::RecordGraph;

    const EADACCESS: &'static str = r#"<ead><archdesc level="collection">
<did>
  <unittitle>Papers</unittitle>
  <origination><corpname source="lcnaf" authfilenumber="n79-1">Acme Corp.</corpname></origination>
  <origination><persname ref="/agents/people/9">Jones, Ann</persname></origination>
</did>
<controlaccess>
  <famname>Smith family</famname>
  <corpname>University of Michigan<term type="topical">History</term><term type="temporal">20th century</term></corpname>
  <genreform source="aat">Photographs</genreform>
  <function>Teaching</function>
</controlaccess>
</archdesc></ead>"#;

    fn convert(markup: &str, config: ConversionConfig) -> std::result::Result<RecordGraph, String> {
        Converter::new(config)
            .convert(markup)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_creators() -> std::result::Result<(), String> {
        let graph = convert(EADACCESS, ConversionConfig::new())?;
        let linked = graph.resource["linked_agents"]
            .as_array()
            .ok_or("no linked agents")?;
        assert_eq!(linked.len(), 4);
        assert_eq!(linked[0]["role"], "creator");
        assert_eq!(linked[0]["ref"], graph.records[0]["uri"]);
        let corporate = &graph.records[0];
        assert_eq!(corporate["jsonmodel_type"], "agent_corporate_entity");
        assert_eq!(corporate["uri"], "/agents/corporate_entities/import_2");
        assert_eq!(corporate["names"][0]["primary_name"], "Acme Corp.");
        assert_eq!(corporate["names"][0]["source"], "lcnaf");
        assert_eq!(corporate["names"][0]["authority_id"], "n79-1");

        // a referenced agent is linked, not created
        assert_eq!(linked[1]["ref"], "/agents/people/9");
        assert_eq!(graph.dangling_references[0].kind, ReferenceKind::Agent);
        Ok(())
    }

    #[test]
    fn test_agent_terms() -> std::result::Result<(), String> {
        let graph = convert(EADACCESS, ConversionConfig::new())?;
        let family = &graph.records[1];
        assert_eq!(family["jsonmodel_type"], "agent_family");
        assert_eq!(family["names"][0]["family_name"], "Smith family");
        assert_eq!(family["names"][0]["source"], "ingest");

        let university = &graph.records[2];
        assert_eq!(university["names"][0]["primary_name"], "University of Michigan");
        let linked = &graph.resource["linked_agents"][3];
        assert_eq!(linked["role"], "subject");
        assert_eq!(linked["terms"][0]["term"], "History");
        assert_eq!(linked["terms"][0]["term_type"], "topical");
        assert_eq!(linked["terms"][1]["term"], "20th century");
        assert_eq!(linked["terms"][1]["vocabulary"], "/vocabularies/1");
        assert!(graph.resource["linked_agents"][2].get("terms").is_none());
        Ok(())
    }

    #[test]
    fn test_subjects() -> std::result::Result<(), String> {
        let config = ConversionConfig::new()
            .with_vocabulary("/vocabularies/2")
            .with_source("local");
        let graph = convert(EADACCESS, config)?;
        let genre = &graph.records[3];
        assert_eq!(genre["jsonmodel_type"], "subject");
        assert_eq!(genre["terms"][0]["term"], "Photographs");
        assert_eq!(genre["terms"][0]["term_type"], "genre_form");
        assert_eq!(genre["vocabulary"], "/vocabularies/2");
        assert_eq!(genre["source"], "aat");
        let function = &graph.records[4];
        assert_eq!(function["terms"][0]["term_type"], "function");
        assert_eq!(function["source"], "local");
        let subjects = graph.resource["subjects"].as_array().ok_or("no subjects")?;
        assert_eq!(subjects[0]["ref"], genre["uri"]);
        assert_eq!(subjects[1]["ref"], function["uri"]);
        Ok(())
    }

    #[test]
    fn test_names_in_notes_are_not_agents() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<ead><archdesc level="collection"><did><unittitle>Papers</unittitle></did>
<bioghist><p>Worked with <persname>Doe, Jane</persname>.</p></bioghist></archdesc></ead>"#,
            ConversionConfig::new(),
        )?;
        assert!(graph.records.is_empty());
        assert!(graph.resource.get("linked_agents").is_none());
        Ok(())
    }
}
