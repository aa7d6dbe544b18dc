//! Containers and the instances that hold them.
//!
//! A container is often described over several sibling fragments: a box, then
//! the folder in it referring to the box by `parent`. Fragments with an `id`
//! are indexed in the session so later fragments can continue filling the same
//! container record.

use tracing::warn;

use super::{outside_lists, DESCRIBED};
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::normalize;
use crate::record::{Fields, RecordId, RecordKind, ReferenceKind};

/// Type and indicator slots of a container record
const SLOTS: [(&str, &str); 3] = [
    ("type_1", "indicator_1"),
    ("type_2", "indicator_2"),
    ("type_3", "indicator_3"),
];

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("container", container, 0);
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("container", outside_lists(container), 0);
}

fn container(element: &Element, session: &mut Session) -> Result<Outcome> {
    let parent = element.attribute("parent");
    let id = element.attribute("id");
    let container = match parent.and_then(|parent| session.container(parent)) {
        Some(container) => container,
        None => {
            if let Some(parent) = parent {
                session.dangling(ReferenceKind::Container, parent);
            }
            // a fragment with its own id is a new top level container
            let reused = match id {
                Some(_) => None,
                None => last_container(session),
            };
            match reused {
                Some(container) => container,
                None => new_container(session)?,
            }
        }
    };
    fill_slot(element, session, container);
    if let Some(id) = id {
        session.index_container(id, container);
    }
    Ok(Outcome::Consumed)
}

/// The container of the last instance of the described record, if it has one
fn last_container(session: &Session) -> Option<RecordId> {
    let owner = session.nearest(DESCRIBED)?;
    let instance = session
        .record(owner)
        .children("instances")
        .filter(|instance| session.record(*instance).has("container"))
        .last()?;
    session.record(instance).children("container").next()
}

fn new_container(session: &mut Session) -> Result<RecordId> {
    let instance = session.make(
        RecordKind::Instance,
        Fields::new().with("instance_type", "mixed_materials"),
        Owner::Nearest(DESCRIBED),
        "instances",
    )?;
    let container = session.make(
        RecordKind::Container,
        Fields::new(),
        Owner::Record(instance),
        "container",
    )?;
    Ok(container)
}

/// The first slot takes the fragment's type, later slots its label
fn fill_slot(element: &Element, session: &mut Session, container: RecordId) {
    let record = session.record_mut(container);
    let Some(slot) = SLOTS.iter().position(|(_, indicator)| !record.has(indicator)) else {
        warn!(
            indicator = %element.inner_text().trim(),
            "container has no free slot, fragment dropped"
        );
        return;
    };
    let (type_field, indicator_field) = SLOTS[slot];
    let container_type = match slot {
        0 => element.attribute("type").or(element.attribute("label")),
        _ => element.attribute("label").or(element.attribute("type")),
    };
    record.set_opt(type_field, container_type);
    record.set(indicator_field, normalize(&element.inner_markup()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::convert::Converter;
    use crate::record::RecordGraph;

    fn convert(did: &str) -> std::result::Result<RecordGraph, String> {
        let markup = format!(
            r#"<ead><archdesc level="collection"><did><unittitle>Papers</unittitle></did>
<dsc><c01 level="file"><did><unittitle>File</unittitle>{}</did></c01></dsc></archdesc></ead>"#,
            did
        );
        Converter::new(ConversionConfig::new())
            .convert(&markup)
            .map_err(|e| e.to_string())
    }

    fn instances(graph: &RecordGraph) -> std::result::Result<Vec<serde_json::Value>, String> {
        Ok(graph.resource["children"][0]["instances"]
            .as_array()
            .ok_or("no instances")?
            .clone())
    }

    #[test]
    fn test_parent_fills_next_slot() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<container id="A" type="box" label="Mixed materials">4</container>
<container parent="A" type="ignored" label="folder">12</container>"#,
        )?;
        let instances = instances(&graph)?;
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["instance_type"], "mixed_materials");
        let container = &instances[0]["container"];
        assert_eq!(container["type_1"], "box");
        assert_eq!(container["indicator_1"], "4");
        assert_eq!(container["type_2"], "folder");
        assert_eq!(container["indicator_2"], "12");
        assert!(graph.dangling_references.is_empty());
        Ok(())
    }

    #[test]
    fn test_siblings_share_a_container() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<container type="box">1</container><container type="folder">2</container><container type="item">3</container>"#,
        )?;
        let instances = instances(&graph)?;
        assert_eq!(instances.len(), 1);
        let container = &instances[0]["container"];
        assert_eq!(container["type_1"], "box");
        assert_eq!(container["type_2"], "folder");
        assert_eq!(container["type_3"], "item");
        assert_eq!(container["indicator_3"], "3");
        Ok(())
    }

    #[test]
    fn test_id_starts_new_instance() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<container id="b1" type="box">1</container><container parent="b1" label="folder">1</container>
<container id="b2" type="box">2</container><container parent="b2" label="folder">5</container>"#,
        )?;
        let instances = instances(&graph)?;
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1]["container"]["indicator_1"], "2");
        assert_eq!(instances[1]["container"]["indicator_2"], "5");
        Ok(())
    }

    #[test]
    fn test_full_container_drops_fragment() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<container id="A" type="box">1</container><container parent="A" label="folder">2</container>
<container parent="A" label="item">3</container><container parent="A" label="page">4</container>"#,
        )?;
        let container = &instances(&graph)?[0]["container"];
        assert_eq!(container["indicator_3"], "3");
        assert!(container.get("type_4").is_none());
        Ok(())
    }

    #[test]
    fn test_unknown_parent_is_dangling() -> std::result::Result<(), String> {
        let graph = convert(r#"<container parent="missing" label="folder">7</container>"#)?;
        let container = &instances(&graph)?[0]["container"];
        // first slot of a new container, type falls back to the label
        assert_eq!(container["type_1"], "folder");
        assert_eq!(container["indicator_1"], "7");
        assert_eq!(graph.dangling_references[0].kind, ReferenceKind::Container);
        assert_eq!(graph.dangling_references[0].identifier, "missing");
        Ok(())
    }

    #[test]
    fn test_archref_containers_are_skipped() -> std::result::Result<(), String> {
        let graph = convert(
            r#"<archref><container type="box">9</container></archref>"#,
        )?;
        assert!(graph.resource["children"][0].get("instances").is_none());
        Ok(())
    }
}
