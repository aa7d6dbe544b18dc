//! Physical descriptions: extents, or notes when there is no countable extent.

use std::sync::LazyLock;

use regex::Regex;

use super::notes::{make_dimensions, make_singlepart};
use super::{content_of, outside_lists, DESCRIBED};
use crate::convert::{Owner, Session};
use crate::dispatch::{Outcome, RuleRegistry};
use crate::document::Element;
use crate::error::Result;
use crate::normalize::{normalize, strip_enclosing};
use crate::record::{Fields, RecordKind};

/// A quantity followed by its unit, like `3 linear feet`
static EXTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9.]+)\s+(.*)$").expect("extent pattern must compile")
});

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("physdesc", stock_physdesc, 0);
}

pub(super) fn register_extended(registry: &mut RuleRegistry) {
    registry.register("physdesc", outside_lists(physdesc), 0);
}

/// Splits extent text into number and extent type
pub(crate) fn parse_extent(text: &str) -> Option<(String, String)> {
    let captures = EXTENT.captures(text.trim())?;
    Some((captures[1].to_string(), captures[2].trim().to_string()))
}

fn portion(element: &Element) -> &str {
    element.attribute("altrender").unwrap_or("whole")
}

fn joined(parts: &[String]) -> Option<String> {
    Some(parts.join("; ")).filter(|joined| !joined.is_empty())
}

/// Every countable extent becomes an extent record, anything else ends up in one note
fn stock_physdesc(element: &Element, session: &mut Session) -> Result<Outcome> {
    let mut uncounted = false;
    for child in element.elements() {
        if child.tag() != "extent" {
            uncounted |= child.tag() != "head";
            continue;
        }
        match parse_extent(&child.inner_text()) {
            Some((number, extent_type)) => {
                session.make(
                    RecordKind::Extent,
                    Fields::new()
                        .with("number", number)
                        .with("extent_type", extent_type)
                        .with("portion", portion(element)),
                    Owner::Nearest(DESCRIBED),
                    "extents",
                )?;
            }
            None => uncounted = true,
        }
    }
    uncounted |= !element.own_text().trim().is_empty();
    if uncounted {
        let content = content_of(element);
        if !content.is_empty() {
            make_singlepart(element, session, "physdesc", content)?;
        }
    }
    Ok(Outcome::Consumed)
}

/// The first countable extent carries the rest of the description along. Without
/// one, each part of the description becomes a note of its own.
fn physdesc(element: &Element, session: &mut Session) -> Result<Outcome> {
    let mut extent: Option<(String, String)> = None;
    let mut summaries: Vec<&Element> = Vec::new();
    let mut facets: Vec<&Element> = Vec::new();
    let mut dimensions: Vec<&Element> = Vec::new();
    let mut other: Vec<&Element> = Vec::new();
    for child in element.elements() {
        match child.tag() {
            "extent" => match parse_extent(&child.inner_text()) {
                Some(parsed) if extent.is_none() => extent = Some(parsed),
                _ => summaries.push(child),
            },
            "physfacet" => facets.push(child),
            "dimensions" => dimensions.push(child),
            "head" => {}
            _ => other.push(child),
        }
    }
    let text_of = |parts: &[&Element]| -> Vec<String> {
        parts
            .iter()
            .map(|part| part.inner_text().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect()
    };

    if let Some((number, extent_type)) = extent {
        session.make(
            RecordKind::Extent,
            Fields::new()
                .with("number", number)
                .with("extent_type", extent_type)
                .with("portion", portion(element))
                .with_opt("container_summary", joined(&text_of(&summaries)))
                .with_opt("physical_details", joined(&text_of(&facets)))
                .with_opt("dimensions", joined(&text_of(&dimensions))),
            Owner::Nearest(DESCRIBED),
            "extents",
        )?;
    } else {
        for summary in summaries {
            let content = content_of(summary);
            let content = strip_enclosing(&content);
            if !content.is_empty() {
                make_singlepart(summary, session, "physdesc", content.to_string())?;
            }
        }
        for facet in facets {
            let content = content_of(facet);
            let content = strip_enclosing(&content);
            if !content.is_empty() {
                make_singlepart(facet, session, "physfacet", content.to_string())?;
            }
        }
        for dimension in dimensions {
            let content = content_of(dimension);
            make_dimensions(dimension, session, strip_enclosing(&content).to_string())?;
        }
    }

    for part in other {
        let content = content_of(part);
        if !content.is_empty() {
            make_singlepart(part, session, part.tag(), content)?;
        }
    }
    let loose = normalize(&element.own_text());
    if !loose.is_empty() {
        make_singlepart(element, session, "physdesc", loose)?;
    }
    Ok(Outcome::Consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionConfig, Profile};
    use crate::convert::Converter;
    use crate::record::RecordGraph;

    fn convert(physdesc: &str, profile: Profile) -> std::result::Result<RecordGraph, String> {
        let markup = format!(
            r#"<ead><archdesc level="collection"><did><unittitle>Papers</unittitle>{}</did></archdesc></ead>"#,
            physdesc
        );
        Converter::new(ConversionConfig::new().with_profile(profile))
            .convert(&markup)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_single_extent_makes_no_notes() -> std::result::Result<(), String> {
        let graph = convert(
            "<physdesc altrender=\"part\"><extent>2.5 linear feet</extent></physdesc>",
            Profile::Extended,
        )?;
        let extents = graph.resource["extents"].as_array().ok_or("no extents")?;
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0]["number"], "2.5");
        assert_eq!(extents[0]["extent_type"], "linear feet");
        assert_eq!(extents[0]["portion"], "part");
        assert!(extents[0].get("container_summary").is_none());
        assert!(graph.resource.get("notes").is_none());
        Ok(())
    }

    #[test]
    fn test_extent_carries_the_rest() -> std::result::Result<(), String> {
        let graph = convert(
            "<physdesc><extent>3 linear feet</extent><extent>(7 boxes)</extent><extent>12 folders</extent>\
             <physfacet>Photographs</physfacet><dimensions>8 x 10 in.</dimensions></physdesc>",
            Profile::Extended,
        )?;
        let extents = graph.resource["extents"].as_array().ok_or("no extents")?;
        assert_eq!(extents.len(), 1);
        assert_eq!(extents[0]["number"], "3");
        assert_eq!(extents[0]["portion"], "whole");
        assert_eq!(extents[0]["container_summary"], "(7 boxes); 12 folders");
        assert_eq!(extents[0]["physical_details"], "Photographs");
        assert_eq!(extents[0]["dimensions"], "8 x 10 in.");
        assert!(graph.resource.get("notes").is_none());
        Ok(())
    }

    #[test]
    fn test_no_extent_makes_notes() -> std::result::Result<(), String> {
        let graph = convert(
            "<physdesc><extent>(ca. 300 items)</extent><physfacet>[Albumen prints]</physfacet>\
             <dimensions>(20 x 25 cm)</dimensions><genreform>Photographs</genreform></physdesc>",
            Profile::Extended,
        )?;
        assert!(graph.resource.get("extents").is_none());
        let notes = graph.resource["notes"].as_array().ok_or("no notes")?;
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[0]["type"], "physdesc");
        assert_eq!(notes[0]["content"][0], "ca. 300 items");
        assert_eq!(notes[1]["type"], "physfacet");
        assert_eq!(notes[1]["content"][0], "Albumen prints");
        assert_eq!(notes[2]["jsonmodel_type"], "note_multipart");
        assert_eq!(notes[2]["type"], "dimensions");
        assert_eq!(notes[2]["subnotes"][0]["content"], "20 x 25 cm");
        assert_eq!(notes[3]["type"], "genreform");
        assert_eq!(notes[3]["content"][0], "Photographs");
        Ok(())
    }

    #[test]
    fn test_other_parts_always_make_notes() -> std::result::Result<(), String> {
        let graph = convert(
            "<physdesc>Bound volume; <extent>1 volume</extent><genreform>Ledgers</genreform></physdesc>",
            Profile::Extended,
        )?;
        assert_eq!(graph.resource["extents"].as_array().map(|e| e.len()), Some(1));
        let notes = graph.resource["notes"].as_array().ok_or("no notes")?;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0]["type"], "genreform");
        assert_eq!(notes[1]["type"], "physdesc");
        assert_eq!(notes[1]["content"][0], "Bound volume;");
        Ok(())
    }

    #[test]
    fn test_stock_extents() -> std::result::Result<(), String> {
        let graph = convert(
            "<physdesc><extent>3 linear feet</extent><extent>12 folders</extent></physdesc>",
            Profile::Stock,
        )?;
        let extents = graph.resource["extents"].as_array().ok_or("no extents")?;
        assert_eq!(extents.len(), 2);
        assert_eq!(extents[1]["extent_type"], "folders");
        assert!(graph.resource.get("notes").is_none());

        let graph = convert(
            "<physdesc><extent>3 linear feet</extent><physfacet>Photographs</physfacet></physdesc>",
            Profile::Stock,
        )?;
        assert_eq!(graph.resource["extents"].as_array().map(|e| e.len()), Some(1));
        assert_eq!(graph.resource["notes"][0]["type"], "physdesc");
        Ok(())
    }

    #[test]
    fn test_parse_extent() {
        assert_eq!(
            parse_extent(" 0.25 cubic feet "),
            Some(("0.25".to_string(), "cubic feet".to_string()))
        );
        assert_eq!(parse_extent("ca. 300 items"), None);
        assert_eq!(parse_extent("300"), None);
    }
}
