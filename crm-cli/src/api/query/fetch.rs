//! FetchXML serialization
//!
//! `FetchXml` collects the paging options and the root entity; `build()`
//! turns the tree into the XML document the Web API expects in its
//! `fetchXml` query parameter. Only a [`BuiltFetchXml`] can be sent, so a
//! query cannot be executed before it was serialized.

use std::fmt;

use quick_xml::escape::escape;

use super::entity::{Entity, Filter, LinkedEntity, Order};
use crate::error::{CrmError, Result};

const INDENT: usize = 2;

/// FetchXML query under construction
#[derive(Debug, Clone, Default)]
pub struct FetchXml {
    entity: Option<Entity>,
    page: Option<u32>,
    count: Option<u32>,
    return_total_record_count: bool,
}

impl FetchXml {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root entity, replacing any previous one
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// 1-based page number
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Page size
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn return_total_record_count(mut self, enabled: bool) -> Self {
        self.return_total_record_count = enabled;
        self
    }

    /// Serialize the query tree
    ///
    /// Fails if no root entity has been set or an entity in the tree has no name.
    pub fn build(&self) -> Result<BuiltFetchXml> {
        let entity = self
            .entity
            .as_ref()
            .ok_or_else(|| CrmError::Query("Entity must be set before building query".into()))?;
        validate_names(entity)?;

        let mut fetch = String::from(
            r#"<fetch version="1.0" output-format="xml-platform" mapping="logical" no-lock="false""#,
        );
        if let Some(page) = self.page {
            fetch.push_str(&format!(r#" page="{}""#, page));
        }
        if let Some(count) = self.count {
            fetch.push_str(&format!(r#" count="{}""#, count));
        }
        if self.return_total_record_count {
            fetch.push_str(r#" returntotalrecordcount="true""#);
        }
        fetch.push('>');

        let mut lines = vec![fetch];
        lines.push(format!(
            r#"{}<entity name="{}">"#,
            pad(INDENT),
            escape(entity.name.as_str())
        ));
        write_entity_children(&mut lines, entity, INDENT * 2);
        lines.push(format!("{}</entity>", pad(INDENT)));
        lines.push("</fetch>".to_string());

        let xml = lines.join("\n");
        log::debug!("Built FetchXML for '{}': {}", entity.name, xml);

        Ok(BuiltFetchXml {
            xml,
            entity_name: entity.name.clone(),
        })
    }
}

/// A serialized FetchXML query, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltFetchXml {
    xml: String,
    entity_name: String,
}

impl BuiltFetchXml {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Logical name of the root entity
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }
}

impl fmt::Display for BuiltFetchXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

fn pad(indent: usize) -> String {
    " ".repeat(indent)
}

fn validate_names(entity: &Entity) -> Result<()> {
    if entity.name.trim().is_empty() {
        return Err(CrmError::Query("Entity name must not be empty".into()));
    }
    for link in &entity.links {
        validate_names(&link.entity)?;
    }
    Ok(())
}

/// Attributes, order, filters, then nested joins
fn write_entity_children(lines: &mut Vec<String>, entity: &Entity, indent: usize) {
    for attribute in &entity.attributes {
        lines.push(format!(
            r#"{}<attribute name="{}" />"#,
            pad(indent),
            escape(attribute.as_str())
        ));
    }

    if let Some(order) = &entity.order {
        lines.push(order_xml(order, indent));
    }

    for filter in &entity.filters {
        write_filter(lines, filter, indent);
    }

    for link in &entity.links {
        write_link(lines, link, indent);
    }
}

fn order_xml(order: &Order, indent: usize) -> String {
    let mut xml = format!(
        r#"{}<order attribute="{}""#,
        pad(indent),
        escape(order.attribute.as_str())
    );
    if let Some(entity_name) = &order.entity_name {
        xml.push_str(&format!(r#" entityname="{}""#, escape(entity_name.as_str())));
    }
    xml.push_str(&format!(r#" descending="{}" />"#, order.descending));
    xml
}

fn write_filter(lines: &mut Vec<String>, filter: &Filter, indent: usize) {
    lines.push(format!(
        r#"{}<filter type="{}">"#,
        pad(indent),
        filter.filter_type.as_str()
    ));

    for condition in &filter.conditions {
        let mut xml = format!(
            r#"{}<condition attribute="{}" operator="{}""#,
            pad(indent + INDENT),
            escape(condition.attribute.as_str()),
            escape(condition.operator.as_str())
        );
        if let Some(value) = condition.serialized_value() {
            xml.push_str(&format!(r#" value="{}""#, escape(value)));
        }
        xml.push_str(" />");
        lines.push(xml);
    }

    lines.push(format!("{}</filter>", pad(indent)));
}

fn write_link(lines: &mut Vec<String>, link: &LinkedEntity, indent: usize) {
    let mut open = format!(
        r#"{}<link-entity name="{}" from="{}" to="{}" link-type="{}""#,
        pad(indent),
        escape(link.entity.name.as_str()),
        escape(link.from_attribute.as_str()),
        escape(link.to_attribute.as_str()),
        link.link_type.as_str()
    );
    if let Some(alias) = &link.alias {
        open.push_str(&format!(r#" alias="{}""#, escape(alias.as_str())));
    }
    open.push('>');
    lines.push(open);

    write_entity_children(lines, &link.entity, indent + INDENT);

    lines.push(format!("{}</link-entity>", pad(indent)));
}
