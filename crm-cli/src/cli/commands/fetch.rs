//! `fetch` command: assemble a FetchXML query from flags

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde_json::Value;

use crate::cli::AppContext;
use crate::cli::output::{OutputFormat, format_output};
use crm_cli::api::query::{Entity, FetchXml, Filter, FilterCondition, Order};

#[derive(Args)]
pub struct FetchArgs {
    /// Logical entity name, e.g. incident
    pub entity: String,

    /// Attributes to return (comma separated or repeated)
    #[arg(long = "attr", value_delimiter = ',')]
    pub attributes: Vec<String>,

    /// Condition as attribute:operator[:value]
    #[arg(long = "filter", value_parser = parse_condition)]
    pub conditions: Vec<FilterCondition>,

    /// Combine conditions with OR instead of AND
    #[arg(long)]
    pub any: bool,

    /// Sort as attribute[:desc]
    #[arg(long, value_parser = parse_order)]
    pub order: Option<Order>,

    /// Maximum records per page
    #[arg(long)]
    pub count: Option<u32>,

    #[arg(long)]
    pub page: Option<u32>,

    /// Print the FetchXML instead of running it
    #[arg(long)]
    pub dry: bool,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn parse_condition(raw: &str) -> std::result::Result<FilterCondition, String> {
    let mut parts = raw.splitn(3, ':');
    let attribute = parts.next().unwrap_or_default().trim();
    let operator = parts.next().map(str::trim).unwrap_or_default();
    if attribute.is_empty() || operator.is_empty() {
        return Err(format!("expected attribute:operator[:value], got '{}'", raw));
    }

    Ok(match parts.next() {
        Some(value) => FilterCondition::with_value(attribute, operator, value),
        None => FilterCondition::new(attribute, operator),
    })
}

fn parse_order(raw: &str) -> std::result::Result<Order, String> {
    match raw.split_once(':') {
        None => Ok(Order::asc(raw.trim())),
        Some((attribute, "desc")) => Ok(Order::desc(attribute.trim())),
        Some((attribute, "asc")) => Ok(Order::asc(attribute.trim())),
        Some((_, direction)) => Err(format!("unknown sort direction '{}'", direction)),
    }
}

fn build_query(args: &FetchArgs) -> FetchXml {
    let mut entity = Entity::new(args.entity.as_str()).attributes(args.attributes.iter().cloned());

    if !args.conditions.is_empty() {
        let conditions = args.conditions.iter().cloned();
        entity = entity.filter(if args.any {
            Filter::or(conditions)
        } else {
            Filter::and(conditions)
        });
    }
    if let Some(order) = &args.order {
        entity = entity.order(order.clone());
    }

    let mut fetch = FetchXml::new().entity(entity);
    if let Some(count) = args.count {
        fetch = fetch.count(count);
    }
    if let Some(page) = args.page {
        fetch = fetch.page(page);
    }
    fetch
}

pub async fn handle(args: FetchArgs) -> Result<()> {
    let built = build_query(&args).build().context("Failed to build FetchXML")?;

    if args.dry {
        println!("{}", built);
        return Ok(());
    }

    let ctx = AppContext::from_env()?;
    let result = ctx
        .client
        .fetch_xml_request(&built)
        .await
        .context("Failed to execute query")?;

    match result {
        Some(normalized) if !normalized.is_empty() => {
            let records = Value::Array(normalized.records().iter().cloned().map(Value::Object).collect());
            println!("{}", format_output(&records, args.format)?);
        }
        _ => println!("{}", "No records found".yellow()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: FetchArgs,
    }

    #[test]
    fn test_parse_condition() {
        let condition = parse_condition("statecode:eq:0").unwrap();
        assert_eq!(condition, FilterCondition::eq("statecode", "0"));

        let condition = parse_condition("ownerid:eq-userid").unwrap();
        assert_eq!(condition.serialized_value(), None);
        let condition = parse_condition("ownerid:eq-userid:x").unwrap();
        assert_eq!(condition.serialized_value(), None);

        // values may contain colons
        let condition = parse_condition("createdon:gt:2024-01-01T00:00:00Z").unwrap();
        assert_eq!(condition.serialized_value(), Some("2024-01-01T00:00:00Z"));

        assert!(parse_condition("statecode").is_err());
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(parse_order("createdon:desc").unwrap(), Order::desc("createdon"));
        assert_eq!(parse_order("title").unwrap(), Order::asc("title"));
        assert!(parse_order("title:sideways").is_err());
    }

    #[test]
    fn test_flags_build_query() {
        let cli = TestCli::parse_from([
            "fetch",
            "incident",
            "--attr",
            "title,ticketnumber",
            "--filter",
            "statecode:eq:0",
            "--order",
            "createdon:desc",
            "--count",
            "5",
        ]);

        let xml = build_query(&cli.args).build().unwrap().xml().to_string();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let fetch = doc.root_element();
        assert_eq!(fetch.attribute("count"), Some("5"));

        let attributes: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("attribute"))
            .filter_map(|n| n.attribute("name"))
            .collect();
        assert_eq!(attributes, vec!["title", "ticketnumber"]);

        let order = doc.descendants().find(|n| n.has_tag_name("order")).unwrap();
        assert_eq!(order.attribute("descending"), Some("true"));
    }
}
