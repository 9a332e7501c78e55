//! OData query description and parameter compilation
//!
//! An [`ODataQuery`] compiles to an ordered list of `(key, value)` pairs in
//! the fixed order `$select, $filter, $orderby, $top, $expand`. Nested
//! expands compile recursively and render as `entity($select=a,b;$top=1)`.

use serde::{Deserialize, Serialize};

use super::pluralization::Pluralization;

/// OData query against one entity set (or one record of it)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ODataQuery {
    /// Logical entity name, or the navigation property name when used as an expand
    pub entity: String,
    pub id: Option<String>,
    #[serde(default)]
    pub select: Vec<String>,
    /// Complete boolean expressions; joined with ` and ` as-is, callers parenthesize
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub orderby: Vec<String>,
    pub top: Option<u32>,
    #[serde(default)]
    pub expand: Vec<ODataQuery>,
}

impl ODataQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Address a single record
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter.push(expression.into());
        self
    }

    pub fn orderby(mut self, clause: impl Into<String>) -> Self {
        self.orderby.push(clause.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn expand(mut self, nested: ODataQuery) -> Self {
        self.expand.push(nested);
        self
    }

    /// Path relative to the API data endpoint: `incidents` or `incidents(<id>)`
    pub fn endpoint(&self, pluralization: Pluralization) -> String {
        let entity_set = pluralization.entity_set_name(&self.entity);
        match &self.id {
            Some(id) => format!("{}({})", entity_set, id),
            None => entity_set,
        }
    }

    pub fn compile(&self) -> Vec<(String, String)> {
        compile_params(self)
    }
}

/// Compile a query into ordered URL parameters
pub fn compile_params(query: &ODataQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if !query.select.is_empty() {
        params.push(("$select".to_string(), query.select.join(",")));
    }

    if !query.filter.is_empty() {
        params.push(("$filter".to_string(), query.filter.join(" and ")));
    }

    if !query.orderby.is_empty() {
        params.push(("$orderby".to_string(), query.orderby.join(",")));
    }

    if let Some(top) = query.top.filter(|top| *top > 0) {
        params.push(("$top".to_string(), top.to_string()));
    }

    let expand_parts: Vec<String> = query
        .expand
        .iter()
        .filter(|nested| !nested.entity.is_empty())
        .map(|nested| {
            let inner = compile_params(nested)
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(";");
            format!("{}({})", nested.entity, inner)
        })
        .collect();

    if !expand_parts.is_empty() {
        params.push(("$expand".to_string(), expand_parts.join(",")));
    }

    params
}
