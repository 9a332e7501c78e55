//! Query tree nodes: entities, joins, filters and sort keys
//!
//! Trees are assembled bottom-up: children are built first and moved into
//! their parent, so there are no back references and nothing changes after
//! the tree is handed to the serializer.

use serde::{Deserialize, Serialize};

/// How the conditions of a filter block are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    And,
    Or,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::And => "and",
            FilterType::Or => "or",
        }
    }
}

/// Operators that never carry a value
pub const VALUELESS_OPERATORS: [&str; 5] = ["eq-userid", "ne-userid", "eq-userteams", "null", "not-null"];

/// A single `<condition>` inside a filter block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub attribute: String,
    /// Operator as the API spells it (`eq`, `ne`, `eq-userid`, `on-or-after`, ...)
    pub operator: String,
    /// Operators such as `eq-userid` take no value
    pub value: Option<String>,
}

impl FilterCondition {
    /// Condition without a value (e.g. `eq-userid`, `null`)
    pub fn new(attribute: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: operator.into(),
            value: None,
        }
    }

    /// Condition comparing the attribute against a value
    pub fn with_value(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: operator.into(),
            value: Some(value.into()),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value(attribute, "eq", value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value(attribute, "ne", value)
    }

    /// Matches records owned by the calling user
    pub fn eq_userid(attribute: impl Into<String>) -> Self {
        Self::new(attribute, "eq-userid")
    }

    pub fn takes_value(&self) -> bool {
        !VALUELESS_OPERATORS.contains(&self.operator.as_str())
    }

    /// Value to serialize, if any. Empty strings count as "no value", and
    /// operators that take no value never get one.
    pub fn serialized_value(&self) -> Option<&str> {
        if !self.takes_value() {
            return None;
        }
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

/// One `<filter>` block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<FilterCondition>,
    pub filter_type: FilterType,
}

impl Filter {
    pub fn and(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            filter_type: FilterType::And,
        }
    }

    pub fn or(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            filter_type: FilterType::Or,
        }
    }

    pub fn condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Sort key for one entity level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub attribute: String,
    pub descending: bool,
    /// Needed when sorting by a column of a linked entity
    pub entity_name: Option<String>,
}

impl Order {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: false,
            entity_name: None,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: true,
            entity_name: None,
        }
    }

    pub fn entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = Some(entity_name.into());
        self
    }
}

/// Join type of a `<link-entity>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Inner,
    Outer,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Inner => "inner",
            LinkType::Outer => "outer",
        }
    }
}

/// Root entity or the entity part of a join
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub name: String,
    /// Columns to fetch; empty means the server default set
    pub attributes: Vec<String>,
    pub filters: Vec<Filter>,
    pub links: Vec<LinkedEntity>,
    /// Only one sort key per entity level is supported
    pub order: Option<Order>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Append a filter block; blocks are serialized in the order they were added
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn link(mut self, link: LinkedEntity) -> Self {
        self.links.push(link);
        self
    }

    /// Set the sort key, replacing any previous one
    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
}

/// A `<link-entity>` join. May own further joins of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedEntity {
    pub entity: Entity,
    pub from_attribute: String,
    pub to_attribute: String,
    pub link_type: LinkType,
    /// Omitted from the output when `None`
    pub alias: Option<String>,
}

impl LinkedEntity {
    /// Inner join on `name.from = parent.to`
    pub fn new(
        name: impl Into<String>,
        from_attribute: impl Into<String>,
        to_attribute: impl Into<String>,
    ) -> Self {
        Self {
            entity: Entity::new(name),
            from_attribute: from_attribute.into(),
            to_attribute: to_attribute.into(),
            link_type: LinkType::Inner,
            alias: None,
        }
    }

    pub fn link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn outer(self) -> Self {
        self.link_type(LinkType::Outer)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.entity = self.entity.attribute(name);
        self
    }

    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity = self.entity.attributes(names);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.entity = self.entity.filter(filter);
        self
    }

    pub fn link(mut self, link: LinkedEntity) -> Self {
        self.entity = self.entity.link(link);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.entity = self.entity.order(order);
        self
    }

    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_replaced_not_appended() {
        let entity = Entity::new("incident")
            .order(Order::asc("title"))
            .order(Order::desc("createdon"));

        assert_eq!(entity.order, Some(Order::desc("createdon")));
    }

    #[test]
    fn test_filters_keep_insertion_order() {
        let entity = Entity::new("incident")
            .filter(Filter::and([FilterCondition::eq("statecode", "0")]))
            .filter(Filter::or([
                FilterCondition::eq("prioritycode", "1"),
                FilterCondition::eq("prioritycode", "2"),
            ]));

        assert_eq!(entity.filters.len(), 2);
        assert_eq!(entity.filters[0].filter_type, FilterType::And);
        assert_eq!(entity.filters[1].filter_type, FilterType::Or);
    }

    #[test]
    fn test_linked_entity_defaults() {
        let link = LinkedEntity::new("incident", "incidentid", "coop_relatedcase");
        assert_eq!(link.link_type, LinkType::Inner);
        assert!(link.alias.is_none());
        assert_eq!(link.name(), "incident");

        let link = link.outer().alias("case");
        assert_eq!(link.link_type, LinkType::Outer);
        assert_eq!(link.alias.as_deref(), Some("case"));
    }

    #[test]
    fn test_empty_value_counts_as_absent() {
        assert_eq!(FilterCondition::eq("a", "").serialized_value(), None);
        assert_eq!(FilterCondition::eq_userid("ownerid").serialized_value(), None);
        assert_eq!(FilterCondition::eq("a", "1").serialized_value(), Some("1"));
    }

    #[test]
    fn test_valueless_operators_drop_stray_value() {
        for operator in VALUELESS_OPERATORS {
            let condition = FilterCondition::with_value("ownerid", operator, "x");
            assert!(!condition.takes_value());
            assert_eq!(condition.serialized_value(), None, "{operator}");
        }
        assert!(FilterCondition::new("createdon", "on-or-after").takes_value());
    }
}
