//! FetchXML Query Builder Module
//!
//! Provides the query tree (entities, joins, filter blocks, sort keys) and its
//! serialization to FetchXML. Trees are built bottom-up and serialized once.

pub mod entity;
pub mod fetch;

pub use entity::{Entity, Filter, FilterCondition, FilterType, LinkType, LinkedEntity, Order};
pub use fetch::{BuiltFetchXml, FetchXml};
