//! Canned queries for the incident workflow

use reqwest::StatusCode;

use super::models::{Incident, Notification, ODataResponse, UserQuery};
use crate::api::normalize::NormalizedResponse;
use crate::api::query::{BuiltFetchXml, Entity, FetchXml, Filter, FilterCondition, LinkedEntity, Order};
use crate::api::{ApiClient, ODataQuery};
use crate::error::{CrmError, Result};

const INCIDENT_FIELDS: [&str; 4] = ["title", "incidentid", "ticketnumber", "description"];
const CONTACT_FIELDS: [&str; 4] = [
    "contactid",
    "coop_external_customer_id",
    "fullname",
    "emailaddress1",
];

pub const DEFAULT_LATEST_TOP: u32 = 4;

const USER_QUERY_SET: &str = "userqueries";

/// Open incidents owned by a team, newest first, with the customer contact
pub fn latest_incidents_query(team_id: &str, top: u32, exclude: Option<&str>) -> ODataQuery {
    let mut filter = format!("_owningteam_value eq '{}'", escape_literal(team_id));
    if let Some(exclude) = exclude.filter(|e| !e.trim().is_empty()) {
        filter.push_str(" and ");
        filter.push_str(exclude);
    }
    filter.push_str(" and statecode eq 0");

    ODataQuery::new("incident")
        .select(INCIDENT_FIELDS)
        .filter(filter)
        .orderby("createdon desc")
        .top(top)
        .expand(ODataQuery::new("customerid_contact").select(CONTACT_FIELDS))
}

pub fn incident_by_id_query(incident_id: &str) -> ODataQuery {
    ODataQuery::new("incident")
        .id(incident_id)
        .select(INCIDENT_FIELDS.into_iter().chain(["_subjectid_value"]))
}

/// Notifications still unread by the current user whose case is already resolved
pub fn inactive_notifications_fetch() -> Result<BuiltFetchXml> {
    let case = LinkedEntity::new("incident", "incidentid", "coop_relatedcase")
        .alias("incident")
        .attributes(["statuscode", "ticketnumber", "statecode", "incidentid"])
        .filter(Filter::and([FilterCondition::eq("statecode", "1")]));

    let notification = Entity::new("coop_notification")
        .attributes([
            "statecode",
            "coop_name",
            "createdon",
            "coop_relatedcase",
            "coop_notificationsubject",
            "coop_knowledgearticleid",
            "coop_notificationid",
        ])
        .filter(Filter::and([
            FilterCondition::eq("coop_isread", "0"),
            FilterCondition::eq_userid("ownerid"),
        ]))
        .order(Order::asc("coop_name"))
        .link(case);

    FetchXml::new().entity(notification).build()
}

pub async fn latest_incidents(
    api: &ApiClient,
    team_id: &str,
    top: u32,
    exclude: Option<&str>,
) -> Result<Option<Vec<Incident>>> {
    let response = api
        .odata_request(&latest_incidents_query(team_id, top, exclude))
        .await?
        .error_for_status()?;

    match response.json_as::<ODataResponse<Incident>>() {
        Ok(listing) => Ok(Some(listing.value)),
        Err(CrmError::Validation { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// `Ok(None)` when the incident does not exist or cannot be read
pub async fn incident_by_id(api: &ApiClient, incident_id: &str) -> Result<Option<Incident>> {
    let response = api.odata_request(&incident_by_id_query(incident_id)).await?;
    if response.status == StatusCode::NOT_FOUND {
        log::info!("Incident {} not found", incident_id);
        return Ok(None);
    }

    match response.error_for_status()?.json_as::<Incident>() {
        Ok(incident) => Ok(Some(incident)),
        Err(CrmError::Validation { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn inactive_notifications(api: &ApiClient) -> Result<Vec<Notification>> {
    let fetch = inactive_notifications_fetch()?;
    log::debug!("FetchXML: {}", fetch);

    match api.fetch_xml_request(&fetch).await? {
        Some(normalized) => normalized.records_as(),
        None => {
            log::warn!("Notification listing could not be read");
            Ok(Vec::new())
        }
    }
}

/// Look up a saved personal view by exact name
pub async fn find_user_query(api: &ApiClient, name: &str) -> Result<Option<UserQuery>> {
    let query = ODataQuery::new("userquery")
        .select(["userqueryid", "name"])
        .filter(format!("name eq '{}'", escape_literal(name)))
        .top(1);

    // irregular entity set name
    let response = api
        .get(USER_QUERY_SET, &query.compile())
        .await?
        .error_for_status()?;
    let listing: ODataResponse<UserQuery> = response.json_as()?;
    Ok(listing.value.into_iter().next())
}

/// Run a saved personal view against its entity set
///
/// `Ok(None)` when no view has that name or the result cannot be read.
pub async fn run_user_query(api: &ApiClient, entity: &str, name: &str) -> Result<Option<NormalizedResponse>> {
    let Some(view) = find_user_query(api, name).await? else {
        log::warn!("No saved view named '{}'", name);
        return Ok(None);
    };

    let endpoint = api.pluralization().entity_set_name(entity);
    let params = [("userQuery".to_string(), view.userqueryid)];
    let response = api.get(&endpoint, &params).await?.error_for_status()?;

    Ok(crate::api::normalize_response(&response.json()?))
}

/// Double single quotes inside an OData string literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_latest_incidents_params() {
        let params = latest_incidents_query("team-1", 4, Some("not contains(title, 'Spam')")).compile();

        assert_eq!(
            params.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            vec!["$select", "$filter", "$orderby", "$top", "$expand"]
        );
        assert_eq!(
            param(&params, "$filter"),
            Some("_owningteam_value eq 'team-1' and not contains(title, 'Spam') and statecode eq 0")
        );
        assert_eq!(param(&params, "$orderby"), Some("createdon desc"));
        assert_eq!(param(&params, "$top"), Some("4"));
        assert_eq!(
            param(&params, "$expand"),
            Some("customerid_contact($select=contactid,coop_external_customer_id,fullname,emailaddress1)")
        );
    }

    #[test]
    fn test_incident_by_id() {
        let query = incident_by_id_query("abc");
        assert_eq!(query.endpoint(crate::api::Pluralization::Simple), "incidents(abc)");
        assert_eq!(
            param(&query.compile(), "$select"),
            Some("title,incidentid,ticketnumber,description,_subjectid_value")
        );
    }

    #[test]
    fn test_inactive_notifications_document() {
        let fetch = inactive_notifications_fetch().unwrap();
        assert_eq!(fetch.entity_name(), "coop_notification");

        let doc = roxmltree::Document::parse(fetch.xml()).unwrap();
        let ownerid = doc
            .descendants()
            .find(|n| n.has_tag_name("condition") && n.attribute("attribute") == Some("ownerid"))
            .unwrap();
        assert_eq!(ownerid.attribute("operator"), Some("eq-userid"));
        assert_eq!(ownerid.attribute("value"), None);

        let link = doc.descendants().find(|n| n.has_tag_name("link-entity")).unwrap();
        assert_eq!(link.attribute("name"), Some("incident"));
        assert_eq!(link.attribute("from"), Some("incidentid"));
        assert_eq!(link.attribute("to"), Some("coop_relatedcase"));
        assert_eq!(link.attribute("alias"), Some("incident"));
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("O'Brien's view"), "O''Brien''s view");
    }
}
