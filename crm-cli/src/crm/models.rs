//! Typed records returned by the incident queries

use serde::{Deserialize, Serialize};

/// `{"value": [...]}` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ODataResponse<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub contactid: String,
    /// Membership number; absent for customers without a membership
    #[serde(alias = "coop_external_customer_id", default)]
    pub mmid: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(alias = "emailaddress1", default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(default)]
    pub incidentid: Option<String>,
    #[serde(default)]
    pub ticketnumber: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "_subjectid_value", default)]
    pub subjectid: Option<String>,
    #[serde(alias = "customerid_contact", default)]
    pub contact: Option<Contact>,
}

/// Case a notification points at, as returned through the `incident` link alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedIncident {
    #[serde(default)]
    pub incidentid: Option<String>,
    #[serde(default)]
    pub ticketnumber: Option<String>,
    #[serde(default)]
    pub statecode: Option<i64>,
    #[serde(default)]
    pub statuscode: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub coop_notificationid: String,
    #[serde(default)]
    pub coop_name: Option<String>,
    #[serde(default)]
    pub createdon: Option<String>,
    #[serde(default)]
    pub statecode: Option<i64>,
    #[serde(default)]
    pub coop_notificationsubject: Option<String>,
    #[serde(default)]
    pub coop_knowledgearticleid: Option<String>,
    #[serde(default)]
    pub coop_relatedcase: Option<String>,
    #[serde(default)]
    pub incident: Option<RelatedIncident>,
}

/// Saved personal view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuery {
    pub userqueryid: String,
    pub name: String,
}

/// Fields to change on an incident; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coop_resolvedon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coop_closecasenotification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coop_resolution: Option<String>,
    /// Subject label from the subjects table, bound separately
    #[serde(skip)]
    pub subject: Option<String>,
}

impl IncidentPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.coop_resolution = Some(resolution.into());
        self
    }

    pub fn subject(mut self, label: impl Into<String>) -> Self {
        self.subject = Some(label.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incident_with_expanded_contact() {
        let raw = json!({
            "value": [{
                "@odata.etag": "W/\"1\"",
                "title": "Membership not created",
                "incidentid": "8c1a0000-0000-0000-0000-000000000001",
                "ticketnumber": "CAS-01234",
                "description": null,
                "customerid_contact": {
                    "contactid": "c0000000-0000-0000-0000-000000000001",
                    "coop_external_customer_id": null,
                    "fullname": "Anna Svensson",
                    "emailaddress1": "anna@example.com"
                }
            }]
        });

        let parsed: ODataResponse<Incident> = serde_json::from_value(raw).unwrap();
        let incident = &parsed.value[0];
        assert_eq!(incident.ticketnumber.as_deref(), Some("CAS-01234"));
        let contact = incident.contact.as_ref().unwrap();
        assert_eq!(contact.email.as_deref(), Some("anna@example.com"));
        assert!(contact.mmid.is_none());
    }

    #[test]
    fn test_incident_subject_lookup_value() {
        let incident: Incident = serde_json::from_value(json!({
            "title": "t",
            "_subjectid_value": "5a000000-0000-0000-0000-000000000001"
        }))
        .unwrap();
        assert_eq!(
            incident.subjectid.as_deref(),
            Some("5a000000-0000-0000-0000-000000000001")
        );
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        let patch = IncidentPatch::default().title("New").subject("Billing");
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"title": "New"}));
        assert!(!patch.is_empty());
        assert!(IncidentPatch::default().is_empty());
    }
}
