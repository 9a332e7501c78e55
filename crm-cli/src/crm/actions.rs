//! Record updates and server-side actions
//!
//! Closing an incident is two dependent calls: a PATCH stamping the
//! resolution fields, then the `CloseIncident` action. The action is only
//! posted once the PATCH has succeeded.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use super::models::IncidentPatch;
use super::subjects::SubjectTable;
use crate::api::batch::{BatchOutcome, ConcurrencyLimiter, gather};
use crate::api::{ApiClient, ApiResponse};
use crate::error::{CrmError, Result};

/// Unbound action invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub data: Value,
}

impl Action {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Resolve an incident as "closed" (`Status: -1` keeps the default status reason)
    pub fn close_incident(incident_id: &str) -> Self {
        Self::new(
            "CloseIncident",
            json!({
                "IncidentResolution": {
                    "incidentid@odata.bind": lookup_bind("incidents", incident_id),
                },
                "Status": -1,
            }),
        )
    }
}

/// `/{entity_set}({id})` reference for `@odata.bind` fields
pub fn lookup_bind(entity_set: &str, id: &str) -> String {
    format!("/{}({})", entity_set, id)
}

/// Current time as `2024-05-02T08:15:30.123Z`
pub fn resolved_on_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wrap plain text in the rich-text container the case form renders
pub fn case_description_wrapper(description: &str) -> String {
    format!(
        concat!(
            r#"<div class="ck-content" data-wrapper="true" dir="ltr" "#,
            r#"style="--ck-image-style-spacing: 1.5em; --ck-inline-image-style-spacing: calc(var(--ck-image-style-spacing) / 2); "#,
            r#"--ck-color-selector-caption-background: hsl(0, 0%, 97%); --ck-color-selector-caption-text: hsl(0, 0%, 20%); "#,
            r#"font-family: Segoe UI; font-size: 11pt;"><p style="margin: 0;">{}</p></div>"#
        ),
        description
    )
}

/// PATCH body for an incident update
pub fn incident_patch_body(patch: &IncidentPatch, subjects: &SubjectTable) -> Result<Map<String, Value>> {
    let mut patch = patch.clone();
    if let Some(description) = patch.description.take() {
        patch.description = Some(case_description_wrapper(&description));
    }

    let mut body = match serde_json::to_value(&patch)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(label) = &patch.subject {
        body.extend(subjects.resolve(label)?.patch_fields());
    }

    Ok(body)
}

/// PATCH `{entity}s({id})`
pub async fn update_record(api: &ApiClient, entity: &str, id: &str, data: &Value) -> Result<ApiResponse> {
    let endpoint = format!("{}({})", api.pluralization().entity_set_name(entity), id);
    log::debug!("Updating {} with {}", endpoint, data);

    api.patch(&endpoint, data).await.inspect_err(|e| {
        log::error!("Failed to patch record {}: {}", id, e);
    })
}

/// POST an unbound action
pub async fn execute_action(api: &ApiClient, action: &Action) -> Result<ApiResponse> {
    api.post(&action.name, &action.data, None).await
}

pub async fn update_incident(
    api: &ApiClient,
    subjects: &SubjectTable,
    incident_id: &str,
    patch: &IncidentPatch,
) -> Result<ApiResponse> {
    let body = incident_patch_body(patch, subjects)?;
    if body.is_empty() {
        return Err(CrmError::Query(format!(
            "Nothing to update on incident {}",
            incident_id
        )));
    }
    update_record(api, "incident", incident_id, &Value::Object(body)).await
}

/// Stamp the resolution fields, then resolve the incident
pub async fn close_incident(
    api: &ApiClient,
    subjects: &SubjectTable,
    incident_id: &str,
    resolution: Option<&str>,
    subject: Option<&str>,
) -> Result<ApiResponse> {
    let patch = IncidentPatch {
        coop_resolvedon: Some(resolved_on_now()),
        coop_closecasenotification: Some(false),
        coop_resolution: resolution.map(str::to_string),
        subject: subject.map(str::to_string),
        ..Default::default()
    };
    update_incident(api, subjects, incident_id, &patch).await?;

    execute_action(api, &Action::close_incident(incident_id))
        .await
        .inspect_err(|e| {
            log::error!("Failed to post close action for incident {}: {}", incident_id, e);
        })
}

/// Mark a notification as read
pub async fn close_notification(api: &ApiClient, notification_id: &str) -> Result<ApiResponse> {
    update_record(
        api,
        "coop_notification",
        notification_id,
        &json!({ "coop_isread": true }),
    )
    .await
}

/// Close several incidents; each id gets its own outcome
pub async fn close_incidents(
    api: &ApiClient,
    subjects: &SubjectTable,
    incident_ids: Vec<String>,
    limiter: &ConcurrencyLimiter,
    resolution: Option<&str>,
    subject: Option<&str>,
) -> Vec<BatchOutcome<String, ApiResponse>> {
    gather(incident_ids, limiter, |id| async move {
        close_incident(api, subjects, &id, resolution, subject).await
    })
    .await
}

pub async fn close_notifications(
    api: &ApiClient,
    notification_ids: Vec<String>,
    limiter: &ConcurrencyLimiter,
) -> Vec<BatchOutcome<String, ApiResponse>> {
    gather(notification_ids, limiter, |id| async move {
        close_notification(api, &id).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::subjects::RawSubject;

    fn subjects() -> SubjectTable {
        SubjectTable::from_subjects(&[RawSubject {
            title: "Medlemsservice\\Manuella medlemskap".into(),
            subjectid: "5a000000-0000-0000-0000-000000000001".into(),
        }])
    }

    #[test]
    fn test_close_incident_action() {
        let action = Action::close_incident("abc");
        assert_eq!(action.name, "CloseIncident");
        assert_eq!(
            action.data,
            json!({
                "IncidentResolution": {"incidentid@odata.bind": "/incidents(abc)"},
                "Status": -1
            })
        );
    }

    #[test]
    fn test_resolved_on_format() {
        let stamp = resolved_on_now();
        assert!(stamp.ends_with('Z'));
        // 2024-05-02T08:15:30.123Z
        assert_eq!(stamp.len(), 24);
        assert_eq!(&stamp[19..20], ".");
    }

    #[test]
    fn test_description_is_wrapped() {
        let body = incident_patch_body(
            &IncidentPatch::default().description("Kunden saknar medlemskap"),
            &SubjectTable::default(),
        )
        .unwrap();
        let description = body["description"].as_str().unwrap();
        assert!(description.starts_with(r#"<div class="ck-content""#));
        assert!(description.ends_with(r#"<p style="margin: 0;">Kunden saknar medlemskap</p></div>"#));
    }

    #[test]
    fn test_subject_is_bound() {
        let patch = IncidentPatch {
            coop_closecasenotification: Some(false),
            ..Default::default()
        }
        .subject("Medlemsservice_Manuella_medlemskap");

        let body = incident_patch_body(&patch, &subjects()).unwrap();
        assert_eq!(
            body["subjectid@odata.bind"],
            "/subjects(5a000000-0000-0000-0000-000000000001)"
        );
        assert_eq!(body["coop_topparentcategory"], "Medlemsservice");
        assert_eq!(body["coop_closecasenotification"], false);
        assert!(!body.contains_key("subject"));
    }

    #[test]
    fn test_unknown_subject_fails_before_any_request() {
        let patch = IncidentPatch::default().subject("Missing");
        assert!(matches!(
            incident_patch_body(&patch, &subjects()),
            Err(CrmError::UnknownSubject(_))
        ));
    }
}
