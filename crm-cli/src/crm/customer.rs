//! Customer lookup and membership creation through custom actions
//!
//! Both actions answer with `{"Response": ...}` where the inner value is a
//! JSON object or a string holding one. A lookup response either describes a
//! customer (it carries `kimCustomerId`) or an error; [`CustomerLookup::classify`]
//! makes that decision once.
//!
//! The action names and their parameter shapes are deployment-specific
//! custom actions of the organization. The defaults below can be overridden
//! through [`CustomerActions`] (see `CUSTOMER_LOOKUP_ACTION` and
//! `CREATE_MEMBER_ACTION` in the configuration); an unknown action name makes
//! the server answer 404, which surfaces as a status error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::actions::{Action, execute_action};
use crate::api::ApiClient;
use crate::api::batch::{BatchOutcome, ConcurrencyLimiter, gather};
use crate::error::{CrmError, Result};

pub const GET_CUSTOMER_ACTION: &str = "coop_GetCustomerByPersonalNumber";
pub const CREATE_MEMBER_ACTION: &str = "coop_CreateMember";

/// Names of the custom actions behind customer lookup and membership creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerActions {
    pub lookup: String,
    pub create_member: String,
}

impl Default for CustomerActions {
    fn default() -> Self {
        Self {
            lookup: GET_CUSTOMER_ACTION.to_string(),
            create_member: CREATE_MEMBER_ACTION.to_string(),
        }
    }
}

/// Key whose presence marks a successful lookup
const CUSTOMER_ID_KEY: &str = "kimCustomerId";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "kimCustomerId")]
    pub kim_customer_id: String,
    /// Membership number, `None` when the customer has no membership
    #[serde(rename = "mmId", default)]
    pub mm_id: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerError {
    #[serde(alias = "errorMessage", alias = "Message", default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CustomerLookup {
    Found { customer: Customer },
    NotFound { error: CustomerError },
}

impl CustomerLookup {
    /// Decide the variant from the unwrapped response object
    pub fn classify(response: &Value) -> Result<Self> {
        let Value::Object(map) = response else {
            return Err(CrmError::Validation {
                message: "Customer response is not an object".into(),
                payload: response.to_string(),
            });
        };

        let has_customer_id = map
            .get(CUSTOMER_ID_KEY)
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());

        let validation = |e: serde_json::Error| CrmError::Validation {
            message: e.to_string(),
            payload: response.to_string(),
        };

        if has_customer_id {
            let customer = Customer::deserialize(response).map_err(validation)?;
            Ok(Self::Found { customer })
        } else {
            let error = CustomerError::deserialize(response).map_err(validation)?;
            Ok(Self::NotFound { error })
        }
    }

    pub fn customer(&self) -> Option<&Customer> {
        match self {
            Self::Found { customer } => Some(customer),
            Self::NotFound { .. } => None,
        }
    }

    pub fn kim_customer_id(&self) -> Option<&str> {
        self.customer().map(|c| c.kim_customer_id.as_str())
    }

    pub fn is_customer_without_membership(&self) -> bool {
        self.customer().is_some_and(|c| c.mm_id.is_none())
    }

    pub fn is_paid_member(&self) -> bool {
        self.customer().is_some_and(|c| c.mm_id.is_some())
    }

    pub fn is_not_customer(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Unwrap the `{"Response": ...}` envelope
pub fn unwrap_action_response(body: &Value) -> Result<Value> {
    let invalid = |message: &str| CrmError::Validation {
        message: message.to_string(),
        payload: body.to_string(),
    };

    match body.get("Response") {
        Some(Value::String(inner)) => serde_json::from_str(inner).map_err(|e| {
            log::error!("Action response is not valid JSON: {}", e);
            invalid(&e.to_string())
        }),
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        Some(_) => Err(invalid("Action response has an unexpected shape")),
        None => Err(invalid("Action response has no Response field")),
    }
}

pub async fn get_customer_by_personal_number(
    api: &ApiClient,
    actions: &CustomerActions,
    personal_number: &str,
) -> Result<CustomerLookup> {
    let action = Action::new(&actions.lookup, json!({ "PersonalNumber": personal_number }));
    let response = execute_action(api, &action).await?;
    let lookup = CustomerLookup::classify(&unwrap_action_response(&response.json()?)?)?;
    log::debug!(
        "Customer lookup for {}: {}",
        personal_number,
        if lookup.is_not_customer() { "not found" } else { "found" }
    );
    Ok(lookup)
}

/// Create a membership for an existing customer
pub async fn create_member(
    api: &ApiClient,
    actions: &CustomerActions,
    kim_customer_id: &str,
    channel: &str,
) -> Result<Value> {
    let action = Action::new(
        &actions.create_member,
        json!({ "KimCustomerId": kim_customer_id, "Channel": channel }),
    );
    let response = execute_action(api, &action).await.inspect_err(|e| {
        log::error!("Failed to create member for {}: {}", kim_customer_id, e);
    })?;
    unwrap_action_response(&response.json()?)
}

pub async fn lookup_customers(
    api: &ApiClient,
    actions: &CustomerActions,
    personal_numbers: Vec<String>,
    limiter: &ConcurrencyLimiter,
) -> Vec<BatchOutcome<String, CustomerLookup>> {
    gather(personal_numbers, limiter, |number| async move {
        get_customer_by_personal_number(api, actions, &number).await
    })
    .await
}
