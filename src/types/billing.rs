use serde_json::Value;

use crate::error::{Error, Result};

/// Normalized payment-processor webhook event. Signature verification
/// happens before normalization and is not handled here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// Checkout completed: a subscription now backs the workspace.
    SubscriptionStarted {
        workspace_id: String,
        plan_id: String,
        subscription_id: String,
        customer_id: Option<String>,
    },
    /// Subscription changed (plan switch or reactivation).
    SubscriptionUpdated {
        subscription_id: String,
        active: bool,
        plan_id: Option<String>,
    },
    /// Subscription ended; the workspace enters its grace period.
    SubscriptionEnded { subscription_id: String },
}

impl BillingEvent {
    /// Normalizes a raw webhook payload of the form
    /// `{"type": ..., "data": {"object": {...}}}`.
    pub fn normalize(raw: &Value) -> Result<Self> {
        let event_type = raw["type"]
            .as_str()
            .ok_or_else(|| Error::BadRequest("billing event missing 'type'".to_string()))?;
        let object = &raw["data"]["object"];

        match event_type {
            "checkout.session.completed" => {
                let metadata = &object["metadata"];
                Ok(BillingEvent::SubscriptionStarted {
                    workspace_id: require_str(metadata, "workspace_id")?,
                    plan_id: require_str(metadata, "plan_id")?,
                    subscription_id: require_str(object, "subscription")?,
                    customer_id: object["customer"].as_str().map(String::from),
                })
            }
            "customer.subscription.updated" => Ok(BillingEvent::SubscriptionUpdated {
                subscription_id: require_str(object, "id")?,
                active: object["status"].as_str() == Some("active"),
                plan_id: object["metadata"]["plan_id"].as_str().map(String::from),
            }),
            "customer.subscription.deleted" => Ok(BillingEvent::SubscriptionEnded {
                subscription_id: require_str(object, "id")?,
            }),
            other => Err(Error::BadRequest(format!(
                "unsupported billing event type: {other}"
            ))),
        }
    }

    /// The identifier used to locate the workspace for this event.
    #[must_use]
    pub fn billing_id(&self) -> &str {
        match self {
            BillingEvent::SubscriptionStarted { workspace_id, .. } => workspace_id,
            BillingEvent::SubscriptionUpdated {
                subscription_id, ..
            }
            | BillingEvent::SubscriptionEnded { subscription_id } => subscription_id,
        }
    }
}

fn require_str(value: &Value, key: &str) -> Result<String> {
    value[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::BadRequest(format!("billing event missing '{key}'")))
}
