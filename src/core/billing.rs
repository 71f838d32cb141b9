use chrono::{Duration, Utc};

use super::{Core, GRACE_PERIOD_DAYS};
use crate::error::{Error, Result};
use crate::types::BillingEvent;

impl Core {
    /// Applies a normalized billing event to the workspace it targets.
    ///
    /// Transitions run under the workspace lock. Every arm is safe to
    /// re-run: cancellation is guarded in the store, reactivation and
    /// plan changes are absolute writes.
    pub async fn apply_event(&self, event: &BillingEvent) -> Result<()> {
        match event {
            BillingEvent::SubscriptionStarted {
                workspace_id,
                plan_id,
                subscription_id,
                customer_id,
            } => {
                let _guard = self.locks.acquire(workspace_id).await;
                let ws = self.store.get_workspace(workspace_id)?.ok_or_else(|| {
                    tracing::warn!(workspace_id, "billing event for unknown workspace");
                    Error::UnknownWorkspace(workspace_id.clone())
                })?;
                self.require_plan(plan_id)?;

                self.store
                    .reactivate(&ws.id, Some(subscription_id), Some(plan_id))?;
                if let Some(customer_id) = customer_id {
                    self.store.set_billing_customer(&ws.id, customer_id)?;
                }

                tracing::info!(workspace_id = %ws.id, plan_id, "subscription started");
                Ok(())
            }

            BillingEvent::SubscriptionUpdated {
                subscription_id,
                active,
                plan_id,
            } => {
                let ws = self
                    .store
                    .get_workspace_by_subscription(subscription_id)?
                    .ok_or_else(|| {
                        tracing::warn!(subscription_id, "billing event for unknown subscription");
                        Error::UnknownWorkspace(subscription_id.clone())
                    })?;
                let _guard = self.locks.acquire(&ws.id).await;

                if *active {
                    // Plan switch, or reactivation if the workspace was
                    // in its grace window.
                    self.store.reactivate(&ws.id, None, plan_id.as_deref())?;
                    tracing::info!(workspace_id = %ws.id, ?plan_id, "subscription updated");
                } else {
                    tracing::info!(workspace_id = %ws.id, "subscription inactive, awaiting deletion event");
                }
                Ok(())
            }

            BillingEvent::SubscriptionEnded { subscription_id } => {
                let ws = self
                    .store
                    .get_workspace_by_subscription(subscription_id)?
                    .ok_or_else(|| {
                        tracing::warn!(subscription_id, "billing event for unknown subscription");
                        Error::UnknownWorkspace(subscription_id.clone())
                    })?;
                let _guard = self.locks.acquire(&ws.id).await;

                let now = Utc::now();
                let stamped = self.store.mark_cancelled(
                    &ws.id,
                    now,
                    now + Duration::days(GRACE_PERIOD_DAYS),
                )?;
                if stamped {
                    tracing::info!(workspace_id = %ws.id, "subscription ended, grace window opened");
                } else {
                    tracing::debug!(workspace_id = %ws.id, "duplicate cancellation event ignored");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::testing::*;
    use crate::error::Error;
    use crate::types::BillingEvent;

    fn started(workspace_id: &str, plan_id: &str, subscription_id: &str) -> BillingEvent {
        BillingEvent::SubscriptionStarted {
            workspace_id: workspace_id.to_string(),
            plan_id: plan_id.to_string(),
            subscription_id: subscription_id.to_string(),
            customer_id: Some("cus_1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_subscription_started_binds_plan() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 1024, 1);
        seed_plan(&core, "haste_i", 4096, 5);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");

        core.apply_event(&started("ws-1", "haste_i", "sub_1"))
            .await
            .unwrap();

        let ws = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert_eq!(ws.plan_id, "haste_i");
        assert_eq!(ws.billing_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(ws.billing_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn test_unknown_workspace_rejected() {
        let (_temp, core) = test_core();
        seed_plan(&core, "haste_i", 4096, 5);

        let result = core.apply_event(&started("nope", "haste_i", "sub_1")).await;
        assert!(matches!(result, Err(Error::UnknownWorkspace(_))));

        let result = core
            .apply_event(&BillingEvent::SubscriptionEnded {
                subscription_id: "sub_unknown".to_string(),
            })
            .await;
        assert!(matches!(result, Err(Error::UnknownWorkspace(_))));
    }

    #[tokio::test]
    async fn test_ended_opens_grace_window_once() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 1024, 1);
        seed_plan(&core, "haste_i", 4096, 5);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        core.apply_event(&started("ws-1", "haste_i", "sub_1"))
            .await
            .unwrap();

        let ended = BillingEvent::SubscriptionEnded {
            subscription_id: "sub_1".to_string(),
        };
        core.apply_event(&ended).await.unwrap();
        let first = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert!(first.is_read_only);

        // Duplicate delivery keeps the original stamps.
        core.apply_event(&ended).await.unwrap();
        let second = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert_eq!(second.cancelled_at, first.cancelled_at);
        assert_eq!(second.delete_after, first.delete_after);
    }

    #[tokio::test]
    async fn test_updated_active_reactivates() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 1024, 1);
        seed_plan(&core, "haste_i", 4096, 5);
        seed_plan(&core, "haste_ii", 16384, 10);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        core.apply_event(&started("ws-1", "haste_i", "sub_1"))
            .await
            .unwrap();
        core.apply_event(&BillingEvent::SubscriptionEnded {
            subscription_id: "sub_1".to_string(),
        })
        .await
        .unwrap();

        core.apply_event(&BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_1".to_string(),
            active: true,
            plan_id: Some("haste_ii".to_string()),
        })
        .await
        .unwrap();

        let ws = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert!(!ws.is_read_only);
        assert!(ws.cancelled_at.is_none());
        assert!(ws.delete_after.is_none());
        assert_eq!(ws.plan_id, "haste_ii");
    }

    #[tokio::test]
    async fn test_updated_inactive_is_noop() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 1024, 1);
        seed_plan(&core, "haste_i", 4096, 5);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        core.apply_event(&started("ws-1", "haste_i", "sub_1"))
            .await
            .unwrap();

        core.apply_event(&BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_1".to_string(),
            active: false,
            plan_id: None,
        })
        .await
        .unwrap();

        let ws = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert!(!ws.is_read_only);
        assert_eq!(ws.plan_id, "haste_i");
    }
}
