use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::BillingStatus;
use crate::domain::ports::BillingGate;

/// Billing gate for deployments without quota enforcement.
#[derive(Debug, Default, Clone)]
pub struct AllowAllBillingGate;

#[async_trait]
impl BillingGate for AllowAllBillingGate {
    async fn check_billing_status(&self, account_id: Uuid) -> DomainResult<BillingStatus> {
        tracing::trace!(%account_id, "billing check skipped");
        Ok(BillingStatus::allowed())
    }
}
