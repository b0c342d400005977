use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::gateway::signature;
use crate::gateway::webhook::PaymentNotification;
use crate::models::Order;
use crate::services::tickets::TicketIssuer;
use crate::store::{InventoryStore, Transition};
use crate::utils::error::AppError;

const TICKET_ISSUE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SettlementOutcome {
    Completed { tickets_issued: usize },
    Failed,
    /// The order had already been settled or expired.
    AlreadySettled,
    /// Event type this handler does not act on.
    Ignored,
}

/// Applies gateway payment notifications to pending orders.
pub struct SettlementHandler {
    store: Arc<dyn InventoryStore>,
    issuer: TicketIssuer,
    webhook_secret: Option<String>,
}

impl SettlementHandler {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        issuer: TicketIssuer,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            issuer,
            webhook_secret,
        }
    }

    /// Verifies and applies one webhook delivery.
    ///
    /// Redelivery of a notification that was already applied succeeds with
    /// [`SettlementOutcome::AlreadySettled`] and changes nothing.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<SettlementOutcome, AppError> {
        self.authenticate(raw_body, signature_header)?;

        let notification = PaymentNotification::parse(raw_body).map_err(|e| {
            tracing::warn!(error = %e, "Rejected unparseable payment webhook");
            AppError::BadRequest("Malformed payment notification".to_string())
        })?;

        match notification {
            PaymentNotification::Captured {
                gateway_order_id,
                payment_id,
            } => {
                let Some(order) = self.pending_order(&gateway_order_id).await? else {
                    return Ok(SettlementOutcome::AlreadySettled);
                };
                self.complete(order, &payment_id).await
            }
            PaymentNotification::Failed {
                gateway_order_id,
                payment_id,
                reason,
            } => {
                let Some(order) = self.pending_order(&gateway_order_id).await? else {
                    return Ok(SettlementOutcome::AlreadySettled);
                };
                match self.store.fail_order(order.id, Some(&payment_id)).await? {
                    Transition::Applied => {
                        tracing::info!(
                            order_id = %order.id,
                            payment_id = %payment_id,
                            reason = reason.as_deref().unwrap_or("unspecified"),
                            "Payment failed, reservation released"
                        );
                        Ok(SettlementOutcome::Failed)
                    }
                    Transition::Skipped => Ok(SettlementOutcome::AlreadySettled),
                }
            }
            PaymentNotification::Other(kind) => {
                tracing::debug!(event = %kind, "Ignoring payment webhook");
                Ok(SettlementOutcome::Ignored)
            }
        }
    }

    fn authenticate(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<(), AppError> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            tracing::warn!("Payment webhook received but no webhook secret is configured");
            return Err(AppError::BadRequest("Webhook verification unavailable".to_string()));
        };
        let Some(signature_header) = signature_header else {
            tracing::warn!("Payment webhook rejected: missing signature");
            return Err(AppError::BadRequest("Missing webhook signature".to_string()));
        };
        if !signature::verify(secret, raw_body, signature_header) {
            tracing::warn!(body_len = raw_body.len(), "Payment webhook rejected: signature mismatch");
            return Err(AppError::BadRequest("Invalid webhook signature".to_string()));
        }
        Ok(())
    }

    /// Resolves the gateway reference; `None` when the order already left `pending`.
    async fn pending_order(&self, gateway_order_id: &str) -> Result<Option<Order>, AppError> {
        let order = self
            .store
            .find_order_by_gateway_order(gateway_order_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(gateway_order_id, "Payment webhook for unknown order");
                AppError::NotFound(format!("No order for gateway order '{}'", gateway_order_id))
            })?;

        if order.payment_status.is_terminal() {
            tracing::info!(
                order_id = %order.id,
                status = ?order.payment_status,
                "Duplicate or late payment webhook ignored"
            );
            return Ok(None);
        }
        Ok(Some(order))
    }

    async fn complete(&self, order: Order, payment_id: &str) -> Result<SettlementOutcome, AppError> {
        let items = self.store.order_items(order.id).await?;
        let attendee = self
            .store
            .find_attendee(order.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", order.user_id)))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let paid_at = Utc::now();
            let tickets = self.issuer.issue(&order, &items, &attendee, paid_at);

            match self
                .store
                .complete_order(order.id, payment_id, paid_at, &tickets)
                .await
            {
                Ok(Transition::Applied) => {
                    tracing::info!(
                        order_id = %order.id,
                        payment_id,
                        tickets = tickets.len(),
                        "Payment captured, tickets issued"
                    );
                    return Ok(SettlementOutcome::Completed {
                        tickets_issued: tickets.len(),
                    });
                }
                Ok(Transition::Skipped) => return Ok(SettlementOutcome::AlreadySettled),
                Err(e) if e.is_unique_violation_on("tickets_") => {
                    tracing::warn!(order_id = %order.id, attempt, "Ticket identifier collision");
                    if attempt >= TICKET_ISSUE_ATTEMPTS {
                        return Err(AppError::InternalServerError(format!(
                            "Could not issue unique tickets for order {}",
                            order.id
                        )));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
