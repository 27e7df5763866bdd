use chrono::Utc;
use tracing::info;

use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::{BusinessEvent, EventBus};
use crate::models::{new_id, NewQuote, PaymentTerm, Quote, QuotePatch, QuoteStatus};
use crate::repository::Repositories;
use crate::validation::check_id;

use super::base::{BaseService, Validate};
use super::check_strictly_increasing;

pub(crate) fn check_payment_terms(errors: &mut ValidationErrors, terms: &[PaymentTerm]) {
    for (index, term) in terms.iter().enumerate() {
        if term.name.trim().is_empty() {
            errors.add(format!("paymentTerms[{index}].name"), "is required");
        }
        if !term.amount.is_finite() || term.amount < 0.0 {
            errors.add(
                format!("paymentTerms[{index}].amount"),
                "must be a non-negative amount",
            );
        }
    }
    check_strictly_increasing(errors, "paymentTerms", terms.iter().map(|term| term.order));
}

fn check_amount(errors: &mut ValidationErrors, amount: f64) {
    if !amount.is_finite() || amount < 0.0 {
        errors.add("amount", "must be a non-negative amount");
    }
}

impl Validate for NewQuote {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_amount(&mut errors, self.amount);
        check_id(&mut errors, "requestId", self.request_id.as_deref());
        check_id(&mut errors, "projectId", self.project_id.as_deref());
        check_id(&mut errors, "contactId", self.contact_id.as_deref());
        check_payment_terms(&mut errors, &self.payment_terms);
        errors
    }
}

impl Validate for QuotePatch {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.status.is_some() {
            errors.add("status", "use the status transition endpoint");
        }
        if self.sent_at.is_some() || self.viewed_at.is_some() || self.signed_at.is_some() {
            errors.add("status", "signature timestamps are set by status transitions");
        }
        if let Some(amount) = self.amount {
            check_amount(&mut errors, amount);
        }
        check_id(&mut errors, "projectId", self.project_id.as_deref());
        if let Some(terms) = &self.payment_terms {
            check_payment_terms(&mut errors, terms);
        }
        errors
    }
}

#[derive(Clone)]
pub struct QuoteService {
    base: BaseService<Quote>,
}

impl QuoteService {
    pub fn new(repositories: &Repositories, events: EventBus) -> Self {
        Self {
            base: BaseService::new(repositories.quotes.clone(), events),
        }
    }

    pub fn base(&self) -> &BaseService<Quote> {
        &self.base
    }

    pub async fn create(&self, mut input: NewQuote) -> DataResult<Quote> {
        if input.id.is_empty() {
            input.id = new_id();
        }
        input.status = QuoteStatus::Draft;
        self.base.create(&input).await
    }

    /// Signed and expired quotes keep their price and terms.
    pub async fn update(&self, id: &str, patch: &QuotePatch) -> DataResult<Quote> {
        patch.validate().into_result()?;
        let current = self.base.get(id).await?;
        if current.status.is_terminal() && (patch.amount.is_some() || patch.payment_terms.is_some())
        {
            return Err(DataError::invalid(
                "status",
                format!("a {} quote can no longer be repriced", current.status),
            ));
        }
        self.base.persist_update(id, patch).await
    }

    pub async fn list_for_request(&self, request_id: &str) -> DataResult<Vec<Quote>> {
        self.base.repository().list_for_request(request_id).await
    }

    pub async fn transition(&self, id: &str, target: QuoteStatus) -> DataResult<Quote> {
        let quote = self.base.get(id).await?;
        if !quote.status.can_transition_to(target) {
            return Err(DataError::invalid(
                "status",
                format!("cannot move a quote from {} to {target}", quote.status),
            ));
        }

        let now = Utc::now();
        let mut patch = QuotePatch {
            status: Some(target),
            ..QuotePatch::default()
        };
        match target {
            QuoteStatus::Sent => patch.sent_at = Some(now),
            QuoteStatus::Viewed => patch.viewed_at = Some(now),
            QuoteStatus::Signed => patch.signed_at = Some(now),
            QuoteStatus::Draft | QuoteStatus::Expired => {}
        }

        let updated = self.base.persist_update(id, &patch).await?;
        info!(quote_id = id, from = %quote.status, to = %target, "quote status changed");
        self.base.events().emit(BusinessEvent::QuoteStatusChanged {
            quote_id: id.to_string(),
            from: quote.status,
            to: target,
        });
        Ok(updated)
    }
}
