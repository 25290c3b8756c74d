use airpark_core::identity::User;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Booking, Invoice, InvoiceStatus};
use crate::BookingError;

/// Issues invoices for corporate-customer bookings
pub struct InvoiceGenerator {
    due_days: i64,
}

impl InvoiceGenerator {
    pub fn new(due_days: i64) -> Self {
        Self { due_days }
    }

    /// Build the invoice for a booking. Only corporate customers are invoiced.
    pub fn issue(
        &self,
        booking: &Booking,
        customer: &User,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BookingError> {
        if !customer.is_corporate() {
            return Err(BookingError::Validation(format!(
                "customer {} is not a corporate account",
                customer.id
            )));
        }
        if booking.user_id != customer.id {
            return Err(BookingError::Validation("booking belongs to another customer".into()));
        }

        let id = Uuid::new_v4();
        let suffix = id.simple().to_string()[..8].to_uppercase();

        Ok(Invoice {
            id,
            invoice_number: format!("INV-{}-{}", now.format("%Y%m%d"), suffix),
            booking_id: booking.id,
            user_id: customer.id,
            company_name: customer.company_name.clone(),
            amount_pence: booking.total_pence,
            currency: booking.currency.clone(),
            status: InvoiceStatus::Issued,
            issued_at: now,
            due_at: now + Duration::days(self.due_days),
            paid_at: None,
        })
    }
}

impl Invoice {
    /// Issued and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Issued && now > self.due_at
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        match self.status {
            InvoiceStatus::Issued | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Paid;
                self.paid_at = Some(now);
                Ok(())
            }
            other => Err(BookingError::InvalidTransition {
                from: other.as_str().to_string(),
                to: InvoiceStatus::Paid.as_str().to_string(),
            }),
        }
    }

    pub fn mark_overdue(&mut self) -> Result<(), BookingError> {
        if self.status != InvoiceStatus::Issued {
            return Err(BookingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: InvoiceStatus::Overdue.as_str().to_string(),
            });
        }
        self.status = InvoiceStatus::Overdue;
        Ok(())
    }

    /// Void an unpaid invoice (booking cancelled)
    pub fn void(&mut self) -> Result<(), BookingError> {
        if self.status == InvoiceStatus::Paid {
            return Err(BookingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: InvoiceStatus::Void.as_str().to_string(),
            });
        }
        self.status = InvoiceStatus::Void;
        Ok(())
    }
}

/// Receivables position across a set of invoices
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReceivablesSummary {
    pub outstanding_pence: i64,
    pub overdue_pence: i64,
    pub paid_pence: i64,
    pub invoice_count: usize,
}

pub fn receivables_summary(invoices: &[Invoice], now: DateTime<Utc>) -> ReceivablesSummary {
    let mut summary = ReceivablesSummary {
        invoice_count: invoices.len(),
        ..ReceivablesSummary::default()
    };

    for invoice in invoices {
        match invoice.status {
            InvoiceStatus::Paid => summary.paid_pence += invoice.amount_pence,
            InvoiceStatus::Overdue => {
                summary.outstanding_pence += invoice.amount_pence;
                summary.overdue_pence += invoice.amount_pence;
            }
            InvoiceStatus::Issued => {
                summary.outstanding_pence += invoice.amount_pence;
                if invoice.is_overdue(now) {
                    summary.overdue_pence += invoice.amount_pence;
                }
            }
            InvoiceStatus::Void => {}
        }
    }

    summary
}
