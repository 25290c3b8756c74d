use chrono::Utc;

use crate::models::{Booking, BookingStatus};
use crate::BookingError;

impl Booking {
    /// Transition: PendingPayment → Confirmed (payment captured)
    pub fn confirm(&mut self) -> Result<(), BookingError> {
        self.transition(&[BookingStatus::PendingPayment], BookingStatus::Confirmed)
    }

    /// Transition: Confirmed → CheckedIn (vehicle dropped off)
    pub fn check_in(&mut self) -> Result<(), BookingError> {
        self.transition(&[BookingStatus::Confirmed], BookingStatus::CheckedIn)
    }

    /// Transition: CheckedIn → Completed (vehicle collected)
    pub fn check_out(&mut self) -> Result<(), BookingError> {
        self.transition(&[BookingStatus::CheckedIn], BookingStatus::Completed)
    }

    /// Cancel a booking that has not started yet
    pub fn cancel(&mut self) -> Result<(), BookingError> {
        self.transition(
            &[BookingStatus::PendingPayment, BookingStatus::Confirmed],
            BookingStatus::Cancelled,
        )
    }

    /// Transition: PendingPayment → Expired (payment never arrived)
    pub fn expire(&mut self) -> Result<(), BookingError> {
        self.transition(&[BookingStatus::PendingPayment], BookingStatus::Expired)
    }

    /// Flight, tariff and vehicles can still be changed
    pub fn is_editable(&self) -> bool {
        matches!(self.status, BookingStatus::PendingPayment | BookingStatus::Confirmed)
    }

    fn transition(
        &mut self,
        allowed_from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<(), BookingError> {
        if !allowed_from.contains(&self.status) {
            return Err(BookingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
