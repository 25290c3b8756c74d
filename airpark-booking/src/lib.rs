pub mod error;
pub mod gateways;
pub mod invoicing;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod repository;
pub mod service;

pub use error::{BookingError, BookingResult};
pub use invoicing::{receivables_summary, InvoiceGenerator, ReceivablesSummary};
pub use models::{
    Booking, BookingFilter, BookingLine, BookingPaymentStatus, BookingStatus, Invoice,
    InvoiceStatus, PaymentRecord,
};
pub use orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
pub use repository::{BookingRepository, InvoiceRepository, PaymentRepository};
pub use service::{
    Actor, BookingCreated, BookingPolicy, BookingService, CreateBooking, QuoteRequest, Repositories,
    UpdateBooking,
};
