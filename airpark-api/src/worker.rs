use std::sync::Arc;

use airpark_booking::BookingService;
use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// One housekeeping pass: expire unpaid bookings, flag late invoices
pub async fn run_housekeeping(service: &BookingService) {
    let now = Utc::now();

    match service.expire_stale_bookings(now).await {
        Ok(0) => {}
        Ok(n) => info!("Expired {} unpaid bookings", n),
        Err(e) => error!("Booking expiry failed: {}", e),
    }

    match service.flag_overdue_invoices(now).await {
        Ok(0) => {}
        Ok(n) => info!("Flagged {} overdue invoices", n),
        Err(e) => error!("Overdue invoice scan failed: {}", e),
    }
}

pub async fn start_housekeeping_worker(service: Arc<BookingService>, every_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(every_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Housekeeping worker started, running every {}s", every_seconds);

    loop {
        ticker.tick().await;
        run_housekeeping(&service).await;
    }
}
