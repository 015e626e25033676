use tokio::time;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::{BookingConfig, IsolationLevel};
use crate::error::AppError;
use crate::models::{
    Booking, BookingDetails, BookingStatus, BookingWithSeats, CreateBookingRequest, NewBooking,
    SeatAvailability,
};
use crate::services::booking_code::new_booking_code;
use crate::services::conflicts::find_conflicts;
use crate::store::{RecordStore, StoreError, StoreTx, BOOKING_CODE_KEY, HELD_SEATS_PKEY};

/// Creates, cancels and reads bookings. Every booking write goes through
/// here so the conflict check and the seat writes share one transaction.
#[derive(Clone)]
pub struct BookingService<S> {
    store: S,
    settings: BookingConfig,
}

impl<S: RecordStore> BookingService<S> {
    pub fn new(store: S, settings: BookingConfig) -> Self {
        Self { store, settings }
    }

    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<BookingDetails, AppError> {
        request.validate()?;

        let limit = self.settings.timeout();
        let booking = match time::timeout(limit, self.book_seats(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                // Транзакция уже сброшена вместе с future, откат выполнит драйвер
                warn!(
                    showtime_id = request.showtime_id,
                    timeout_ms = self.settings.timeout_ms,
                    "booking transaction timed out"
                );
                return Err(StoreError::Timeout(limit).into());
            }
        };

        info!(
            booking_code = %booking.booking_code,
            showtime_id = booking.showtime_id,
            seats = request.seat_ids.len(),
            total_price = booking.total_price,
            "booking confirmed"
        );

        Ok(self.reload(booking).await)
    }

    async fn book_seats(&self, request: &CreateBookingRequest) -> Result<Booking, AppError> {
        let mut retries_left = self.settings.serialization_retries;
        loop {
            match self.run_booking_tx(request).await {
                Err(AppError::Persistence(StoreError::SerializationFailure)) => {
                    let err = self.settle_serialization_failure(request).await;
                    let retryable =
                        matches!(err, AppError::Persistence(StoreError::SerializationFailure));
                    if !retryable || retries_left == 0 {
                        return Err(err);
                    }
                    retries_left -= 1;
                    debug!(
                        showtime_id = request.showtime_id,
                        retries_left, "retrying booking after serialization failure"
                    );
                }
                result => return result,
            }
        }
    }

    async fn run_booking_tx(&self, request: &CreateBookingRequest) -> Result<Booking, AppError> {
        let mut tx = self.store.begin(self.settings.isolation).await?;

        let booking = match self.write_booking(&mut tx, request).await {
            Ok(booking) => booking,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed booking did not complete");
                }
                return Err(err);
            }
        };

        tx.commit().await?;
        Ok(booking)
    }

    /// A serialization failure only says that some concurrent transaction
    /// interfered. Under SERIALIZABLE that can be a booking of other seats of
    /// the same showtime, so the holds are read again: seats held by now are
    /// a lost race, anything else is retryable. A retry runs the conflict
    /// check again, so a race the re-read missed still ends as a conflict.
    async fn settle_serialization_failure(&self, request: &CreateBookingRequest) -> AppError {
        let retryable = || AppError::Persistence(StoreError::SerializationFailure);

        let mut tx = match self.store.begin(IsolationLevel::ReadCommitted).await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(error = %err, "could not re-check seats after serialization failure");
                return retryable();
            }
        };
        let held = find_conflicts(&mut tx, request.showtime_id, &request.seat_ids).await;
        if let Err(err) = tx.rollback().await {
            warn!(error = %err, "rollback of seat re-check did not complete");
        }

        match held {
            Ok(held) if !held.is_empty() => {
                debug!(showtime_id = request.showtime_id, ?held, "lost seat race");
                AppError::seats_taken(held)
            }
            Ok(_) => {
                info!(
                    showtime_id = request.showtime_id,
                    "serialization failure without a seat conflict"
                );
                retryable()
            }
            Err(err) => {
                warn!(error = %err, "could not re-check seats after serialization failure");
                retryable()
            }
        }
    }

    async fn write_booking(
        &self,
        tx: &mut S::Tx,
        request: &CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        let seat_ids = &request.seat_ids;

        let showtime = tx
            .showtime_for_booking(request.showtime_id)
            .await?
            .ok_or(AppError::NotFound("showtime"))?;

        let taken = find_conflicts(tx, showtime.id, seat_ids).await?;
        if !taken.is_empty() {
            debug!(showtime_id = showtime.id, ?taken, "requested seats already held");
            return Err(AppError::seats_taken(taken));
        }

        let total_price = total_price(showtime.price, seat_ids.len())?;
        let booking = self
            .insert_with_fresh_code(
                tx,
                NewBooking {
                    showtime_id: showtime.id,
                    customer_name: request.customer_name.trim().to_string(),
                    customer_email: request.customer_email.trim().to_string(),
                    customer_phone: request.customer_phone.trim().to_string(),
                    total_price,
                    status: BookingStatus::Confirmed,
                    booking_code: String::new(),
                },
            )
            .await?;

        for &seat_id in seat_ids {
            tx.insert_booking_seat(&booking, seat_id)
                .await
                .map_err(|err| match err {
                    err if err.is_unique_violation(HELD_SEATS_PKEY) => {
                        AppError::seats_taken([seat_id])
                    }
                    StoreError::SerializationFailure => AppError::Persistence(StoreError::SerializationFailure),
                    other => {
                        warn!(seat_id, error = %other, "failed to link seat to booking");
                        AppError::Persistence(other)
                    }
                })?;
        }

        Ok(booking)
    }

    async fn insert_with_fresh_code(
        &self,
        tx: &mut S::Tx,
        mut booking: NewBooking,
    ) -> Result<Booking, AppError> {
        let attempts = self.settings.code_attempts.max(1);
        for attempt in 1..=attempts {
            booking.booking_code = new_booking_code();
            if let Some(inserted) = tx.insert_booking(&booking).await? {
                return Ok(inserted);
            }
            debug!(attempt, code = %booking.booking_code, "booking code collision");
        }
        warn!(attempts, "could not allocate a unique booking code");
        Err(StoreError::UniqueViolation {
            constraint: BOOKING_CODE_KEY.to_string(),
        }
        .into())
    }

    async fn reload(&self, booking: Booking) -> BookingDetails {
        match self.store.find_booking(&booking.booking_code).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!(booking_code = %booking.booking_code, "committed booking missing on reload");
                BookingDetails {
                    booking,
                    showtime: None,
                }
            }
            Err(err) => {
                warn!(booking_code = %booking.booking_code, error = %err, "failed to reload booking");
                BookingDetails {
                    booking,
                    showtime: None,
                }
            }
        }
    }

    pub async fn cancel_booking(&self, booking_code: &str) -> Result<Booking, AppError> {
        let booking = self
            .store
            .cancel_booking(booking_code)
            .await?
            .ok_or(AppError::NotFound("booking"))?;
        info!(booking_code, "booking cancelled");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_code: &str) -> Result<BookingWithSeats, AppError> {
        let booking = self
            .store
            .find_booking(booking_code)
            .await?
            .ok_or(AppError::NotFound("booking"))?;
        let seats = self.store.booked_seats(booking.booking.id).await?;
        Ok(BookingWithSeats { booking, seats })
    }

    pub async fn list_bookings(&self) -> Result<Vec<BookingDetails>, AppError> {
        Ok(self.store.list_bookings().await?)
    }

    pub async fn seat_map(&self, showtime_id: i64) -> Result<Vec<SeatAvailability>, AppError> {
        self.store
            .seat_map(showtime_id)
            .await?
            .ok_or(AppError::NotFound("showtime"))
    }
}

pub fn total_price(unit_price: i64, seats: usize) -> Result<i64, AppError> {
    i64::try_from(seats)
        .ok()
        .and_then(|count| unit_price.checked_mul(count))
        .ok_or_else(|| AppError::Validation("total price is out of range".to_string()))
}
