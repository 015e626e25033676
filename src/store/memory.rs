//! In-process record store.
//!
//! One mutex guards every table. A transaction owns the lock from `begin`
//! until it is committed, rolled back or dropped, and works on a private copy
//! of the tables that replaces the shared ones on commit. Transactions are
//! therefore fully serialized, which makes this store a reference for the
//! behaviour `PgStore` reaches through locking and constraints.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    RecordStore, StoreError, StoreResult, StoreTx, BOOKINGS_SHOWTIME_FKEY,
    BOOKING_SEATS_SEAT_FKEY, HELD_SEATS_PKEY,
};
use crate::config::IsolationLevel;
use crate::models::{
    BookedSeat, Booking, BookingDetails, BookingSeat, BookingStatus, Movie, NewBooking, NewMovie,
    NewSeat, NewShowtime, NewVenue, Seat, SeatAvailability, Showtime, ShowtimeDetails,
    ShowtimeFilter, Venue,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    venues: BTreeMap<i64, Venue>,
    movies: BTreeMap<i64, Movie>,
    showtimes: BTreeMap<i64, Showtime>,
    seats: BTreeMap<i64, Seat>,
    bookings: BTreeMap<i64, Booking>,
    booking_seats: BTreeMap<i64, BookingSeat>,
    // (showtime_id, seat_id) -> booking_id
    held_seats: BTreeMap<(i64, i64), i64>,
    sequences: Sequences,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    venue: i64,
    movie: i64,
    showtime: i64,
    seat: i64,
    booking: i64,
    booking_seat: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl Tables {
    fn showtime_details(&self, showtime: &Showtime) -> Option<ShowtimeDetails> {
        Some(ShowtimeDetails {
            showtime: showtime.clone(),
            movie: self.movies.get(&showtime.movie_id)?.clone(),
            venue: self.venues.get(&showtime.venue_id)?.clone(),
        })
    }

    fn booking_details(&self, booking: &Booking) -> Option<BookingDetails> {
        let showtime = self.showtimes.get(&booking.showtime_id)?;
        Some(BookingDetails {
            booking: booking.clone(),
            showtime: Some(self.showtime_details(showtime)?),
        })
    }

    fn held_seat_ids(&self, showtime_id: i64) -> BTreeSet<i64> {
        self.booking_seats
            .values()
            .filter(|link| link.showtime_id == showtime_id)
            .filter(|link| {
                self.bookings
                    .get(&link.booking_id)
                    .is_some_and(|booking| booking.status.holds_seats())
            })
            .map(|link| link.seat_id)
            .collect()
    }

    /// Drops the showtimes matching `doomed` (and the seats matching
    /// `doomed_seat`) the way `ON DELETE CASCADE` would, refusing while any
    /// booking still refers to them.
    fn cascade_delete(
        &mut self,
        doomed: impl Fn(&Showtime) -> bool,
        doomed_seat: impl Fn(&Seat) -> bool,
    ) -> StoreResult<()> {
        let showtime_ids: BTreeSet<i64> = self
            .showtimes
            .values()
            .filter(|showtime| doomed(showtime))
            .map(|showtime| showtime.id)
            .collect();
        if self
            .bookings
            .values()
            .any(|booking| showtime_ids.contains(&booking.showtime_id))
        {
            return Err(StoreError::ForeignKeyViolation {
                constraint: BOOKINGS_SHOWTIME_FKEY.into(),
            });
        }
        let seat_ids: BTreeSet<i64> = self
            .seats
            .values()
            .filter(|seat| doomed_seat(seat))
            .map(|seat| seat.id)
            .collect();
        if self
            .booking_seats
            .values()
            .any(|link| seat_ids.contains(&link.seat_id))
        {
            return Err(StoreError::ForeignKeyViolation {
                constraint: BOOKING_SEATS_SEAT_FKEY.into(),
            });
        }
        self.showtimes.retain(|id, _| !showtime_ids.contains(id));
        self.seats.retain(|id, _| !seat_ids.contains(id));
        Ok(())
    }
}

fn by_row_and_column(a: &Seat, b: &Seat) -> std::cmp::Ordering {
    (&a.row, a.column, a.id).cmp(&(&b.row, b.column, b.id))
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, _isolation: IsolationLevel) -> StoreResult<MemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_venue(&self, venue: &NewVenue) -> StoreResult<Venue> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.sequences.venue);
        let created_at = now();
        let venue = Venue {
            id,
            name: venue.name.clone(),
            location: venue.location.clone(),
            rating: venue.rating,
            created_at,
            updated_at: created_at,
        };
        tables.venues.insert(id, venue.clone());
        Ok(venue)
    }

    async fn list_venues(&self) -> StoreResult<Vec<Venue>> {
        let tables = self.tables.lock().await;
        let mut venues: Vec<Venue> = tables.venues.values().cloned().collect();
        venues.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(venues)
    }

    async fn find_venue(&self, id: i64) -> StoreResult<Option<Venue>> {
        Ok(self.tables.lock().await.venues.get(&id).cloned())
    }

    async fn update_venue(&self, id: i64, venue: &NewVenue) -> StoreResult<Option<Venue>> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.venues.get_mut(&id) else {
            return Ok(None);
        };
        existing.name = venue.name.clone();
        existing.location = venue.location.clone();
        existing.rating = venue.rating;
        existing.updated_at = now();
        Ok(Some(existing.clone()))
    }

    async fn delete_venue(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.venues.contains_key(&id) {
            return Ok(false);
        }
        tables.cascade_delete(|showtime| showtime.venue_id == id, |seat| seat.venue_id == id)?;
        tables.venues.remove(&id);
        Ok(true)
    }

    async fn create_movie(&self, movie: &NewMovie) -> StoreResult<Movie> {
        let mut tables = self.tables.lock().await;
        let id = next(&mut tables.sequences.movie);
        let created_at = now();
        let movie = Movie {
            id,
            title: movie.title.clone(),
            description: movie.description.clone(),
            duration: movie.duration,
            genre: movie.genre.clone(),
            rating: movie.rating.clone(),
            poster_url: movie.poster_url.clone(),
            created_at,
            updated_at: created_at,
        };
        tables.movies.insert(id, movie.clone());
        Ok(movie)
    }

    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let tables = self.tables.lock().await;
        let mut movies: Vec<Movie> = tables.movies.values().cloned().collect();
        movies.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(movies)
    }

    async fn find_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        Ok(self.tables.lock().await.movies.get(&id).cloned())
    }

    async fn update_movie(&self, id: i64, movie: &NewMovie) -> StoreResult<Option<Movie>> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.movies.get_mut(&id) else {
            return Ok(None);
        };
        existing.title = movie.title.clone();
        existing.description = movie.description.clone();
        existing.duration = movie.duration;
        existing.genre = movie.genre.clone();
        existing.rating = movie.rating.clone();
        existing.poster_url = movie.poster_url.clone();
        existing.updated_at = now();
        Ok(Some(existing.clone()))
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.movies.contains_key(&id) {
            return Ok(false);
        }
        tables.cascade_delete(|showtime| showtime.movie_id == id, |_| false)?;
        tables.movies.remove(&id);
        Ok(true)
    }

    async fn create_showtime(&self, showtime: &NewShowtime) -> StoreResult<Showtime> {
        let mut tables = self.tables.lock().await;
        if !tables.movies.contains_key(&showtime.movie_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "showtimes_movie_id_fkey".into(),
            });
        }
        if !tables.venues.contains_key(&showtime.venue_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "showtimes_venue_id_fkey".into(),
            });
        }
        let id = next(&mut tables.sequences.showtime);
        let created_at = now();
        let showtime = Showtime {
            id,
            movie_id: showtime.movie_id,
            venue_id: showtime.venue_id,
            show_date: showtime.show_date,
            show_time: showtime.show_time,
            price: showtime.price,
            created_at,
            updated_at: created_at,
        };
        tables.showtimes.insert(id, showtime.clone());
        Ok(showtime)
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<ShowtimeDetails>> {
        let tables = self.tables.lock().await;
        let mut showtimes: Vec<&Showtime> = tables
            .showtimes
            .values()
            .filter(|showtime| filter.matches(showtime))
            .collect();
        showtimes.sort_by_key(|s| (s.show_date, s.show_time, s.id));
        Ok(showtimes
            .into_iter()
            .filter_map(|showtime| tables.showtime_details(showtime))
            .collect())
    }

    async fn find_showtime(&self, id: i64) -> StoreResult<Option<ShowtimeDetails>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .showtimes
            .get(&id)
            .and_then(|showtime| tables.showtime_details(showtime)))
    }

    async fn create_seats(&self, seats: &[NewSeat]) -> StoreResult<Vec<Seat>> {
        let mut tables = self.tables.lock().await;
        if seats.iter().any(|seat| !tables.venues.contains_key(&seat.venue_id)) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "seats_venue_id_fkey".into(),
            });
        }

        let mut taken: BTreeSet<(i64, String)> = tables
            .seats
            .values()
            .map(|seat| (seat.venue_id, seat.seat_number.clone()))
            .collect();
        if !seats
            .iter()
            .all(|seat| taken.insert((seat.venue_id, seat.seat_number.clone())))
        {
            return Err(StoreError::UniqueViolation {
                constraint: "seats_venue_id_seat_number_key".into(),
            });
        }

        let mut created = Vec::with_capacity(seats.len());
        for seat in seats {
            let id = next(&mut tables.sequences.seat);
            let seat = Seat {
                id,
                venue_id: seat.venue_id,
                seat_number: seat.seat_number.clone(),
                row: seat.row.clone(),
                column: seat.column,
                seat_type: seat.seat_type,
            };
            tables.seats.insert(id, seat.clone());
            created.push(seat);
        }
        Ok(created)
    }

    async fn list_seats(&self, venue_id: Option<i64>) -> StoreResult<Vec<Seat>> {
        let tables = self.tables.lock().await;
        let mut seats: Vec<Seat> = tables
            .seats
            .values()
            .filter(|seat| venue_id.map_or(true, |id| seat.venue_id == id))
            .cloned()
            .collect();
        seats.sort_by(by_row_and_column);
        Ok(seats)
    }

    async fn find_booking(&self, booking_code: &str) -> StoreResult<Option<BookingDetails>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .values()
            .find(|booking| booking.booking_code == booking_code)
            .and_then(|booking| tables.booking_details(booking)))
    }

    async fn booked_seats(&self, booking_id: i64) -> StoreResult<Vec<BookedSeat>> {
        let tables = self.tables.lock().await;
        let mut seats: Vec<BookedSeat> = tables
            .booking_seats
            .values()
            .filter(|link| link.booking_id == booking_id)
            .filter_map(|link| {
                tables.seats.get(&link.seat_id).map(|seat| BookedSeat {
                    id: link.id,
                    booking_id: link.booking_id,
                    seat_id: link.seat_id,
                    seat: seat.clone(),
                })
            })
            .collect();
        seats.sort_by(|a, b| by_row_and_column(&a.seat, &b.seat));
        Ok(seats)
    }

    async fn list_bookings(&self) -> StoreResult<Vec<BookingDetails>> {
        let tables = self.tables.lock().await;
        let mut bookings: Vec<&Booking> = tables.bookings.values().collect();
        bookings.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(bookings
            .into_iter()
            .filter_map(|booking| tables.booking_details(booking))
            .collect())
    }

    async fn seat_map(&self, showtime_id: i64) -> StoreResult<Option<Vec<SeatAvailability>>> {
        let tables = self.tables.lock().await;
        let Some(showtime) = tables.showtimes.get(&showtime_id) else {
            return Ok(None);
        };
        let held = tables.held_seat_ids(showtime_id);
        let mut seats: Vec<&Seat> = tables
            .seats
            .values()
            .filter(|seat| seat.venue_id == showtime.venue_id)
            .collect();
        seats.sort_by(|a, b| by_row_and_column(a, b));
        Ok(Some(
            seats
                .into_iter()
                .map(|seat| SeatAvailability {
                    seat: seat.clone(),
                    is_available: !held.contains(&seat.id),
                })
                .collect(),
        ))
    }

    async fn cancel_booking(&self, booking_code: &str) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        let Some(booking) = tables
            .bookings
            .values_mut()
            .find(|booking| booking.booking_code == booking_code)
        else {
            return Ok(None);
        };
        if booking.status != BookingStatus::Cancelled {
            booking.status = BookingStatus::Cancelled;
            booking.updated_at = now();
        }
        let booking = booking.clone();
        tables.held_seats.retain(|_, holder| *holder != booking.id);
        Ok(Some(booking))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn showtime_for_booking(&mut self, showtime_id: i64) -> StoreResult<Option<Showtime>> {
        Ok(self.staged.showtimes.get(&showtime_id).cloned())
    }

    async fn held_seat_ids(&mut self, showtime_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<i64>> {
        let held = self.staged.held_seat_ids(showtime_id);
        Ok(seat_ids
            .iter()
            .copied()
            .filter(|id| held.contains(id))
            .collect())
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Option<Booking>> {
        let tables = &mut self.staged;
        if tables
            .bookings
            .values()
            .any(|existing| existing.booking_code == booking.booking_code)
        {
            return Ok(None);
        }
        if !tables.showtimes.contains_key(&booking.showtime_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "bookings_showtime_id_fkey".into(),
            });
        }
        let id = next(&mut tables.sequences.booking);
        let created_at = now();
        let booking = Booking {
            id,
            showtime_id: booking.showtime_id,
            customer_name: booking.customer_name.clone(),
            customer_email: booking.customer_email.clone(),
            customer_phone: booking.customer_phone.clone(),
            total_price: booking.total_price,
            status: booking.status,
            booking_code: booking.booking_code.clone(),
            created_at,
            updated_at: created_at,
        };
        tables.bookings.insert(id, booking.clone());
        Ok(Some(booking))
    }

    async fn insert_booking_seat(&mut self, booking: &Booking, seat_id: i64) -> StoreResult<()> {
        let tables = &mut self.staged;
        if !tables.seats.contains_key(&seat_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: BOOKING_SEATS_SEAT_FKEY.into(),
            });
        }
        let key = (booking.showtime_id, seat_id);
        if tables.held_seats.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: HELD_SEATS_PKEY.into(),
            });
        }
        let id = next(&mut tables.sequences.booking_seat);
        tables.booking_seats.insert(
            id,
            BookingSeat {
                id,
                booking_id: booking.id,
                seat_id,
                showtime_id: booking.showtime_id,
            },
        );
        tables.held_seats.insert(key, booking.id);
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
