use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::{RecordStore, StoreResult, StoreTx};
use crate::config::IsolationLevel;
use crate::models::{
    BookedSeat, Booking, BookingDetails, Movie, NewBooking, NewMovie, NewSeat, NewShowtime,
    NewVenue, Seat, SeatAvailability, Showtime, ShowtimeDetails, ShowtimeFilter, Venue,
};

const BOOKING_COLUMNS: &str = "id, showtime_id, customer_name, customer_email, customer_phone, \
     total_price, status, booking_code, created_at, updated_at";

const SHOWTIME_COLUMNS: &str =
    "id, movie_id, venue_id, show_date, show_time, price, created_at, updated_at";

const SEAT_COLUMNS: &str = "id, venue_id, seat_number, row_label, column_number, seat_type";

// Колонки сеанса с фильмом и кинотеатром, алиасы совпадают с ShowtimeDetailsRow
const SHOWTIME_DETAIL_COLUMNS: &str = r#"
    s.id AS st_id, s.movie_id AS st_movie_id, s.venue_id AS st_venue_id,
    s.show_date AS st_show_date, s.show_time AS st_show_time, s.price AS st_price,
    s.created_at AS st_created_at, s.updated_at AS st_updated_at,
    m.title AS movie_title, m.description AS movie_description, m.duration AS movie_duration,
    m.genre AS movie_genre, m.rating AS movie_rating, m.poster_url AS movie_poster_url,
    m.created_at AS movie_created_at, m.updated_at AS movie_updated_at,
    v.name AS venue_name, v.location AS venue_location, v.rating AS venue_rating,
    v.created_at AS venue_created_at, v.updated_at AS venue_updated_at
"#;

const SHOWTIME_DETAIL_JOINS: &str = r#"
    JOIN movies m ON m.id = s.movie_id
    JOIN venues v ON v.id = s.venue_id
"#;

#[derive(FromRow)]
struct ShowtimeDetailsRow {
    st_id: i64,
    st_movie_id: i64,
    st_venue_id: i64,
    st_show_date: NaiveDate,
    st_show_time: NaiveTime,
    st_price: i64,
    st_created_at: NaiveDateTime,
    st_updated_at: NaiveDateTime,
    movie_title: String,
    movie_description: Option<String>,
    movie_duration: i32,
    movie_genre: Option<String>,
    movie_rating: Option<String>,
    movie_poster_url: Option<String>,
    movie_created_at: NaiveDateTime,
    movie_updated_at: NaiveDateTime,
    venue_name: String,
    venue_location: String,
    venue_rating: f64,
    venue_created_at: NaiveDateTime,
    venue_updated_at: NaiveDateTime,
}

impl From<ShowtimeDetailsRow> for ShowtimeDetails {
    fn from(row: ShowtimeDetailsRow) -> Self {
        ShowtimeDetails {
            showtime: Showtime {
                id: row.st_id,
                movie_id: row.st_movie_id,
                venue_id: row.st_venue_id,
                show_date: row.st_show_date,
                show_time: row.st_show_time,
                price: row.st_price,
                created_at: row.st_created_at,
                updated_at: row.st_updated_at,
            },
            movie: Movie {
                id: row.st_movie_id,
                title: row.movie_title,
                description: row.movie_description,
                duration: row.movie_duration,
                genre: row.movie_genre,
                rating: row.movie_rating,
                poster_url: row.movie_poster_url,
                created_at: row.movie_created_at,
                updated_at: row.movie_updated_at,
            },
            venue: Venue {
                id: row.st_venue_id,
                name: row.venue_name,
                location: row.venue_location,
                rating: row.venue_rating,
                created_at: row.venue_created_at,
                updated_at: row.venue_updated_at,
            },
        }
    }
}

#[derive(FromRow)]
struct BookingDetailsRow {
    #[sqlx(flatten)]
    booking: Booking,
    #[sqlx(flatten)]
    showtime: ShowtimeDetailsRow,
}

impl From<BookingDetailsRow> for BookingDetails {
    fn from(row: BookingDetailsRow) -> Self {
        BookingDetails {
            booking: row.booking,
            showtime: Some(row.showtime.into()),
        }
    }
}

#[derive(FromRow)]
struct BookedSeatRow {
    link_id: i64,
    booking_id: i64,
    #[sqlx(flatten)]
    seat: Seat,
}

fn booking_details_query(filter: &str) -> String {
    format!(
        "SELECT b.id, b.showtime_id, b.customer_name, b.customer_email, b.customer_phone, \
                b.total_price, b.status, b.booking_code, b.created_at, b.updated_at, \
                {SHOWTIME_DETAIL_COLUMNS} \
         FROM bookings b \
         JOIN showtimes s ON s.id = b.showtime_id \
         {SHOWTIME_DETAIL_JOINS} \
         {filter}"
    )
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RecordStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self, isolation: IsolationLevel) -> StoreResult<PgTx> {
        let mut tx = self.pool.begin().await?;
        let statement = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&statement).execute(&mut *tx).await?;
        Ok(PgTx { tx })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_venue(&self, venue: &NewVenue) -> StoreResult<Venue> {
        let venue = sqlx::query_as::<_, Venue>(
            "INSERT INTO venues (name, location, rating)
             VALUES ($1, $2, $3)
             RETURNING id, name, location, rating, created_at, updated_at",
        )
        .bind(&venue.name)
        .bind(&venue.location)
        .bind(venue.rating)
        .fetch_one(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn list_venues(&self) -> StoreResult<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(
            "SELECT id, name, location, rating, created_at, updated_at
             FROM venues ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    async fn find_venue(&self, id: i64) -> StoreResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(
            "SELECT id, name, location, rating, created_at, updated_at FROM venues WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn update_venue(&self, id: i64, venue: &NewVenue) -> StoreResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(
            "UPDATE venues
             SET name = $2, location = $3, rating = $4, updated_at = NOW()
             WHERE id = $1
             RETURNING id, name, location, rating, created_at, updated_at",
        )
        .bind(id)
        .bind(&venue.name)
        .bind(&venue.location)
        .bind(venue.rating)
        .fetch_optional(&self.pool)
        .await?;
        Ok(venue)
    }

    // Сеансы и места удаляются каскадом, брони блокируют удаление по FK
    async fn delete_venue(&self, id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM venues WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_movie(&self, movie: &NewMovie) -> StoreResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies (title, description, duration, genre, rating, poster_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, title, description, duration, genre, rating, poster_url,
                       created_at, updated_at",
        )
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(movie.duration)
        .bind(&movie.genre)
        .bind(&movie.rating)
        .bind(&movie.poster_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT id, title, description, duration, genre, rating, poster_url,
                    created_at, updated_at
             FROM movies ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn find_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, title, description, duration, genre, rating, poster_url,
                    created_at, updated_at
             FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn update_movie(&self, id: i64, movie: &NewMovie) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "UPDATE movies
             SET title = $2, description = $3, duration = $4, genre = $5, rating = $6,
                 poster_url = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING id, title, description, duration, genre, rating, poster_url,
                       created_at, updated_at",
        )
        .bind(id)
        .bind(&movie.title)
        .bind(&movie.description)
        .bind(movie.duration)
        .bind(&movie.genre)
        .bind(&movie.rating)
        .bind(&movie.poster_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_showtime(&self, showtime: &NewShowtime) -> StoreResult<Showtime> {
        let sql = format!(
            "INSERT INTO showtimes (movie_id, venue_id, show_date, show_time, price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SHOWTIME_COLUMNS}"
        );
        let showtime = sqlx::query_as::<_, Showtime>(&sql)
            .bind(showtime.movie_id)
            .bind(showtime.venue_id)
            .bind(showtime.show_date)
            .bind(showtime.show_time)
            .bind(showtime.price)
            .fetch_one(&self.pool)
            .await?;
        Ok(showtime)
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<ShowtimeDetails>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SHOWTIME_DETAIL_COLUMNS} FROM showtimes s {SHOWTIME_DETAIL_JOINS} WHERE TRUE"
        ));
        if let Some(movie_id) = filter.movie_id {
            query.push(" AND s.movie_id = ").push_bind(movie_id);
        }
        if let Some(venue_id) = filter.venue_id {
            query.push(" AND s.venue_id = ").push_bind(venue_id);
        }
        if let Some(date) = filter.date {
            query.push(" AND s.show_date = ").push_bind(date);
        }
        query.push(" ORDER BY s.show_date, s.show_time, s.id");

        let rows = query
            .build_query_as::<ShowtimeDetailsRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_showtime(&self, id: i64) -> StoreResult<Option<ShowtimeDetails>> {
        let sql = format!(
            "SELECT {SHOWTIME_DETAIL_COLUMNS} FROM showtimes s {SHOWTIME_DETAIL_JOINS} WHERE s.id = $1"
        );
        let row = sqlx::query_as::<_, ShowtimeDetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn create_seats(&self, seats: &[NewSeat]) -> StoreResult<Vec<Seat>> {
        if seats.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO seats (venue_id, seat_number, row_label, column_number, seat_type) ",
        );
        query.push_values(seats, |mut row, seat| {
            row.push_bind(seat.venue_id)
                .push_bind(seat.seat_number.clone())
                .push_bind(seat.row.clone())
                .push_bind(seat.column)
                .push_bind(seat.seat_type.as_str());
        });
        query.push(format!(" RETURNING {SEAT_COLUMNS}"));

        let created = query.build_query_as::<Seat>().fetch_all(&self.pool).await?;
        Ok(created)
    }

    async fn list_seats(&self, venue_id: Option<i64>) -> StoreResult<Vec<Seat>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {SEAT_COLUMNS} FROM seats"));
        if let Some(venue_id) = venue_id {
            query.push(" WHERE venue_id = ").push_bind(venue_id);
        }
        query.push(" ORDER BY row_label, column_number, id");

        let seats = query.build_query_as::<Seat>().fetch_all(&self.pool).await?;
        Ok(seats)
    }

    async fn find_booking(&self, booking_code: &str) -> StoreResult<Option<BookingDetails>> {
        let sql = booking_details_query("WHERE b.booking_code = $1");
        let row = sqlx::query_as::<_, BookingDetailsRow>(&sql)
            .bind(booking_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn booked_seats(&self, booking_id: i64) -> StoreResult<Vec<BookedSeat>> {
        let rows = sqlx::query_as::<_, BookedSeatRow>(
            "SELECT bs.id AS link_id, bs.booking_id,
                    s.id, s.venue_id, s.seat_number, s.row_label, s.column_number, s.seat_type
             FROM booking_seats bs
             JOIN seats s ON s.id = bs.seat_id
             WHERE bs.booking_id = $1
             ORDER BY s.row_label, s.column_number, s.id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BookedSeat {
                id: row.link_id,
                booking_id: row.booking_id,
                seat_id: row.seat.id,
                seat: row.seat,
            })
            .collect())
    }

    async fn list_bookings(&self) -> StoreResult<Vec<BookingDetails>> {
        let sql = booking_details_query("ORDER BY b.created_at DESC, b.id DESC");
        let rows = sqlx::query_as::<_, BookingDetailsRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn seat_map(&self, showtime_id: i64) -> StoreResult<Option<Vec<SeatAvailability>>> {
        let venue_id: Option<i64> =
            sqlx::query_scalar("SELECT venue_id FROM showtimes WHERE id = $1")
                .bind(showtime_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(venue_id) = venue_id else {
            return Ok(None);
        };

        let seats = sqlx::query_as::<_, SeatAvailability>(
            r#"
            SELECT s.id, s.venue_id, s.seat_number, s.row_label, s.column_number, s.seat_type,
                   NOT EXISTS (
                       SELECT 1
                       FROM booking_seats bs
                       JOIN bookings b ON b.id = bs.booking_id
                       WHERE bs.seat_id = s.id
                         AND b.showtime_id = $2
                         AND b.status <> 'cancelled'
                   ) AS is_available
            FROM seats s
            WHERE s.venue_id = $1
            ORDER BY s.row_label, s.column_number, s.id
            "#,
        )
        .bind(venue_id)
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(seats))
    }

    async fn cancel_booking(&self, booking_code: &str) -> StoreResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        // Повторная отмена не трогает updated_at
        let sql = format!(
            "UPDATE bookings
             SET status = 'cancelled',
                 updated_at = CASE WHEN status = 'cancelled' THEN updated_at ELSE NOW() END
             WHERE booking_code = $1
             RETURNING {BOOKING_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_code)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(booking) = &booking {
            let released = sqlx::query("DELETE FROM held_seats WHERE booking_id = $1")
                .bind(booking.id)
                .execute(&mut *tx)
                .await?;
            debug!(
                booking_code,
                released = released.rows_affected(),
                "released seat holds"
            );
        }

        tx.commit().await?;
        Ok(booking)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn showtime_for_booking(&mut self, showtime_id: i64) -> StoreResult<Option<Showtime>> {
        let sql = format!("SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1 FOR SHARE");
        let showtime = sqlx::query_as::<_, Showtime>(&sql)
            .bind(showtime_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(showtime)
    }

    async fn held_seat_ids(&mut self, showtime_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<i64>> {
        let held = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT bs.seat_id
            FROM booking_seats bs
            JOIN bookings b ON b.id = bs.booking_id
            WHERE b.showtime_id = $1
              AND b.status <> 'cancelled'
              AND bs.seat_id = ANY($2)
            "#,
        )
        .bind(showtime_id)
        .bind(seat_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(held)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "INSERT INTO bookings
                 (showtime_id, customer_name, customer_email, customer_phone,
                  total_price, status, booking_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (booking_code) DO NOTHING
             RETURNING {BOOKING_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking.showtime_id)
            .bind(&booking.customer_name)
            .bind(&booking.customer_email)
            .bind(&booking.customer_phone)
            .bind(booking.total_price)
            .bind(booking.status.as_str())
            .bind(&booking.booking_code)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(inserted)
    }

    async fn insert_booking_seat(&mut self, booking: &Booking, seat_id: i64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO booking_seats (booking_id, seat_id, showtime_id) VALUES ($1, $2, $3)",
        )
        .bind(booking.id)
        .bind(seat_id)
        .bind(booking.showtime_id)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("INSERT INTO held_seats (showtime_id, seat_id, booking_id) VALUES ($1, $2, $3)")
            .bind(booking.showtime_id)
            .bind(seat_id)
            .bind(booking.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
