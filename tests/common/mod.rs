#![allow(dead_code)]

pub mod scripted;

use chrono::{NaiveDate, NaiveTime};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;

use cinema_booking::config::BookingConfig;
use cinema_booking::models::{
    CreateBookingRequest, NewMovie, NewSeat, NewShowtime, NewVenue, Seat, SeatType, Showtime,
};
use cinema_booking::services::BookingService;
use cinema_booking::store::{MemoryStore, RecordStore};

pub struct Cinema {
    pub store: MemoryStore,
    pub service: BookingService<MemoryStore>,
    pub showtime: Showtime,
    pub seats: Vec<Seat>,
}

impl Cinema {
    pub fn seat_ids(&self, count: usize) -> Vec<i64> {
        self.seats.iter().take(count).map(|seat| seat.id).collect()
    }
}

/// One venue with `rows` x `columns` seats, one movie and one showtime.
pub async fn cinema(price: i64, rows: usize, columns: i32) -> Cinema {
    let store = MemoryStore::new();
    let venue = store
        .create_venue(&NewVenue {
            name: "CGV Grand Indonesia".into(),
            location: "Jakarta".into(),
            rating: 4.5,
        })
        .await
        .unwrap();
    let movie = store
        .create_movie(&NewMovie {
            title: "Laskar Pelangi".into(),
            description: Some("Ten children on Belitung".into()),
            duration: 125,
            genre: Some("Drama".into()),
            rating: Some("PG".into()),
            poster_url: None,
        })
        .await
        .unwrap();
    let showtime = store
        .create_showtime(&NewShowtime {
            movie_id: movie.id,
            venue_id: venue.id,
            show_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            show_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            price,
        })
        .await
        .unwrap();

    let new_seats: Vec<NewSeat> = (0..rows)
        .flat_map(|r| {
            let row = ((b'A' + r as u8) as char).to_string();
            (1..=columns).map(move |column| NewSeat {
                venue_id: venue.id,
                seat_number: format!("{row}{column}"),
                row: row.clone(),
                column,
                seat_type: SeatType::Regular,
            })
        })
        .collect();
    let seats = store.create_seats(&new_seats).await.unwrap();

    let service = BookingService::new(store.clone(), BookingConfig::default());
    Cinema {
        store,
        service,
        showtime,
        seats,
    }
}

pub fn request(showtime_id: i64, seat_ids: Vec<i64>) -> CreateBookingRequest {
    CreateBookingRequest {
        showtime_id,
        customer_name: Name().fake(),
        customer_email: SafeEmail().fake(),
        customer_phone: PhoneNumber().fake(),
        seat_ids,
    }
}
