//! Booking codes: `BK` + 6 base-36 digits of the Unix second + 6 base-36
//! digits of randomness from a v4 UUID.
//!
//! Codes sort roughly by creation time and two codes from the same second
//! collide with probability 1 / 36^6. The bookings table has a unique key on
//! the code, and the orchestrator draws a new code when an insert hits it.

use chrono::Utc;
use uuid::Uuid;

pub const CODE_PREFIX: &str = "BK";
pub const CODE_LEN: usize = CODE_PREFIX.len() + 2 * SEGMENT_LEN;

const SEGMENT_LEN: usize = 6;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
// 36^6
const SEGMENT_SPACE: u64 = 2_176_782_336;
// Младшие 62 бита UUID v4 случайны (выше лежат version и variant)
const RANDOM_BITS_MASK: u128 = (1 << 62) - 1;

pub fn new_booking_code() -> String {
    code_from_parts(Utc::now().timestamp(), Uuid::new_v4())
}

fn code_from_parts(unix_secs: i64, entropy: Uuid) -> String {
    let time_part = unix_secs.rem_euclid(SEGMENT_SPACE as i64) as u64;
    let random_part = ((entropy.as_u128() & RANDOM_BITS_MASK) % SEGMENT_SPACE as u128) as u64;

    let mut code = String::with_capacity(CODE_LEN);
    code.push_str(CODE_PREFIX);
    push_base36(&mut code, time_part);
    push_base36(&mut code, random_part);
    code
}

fn push_base36(out: &mut String, mut value: u64) {
    let mut digits = [b'0'; SEGMENT_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    out.extend(digits.iter().map(|&d| d as char));
}

/// Shape check used before hitting the store with a client-supplied code.
pub fn looks_like_booking_code(code: &str) -> bool {
    code.len() == CODE_LEN
        && code.starts_with(CODE_PREFIX)
        && code[CODE_PREFIX.len()..]
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}
