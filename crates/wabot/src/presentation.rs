//! Greeting, time-of-day and decorative font helpers.
//!
//! All wall-clock values are taken in a fixed timezone so the output does
//! not depend on where the daemon runs.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Timezone every greeting and timestamp is rendered in.
pub const TIMEZONE: Tz = chrono_tz::Africa::Nairobi;

/// Greeting labels, in bucket order.
pub mod label {
    /// Hours `[5, 12)`.
    pub const MORNING: &str = "ᴍᴏʀɴɪɴɢ";
    /// Hours `[12, 18)`.
    pub const AFTERNOON: &str = "ᴀғᴛᴇʀɴᴏᴏɴ";
    /// Hours `[18, 22)`.
    pub const EVENING: &str = "ᴇᴠᴇɴɪɴɢ!";
    /// Everything else.
    pub const NIGHT: &str = "ɴɪɢʜᴛ!";
}

/// Maps an hour of day (0-23) to its greeting label.
#[must_use]
pub const fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => label::MORNING,
        12..=17 => label::AFTERNOON,
        18..=21 => label::EVENING,
        _ => label::NIGHT,
    }
}

/// Greeting for `now`, evaluated in [`TIMEZONE`].
#[must_use]
pub fn greeting_at(now: DateTime<Utc>) -> &'static str {
    greeting_for_hour(TIMEZONE.from_utc_datetime(&now.naive_utc()).hour())
}

/// Greeting for the current wall-clock time.
#[must_use]
pub fn greeting() -> &'static str {
    greeting_at(Utc::now())
}

/// Short 12-hour time such as `9:05 AM`, evaluated in [`TIMEZONE`].
#[must_use]
pub fn time_at(now: DateTime<Utc>) -> String {
    TIMEZONE
        .from_utc_datetime(&now.naive_utc())
        .format("%-I:%M %p")
        .to_string()
}

/// Current time of day.
#[must_use]
pub fn current_time() -> String {
    time_at(Utc::now())
}

const fn fancy_char(c: char) -> Option<char> {
    Some(match c {
        'a' => 'ᴀ',
        'b' => 'ʙ',
        'c' => 'ᴄ',
        'd' => 'ᴅ',
        'e' => 'ᴇ',
        'f' => 'ғ',
        'g' => 'ɢ',
        'h' => 'ʜ',
        'i' => 'ɪ',
        'j' => 'ᴊ',
        'k' => 'ᴋ',
        'l' => 'ʟ',
        'm' => 'ᴍ',
        'n' => 'ɴ',
        'o' => 'ᴏ',
        'p' => 'ᴘ',
        'q' => 'ǫ',
        'r' => 'ʀ',
        's' => 's',
        't' => 'ᴛ',
        'u' => 'ᴜ',
        'v' => 'ᴠ',
        'w' => 'ᴡ',
        'x' => 'x',
        'y' => 'ʏ',
        'z' => 'ᴢ',
        _ => return None,
    })
}

/// Transliterates `text` into small-capital glyphs.
///
/// The input is upper-cased when `uppercase` is set and lower-cased
/// otherwise; only lowercase Latin letters have glyphs, so upper-cased
/// input passes through unchanged. Unmapped characters are kept as is.
#[must_use]
pub fn to_fancy_font(text: &str, uppercase: bool) -> String {
    let folded = if uppercase {
        text.to_uppercase()
    } else {
        text.to_lowercase()
    };
    folded
        .chars()
        .map(|c| fancy_char(c).unwrap_or(c))
        .collect()
}
