//! Curated emoji and reply sets with uniform random draws.

use rand::seq::SliceRandom;
use rand::Rng;

/// Reactions used on status updates.
pub const STATUS_EMOJIS: &[&str] = &[
    "🗿", "⌚️", "💠", "👣", "🏆", "💔", "🤍", "❤️‍🔥", "💣", "🧠", "🦅", "🌻", "🧊", "🛑", "🧸",
    "👑", "🍓", "😅", "🎭", "🎉", "😳", "💯", "🔥", "💫", "💝", "💗", "❤️‍🔥", "👁️", "👀", "🙌",
    "🙆", "🌟", "💧", "🦄", "🟢", "🎎", "✅", "🥱", "🌚", "💚", "💕", "😉", "😒",
];

/// Replies sent under status updates.
pub const STATUS_REPLIES: &[&str] = &[
    "Nice you status 🧐",
    "esh you status is Hot 😘",
    "l see you status bro not allowed 💀",
    "What’s good? Your status is pure chaos! 🤪",
    "Status checked. You’re droppin’ bombs out here! 💣",
    "Aight, peeped your status. Too lit! 🤔",
    "Your status? Absolute fire, no cap! 🚨",
    "Just saw your status. Keep it 100, fam! 🖤",
];

/// Reactions used on ordinary chat messages.
pub const MESSAGE_EMOJIS: &[&str] = &[
    "👍", "❤️", "😂", "😮", "😢", "🙏", "🔥", "🎉", "💯", "👏", "😎", "🤝", "✨", "🥳", "😁",
    "🤩", "💪", "👌", "🙌", "😇", "🤗", "💖", "🌹", "⭐", "🍀", "🚀", "🎶", "☕", "🌈", "🫡",
];

/// Draws one element uniformly at random.
///
/// Returns `None` only for an empty pool.
pub fn draw<'a, R: Rng + ?Sized>(pool: &[&'a str], rng: &mut R) -> Option<&'a str> {
    pool.choose(rng).copied()
}
