//! # Larder (Recipe & Pantry Service)
//!
//! `larder` is the HTTP backend of a recipe and pantry management
//! application: per-user pantry shelves with items, a recipe collection with
//! ingredients and a meal-plan multiplier, and passwordless authentication
//! via emailed magic links.
//!
//! ## Authentication (magic links)
//!
//! There are no passwords. A login request generates a random nonce, stores
//! it in a signed session cookie, and emails a link whose `magic` query
//! parameter is an encrypted `{email, nonce, createdAt}` payload. Visiting
//! the link decrypts the payload, checks the five-minute expiry window, and
//! compares the embedded nonce against the one in the session cookie. Known
//! emails are logged in; unknown emails complete signup with their name.
//!
//! - **Session cookie:** signed (HMAC-SHA256), httpOnly, holding only
//!   `nonce` and `userId`. Tampering yields a fresh empty session.
//! - **Magic payload:** ChaCha20-Poly1305 encrypted; never persisted
//!   server-side, so its validity derives entirely from the embedded
//!   `createdAt` timestamp.
//!
//! ## Ownership
//!
//! Shelves, items, recipes, and ingredients belong to the user who created
//! them. Cross-user mutations are rejected with `401` and a human-readable
//! message rather than silently ignored.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
