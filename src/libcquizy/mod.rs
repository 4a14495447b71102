pub mod api;
pub mod bookmarks;
pub mod card;
#[cfg(feature = "client")]
pub mod client;
pub mod db;
pub mod deck;
pub mod question;
pub mod session;
pub mod storage;
pub mod theme;
pub mod timer;
