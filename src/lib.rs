//! Scrapes Amazon wishlists into a map of items keyed by their wishlist item ID.
//!
//! ```no_run
//! # async fn run() -> Result<(), wishlist_archiver::WishlistError> {
//! let mut wishlist = wishlist_archiver::Wishlist::from_url("https://www.amazon.com/hz/wishlist/ls/3I6EQPZ8OB1DT")?;
//! for (id, item) in wishlist.items().await? {
//!     println!("{id}: {} {}", item.name, item.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod wishlist;

pub use config::WishlistConfig;
pub use error::WishlistError;
pub use fetcher::{FetchPage, HttpFetcher, Page};
pub use models::{Item, ItemMap, WishlistArchive};
pub use wishlist::Wishlist;
