use std::fs::File;
use std::io::Write;
use std::path::Path;
use anyhow::{Context, Result};
use crate::models::WishlistArchive;

pub fn save_to_file(archive: &WishlistArchive, filename: impl AsRef<Path>) -> Result<()> {
    let filename = filename.as_ref();
    let json = serde_json::to_string_pretty(archive)?;
    let mut file = File::create(filename)
        .with_context(|| format!("Failed to create {}", filename.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

pub fn archive_filename(wishlist_id: &str) -> String {
    format!("wishlist-{}.json", wishlist_id)
}
