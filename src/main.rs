use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wishlist_archiver::{Wishlist, WishlistArchive, WishlistConfig, archiver};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let target = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WISHLIST_URL").ok())
        .context("pass a wishlist URL or ID, or set WISHLIST_URL")?;

    let config = WishlistConfig::from_env()?;
    let mut wishlist = Wishlist::from_url_or_id_with_config(&target, config)?;

    let items = match wishlist.items().await {
        Ok(items) => items,
        Err(err) if err.is_blocked() => {
            error!("{err}");
            std::process::exit(1);
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to scrape {}", wishlist)),
    };

    let filename = archiver::archive_filename(wishlist.id());
    let archive = WishlistArchive::new(wishlist.id(), wishlist.urls().to_vec(), items);
    archiver::save_to_file(&archive, &filename)?;
    info!(items = archive.items.len(), file = %filename, "Wishlist archived successfully");
    Ok(())
}
