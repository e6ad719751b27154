//! Build the static site

use anyhow::Result;
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::generator::{load_full, Generator};
use crate::{watch, Site};

/// Generate the static site once
pub fn run(site: &Site) -> Result<()> {
    let start = std::time::Instant::now();

    let index = site.content_index();
    let generator = Generator::new(site)?;
    let report = generator.generate(&index)?;

    tracing::info!(
        "Generated {} pages for {} items ({} assets) in {:.2}s",
        report.pages,
        report.items,
        report.assets,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Rebuild on every content change until interrupted
pub async fn watch(site: &Site) -> Result<()> {
    let index = Arc::new(site.content_index());
    let generator = Generator::new(site)?;

    // The first snapshot matches what `run` just built
    let mut snapshots = Box::pin(watch::subscribe(index.clone())?.into_stream().skip(1));

    tracing::info!("Watching {:?} for changes. Press Ctrl+C to stop.", index.root());

    loop {
        tokio::select! {
            snapshot = snapshots.next() => {
                let Some(listing) = snapshot else { break };
                tracing::info!("Content changed, regenerating...");

                let index = index.clone();
                let start = std::time::Instant::now();
                let full = tokio::task::spawn_blocking(move || load_full(&index, &listing).map(|f| (listing, f))).await?;

                match full.and_then(|(listing, full)| generator.write_site(&listing, &full)) {
                    Ok(report) => tracing::info!(
                        "Regenerated {} pages in {:.2}s",
                        report.pages,
                        start.elapsed().as_secs_f64()
                    ),
                    Err(e) => tracing::error!("Generation failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
