//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::Site;

/// Remove the generated site
pub fn run(site: &Site) -> Result<()> {
    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)?;
        tracing::info!("Deleted: {:?}", site.public_dir);
    } else {
        tracing::debug!("Nothing to clean at {:?}", site.public_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_public_dir() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        fs::create_dir_all(site.public_dir.join("blog")).unwrap();
        fs::write(site.public_dir.join("index.html"), "<html></html>").unwrap();

        run(&site).unwrap();
        assert!(!site.public_dir.exists());

        // Cleaning twice is fine
        run(&site).unwrap();
    }
}
