//! List site content

use anyhow::Result;

use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let index = site.content_index();

    match content_type {
        "post" | "posts" => {
            let items = index.list_all()?;
            println!("Posts ({}):", items.len());
            for item in items {
                println!(
                    "  {} - {} [{}]",
                    item.date.format("%Y-%m-%d"),
                    item.title,
                    item.slug
                );
            }
        }
        "tag" | "tags" => {
            let tags = index.tags()?;
            println!("Tags ({}):", tags.len());
            for (tag, count) in tags {
                println!("  {} ({})", tag, count);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, tag", content_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_type_is_an_error() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        assert!(run(&site, "post").is_ok());
        assert!(run(&site, "tag").is_ok());
        assert!(run(&site, "category").is_err());
    }
}
