use refdb_catalog::Catalog;
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Database file to inspect
    file: PathBuf,

    /// List every recorded consistency issue, not just their number
    #[clap(long = "issues")]
    show_issues: bool,
}

pub(crate) fn command(config: Config) -> Result<(), Box<dyn Error>> {
    let catalog = Catalog::load_file(&config.file)?;
    println!("{}", render(&catalog, config.show_issues));
    Ok(())
}

fn render(catalog: &Catalog, show_issues: bool) -> String {
    let mut out = catalog.info().to_string();
    if show_issues && !catalog.consistency_report().is_empty() {
        out.push('\n');
        out.push_str(&catalog.consistency_report().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdb_catalog::{CatalogBuilder, CategoryId, ColorId, ItemTypeId};

    #[test]
    fn lists_issues_on_request() {
        let mut b = CatalogBuilder::new();
        b.add_color(ColorId::new(1), "White");
        let part = ItemTypeId::new(b'P').unwrap();
        b.add_item_type(part, "Part");
        b.add_item(part, "3001", "Brick 2 x 4").category = CategoryId::new(99);
        let catalog = b.finish();

        let short = render(&catalog, false);
        assert!(short.contains("consistency issues:   1"), "{short}");
        assert!(!short.contains("3001"), "{short}");

        let long = render(&catalog, true);
        assert!(long.contains("1 consistency issue(s)"), "{long}");
        assert!(long.contains("3001"), "{long}");
    }
}
