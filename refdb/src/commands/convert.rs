use refdb_catalog::{Catalog, Version};
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Database file of any supported version
    input: PathBuf,

    /// Where to write the converted database
    output: PathBuf,
}

pub(crate) fn command(config: Config) -> Result<(), Box<dyn Error>> {
    let catalog = Catalog::load_file(&config.input)?;
    catalog.save_file(&config.output)?;
    println!(
        "Converted {} to {} ({}, {} items)",
        config.input.display(),
        config.output.display(),
        Version::LATEST,
        catalog.items().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refdb_catalog::{CatalogBuilder, ColorId};

    #[test]
    fn writes_latest_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        let mut b = CatalogBuilder::new();
        b.add_color(ColorId::new(11), "Black");
        b.finish().save_file(&input).unwrap();

        command(Config {
            input: input.clone(),
            output: output.clone(),
        })
        .unwrap();

        let converted = Catalog::load_file(&output).unwrap();
        assert_eq!(converted.info().colors, 1);
        assert_eq!(
            std::fs::read(&input).unwrap(),
            std::fs::read(&output).unwrap()
        );
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = command(Config {
            input: dir.path().join("nope"),
            output: dir.path().join("out"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("nope"), "{err}");
        assert!(!dir.path().join("out").exists());
    }
}
