//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<PadtrigConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {:?}", path))?;
    let config: PadtrigConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
pads:
  - name: snare
    input: 0
    threshold_volts: 0.2
    note: 38
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.adc.resolution_bits, 12);
        assert_eq!(config.source.kind, SourceKind::Iio);
        assert_eq!(config.pads.len(), 1);
        assert!(config.pedal.is_none());
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
midi:
  channel: 20
pads:
  - name: snare
    input: 0
    threshold_volts: 0.2
    note: 38
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/padtrig.yaml")).is_err());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: PadtrigConfig =
            serde_yaml::from_str(include_str!("../../padtrig.example.yaml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.pads.len(), 3);
    }
}
