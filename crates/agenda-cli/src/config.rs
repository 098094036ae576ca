//! Engine options from a TOML file, with command-line overrides on top.

use std::path::Path;

use agenda_engine::EngineOptions;
use anyhow::{Context, Result};

/// Load options from `path`, or the defaults when no file is given.
///
/// Every key is optional; missing keys keep their default.
pub fn load_options(path: Option<&Path>) -> Result<EngineOptions> {
    let Some(path) = path else {
        return Ok(EngineOptions::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let options: EngineOptions = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_engine::GapPolicy;
    use std::io::Write;

    #[test]
    fn missing_path_gives_defaults() {
        assert_eq!(load_options(None).unwrap(), EngineOptions::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_timezone = \"Europe/Berlin\"\ndisplay_limit = 2\n\n[dst]\ngap = \"skip\""
        )
        .unwrap();

        let options = load_options(Some(file.path())).unwrap();

        assert_eq!(options.default_timezone, "Europe/Berlin");
        assert_eq!(options.display_limit, 2);
        assert_eq!(options.dst.gap, GapPolicy::Skip);
        assert_eq!(options.horizon_days, EngineOptions::default().horizon_days);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dst]\ngap = \"sideways\"").unwrap();

        assert!(load_options(Some(file.path())).is_err());
    }
}
