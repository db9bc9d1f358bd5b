//! JSON configuration loading.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Error, Result};

/// Read and parse a JSON file into `T`.
///
/// A missing file is reported as [`Error::NotFound`]; malformed content as
/// [`Error::Config`] so callers can tell a bad file from a bad path.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(Error::not_found(path.display()));
        }
        Err(err) => return Err(err.into()),
    };
    debug!("loaded {} bytes from {}", text.len(), path.display());
    serde_json::from_str(&text).map_err(|e| Error::config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Planes {
        near: f32,
        #[serde(default)]
        far: Option<f32>,
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("vireo-{name}-{unique}.json"));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_json_parses_file() {
        let path = temp_file("planes", r#"{ "near": 0.25 }"#);
        let planes: Planes = load_json(&path).unwrap();
        assert_eq!(
            planes,
            Planes {
                near: 0.25,
                far: None
            }
        );
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_json_missing_file() {
        let path = std::env::temp_dir().join("vireo-definitely-missing.json");
        let err = load_json::<Planes>(&path).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_load_json_malformed() {
        let path = temp_file("malformed", "{ near: ");
        let err = load_json::<Planes>(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        fs::remove_file(path).unwrap();
    }
}
