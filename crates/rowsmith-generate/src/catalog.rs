use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::GenerationError;

const NAMES_FILE: &str = "names.json";
const COUNTRIES_FILE: &str = "countries.json";
const CAR_MODELS_FILE: &str = "car_models.json";

const BUILTIN_NAMES: &str = include_str!("../assets/names.json");
const BUILTIN_COUNTRIES: &str = include_str!("../assets/countries.json");
const BUILTIN_CAR_MODELS: &str = include_str!("../assets/car_models.json");

/// Locale used when a generator does not ask for one.
pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameTable {
    #[serde(default)]
    pub male: Vec<String>,
    #[serde(default)]
    pub female: Vec<String>,
}

/// Reference data used by the semantic generators.
///
/// A catalog is immutable once built. The built-in one is shared by every
/// dataset in the process; a custom catalog is handed to a dataset as an
/// `Arc<Catalog>`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    names: BTreeMap<String, NameTable>,
    countries: BTreeMap<String, BTreeMap<String, String>>,
    car_models: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    /// Catalog backed by the assets embedded in the crate.
    pub fn builtin() -> Arc<Catalog> {
        static BUILTIN: OnceLock<Arc<Catalog>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| {
            Arc::new(Catalog {
                names: parse_builtin(NAMES_FILE, BUILTIN_NAMES),
                countries: parse_builtin(COUNTRIES_FILE, BUILTIN_COUNTRIES),
                car_models: parse_builtin(CAR_MODELS_FILE, BUILTIN_CAR_MODELS),
            })
        }))
    }

    /// Load reference data from `dir`. Files that do not exist fall back to
    /// the built-in tables; files that exist but do not parse are errors.
    pub fn load_dir(dir: &Path) -> Result<Catalog, GenerationError> {
        let builtin = Catalog::builtin();
        let catalog = Catalog {
            names: read_or_default(dir, NAMES_FILE, || builtin.names.clone())?,
            countries: read_or_default(dir, COUNTRIES_FILE, || builtin.countries.clone())?,
            car_models: read_or_default(dir, CAR_MODELS_FILE, || builtin.car_models.clone())?,
        };
        debug!(
            dir = %dir.display(),
            name_locales = catalog.names.len(),
            country_locales = catalog.countries.len(),
            car_brands = catalog.car_models.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn new(
        names: BTreeMap<String, NameTable>,
        countries: BTreeMap<String, BTreeMap<String, String>>,
        car_models: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            names,
            countries,
            car_models,
        }
    }

    pub fn name_locales(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn names(&self, locale: &str) -> Option<&NameTable> {
        self.names.get(locale)
    }

    /// Country names for `locale`, ordered by ISO 3166-1 code.
    pub fn countries(&self, locale: &str) -> Option<Vec<&str>> {
        self.countries
            .get(locale)
            .map(|table| table.values().map(String::as_str).collect())
    }

    pub fn country(&self, locale: &str, code: &str) -> Option<&str> {
        self.countries.get(locale)?.get(code).map(String::as_str)
    }

    pub fn car_brands(&self) -> Vec<&str> {
        self.car_models.keys().map(String::as_str).collect()
    }

    /// Brands with at least one known model.
    pub fn car_brands_with_models(&self) -> Vec<&str> {
        self.car_models
            .iter()
            .filter(|(_, models)| !models.is_empty())
            .map(|(brand, _)| brand.as_str())
            .collect()
    }

    pub fn car_models(&self, brand: &str) -> Option<&[String]> {
        self.car_models.get(brand).map(Vec::as_slice)
    }
}

fn parse_builtin<T: DeserializeOwned + Default>(file: &str, contents: &str) -> T {
    serde_json::from_str(contents).unwrap_or_else(|err| {
        warn!(file, error = %err, "embedded catalog asset is invalid, using empty table");
        T::default()
    })
}

fn read_or_default<T, F>(dir: &Path, file: &str, fallback: F) -> Result<T, GenerationError>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let path = dir.join(file);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "catalog file missing, using built-in table");
            return Ok(fallback());
        }
        Err(err) => {
            return Err(GenerationError::Asset(format!(
                "failed to read asset {}: {}",
                path.display(),
                err
            )));
        }
    };

    serde_json::from_str(&contents).map_err(|err| {
        GenerationError::Asset(format!("invalid json asset {}: {}", path.display(), err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("rowsmith-{label}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn builtin_catalog_is_populated() {
        let catalog = Catalog::builtin();
        let names = catalog.names(DEFAULT_LOCALE).expect("english names");
        assert!(!names.male.is_empty());
        assert!(!names.female.is_empty());
        assert_eq!(catalog.country("en", "ES"), Some("Spain"));
        assert_eq!(catalog.country("es", "ES"), Some("España"));
        assert!(catalog.car_brands().contains(&"Saab"));
        assert!(!catalog.car_brands_with_models().contains(&"Saab"));
    }

    #[test]
    fn builtin_is_shared() {
        assert!(Arc::ptr_eq(&Catalog::builtin(), &Catalog::builtin()));
    }

    #[test]
    fn load_dir_falls_back_per_file() {
        let dir = temp_dir("catalog");
        fs::write(dir.join(CAR_MODELS_FILE), r#"{"Lada": ["Niva"]}"#).expect("write asset");

        let catalog = Catalog::load_dir(&dir).expect("catalog");
        assert_eq!(catalog.car_brands(), vec!["Lada"]);
        assert_eq!(catalog.country("en", "FR"), Some("France"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_dir_rejects_invalid_json() {
        let dir = temp_dir("catalog-invalid");
        fs::write(dir.join(NAMES_FILE), "[1, 2").expect("write asset");

        let err = Catalog::load_dir(&dir).unwrap_err();
        assert!(matches!(err, GenerationError::Asset(_)));

        let _ = fs::remove_dir_all(&dir);
    }
}
