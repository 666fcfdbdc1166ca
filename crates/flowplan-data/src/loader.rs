//! Resolution pipeline: reads data files, resolves names, builds the catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_dir`] which ties them together.

use crate::schema::{CatalogData, FacilityData, LineData, PlannerData};
use flowplan_core::catalog::{Catalog, CatalogBuilder, CatalogError, FacilityLevel, LineLevel};
use flowplan_core::fixed::Fixed64;
use flowplan_core::flow::SolverConfig;
use flowplan_core::id::{FacilityId, ItemTypeId};
use flowplan_core::network::Network;
use flowplan_core::search::SearchConfig;
use flowplan_core::topology::TopologyError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A number is out of range or otherwise unusable.
    #[error("invalid value in {file}: {detail}")]
    InvalidValue { file: PathBuf, detail: String },

    /// The resolved catalog failed validation.
    #[error("invalid catalog in {file}: {source}")]
    Catalog {
        file: PathBuf,
        #[source]
        source: CatalogError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan `dir` for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `name` is already in `map`.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn to_fixed(value: f64, file: &Path, what: &str) -> Result<Fixed64, DataLoadError> {
    let invalid = || DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        detail: format!("{what} = {value} is not representable"),
    };
    if !value.is_finite() {
        return Err(invalid());
    }
    Fixed64::checked_from_num(value).ok_or_else(invalid)
}

// ===========================================================================
// Catalog resolution
// ===========================================================================

struct Resolver<'a> {
    file: &'a Path,
    items: HashMap<String, ItemTypeId>,
    facilities: HashMap<String, FacilityId>,
}

impl Resolver<'_> {
    fn rates(
        &self,
        rates: impl IntoIterator<Item = (String, f64)>,
        owner: &str,
    ) -> Result<Vec<(ItemTypeId, Fixed64)>, DataLoadError> {
        let mut out = Vec::new();
        for (name, rate) in rates {
            let item = *resolve_name(&self.items, &name, self.file, "item")?;
            let rate = to_fixed(rate, self.file, &format!("rate of '{name}' in '{owner}'"))?;
            // Absent and zero rates mean the same thing.
            if rate != Fixed64::ZERO {
                out.push((item, rate));
            }
        }
        Ok(out)
    }

    fn facility_levels(&self, data: &FacilityData) -> Result<Vec<FacilityLevel>, DataLoadError> {
        match data {
            FacilityData::Explicit { name, levels } => levels
                .iter()
                .map(|level| -> Result<FacilityLevel, DataLoadError> {
                    let rates = self.rates(level.rates.clone(), name)?;
                    let cost = to_fixed(level.cost, self.file, &format!("cost of '{name}'"))?;
                    Ok(FacilityLevel::new(rates, cost))
                })
                .collect(),
            FacilityData::Ramp {
                name,
                recipe,
                current,
                maximum,
                steps,
                step_cost,
            } => {
                if *steps == 0 {
                    return Err(DataLoadError::InvalidValue {
                        file: self.file.to_path_buf(),
                        detail: format!("facility '{name}' has zero steps"),
                    });
                }
                let step_cost = to_fixed(*step_cost, self.file, &format!("step_cost of '{name}'"))?;
                (0..*steps)
                    .map(|i| -> Result<FacilityLevel, DataLoadError> {
                        let throughput =
                            current + (maximum - current) * f64::from(i) / f64::from(*steps);
                        let rates = self.rates(
                            recipe
                                .iter()
                                .map(|(item, per_unit)| (item.clone(), per_unit * throughput)),
                            name,
                        )?;
                        let cost = if i == 0 { Fixed64::ZERO } else { step_cost };
                        Ok(FacilityLevel::new(rates, cost))
                    })
                    .collect()
            }
            FacilityData::Splitter { .. } => Ok(vec![FacilityLevel::new([], Fixed64::ZERO)]),
        }
    }

    fn line(
        &self,
        line: &LineData,
    ) -> Result<(ItemTypeId, FacilityId, FacilityId, Vec<LineLevel>), DataLoadError> {
        let item = *resolve_name(&self.items, &line.item, self.file, "item")?;
        let from = *resolve_name(&self.facilities, &line.from, self.file, "facility")?;
        let to = *resolve_name(&self.facilities, &line.to, self.file, "facility")?;
        let what = format!("line {} -> {}", line.from, line.to);
        let levels = line
            .levels
            .iter()
            .map(|level| -> Result<LineLevel, DataLoadError> {
                Ok(LineLevel::new(
                    to_fixed(level.capacity, self.file, &format!("capacity of {what}"))?,
                    to_fixed(level.cost, self.file, &format!("cost of {what}"))?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((item, from, to, levels))
    }
}

/// Resolve names in `data` and build a validated [`Catalog`]. `file` is
/// only used in error messages.
pub fn build_catalog(data: &CatalogData, file: &Path) -> Result<Catalog, DataLoadError> {
    let mut builder = CatalogBuilder::new();
    let mut resolver = Resolver {
        file,
        items: HashMap::new(),
        facilities: HashMap::new(),
    };

    for name in &data.items {
        check_duplicate(&resolver.items, name, file)?;
        let id = builder.register_item(name);
        resolver.items.insert(name.clone(), id);
    }

    for facility in &data.facilities {
        let name = facility.name();
        check_duplicate(&resolver.facilities, name, file)?;
        let levels = resolver.facility_levels(facility)?;
        let id = builder.add_facility(name, levels);
        resolver.facilities.insert(name.to_string(), id);
    }

    for line in &data.lines {
        let (item, from, to, levels) = resolver.line(line)?;
        builder.add_line(item, from, to, levels);
    }

    builder.build().map_err(|source| DataLoadError::Catalog {
        file: file.to_path_buf(),
        source,
    })
}

/// Load and build a catalog from a single file.
pub fn load_catalog_file(path: &Path) -> Result<Catalog, DataLoadError> {
    let data: CatalogData = deserialize_file(path)?;
    let catalog = build_catalog(&data, path)?;
    debug!(
        file = %path.display(),
        items = catalog.item_count(),
        facilities = catalog.facility_count(),
        lines = catalog.line_count(),
        "catalog loaded"
    );
    Ok(catalog)
}

// ===========================================================================
// Planner settings
// ===========================================================================

/// Solver and search parameters read from a `planner.*` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerSettings {
    pub solver: SolverConfig,
    pub search: SearchConfig,
}

impl PlannerSettings {
    /// Apply the fields present in `data` over the defaults.
    pub fn from_data(data: &PlannerData, file: &Path) -> Result<Self, DataLoadError> {
        let mut settings = Self::default();
        if let Some(tolerance) = data.tolerance {
            let tolerance = to_fixed(tolerance, file, "tolerance")?;
            if tolerance < Fixed64::ZERO {
                return Err(DataLoadError::InvalidValue {
                    file: file.to_path_buf(),
                    detail: "tolerance must not be negative".to_string(),
                });
            }
            settings.solver.tolerance = tolerance;
        }
        if let Some(max_iterations) = data.max_iterations {
            settings.solver.max_iterations = max_iterations;
        }
        settings.search.max_expansions = data.max_expansions;
        settings.search.time_budget = data.time_budget_ms.map(Duration::from_millis);
        settings.search.verify_validated_levels = data.verify_validated_levels;
        Ok(settings)
    }
}

// ===========================================================================
// Directory loading
// ===========================================================================

/// Everything loaded from a data directory.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub catalog: Catalog,
    pub settings: PlannerSettings,
}

impl LoadedData {
    /// Build the per-item topology and apply the solver settings. The search
    /// settings are returned alongside for constructing a planner.
    pub fn initialize(self) -> Result<(Network, SearchConfig), TopologyError> {
        let network = Network::initialize(self.catalog)?.with_solver_config(self.settings.solver);
        Ok((network, self.settings.search))
    }
}

/// Load `catalog.*` (required) and `planner.*` (optional) from `dir`.
pub fn load_dir(dir: &Path) -> Result<LoadedData, DataLoadError> {
    let catalog_path = require_data_file(dir, "catalog")?;
    let catalog = load_catalog_file(&catalog_path)?;

    let settings = match find_data_file(dir, "planner")? {
        Some(path) => {
            let data: PlannerData = deserialize_file(&path)?;
            PlannerSettings::from_data(&data, &path)?
        }
        None => PlannerSettings::default(),
    };

    info!(
        dir = %dir.display(),
        facilities = catalog.facility_count(),
        lines = catalog.line_count(),
        "planner data loaded"
    );
    Ok(LoadedData { catalog, settings })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flowplan_core::search::{PlanOutcome, Planner};
    use flowplan_core::test_utils::{fixed, smelting_chain};
    use std::fs;

    /// Create a fresh temporary test directory.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "flowplan_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const SMELTING_TOML: &str = r#"
items = ["ore", "plate"]

[[facilities]]
name = "mine"
levels = [
    { rates = { ore = 6.0 } },
    { rates = { ore = 9.0 }, cost = 2.0 },
    { rates = { ore = 12.0 }, cost = 3.0 },
]

[[facilities]]
name = "furnace"
levels = [
    { rates = { ore = -4.0, plate = 2.0 } },
    { rates = { ore = -6.0, plate = 3.0 }, cost = 4.0 },
]

[[facilities]]
name = "assembler"
levels = [{ rates = { plate = -3.0 } }]

[[lines]]
item = "ore"
from = "mine"
to = "furnace"
levels = [{ capacity = 5.0 }, { capacity = 10.0, cost = 1.0 }]

[[lines]]
item = "plate"
from = "furnace"
to = "assembler"
levels = [{ capacity = 10.0 }]
"#;

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("catalog.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("catalog.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("catalog.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("catalog.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflicting_formats() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("catalog.ron"), "").unwrap();
        fs::write(dir.join("catalog.json"), "").unwrap();

        let result = find_data_file(&dir, "catalog");
        assert!(matches!(result, Err(DataLoadError::ConflictingFormats { .. })));

        cleanup(&dir);
    }

    #[test]
    fn missing_catalog_is_reported() {
        let dir = make_test_dir("missing");

        let result = load_dir(&dir);
        assert!(matches!(result, Err(DataLoadError::MissingRequired { .. })));

        cleanup(&dir);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("catalog.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        match load_catalog_file(&path) {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Catalog resolution
    // -----------------------------------------------------------------------

    #[test]
    fn toml_catalog_matches_builder_catalog() {
        let dir = make_test_dir("smelting_toml");
        fs::write(dir.join("catalog.toml"), SMELTING_TOML).unwrap();

        let loaded = load_dir(&dir).unwrap();
        assert_eq!(loaded.catalog, smelting_chain());
        assert_eq!(loaded.settings, PlannerSettings::default());

        cleanup(&dir);
    }

    #[test]
    fn loaded_catalog_plans_like_the_fixture() {
        let dir = make_test_dir("smelting_plan");
        fs::write(dir.join("catalog.toml"), SMELTING_TOML).unwrap();

        let (network, search) = load_dir(&dir).unwrap().initialize().unwrap();
        let outcome = Planner::with_config(&network, search)
            .plan(&network.catalog().initial_configuration())
            .unwrap();
        assert!(matches!(outcome, PlanOutcome::Found(_)));
        assert_eq!(outcome.total_cost(), fixed(5.0));

        cleanup(&dir);
    }

    #[test]
    fn ramp_levels_interpolate_towards_maximum() {
        let json = r#"{
            "items": ["coal"],
            "facilities": [
                {"name": "mine", "recipe": {"coal": 0.5}, "current": 10.0,
                 "maximum": 20.0, "steps": 5, "step_cost": 1.5}
            ]
        }"#;
        let data: CatalogData = serde_json::from_str(json).unwrap();
        let catalog = build_catalog(&data, Path::new("catalog.json")).unwrap();
        let coal = catalog.item_id("coal").unwrap();
        let mine = catalog.facility(catalog.facility_id("mine").unwrap()).unwrap();

        let rates: Vec<Fixed64> = mine.levels.iter().map(|l| l.rate(coal)).collect();
        assert_eq!(rates, vec![fixed(5.0), fixed(6.0), fixed(7.0), fixed(8.0), fixed(9.0)]);
        assert_eq!(mine.levels[0].incremental_cost, Fixed64::ZERO);
        assert!(mine.levels[1..].iter().all(|l| l.incremental_cost == fixed(1.5)));
    }

    #[test]
    fn ramp_with_zero_steps_is_rejected() {
        let json = r#"{
            "items": ["coal"],
            "facilities": [
                {"name": "mine", "recipe": {"coal": 1.0}, "current": 1.0,
                 "maximum": 2.0, "steps": 0}
            ]
        }"#;
        let data: CatalogData = serde_json::from_str(json).unwrap();
        let result = build_catalog(&data, Path::new("catalog.json"));
        assert!(matches!(result, Err(DataLoadError::InvalidValue { .. })));
    }

    #[test]
    fn ron_catalog_with_splitter() {
        let ron_str = r#"(
            items: ["coal"],
            facilities: [
                (name: "mine", levels: [(rates: {"coal": 4.0})]),
                (name: "hub"),
                (name: "forge", levels: [(rates: {"coal": -3.0})]),
            ],
            lines: [
                (item: "coal", from: "mine", to: "hub", levels: [(capacity: 10.0)]),
                (item: "coal", from: "hub", to: "forge", levels: [(capacity: 10.0)]),
            ],
        )"#;
        let data: CatalogData = ron::from_str(ron_str).unwrap();
        let catalog = build_catalog(&data, Path::new("catalog.ron")).unwrap();
        let hub = catalog.facility(catalog.facility_id("hub").unwrap()).unwrap();
        assert_eq!(hub.level_count(), 1);
        assert!(hub.levels[0].rates.is_empty());
        assert_eq!(catalog.line_count(), 2);
    }

    #[test]
    fn unresolved_facility_reference() {
        let data: CatalogData = serde_json::from_str(
            r#"{"items": ["coal"], "facilities": [{"name": "hub"}],
                "lines": [{"item": "coal", "from": "hub", "to": "nowhere",
                           "levels": [{"capacity": 1.0}]}]}"#,
        )
        .unwrap();
        match build_catalog(&data, Path::new("catalog.json")) {
            Err(DataLoadError::UnresolvedRef {
                name, expected_kind, ..
            }) => {
                assert_eq!(name, "nowhere");
                assert_eq!(expected_kind, "facility");
            }
            other => panic!("expected unresolved reference, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_item_in_rates() {
        let data: CatalogData = serde_json::from_str(
            r#"{"items": ["coal"], "facilities": [
                {"name": "mine", "levels": [{"rates": {"iron": 1.0}}]}]}"#,
        )
        .unwrap();
        let result = build_catalog(&data, Path::new("catalog.json"));
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { expected_kind: "item", .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let items: CatalogData =
            serde_json::from_str(r#"{"items": ["coal", "coal"]}"#).unwrap();
        assert!(matches!(
            build_catalog(&items, Path::new("catalog.json")),
            Err(DataLoadError::DuplicateName { .. })
        ));

        let facilities: CatalogData = serde_json::from_str(
            r#"{"items": ["coal"], "facilities": [{"name": "hub"}, {"name": "hub"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            build_catalog(&facilities, Path::new("catalog.json")),
            Err(DataLoadError::DuplicateName { .. })
        ));
    }

    #[test]
    fn builder_validation_errors_are_wrapped() {
        let data: CatalogData = serde_json::from_str(
            r#"{"items": ["coal"], "facilities": [
                {"name": "a", "levels": [{"rates": {"coal": 1.0}}]},
                {"name": "b", "levels": [{"rates": {"coal": -1.0}}]}],
                "lines": [{"item": "coal", "from": "a", "to": "b",
                           "levels": [{"capacity": 4.0}, {"capacity": 2.0}]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            build_catalog(&data, Path::new("catalog.json")),
            Err(DataLoadError::Catalog {
                source: CatalogError::CapacityDecreases { .. },
                ..
            })
        ));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(matches!(
            to_fixed(f64::NAN, Path::new("x"), "rate"),
            Err(DataLoadError::InvalidValue { .. })
        ));
        assert!(matches!(
            to_fixed(1e12, Path::new("x"), "rate"),
            Err(DataLoadError::InvalidValue { .. })
        ));
        assert_eq!(to_fixed(2.5, Path::new("x"), "rate").unwrap(), fixed(2.5));
    }

    // -----------------------------------------------------------------------
    // Planner settings
    // -----------------------------------------------------------------------

    #[test]
    fn planner_file_overrides_defaults() {
        let dir = make_test_dir("planner");
        fs::write(dir.join("catalog.toml"), SMELTING_TOML).unwrap();
        fs::write(
            dir.join("planner.json"),
            r#"{"tolerance": 0.5, "max_iterations": 20, "time_budget_ms": 1500}"#,
        )
        .unwrap();

        let loaded = load_dir(&dir).unwrap();
        assert_eq!(loaded.settings.solver.tolerance, fixed(0.5));
        assert_eq!(loaded.settings.solver.max_iterations, 20);
        assert_eq!(loaded.settings.search.max_expansions, None);
        assert_eq!(
            loaded.settings.search.time_budget,
            Some(Duration::from_millis(1500))
        );

        let (network, _) = loaded.initialize().unwrap();
        assert_eq!(network.solver_config().max_iterations, 20);

        cleanup(&dir);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let data = PlannerData {
            tolerance: Some(-1.0),
            ..PlannerData::default()
        };
        assert!(matches!(
            PlannerSettings::from_data(&data, Path::new("planner.toml")),
            Err(DataLoadError::InvalidValue { .. })
        ));
    }
}
