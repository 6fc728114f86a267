use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::array::array_gain_db;
use crate::error::{BudgetError, BudgetResult};
use crate::propagation::free_space_path_loss_db;
use crate::spec::{ComponentSpec, Direction, RawSpec};

/// Frequency assigned to a freshly placed component, in GHz.
pub const DEFAULT_FREQUENCY: &str = "1.0";

/// Process-unique handle for a component. Handles key the per-run power
/// side-table and the lineup's connection maps; they are never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

impl ComponentId {
    fn next() -> Self {
        ComponentId(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a free-space segment recomputes its loss from distance or
/// takes a manually entered loss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    Auto,
    Manual,
}

/// Auto-calculator configuration for a free-space path segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    pub distance_cm: f64,
    pub mode: PropagationMode,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            distance_cm: 100.0,
            mode: PropagationMode::Auto,
        }
    }
}

/// Component category. Each variant carries only the configuration it
/// needs; cascade behavior is decided through [`Category::is_passive`]
/// and [`Category::is_antenna`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Category {
    /// Amplifiers, mixers, and anything else with explicit gain/NF/P1dB.
    Active,
    /// Attenuators, filters, dividers, traces: specified by loss.
    Passive,
    /// Antenna apertures. Gain counts toward EIRP and G/T; the stored
    /// noise figure stays out of the receive noise cascade.
    Antenna,
    /// One equivalent component standing in for a collapsed sub-chain.
    /// Keeps the full serialized originals so the collapse can be undone.
    Merged { members: Vec<ComponentDef> },
    /// Free-space path segment, loss recomputed from distance per
    /// declared frequency while in auto mode.
    PropagationLoss { config: PropagationConfig },
    /// Phased array aperture, gain recomputed from the element grid.
    PhasedArray { rows: u32, cols: u32 },
}

impl Category {
    pub fn is_antenna(&self) -> bool {
        matches!(self, Category::Antenna | Category::PhasedArray { .. })
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, Category::Passive | Category::PropagationLoss { .. })
    }

    fn expected_raw_kind(&self) -> &'static str {
        if self.is_passive() {
            "loss"
        } else if matches!(self, Category::Merged { .. }) {
            "derived"
        } else {
            "gain"
        }
    }

    fn accepts(&self, raw: &RawSpec) -> bool {
        raw.kind() == self.expected_raw_kind()
    }

    fn default_raw(&self) -> RawSpec {
        if self.is_passive() {
            RawSpec::Loss { loss_db: 0.0 }
        } else if matches!(self, Category::Merged { .. }) {
            RawSpec::Derived {
                gain_db: 0.0,
                noise_figure_db: 0.0,
                output_p1db_dbm: None,
                active_gain_db: 0.0,
                passive_gain_db: 0.0,
                antenna_gain_db: 0.0,
            }
        } else {
            RawSpec::Gain {
                gain_db: 0.0,
                noise_figure_db: 0.0,
                output_p1db_dbm: None,
            }
        }
    }
}

/// Validate a frequency label: declared as text, compared numerically.
pub fn parse_frequency(text: &str) -> BudgetResult<f64> {
    let ghz: f64 = text
        .trim()
        .parse()
        .map_err(|_| BudgetError::InvalidFrequency(text.to_string()))?;
    if !ghz.is_finite() || ghz <= 0.0 {
        return Err(BudgetError::InvalidFrequency(text.to_string()));
    }
    Ok(ghz)
}

#[derive(Clone, Debug)]
struct SpecEntry {
    raw: RawSpec,
    resolved: ComponentSpec,
}

impl SpecEntry {
    fn resolve(raw: RawSpec, direction: Direction) -> Self {
        let resolved = raw.resolve(direction);
        Self { raw, resolved }
    }
}

#[derive(Clone, Debug)]
struct FrequencyEntry {
    ghz: f64,
    forward: SpecEntry,
    reverse: SpecEntry,
}

impl FrequencyEntry {
    fn with_defaults(ghz: f64, category: &Category) -> Self {
        let raw = category.default_raw();
        Self {
            ghz,
            forward: SpecEntry::resolve(raw.clone(), Direction::Forward),
            reverse: SpecEntry::resolve(raw, Direction::Reverse),
        }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut SpecEntry {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Reverse => &mut self.reverse,
        }
    }

    fn slot(&self, direction: Direction) -> &SpecEntry {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}

/// One stage of a link budget chain: identity, category, and a
/// per-frequency map of forward/reverse specifications. At least one
/// declared frequency always remains.
#[derive(Clone, Debug)]
pub struct Component {
    id: ComponentId,
    pub name: String,
    category: Category,
    specs_by_freq: BTreeMap<String, FrequencyEntry>,
}

impl Component {
    fn bare(name: impl Into<String>, category: Category) -> Self {
        Self {
            id: ComponentId::next(),
            name: name.into(),
            category,
            specs_by_freq: BTreeMap::new(),
        }
    }

    /// A freshly placed component with zeroed specs at the default
    /// frequency (auto-calculated categories fill themselves in).
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        let mut component = Self::bare(name, category);
        component.insert_default_entry(DEFAULT_FREQUENCY, 1.0);
        component.recalculate();
        component
    }

    /// Amplifier/mixer preset: same specs in both directions.
    pub fn active(
        name: impl Into<String>,
        frequency: &str,
        gain_db: f64,
        noise_figure_db: f64,
        output_p1db_dbm: Option<f64>,
    ) -> BudgetResult<Self> {
        let mut component = Self::bare(name, Category::Active);
        let raw = RawSpec::Gain {
            gain_db,
            noise_figure_db,
            output_p1db_dbm,
        };
        component.set_spec(frequency, Direction::Forward, raw.clone())?;
        component.set_spec(frequency, Direction::Reverse, raw)?;
        Ok(component)
    }

    /// Attenuator/filter/divider preset: same loss in both directions.
    pub fn passive(name: impl Into<String>, frequency: &str, loss_db: f64) -> BudgetResult<Self> {
        let mut component = Self::bare(name, Category::Passive);
        let raw = RawSpec::Loss { loss_db };
        component.set_spec(frequency, Direction::Forward, raw.clone())?;
        component.set_spec(frequency, Direction::Reverse, raw)?;
        Ok(component)
    }

    /// Antenna preset: aperture gain, zero noise figure, uncompressible.
    pub fn antenna(name: impl Into<String>, frequency: &str, gain_db: f64) -> BudgetResult<Self> {
        let mut component = Self::bare(name, Category::Antenna);
        let raw = RawSpec::Gain {
            gain_db,
            noise_figure_db: 0.0,
            output_p1db_dbm: None,
        };
        component.set_spec(frequency, Direction::Forward, raw.clone())?;
        component.set_spec(frequency, Direction::Reverse, raw)?;
        Ok(component)
    }

    /// Free-space segment preset; loss computed from the distance.
    pub fn propagation_loss(
        name: impl Into<String>,
        frequency: &str,
        distance_cm: f64,
    ) -> BudgetResult<Self> {
        let mut component = Self::bare(
            name,
            Category::PropagationLoss {
                config: PropagationConfig {
                    distance_cm,
                    mode: PropagationMode::Auto,
                },
            },
        );
        component.add_frequency(frequency)?;
        Ok(component)
    }

    /// Phased-array preset; gain computed from the element grid.
    pub fn phased_array(
        name: impl Into<String>,
        frequency: &str,
        rows: u32,
        cols: u32,
    ) -> BudgetResult<Self> {
        let mut component = Self::bare(name, Category::PhasedArray { rows, cols });
        component.add_frequency(frequency)?;
        Ok(component)
    }

    /// Rebuild a component from its persisted definition. A definition
    /// with no declared frequencies gets the default frequency entry.
    pub fn from_def(def: ComponentDef) -> BudgetResult<Self> {
        let mut component = Self::bare(def.name, def.category);
        for (frequency, raw) in def.specs_by_freq {
            component.set_spec(&frequency, Direction::Forward, raw.forward)?;
            component.set_spec(&frequency, Direction::Reverse, raw.reverse)?;
        }
        if component.specs_by_freq.is_empty() {
            component.insert_default_entry(DEFAULT_FREQUENCY, 1.0);
        }
        component.recalculate();
        Ok(component)
    }

    /// The persisted shape: raw dB-domain specs only, never the caches.
    pub fn to_def(&self) -> ComponentDef {
        let specs_by_freq = self
            .specs_by_freq
            .iter()
            .map(|(frequency, entry)| {
                (
                    frequency.clone(),
                    DirectionalRaw {
                        forward: entry.forward.raw.clone(),
                        reverse: entry.reverse.raw.clone(),
                    },
                )
            })
            .collect();
        ComponentDef {
            name: self.name.clone(),
            category: self.category.clone(),
            specs_by_freq,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Member definitions of a merged component, in chain order.
    pub fn merged_members(&self) -> Option<&[ComponentDef]> {
        match &self.category {
            Category::Merged { members } => Some(members),
            _ => None,
        }
    }

    /// Resolve and store a spec, creating a default-initialized entry
    /// for the frequency (both directions) if it was not declared yet.
    /// Forward and reverse entries are independent for every category.
    pub fn set_spec(
        &mut self,
        frequency: &str,
        direction: Direction,
        raw: RawSpec,
    ) -> BudgetResult<()> {
        let ghz = parse_frequency(frequency)?;
        if !self.category.accepts(&raw) {
            return Err(BudgetError::SpecKindMismatch {
                component: self.name.clone(),
                expected: self.category.expected_raw_kind(),
            });
        }
        let category = &self.category;
        let entry = self
            .specs_by_freq
            .entry(frequency.to_string())
            .or_insert_with(|| FrequencyEntry::with_defaults(ghz, category));
        *entry.slot_mut(direction) = SpecEntry::resolve(raw, direction);
        Ok(())
    }

    pub fn spec(&self, frequency: &str, direction: Direction) -> Option<&ComponentSpec> {
        self.specs_by_freq
            .get(frequency)
            .map(|entry| &entry.slot(direction).resolved)
    }

    pub fn raw_spec(&self, frequency: &str, direction: Direction) -> Option<&RawSpec> {
        self.specs_by_freq
            .get(frequency)
            .map(|entry| &entry.slot(direction).raw)
    }

    /// Declared frequencies, numerically ascending.
    pub fn available_frequencies(&self) -> Vec<String> {
        let mut frequencies: Vec<(&String, f64)> = self
            .specs_by_freq
            .iter()
            .map(|(frequency, entry)| (frequency, entry.ghz))
            .collect();
        frequencies.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        frequencies
            .into_iter()
            .map(|(frequency, _)| frequency.clone())
            .collect()
    }

    /// Declare a frequency with default specs and re-run the
    /// auto-calculator. Declaring an existing frequency is a no-op.
    pub fn add_frequency(&mut self, frequency: &str) -> BudgetResult<()> {
        let ghz = parse_frequency(frequency)?;
        let category = &self.category;
        self.specs_by_freq
            .entry(frequency.to_string())
            .or_insert_with(|| FrequencyEntry::with_defaults(ghz, category));
        self.recalculate();
        Ok(())
    }

    /// Remove a declared frequency. At least one must always remain.
    pub fn remove_frequency(&mut self, frequency: &str) -> BudgetResult<()> {
        if self.specs_by_freq.len() == 1 && self.specs_by_freq.contains_key(frequency) {
            return Err(BudgetError::LastFrequency {
                component: self.name.clone(),
            });
        }
        self.specs_by_freq.remove(frequency);
        Ok(())
    }

    /// Change a free-space segment's distance and recompute its loss.
    pub fn set_distance_cm(&mut self, distance_cm: f64) -> BudgetResult<()> {
        match &mut self.category {
            Category::PropagationLoss { config } => config.distance_cm = distance_cm,
            _ => {
                return Err(BudgetError::CategoryMismatch {
                    component: self.name.clone(),
                    expected: "propagation loss",
                })
            }
        }
        self.recalculate();
        Ok(())
    }

    /// Switch a free-space segment between auto and manual loss entry.
    pub fn set_propagation_mode(&mut self, mode: PropagationMode) -> BudgetResult<()> {
        match &mut self.category {
            Category::PropagationLoss { config } => config.mode = mode,
            _ => {
                return Err(BudgetError::CategoryMismatch {
                    component: self.name.clone(),
                    expected: "propagation loss",
                })
            }
        }
        self.recalculate();
        Ok(())
    }

    /// Resize a phased array's element grid and recompute its gain.
    pub fn set_element_grid(&mut self, rows: u32, cols: u32) -> BudgetResult<()> {
        match &mut self.category {
            Category::PhasedArray {
                rows: current_rows,
                cols: current_cols,
            } => {
                *current_rows = rows;
                *current_cols = cols;
            }
            _ => {
                return Err(BudgetError::CategoryMismatch {
                    component: self.name.clone(),
                    expected: "phased array",
                })
            }
        }
        self.recalculate();
        Ok(())
    }

    /// Re-run the category's auto-calculator over every declared
    /// frequency. A no-op for categories without one.
    fn recalculate(&mut self) {
        #[derive(Clone, Copy)]
        enum Update {
            Path { distance_cm: f64 },
            Grid { rows: u32, cols: u32 },
        }
        let update = match &self.category {
            Category::PropagationLoss { config } if config.mode == PropagationMode::Auto => {
                Update::Path {
                    distance_cm: config.distance_cm,
                }
            }
            Category::PhasedArray { rows, cols } => Update::Grid {
                rows: *rows,
                cols: *cols,
            },
            _ => return,
        };
        for entry in self.specs_by_freq.values_mut() {
            let raw = match update {
                Update::Path { distance_cm } => RawSpec::Loss {
                    loss_db: free_space_path_loss_db(entry.ghz, distance_cm),
                },
                Update::Grid { rows, cols } => RawSpec::Gain {
                    gain_db: array_gain_db(rows, cols),
                    noise_figure_db: 0.0,
                    output_p1db_dbm: None,
                },
            };
            entry.forward = SpecEntry::resolve(raw.clone(), Direction::Forward);
            entry.reverse = SpecEntry::resolve(raw, Direction::Reverse);
        }
    }

    fn insert_default_entry(&mut self, frequency: &str, ghz: f64) {
        let entry = FrequencyEntry::with_defaults(ghz, &self.category);
        self.specs_by_freq.insert(frequency.to_string(), entry);
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({} GHz)",
            self.name,
            self.available_frequencies().join(", ")
        )
    }
}

/// Raw forward/reverse entries for one declared frequency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionalRaw {
    pub forward: RawSpec,
    pub reverse: RawSpec,
}

/// The persisted/exchanged component definition: name, category (with
/// auto-calculator configuration and, for merged components, the
/// recursive member definitions), and the raw dB-domain specs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub specs_by_freq: BTreeMap<String, DirectionalRaw>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_component_has_default_frequency() {
        let component = Component::new("LNA", Category::Active);
        assert_eq!(component.available_frequencies(), vec!["1.0"]);
        let spec = component
            .spec(DEFAULT_FREQUENCY, Direction::Forward)
            .expect("default entry exists");
        assert_eq!(spec.gain_db, 0.0);
    }

    #[test]
    fn set_spec_creates_both_directions() {
        let mut component = Component::new("PA", Category::Active);
        component
            .set_spec(
                "28",
                Direction::Forward,
                RawSpec::Gain {
                    gain_db: 20.0,
                    noise_figure_db: 5.0,
                    output_p1db_dbm: Some(33.0),
                },
            )
            .expect("valid spec");
        // the reverse slot was default-initialized alongside
        let reverse = component
            .spec("28", Direction::Reverse)
            .expect("reverse default exists");
        assert_eq!(reverse.gain_db, 0.0);
    }

    #[test]
    fn frequencies_sort_numerically_not_lexically() {
        let mut component = Component::new("Filter", Category::Passive);
        for frequency in ["9.0", "28", "2.4", "10.5"] {
            component
                .set_spec(frequency, Direction::Forward, RawSpec::Loss { loss_db: 1.0 })
                .expect("valid spec");
        }
        assert_eq!(
            component.available_frequencies(),
            vec!["1.0", "2.4", "9.0", "10.5", "28"]
        );
    }

    #[test]
    fn wrong_spec_kind_is_rejected() {
        let mut component = Component::new("Atten", Category::Passive);
        let result = component.set_spec(
            "1.0",
            Direction::Forward,
            RawSpec::Gain {
                gain_db: 10.0,
                noise_figure_db: 3.0,
                output_p1db_dbm: None,
            },
        );
        assert!(matches!(
            result,
            Err(BudgetError::SpecKindMismatch { .. })
        ));
    }

    #[test]
    fn invalid_frequency_is_rejected() {
        let mut component = Component::new("Atten", Category::Passive);
        for text in ["", "fast", "-2.0", "0"] {
            let result = component.set_spec(text, Direction::Forward, RawSpec::Loss { loss_db: 1.0 });
            assert!(matches!(result, Err(BudgetError::InvalidFrequency(_))), "{text:?}");
        }
    }

    #[test]
    fn last_frequency_cannot_be_removed() {
        let mut component = Component::new("Atten", Category::Passive);
        let result = component.remove_frequency(DEFAULT_FREQUENCY);
        assert!(matches!(result, Err(BudgetError::LastFrequency { .. })));

        component.add_frequency("3.5").expect("valid frequency");
        component
            .remove_frequency(DEFAULT_FREQUENCY)
            .expect("one remains");
        assert_eq!(component.available_frequencies(), vec!["3.5"]);
    }

    #[test]
    fn passive_loss_is_independent_per_direction() {
        let mut component = Component::new("Duplexer", Category::Passive);
        component
            .set_spec("1.0", Direction::Forward, RawSpec::Loss { loss_db: 1.2 })
            .expect("valid spec");
        component
            .set_spec("1.0", Direction::Reverse, RawSpec::Loss { loss_db: 2.8 })
            .expect("valid spec");
        let forward = component.spec("1.0", Direction::Forward).expect("set");
        let reverse = component.spec("1.0", Direction::Reverse).expect("set");
        assert_eq!(forward.gain_db, -1.2);
        assert_eq!(reverse.gain_db, -2.8);
        assert_eq!(reverse.noise_figure_db, 2.8);
    }

    #[test]
    fn propagation_loss_recomputes_with_distance() {
        let mut component =
            Component::propagation_loss("Air", "1.0", 100.0).expect("valid preset");
        let loss_at_1m = -component
            .spec("1.0", Direction::Forward)
            .expect("auto computed")
            .gain_db;
        assert!((loss_at_1m - 32.45).abs() < 0.01, "got {loss_at_1m}");

        component.set_distance_cm(1000.0).expect("is a segment");
        let loss_at_10m = -component
            .spec("1.0", Direction::Forward)
            .expect("auto computed")
            .gain_db;
        assert!((loss_at_10m - loss_at_1m - 20.0).abs() < 0.01);
    }

    #[test]
    fn manual_propagation_mode_keeps_entered_loss() {
        let mut component =
            Component::propagation_loss("Air", "1.0", 100.0).expect("valid preset");
        component
            .set_propagation_mode(PropagationMode::Manual)
            .expect("is a segment");
        component
            .set_spec("1.0", Direction::Forward, RawSpec::Loss { loss_db: 40.0 })
            .expect("valid spec");
        component.set_distance_cm(1.0).expect("is a segment");
        // manual mode: the distance change does not overwrite the loss
        let spec = component.spec("1.0", Direction::Forward).expect("set");
        assert_eq!(spec.gain_db, -40.0);
    }

    #[test]
    fn phased_array_gain_follows_grid() {
        let mut component = Component::phased_array("Array", "28", 4, 4).expect("valid preset");
        let spec = component.spec("28", Direction::Forward).expect("auto computed");
        assert!((spec.gain_db - 12.0412).abs() < 1e-3);

        component.set_element_grid(8, 8).expect("is an array");
        let spec = component.spec("28", Direction::Reverse).expect("auto computed");
        assert!((spec.gain_db - 18.0618).abs() < 1e-3);
    }

    #[test]
    fn auto_calculator_setter_rejects_other_categories() {
        let mut component = Component::new("LNA", Category::Active);
        assert!(matches!(
            component.set_distance_cm(50.0),
            Err(BudgetError::CategoryMismatch { .. })
        ));
        assert!(matches!(
            component.set_element_grid(2, 2),
            Err(BudgetError::CategoryMismatch { .. })
        ));
    }

    #[test]
    fn def_round_trips_through_toml() {
        let component = Component::active("Mixer", "3.5", -7.0, 7.0, Some(15.0))
            .expect("valid preset");
        let def = component.to_def();
        let text = toml::to_string(&def).expect("serializes");
        let back: ComponentDef = toml::from_str(&text).expect("parses");
        assert_eq!(back, def);

        let rebuilt = Component::from_def(back).expect("valid def");
        assert_eq!(
            rebuilt.spec("3.5", Direction::Forward).expect("set").gain_db,
            -7.0
        );
        // resolved reverse spec drops the compression point again
        assert_eq!(
            rebuilt
                .spec("3.5", Direction::Reverse)
                .expect("set")
                .output_p1db_dbm,
            None
        );
    }

    #[test]
    fn ids_are_unique() {
        let a = Component::new("A", Category::Active);
        let b = Component::new("B", Category::Active);
        assert_ne!(a.id(), b.id());
    }
}
