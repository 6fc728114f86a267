use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::component::{Component, ComponentDef};
use crate::spec::Direction;

/// A parsed chain description: the run inputs plus the components in
/// chain order.
#[derive(Debug)]
pub struct LoadedChain {
    pub input_power_dbm: f64,
    pub frequency: String,
    pub direction: Direction,
    pub components: Vec<Component>,
}

#[derive(Deserialize, Debug)]
struct ChainConfig {
    input_power_dbm: f64,
    frequency: String,
    #[serde(default = "default_direction")]
    direction: Direction,
    components: Vec<ComponentEntry>,
}

#[derive(Deserialize, Debug)]
struct IncludedConfig {
    components: Vec<ComponentEntry>,
}

fn default_direction() -> Direction {
    Direction::Forward
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ComponentEntry {
    Active {
        name: String,
        gain_db: f64,
        noise_figure_db: f64,
        output_p1db_dbm: Option<f64>,
    },
    Passive {
        name: String,
        loss_db: f64,
    },
    Antenna {
        name: String,
        gain_db: f64,
    },
    PropagationLoss {
        name: String,
        distance_cm: f64,
    },
    PhasedArray {
        name: String,
        rows: u32,
        cols: u32,
    },
    /// A full component definition file (the save/load exchange shape),
    /// resolved relative to the including config.
    File {
        path: String,
    },
    /// Another component list spliced in place, resolved relative to the
    /// including config.
    Include {
        path: String,
    },
}

/// Load a chain description from a TOML file. Inline entries are declared
/// at the config's frequency with the same specs in both directions.
pub fn load_chain(path: &str) -> Result<LoadedChain, Box<dyn std::error::Error>> {
    let config_content = fs::read_to_string(path)?;
    let config: ChainConfig = toml::from_str(&config_content)?;

    let mut components = Vec::new();
    let config_path = Path::new(path);
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    load_components_recursive(
        config.components,
        &config.frequency,
        &mut components,
        base_dir,
    )?;

    Ok(LoadedChain {
        input_power_dbm: config.input_power_dbm,
        frequency: config.frequency,
        direction: config.direction,
        components,
    })
}

fn load_components_recursive(
    entries: Vec<ComponentEntry>,
    frequency: &str,
    components: &mut Vec<Component>,
    base_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in entries {
        match entry {
            ComponentEntry::Active {
                name,
                gain_db,
                noise_figure_db,
                output_p1db_dbm,
            } => {
                components.push(Component::active(
                    name,
                    frequency,
                    gain_db,
                    noise_figure_db,
                    output_p1db_dbm,
                )?);
            }
            ComponentEntry::Passive { name, loss_db } => {
                components.push(Component::passive(name, frequency, loss_db)?);
            }
            ComponentEntry::Antenna { name, gain_db } => {
                components.push(Component::antenna(name, frequency, gain_db)?);
            }
            ComponentEntry::PropagationLoss { name, distance_cm } => {
                components.push(Component::propagation_loss(name, frequency, distance_cm)?);
            }
            ComponentEntry::PhasedArray { name, rows, cols } => {
                components.push(Component::phased_array(name, frequency, rows, cols)?);
            }
            ComponentEntry::File { path } => {
                // definition files may also be relative to the config file
                let full_path = base_dir.join(path);
                let content = fs::read_to_string(&full_path)?;
                let def: ComponentDef = toml::from_str(&content)?;
                components.push(Component::from_def(def)?);
            }
            ComponentEntry::Include { path } => {
                let included_path = base_dir.join(&path);
                let content = fs::read_to_string(&included_path)?;
                let included: IncludedConfig = toml::from_str(&content)?;

                let new_base_dir = included_path.parent().unwrap_or_else(|| Path::new("."));
                load_components_recursive(included.components, frequency, components, new_base_dir)?;
            }
        }
    }
    Ok(())
}

/// Write a component's definition (raw dB-domain specs, category
/// configuration, merged members) to a TOML file.
pub fn save_component(path: &str, component: &Component) -> Result<(), Box<dyn std::error::Error>> {
    let text = toml::to_string_pretty(&component.to_def())?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_simple_chain() {
        let loaded = load_chain("tests/files/simple_chain.toml").unwrap();
        assert_eq!(loaded.input_power_dbm, -30.0);
        assert_eq!(loaded.frequency, "1.0");
        assert_eq!(loaded.direction, Direction::Forward);
        assert_eq!(loaded.components.len(), 3);
        assert_eq!(loaded.components[0].name, "LNA");
    }

    #[test]
    fn direction_defaults_to_forward() {
        let config: ChainConfig = toml::from_str(
            r#"
            input_power_dbm = -70.0
            frequency = "6.0"
            components = []
            "#,
        )
        .unwrap();
        assert_eq!(config.direction, Direction::Forward);
    }

    #[test]
    fn load_include_directive() {
        let loaded = load_chain("tests/files/include/main.toml").unwrap();
        // 1 local + 2 included + 1 local
        assert_eq!(loaded.components.len(), 4);
        assert_eq!(loaded.components[1].name, "Front LNA");
    }

    #[test]
    fn load_definition_file_entry() {
        let loaded = load_chain("tests/files/with_definition.toml").unwrap();
        assert_eq!(loaded.components.len(), 2);
        let lna = &loaded.components[0];
        assert_eq!(lna.available_frequencies(), vec!["1.0", "3.5"]);
    }

    #[test]
    fn save_and_reload_component_definition() {
        let mut dir = std::env::temp_dir();
        dir.push("linkbudget_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("saved_array_def.toml");

        let component = Component::phased_array("Array", "28", 4, 4).unwrap();
        save_component(path.to_str().unwrap(), &component).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let def: ComponentDef = toml::from_str(&content).unwrap();
        assert_eq!(def, component.to_def());
    }
}
