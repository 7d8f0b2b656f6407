use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Canonical item categories. Free-form inputs are folded onto these via
/// [`ItemCategory::canonical`]; anything unrecognized lands on `Generic`.
#[derive(
    Deserialize,
    Serialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Thruster,
    Reactor,
    Generator,
    Robonaut,
    Constructor,
    Refinery,
    Radiator,
    Storage,
    Fuel,
    RawMaterial,
    FinishedMaterial,
    Generic,
}

impl ItemCategory {
    /// Fold a free-form category string onto the canonical set. Lookup is
    /// case-insensitive; unknown inputs map to `Generic`.
    pub fn canonical(raw: &str) -> ItemCategory {
        let key = raw.trim().to_lowercase();
        if let Ok(cat) = key.parse::<ItemCategory>() {
            return cat;
        }
        match key.as_str() {
            "thrusters" | "engine" | "engines" => ItemCategory::Thruster,
            "reactors" | "fission" | "fusion" => ItemCategory::Reactor,
            "generators" | "power_generator" | "power" => ItemCategory::Generator,
            "robot" | "robots" | "drone" | "drones" | "robonauts" => ItemCategory::Robonaut,
            "refineries" => ItemCategory::Refinery,
            "constructors" | "builder" | "builders" | "surface_constructor" => {
                ItemCategory::Constructor
            }
            "radiators" | "cooler" | "cooling" => ItemCategory::Radiator,
            "tank" | "tanks" | "cargo" | "wet_storage" | "dry_storage" => ItemCategory::Storage,
            "fuels" | "propellant" | "propellants" => ItemCategory::Fuel,
            "raw" | "raw_materials" | "ore" | "ores" | "feedstock" => ItemCategory::RawMaterial,
            "finished" | "finished_materials" | "alloy" | "alloys" | "metal" | "metals" => {
                ItemCategory::FinishedMaterial
            }
            _ => ItemCategory::Generic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Thruster => "Thruster",
            ItemCategory::Reactor => "Reactor",
            ItemCategory::Generator => "Generator",
            ItemCategory::Robonaut => "Robonaut",
            ItemCategory::Constructor => "Constructor",
            ItemCategory::Refinery => "Refinery",
            ItemCategory::Radiator => "Radiator",
            ItemCategory::Storage => "Storage",
            ItemCategory::Fuel => "Fuel",
            ItemCategory::RawMaterial => "Raw Material",
            ItemCategory::FinishedMaterial => "Finished Material",
            ItemCategory::Generic => "Generic",
        }
    }

    /// Coarse grouping used by catalog payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemCategory::Thruster
            | ItemCategory::Reactor
            | ItemCategory::Generator
            | ItemCategory::Robonaut
            | ItemCategory::Constructor
            | ItemCategory::Refinery
            | ItemCategory::Radiator
            | ItemCategory::Storage => "ship_component",
            ItemCategory::Fuel | ItemCategory::RawMaterial | ItemCategory::FinishedMaterial => {
                "material"
            }
            ItemCategory::Generic => "unknown",
        }
    }

    pub fn is_ship_component(&self) -> bool {
        self.kind() == "ship_component"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_maps_to_itself() {
        assert_eq!(ItemCategory::canonical("thruster"), ItemCategory::Thruster);
        assert_eq!(ItemCategory::canonical("reactor"), ItemCategory::Reactor);
        assert_eq!(ItemCategory::canonical("storage"), ItemCategory::Storage);
    }

    #[test]
    fn aliases_fold_onto_canonical() {
        assert_eq!(ItemCategory::canonical("engines"), ItemCategory::Thruster);
        assert_eq!(ItemCategory::canonical("propellant"), ItemCategory::Fuel);
        assert_eq!(ItemCategory::canonical("tanks"), ItemCategory::Storage);
        assert_eq!(ItemCategory::canonical("ore"), ItemCategory::RawMaterial);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(ItemCategory::canonical("Thruster"), ItemCategory::Thruster);
        assert_eq!(ItemCategory::canonical(" ENGINES "), ItemCategory::Thruster);
    }

    #[test]
    fn unknown_falls_back_to_generic() {
        assert_eq!(
            ItemCategory::canonical("xyzzy_unknown"),
            ItemCategory::Generic
        );
        assert_eq!(ItemCategory::canonical(""), ItemCategory::Generic);
    }
}
