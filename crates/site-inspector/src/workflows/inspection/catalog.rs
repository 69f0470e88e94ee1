use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of an inspection component, e.g. `floor_cleanliness`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    Aroma,
    Visual,
    Functional,
    Availability,
}

impl ComponentCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Aroma,
            Self::Visual,
            Self::Functional,
            Self::Availability,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Aroma => "Aroma",
            Self::Visual => "Visual",
            Self::Functional => "Functional",
            Self::Availability => "Availability",
        }
    }
}

/// One rated aspect of a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: ComponentId,
    pub label: String,
    pub category: ComponentCategory,
    pub weight: f64,
    pub required: bool,
    pub allow_photo: bool,
}

/// Validated, immutable set of component definitions.
///
/// Weights do not need to sum to one; scoring normalises by the weight of the
/// components actually rated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComponentCatalog {
    components: Vec<ComponentDefinition>,
}

impl ComponentCatalog {
    pub fn new(components: Vec<ComponentDefinition>) -> Result<Self, CatalogError> {
        if components.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for component in &components {
            if !seen.insert(component.id.clone()) {
                return Err(CatalogError::DuplicateComponent(component.id.clone()));
            }
            if !component.weight.is_finite() || component.weight <= 0.0 {
                return Err(CatalogError::NonPositiveWeight {
                    component: component.id.clone(),
                    weight: component.weight,
                });
            }
        }

        Ok(Self { components })
    }

    /// Built-in catalog for a public sanitation facility.
    pub fn standard() -> Self {
        Self {
            components: standard_components(),
        }
    }

    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    pub fn get(&self, id: &ComponentId) -> Option<&ComponentDefinition> {
        self.components.iter().find(|component| &component.id == id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.get(id).is_some()
    }

    pub fn required(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.components.iter().filter(|component| component.required)
    }

    pub fn in_category(
        &self,
        category: ComponentCategory,
    ) -> impl Iterator<Item = &ComponentDefinition> {
        self.components
            .iter()
            .filter(move |component| component.category == category)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<'de> Deserialize<'de> for ComponentCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let components = Vec::<ComponentDefinition>::deserialize(deserializer)?;
        ComponentCatalog::new(components).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog must define at least one component")]
    Empty,
    #[error("component {0} is defined more than once")]
    DuplicateComponent(ComponentId),
    #[error("component {component} has weight {weight}; weights must be greater than zero")]
    NonPositiveWeight { component: ComponentId, weight: f64 },
}

fn definition(
    id: &str,
    label: &str,
    category: ComponentCategory,
    weight: f64,
    required: bool,
    allow_photo: bool,
) -> ComponentDefinition {
    ComponentDefinition {
        id: ComponentId::new(id),
        label: label.to_string(),
        category,
        weight,
        required,
        allow_photo,
    }
}

fn standard_components() -> Vec<ComponentDefinition> {
    use ComponentCategory::{Aroma, Availability, Functional, Visual};

    vec![
        definition("odor", "Odor", Aroma, 0.15, true, false),
        definition("ventilation", "Ventilation", Aroma, 0.05, false, true),
        definition("floor_cleanliness", "Floor cleanliness", Visual, 0.12, true, true),
        definition("toilet_cleanliness", "Toilet bowl cleanliness", Visual, 0.12, true, true),
        definition("sink_and_mirror", "Sink and mirror", Visual, 0.08, true, true),
        definition("waste_bin", "Waste bin", Visual, 0.05, false, true),
        definition("flush_function", "Flush function", Functional, 0.10, true, true),
        definition("faucet_function", "Faucet function", Functional, 0.08, true, true),
        definition("lighting", "Lighting", Functional, 0.05, false, true),
        definition("door_lock", "Door lock", Functional, 0.05, false, true),
        definition("soap_supply", "Soap supply", Availability, 0.08, true, true),
        definition("tissue_supply", "Tissue supply", Availability, 0.07, true, true),
    ]
}
