//! Catalog loading functionality.
//!
//! The reference catalog is read from four CSV files located in a data
//! directory (`items.csv`, `buildings.csv`, `recipes.csv` and
//! `world_resources.csv`). A copy of the default data is embedded into the
//! binary so the library works without any files on disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::de::DeserializeOwned;

use crate::error::{PlannerError, Result};
use crate::models::{
    Building, BuildingRow, Item, ItemRow, Recipe, RecipePart, RecipeRow, WorldResource, WorldResourceRow,
};

const EMBEDDED_ITEMS: &str = include_str!("../data/items.csv");
const EMBEDDED_BUILDINGS: &str = include_str!("../data/buildings.csv");
const EMBEDDED_RECIPES: &str = include_str!("../data/recipes.csv");
const EMBEDDED_WORLD_RESOURCES: &str = include_str!("../data/world_resources.csv");

/// Immutable reference tables: items, recipes, buildings and world resources.
///
/// Every entity is addressable both by its string id and by its stable
/// numeric index. The catalog also keeps, per item, the list of recipes that
/// produce it so the solver can expand the recipe graph without scanning.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    recipes: Vec<Recipe>,
    buildings: Vec<Building>,
    world_resources: Vec<Option<WorldResource>>,
    item_ids: HashMap<String, usize>,
    recipe_ids: HashMap<String, usize>,
    building_ids: HashMap<String, usize>,
    producers: Vec<Vec<usize>>,
}

impl Catalog {
    /// Builds a catalog from parsed CSV rows, resolving every reference.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Catalog`] for duplicate ids, references to
    /// unknown items or buildings, recipes without products, non-positive
    /// cycle times and malformed `ItemId:amount` lists.
    pub fn from_rows(
        items: Vec<ItemRow>,
        buildings: Vec<BuildingRow>,
        recipes: Vec<RecipeRow>,
        world_resources: Vec<WorldResourceRow>,
    ) -> Result<Self> {
        let mut catalog = Catalog::default();

        for row in items {
            let index = catalog.items.len();
            if catalog.item_ids.insert(row.id.clone(), index).is_some() {
                return Err(PlannerError::Catalog(format!("duplicate item id '{}'", row.id)));
            }
            catalog.items.push(Item {
                id: row.id,
                name: row.name,
                unit: row.unit,
                producible: row.producible,
                index,
            });
        }

        for row in buildings {
            let index = catalog.buildings.len();
            if catalog.building_ids.insert(row.id.clone(), index).is_some() {
                return Err(PlannerError::Catalog(format!("duplicate building id '{}'", row.id)));
            }
            catalog.buildings.push(Building {
                id: row.id,
                name: row.name,
                area: row.area,
                power: row.power,
                somersloop_slots: row.somersloop_slots,
                index,
            });
        }

        catalog.producers = vec![Vec::new(); catalog.items.len()];
        for row in recipes {
            let index = catalog.recipes.len();
            if catalog.recipe_ids.insert(row.id.clone(), index).is_some() {
                return Err(PlannerError::Catalog(format!("duplicate recipe id '{}'", row.id)));
            }
            if !(row.time > 0.0) {
                return Err(PlannerError::Catalog(format!(
                    "recipe '{}' has non-positive cycle time {}",
                    row.id, row.time
                )));
            }
            let building = catalog.building_index(&row.building).ok_or_else(|| {
                PlannerError::Catalog(format!(
                    "recipe '{}' references unknown building '{}'",
                    row.id, row.building
                ))
            })?;
            let ingredients = catalog.parse_parts(&row.id, &row.ingredients)?;
            let products = catalog.parse_parts(&row.id, &row.products)?;
            if products.is_empty() {
                return Err(PlannerError::Catalog(format!("recipe '{}' has no products", row.id)));
            }
            for product in &products {
                catalog.producers[product.item].push(index);
            }
            catalog.recipes.push(Recipe {
                id: row.id,
                name: row.name,
                ingredients,
                products,
                time: row.time,
                building,
                alternate: row.alternate,
                index,
            });
        }

        catalog.world_resources = vec![None; catalog.items.len()];
        for row in world_resources {
            let item = catalog.item_index(&row.id).ok_or_else(|| {
                PlannerError::Catalog(format!("world resource '{}' is not a known item", row.id))
            })?;
            catalog.world_resources[item] = Some(WorldResource {
                item,
                max: row.max,
                weighted_max: row.weighted_max,
            });
        }

        Ok(catalog)
    }

    /// Returns the catalog compiled into the binary.
    ///
    /// # Example
    ///
    /// ```
    /// use ficsplan::data::Catalog;
    ///
    /// let catalog = Catalog::embedded().unwrap();
    /// assert!(catalog.item_index("SteelIngot").is_some());
    /// ```
    pub fn embedded() -> Result<Self> {
        Self::from_rows(
            read_rows(EMBEDDED_ITEMS.as_bytes())?,
            read_rows(EMBEDDED_BUILDINGS.as_bytes())?,
            read_rows(EMBEDDED_RECIPES.as_bytes())?,
            read_rows(EMBEDDED_WORLD_RESOURCES.as_bytes())?,
        )
    }

    // Parses "ItemId:amount;ItemId:amount" into resolved parts.
    fn parse_parts(&self, recipe: &str, list: &str) -> Result<Vec<RecipePart>> {
        let mut parts = Vec::new();
        for entry in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, amount) = entry.split_once(':').ok_or_else(|| {
                PlannerError::Catalog(format!("recipe '{}': expected ItemId:amount, got '{}'", recipe, entry))
            })?;
            let amount: f64 = amount.trim().parse().map_err(|_| {
                PlannerError::Catalog(format!("recipe '{}': invalid amount in '{}'", recipe, entry))
            })?;
            if !(amount > 0.0) || !amount.is_finite() {
                return Err(PlannerError::Catalog(format!(
                    "recipe '{}': amount must be positive in '{}'",
                    recipe, entry
                )));
            }
            let item = self.item_index(id.trim()).ok_or_else(|| {
                PlannerError::Catalog(format!("recipe '{}' references unknown item '{}'", recipe, id.trim()))
            })?;
            parts.push(RecipePart { item, amount });
        }
        Ok(parts)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// Returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Indices handed out by this catalog
    /// are always valid.
    pub fn item(&self, index: usize) -> &Item {
        &self.items[index]
    }

    /// Returns the recipe at `index`. Panics on an index not issued by this catalog.
    pub fn recipe(&self, index: usize) -> &Recipe {
        &self.recipes[index]
    }

    /// Returns the building at `index`. Panics on an index not issued by this catalog.
    pub fn building(&self, index: usize) -> &Building {
        &self.buildings[index]
    }

    pub fn item_index(&self, id: &str) -> Option<usize> {
        self.item_ids.get(id).copied()
    }

    pub fn recipe_index(&self, id: &str) -> Option<usize> {
        self.recipe_ids.get(id).copied()
    }

    pub fn building_index(&self, id: &str) -> Option<usize> {
        self.building_ids.get(id).copied()
    }

    /// Returns the world availability of an item, if it can be extracted.
    pub fn world_resource(&self, item: usize) -> Option<&WorldResource> {
        self.world_resources.get(item).and_then(Option::as_ref)
    }

    pub fn is_world_resource(&self, item: usize) -> bool {
        self.world_resource(item).is_some()
    }

    /// Iterates over all world resources in item order.
    pub fn world_resources(&self) -> impl Iterator<Item = &WorldResource> {
        self.world_resources.iter().flatten()
    }

    /// Indices of the recipes listing `item` among their products, in
    /// catalog order.
    pub fn recipes_producing(&self, item: usize) -> &[usize] {
        self.producers.get(item).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Deserializes every row of a CSV document.
fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Loads one CSV file from disk.
///
/// # Arguments
///
/// * `path` - Path to the CSV file
///
/// # Returns
///
/// Every row of the file, or an error if the file cannot be opened or a row
/// does not match `T`.
pub fn load_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| PlannerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(file)
}

/// Loads the complete catalog from a data directory.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ficsplan::data::load_catalog;
///
/// let catalog = load_catalog(Path::new("data")).unwrap();
/// println!("Loaded {} recipes", catalog.recipes().len());
/// ```
pub fn load_catalog(data_dir: &Path) -> Result<Catalog> {
    let catalog = Catalog::from_rows(
        load_rows(&data_dir.join("items.csv"))?,
        load_rows(&data_dir.join("buildings.csv"))?,
        load_rows(&data_dir.join("recipes.csv"))?,
        load_rows(&data_dir.join("world_resources.csv"))?,
    )?;
    tracing::debug!(
        items = catalog.items().len(),
        recipes = catalog.recipes().len(),
        buildings = catalog.buildings().len(),
        dir = %data_dir.display(),
        "loaded catalog"
    );
    Ok(catalog)
}
