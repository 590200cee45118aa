//! Label taxonomy: the six judgment categories and their option → code tables
//!
//! Each category offers a fixed list of human-readable options. Every option
//! carries the canonical code that gets persisted. A [`Choice`] can only be
//! obtained through [`Taxonomy::choose`], so turning a choice into its code
//! never fails.
//!
//! # Default tables
//!
//! | Category | Options |
//! |----------|---------|
//! | hateful | NIL, discriminatory, hate speech |
//! | insults | NIL, insult |
//! | sexual | NIL, not appropriate for minors, not appropriate for all ages |
//! | physical_violence | NIL, physical violence |
//! | self_harm | NIL, ideation/intent, actual self-harm/sucide |
//! | all_other_misconduct | NIL, generally not socially accepted, illegal |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::{Error, Result};

/// Code persisted for the "no applicable label" option of every category
pub const NO_LABEL_CODE: &str = "FALSE";

/// Option label offered for "no applicable label" in the default tables
pub const NO_LABEL_OPTION: &str = "NIL";

const DEFAULT_DEFINITIONS: &str = include_str!("definitions.md");

/// One of the six independent judgment axes
///
/// Declaration order is the output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hateful,
    Insults,
    Sexual,
    PhysicalViolence,
    SelfHarm,
    AllOtherMisconduct,
}

impl Category {
    /// All categories in output column order
    pub const ALL: [Category; 6] = [
        Category::Hateful,
        Category::Insults,
        Category::Sexual,
        Category::PhysicalViolence,
        Category::SelfHarm,
        Category::AllOtherMisconduct,
    ];

    /// Output column name
    pub fn key(&self) -> &'static str {
        match self {
            Category::Hateful => "hateful",
            Category::Insults => "insults",
            Category::Sexual => "sexual",
            Category::PhysicalViolence => "physical_violence",
            Category::SelfHarm => "self_harm",
            Category::AllOtherMisconduct => "all_other_misconduct",
        }
    }

    /// Heading shown above the option group
    pub fn title(&self) -> &'static str {
        match self {
            Category::Hateful => "1. Hateful",
            Category::Insults => "2. Insults",
            Category::Sexual => "3. Sexual",
            Category::PhysicalViolence => "4. Physical Violence",
            Category::SelfHarm => "5. Self-harm",
            Category::AllOtherMisconduct => "6. All Other Misconduct",
        }
    }

    /// Zero-based position in [`Category::ALL`]
    pub fn position(&self) -> usize {
        *self as usize
    }

    /// Parse a category key
    ///
    /// Accepts the short forms `insult` and `misconduct` used by older UI
    /// widgets in addition to the column names.
    pub fn from_key(key: &str) -> Option<Category> {
        match key {
            "hateful" => Some(Category::Hateful),
            "insults" | "insult" => Some(Category::Insults),
            "sexual" => Some(Category::Sexual),
            "physical_violence" => Some(Category::PhysicalViolence),
            "self_harm" => Some(Category::SelfHarm),
            "all_other_misconduct" | "misconduct" => Some(Category::AllOtherMisconduct),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A selectable option and the canonical code it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOption {
    pub label: String,
    pub code: String,
}

impl LabelOption {
    pub fn new(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

/// Validated option table for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryMapping {
    category: Category,
    options: Vec<LabelOption>,
}

impl CategoryMapping {
    /// Build a mapping, rejecting empty tables, blank or duplicate labels,
    /// and tables without a `"FALSE"` option
    pub fn new(category: Category, options: Vec<LabelOption>) -> Result<Self> {
        if options.is_empty() {
            return Err(Error::Config(format!("Category '{}' has no options", category)));
        }

        let mut seen = HashSet::new();
        for option in &options {
            if option.label.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Category '{}' has an option with an empty label",
                    category
                )));
            }
            if option.code.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Option '{}' of category '{}' has an empty code",
                    option.label, category
                )));
            }
            if !seen.insert(option.label.as_str()) {
                return Err(Error::Config(format!(
                    "Category '{}' lists option '{}' more than once",
                    category, option.label
                )));
            }
        }

        if !options.iter().any(|o| o.code == NO_LABEL_CODE) {
            return Err(Error::Config(format!(
                "Category '{}' needs an option mapping to \"{}\"",
                category, NO_LABEL_CODE
            )));
        }

        Ok(Self { category, options })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Options in presentation order
    pub fn options(&self) -> &[LabelOption] {
        &self.options
    }

    /// Option labels in presentation order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.label.as_str())
    }

    pub fn lookup(&self, label: &str) -> Option<&LabelOption> {
        self.options.iter().find(|o| o.label == label)
    }
}

/// A validated selection for one category
///
/// Only [`Taxonomy::choose`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    category: Category,
    label: String,
    code: String,
}

impl Choice {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Canonical code for this selection
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Per-category option tables, one per [`Category`], plus the reference
/// definitions shown to labellers
#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    mappings: Vec<CategoryMapping>,
    definitions: String,
}

impl Taxonomy {
    /// Build a taxonomy from a table per category
    ///
    /// Every category must be present.
    pub fn new(
        mut tables: BTreeMap<Category, Vec<LabelOption>>,
        definitions: impl Into<String>,
    ) -> Result<Self> {
        let mut mappings = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let options = tables.remove(&category).ok_or_else(|| {
                Error::Config(format!("No option table for category '{}'", category))
            })?;
            mappings.push(CategoryMapping::new(category, options)?);
        }

        Ok(Self {
            mappings,
            definitions: definitions.into(),
        })
    }

    /// Replace individual category tables and/or the definitions text
    pub fn with_overrides(
        mut self,
        tables: BTreeMap<Category, Vec<LabelOption>>,
        definitions: Option<String>,
    ) -> Result<Self> {
        for (category, options) in tables {
            self.mappings[category.position()] = CategoryMapping::new(category, options)?;
        }
        if let Some(definitions) = definitions {
            self.definitions = definitions;
        }
        Ok(self)
    }

    pub fn mapping(&self, category: Category) -> &CategoryMapping {
        &self.mappings[category.position()]
    }

    /// All category mappings in output column order
    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }

    pub fn definitions(&self) -> &str {
        &self.definitions
    }

    /// Pure lookup of the canonical code for an option label
    pub fn map(&self, category: Category, label: &str) -> Option<&str> {
        self.mapping(category).lookup(label).map(|o| o.code.as_str())
    }

    /// Turn a submitted option label into a [`Choice`]
    ///
    /// This is the only boundary where free text enters; anything not in
    /// the category's table is rejected here.
    pub fn choose(&self, category: Category, label: &str) -> Result<Choice> {
        let option = self.mapping(category).lookup(label).ok_or_else(|| {
            Error::InvalidInput(format!(
                "'{}' is not an option for category '{}'",
                label, category
            ))
        })?;

        Ok(Choice {
            category,
            label: option.label.clone(),
            code: option.code.clone(),
        })
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        let nil = || LabelOption::new(NO_LABEL_OPTION, NO_LABEL_CODE);

        let mut tables = BTreeMap::new();
        tables.insert(
            Category::Hateful,
            vec![
                nil(),
                LabelOption::new("discriminatory", "level_1_discriminatory"),
                LabelOption::new("hate speech", "level_2_hate_speech"),
            ],
        );
        tables.insert(
            Category::Insults,
            vec![nil(), LabelOption::new("insult", "insult")],
        );
        tables.insert(
            Category::Sexual,
            vec![
                nil(),
                LabelOption::new("not appropriate for minors", "level_1_not_appropriate_for_minors"),
                LabelOption::new("not appropriate for all ages", "level_2_not_appropriate_for_all_ages"),
            ],
        );
        tables.insert(
            Category::PhysicalViolence,
            vec![nil(), LabelOption::new("physical violence", "physical_violence")],
        );
        tables.insert(
            Category::SelfHarm,
            vec![
                nil(),
                LabelOption::new("ideation/intent", "level_1_self_harm_intent"),
                LabelOption::new("actual self-harm/sucide", "level_2_self_harm_action"),
            ],
        );
        tables.insert(
            Category::AllOtherMisconduct,
            vec![
                nil(),
                LabelOption::new("generally not socially accepted", "level_1_not_socially_accepted"),
                LabelOption::new("illegal", "level_2_illegal_activities"),
            ],
        );

        // The built-in tables satisfy every CategoryMapping rule
        match Taxonomy::new(tables, DEFAULT_DEFINITIONS.trim()) {
            Ok(taxonomy) => taxonomy,
            Err(e) => unreachable!("built-in taxonomy is invalid: {}", e),
        }
    }
}

/// Per-category selection slots for the record on screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selections {
    slots: [Option<Choice>; 6],
}

impl Selections {
    pub fn set(&mut self, choice: Choice) {
        let position = choice.category().position();
        self.slots[position] = Some(choice);
    }

    pub fn clear(&mut self, category: Category) {
        self.slots[category.position()] = None;
    }

    pub fn clear_all(&mut self) {
        self.slots = Default::default();
    }

    pub fn get(&self, category: Category) -> Option<&Choice> {
        self.slots[category.position()].as_ref()
    }

    /// Categories still lacking a selection, in column order
    pub fn missing(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.slots[c.position()].is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Canonical codes for all six categories, or the missing categories
    pub fn codes(&self) -> std::result::Result<[String; 6], Vec<Category>> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(std::array::from_fn(|i| {
            self.slots[i]
                .as_ref()
                .map(|c| c.code().to_string())
                .unwrap_or_default()
        }))
    }
}
