use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Strength coins charged per current level when upgrading a skill.
pub const SKILL_UPGRADE_COST_PER_LEVEL: i64 = 100;

/// Select coins charged per card draw.
pub const CARD_DRAW_COST: i64 = 10;

/// The four kinds of catalog content a profile can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Achievement,
    Skill,
    Card,
    Item,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 4] = [
        CatalogKind::Achievement,
        CatalogKind::Skill,
        CatalogKind::Card,
        CatalogKind::Item,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Achievement => "achievement",
            CatalogKind::Skill => "skill",
            CatalogKind::Card => "card",
            CatalogKind::Item => "item",
        }
    }

    /// Catalog table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Achievement => "achievements",
            CatalogKind::Skill => "skills",
            CatalogKind::Card => "cards",
            CatalogKind::Item => "items",
        }
    }

    /// Ownership table linking users to entries of this kind.
    pub fn owned_table(&self) -> &'static str {
        match self {
            CatalogKind::Achievement => "user_achievements",
            CatalogKind::Skill => "user_skills",
            CatalogKind::Card => "user_cards",
            CatalogKind::Item => "user_items",
        }
    }

    /// Foreign-key column in the ownership table.
    pub fn owned_column(&self) -> &'static str {
        match self {
            CatalogKind::Achievement => "achievement_id",
            CatalogKind::Skill => "skill_id",
            CatalogKind::Card => "card_id",
            CatalogKind::Item => "item_id",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Route segments use the plural ("/catalog/skills"), bodies the singular.
        let lower = s.to_lowercase();
        CatalogKind::ALL
            .into_iter()
            .find(|kind| lower == kind.as_str() || lower == kind.table())
            .ok_or_else(|| format!("Unknown catalog kind: {}", s))
    }
}

/// Card rarity, with its draw weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    /// Relative draw weight out of 100.
    pub fn weight(&self) -> u32 {
        match self {
            Rarity::Common => 60,
            Rarity::Rare => 25,
            Rarity::Epic => 12,
            Rarity::Legendary => 3,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "common" => Ok(Rarity::Common),
            "rare" => Ok(Rarity::Rare),
            "epic" => Ok(Rarity::Epic),
            "legendary" => Ok(Rarity::Legendary),
            _ => Err(format!("Unknown rarity: {}", s)),
        }
    }
}

/// One catalog entry. `max_level` is only set for skills, `rarity` only for cards.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub kind: CatalogKind,
    pub name: String,
    pub description: String,
    pub max_level: Option<i32>,
    pub rarity: Option<Rarity>,
    pub created_at: DateTime<Utc>,
}

/// DTO for inserting a catalog entry.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub kind: CatalogKind,
    pub name: String,
    pub description: String,
    pub max_level: Option<i32>,
    pub rarity: Option<Rarity>,
}

impl NewCatalogEntry {
    /// Check the kind-specific fields. Skills default to `max_level` 10 and
    /// cards to `common`; other kinds reject both fields.
    pub fn validated(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() || self.name.chars().count() > 64 {
            return Err(AppError::ValidationError(
                "name must be 1 to 64 characters".into(),
            ));
        }

        match self.kind {
            CatalogKind::Skill => {
                let max_level = self.max_level.unwrap_or(10);
                if max_level < 1 {
                    return Err(AppError::ValidationError(
                        "max_level must be at least 1".into(),
                    ));
                }
                self.max_level = Some(max_level);
                if self.rarity.is_some() {
                    return Err(AppError::ValidationError(
                        "rarity only applies to cards".into(),
                    ));
                }
            }
            CatalogKind::Card => {
                self.rarity = Some(self.rarity.unwrap_or(Rarity::Common));
                if self.max_level.is_some() {
                    return Err(AppError::ValidationError(
                        "max_level only applies to skills".into(),
                    ));
                }
            }
            CatalogKind::Achievement | CatalogKind::Item => {
                if self.max_level.is_some() || self.rarity.is_some() {
                    return Err(AppError::ValidationError(format!(
                        "{} entries take only name and description",
                        self.kind
                    )));
                }
            }
        }

        Ok(self)
    }
}

/// A catalog entry as owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct OwnedEntry {
    pub kind: CatalogKind,
    pub entry_id: i64,
    pub name: String,
    pub description: String,
    /// Skill level.
    pub level: Option<i32>,
    pub max_level: Option<i32>,
    /// Card or item count.
    pub quantity: Option<i32>,
    pub rarity: Option<Rarity>,
    /// When the entry was first acquired (unlock time for achievements).
    pub acquired_at: DateTime<Utc>,
}

/// Cost in strength coins to take a skill from `current_level` to the next one.
pub fn skill_upgrade_cost(current_level: i32) -> i64 {
    SKILL_UPGRADE_COST_PER_LEVEL * i64::from(current_level.max(1))
}

/// Pick a rarity by weight, restricted to rarities that actually have cards.
///
/// Returns `None` when `available` is empty.
pub fn draw_rarity<R: Rng + ?Sized>(available: &[Rarity], rng: &mut R) -> Option<Rarity> {
    let total: u32 = available.iter().map(Rarity::weight).sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.random_range(0..total);
    for rarity in available {
        let weight = rarity.weight();
        if roll < weight {
            return Some(*rarity);
        }
        roll -= weight;
    }
    available.last().copied()
}
