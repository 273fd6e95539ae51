//! Maps an entry's category and slot to the limit bucket its votes count against.
//!
//! The limits live in static rule tables rather than in code paths: each
//! [`RuleSet`] is a list of [`BucketRule`] rows and the first row matching the
//! entry wins. Anything no row matches falls back to a bucket keyed by the
//! entry's own slot with capacity 1, so no entry is ever unlimited.

use std::fmt;
use std::iter;
use std::str::FromStr;

use crate::db::schema::{Category, Entry};

pub const ARMOR_SLOTS: &[&str] = &["helmet", "chest", "cloak", "gloves", "pants", "boots"];
pub const ACCESSORY_SLOTS: &[&str] = &["ring", "necklace", "earring", "bracelet", "belt"];
pub const WEAPON_TYPES: &[&str] = &["gs", "lb", "xb", "sns", "dagger", "spear", "staff", "wand", "orb"];

const SLOT_SYNONYMS: &[(&str, &str)] = &[
    ("head", "helmet"),
    ("cape", "cloak"),
    ("neck", "necklace"),
];

/// Lowercases a slot code and collapses historical spellings onto one code.
pub fn normalize_slot(raw: &str) -> String {
    let slot = raw.trim().to_lowercase();

    SLOT_SYNONYMS.iter()
        .find(|(from, _)| *from == slot)
        .map(|(_, to)| to.to_string())
        .unwrap_or(slot)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    /// Two weapons per context, one per armor slot, two earrings.
    Standard,
    /// Two weapons but at most one of each weapon type, two rings.
    Legacy,
}

impl FromStr for RuleSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(RuleSet::Standard),
            "legacy" => Ok(RuleSet::Legacy),
            other => Err(anyhow::anyhow!("unknown rule set '{}'; expected 'standard' or 'legacy'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every entry of the category shares one bucket.
    Category,
    /// Each slot of the category is its own bucket.
    Slot,
}

/// A tighter limit applied per slot inside a category-wide bucket.
#[derive(Debug, Clone, Copy)]
pub struct PerSlot {
    pub slots: &'static [&'static str],
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BucketRule {
    pub category: Category,
    /// `None` matches any slot.
    pub slot: Option<&'static str>,
    pub scope: Scope,
    pub capacity: usize,
    pub per_slot: Option<PerSlot>,
}

impl BucketRule {
    const fn slotted(category: Category, slot: &'static str, capacity: usize) -> Self {
        Self { category, slot: Some(slot), scope: Scope::Slot, capacity, per_slot: None }
    }

    fn matches(&self, category: Category, slot: &str) -> bool {
        self.category == category && self.slot.map_or(true, |s| s == slot)
    }
}

const STANDARD_RULES: &[BucketRule] = &[
    BucketRule { category: Category::Weapon, slot: None, scope: Scope::Category, capacity: 2, per_slot: None },
    BucketRule::slotted(Category::Armor, "helmet", 1),
    BucketRule::slotted(Category::Armor, "chest", 1),
    BucketRule::slotted(Category::Armor, "cloak", 1),
    BucketRule::slotted(Category::Armor, "gloves", 1),
    BucketRule::slotted(Category::Armor, "pants", 1),
    BucketRule::slotted(Category::Armor, "boots", 1),
    BucketRule::slotted(Category::Accessory, "earring", 2),
    BucketRule::slotted(Category::Accessory, "ring", 1),
    BucketRule::slotted(Category::Accessory, "necklace", 1),
    BucketRule::slotted(Category::Accessory, "bracelet", 1),
    BucketRule::slotted(Category::Accessory, "belt", 1),
];

const LEGACY_RULES: &[BucketRule] = &[
    BucketRule {
        category: Category::Weapon,
        slot: None,
        scope: Scope::Category,
        capacity: 2,
        per_slot: Some(PerSlot { slots: WEAPON_TYPES, capacity: 1 }),
    },
    BucketRule::slotted(Category::Armor, "helmet", 1),
    BucketRule::slotted(Category::Armor, "chest", 1),
    BucketRule::slotted(Category::Armor, "cloak", 1),
    BucketRule::slotted(Category::Armor, "gloves", 1),
    BucketRule::slotted(Category::Armor, "pants", 1),
    BucketRule::slotted(Category::Armor, "boots", 1),
    BucketRule::slotted(Category::Accessory, "ring", 2),
    BucketRule::slotted(Category::Accessory, "earring", 1),
    BucketRule::slotted(Category::Accessory, "necklace", 1),
    BucketRule::slotted(Category::Accessory, "bracelet", 1),
    BucketRule::slotted(Category::Accessory, "belt", 1),
];

/// Identity of a bucket. `slot: None` is the category-wide bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub category: Category,
    pub slot: Option<String>,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.category, &self.slot) {
            (Category::Weapon, None) => f.write_str("weapons"),
            (Category::Armor, None) => f.write_str("armor"),
            (Category::Accessory, None) => f.write_str("accessories"),
            (Category::Weapon, Some(slot)) => write!(f, "weapons/{}", slot),
            (_, Some(slot)) => f.write_str(slot),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: BucketKey,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub bucket: Bucket,
    /// Per-slot bucket nested inside `bucket`, checked after it.
    pub nested: Option<Bucket>,
}

impl Classification {
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        iter::once(&self.bucket).chain(self.nested.iter())
    }

    pub fn contains(&self, key: &BucketKey) -> bool {
        self.buckets().any(|b| &b.key == key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BucketRules {
    set: RuleSet,
    rules: &'static [BucketRule],
}

impl BucketRules {
    pub fn new(set: RuleSet) -> Self {
        let rules = match set {
            RuleSet::Standard => STANDARD_RULES,
            RuleSet::Legacy => LEGACY_RULES,
        };

        Self { set, rules }
    }

    pub fn rule_set(&self) -> RuleSet {
        self.set
    }

    pub fn classify(&self, category: Category, slot: &str) -> Classification {
        let slot = normalize_slot(slot);

        let rule = match self.rules.iter().find(|r| r.matches(category, &slot)) {
            None => {
                return Classification {
                    bucket: Bucket { key: BucketKey { category, slot: Some(slot) }, capacity: 1 },
                    nested: None,
                };
            }
            Some(v) => v,
        };

        match rule.scope {
            Scope::Slot => Classification {
                bucket: Bucket { key: BucketKey { category, slot: Some(slot) }, capacity: rule.capacity },
                nested: None,
            },
            Scope::Category => {
                let nested = rule.per_slot
                    .filter(|per| per.slots.contains(&slot.as_str()))
                    .map(|per| Bucket {
                        key: BucketKey { category, slot: Some(slot.clone()) },
                        capacity: per.capacity,
                    });

                Classification {
                    bucket: Bucket { key: BucketKey { category, slot: None }, capacity: rule.capacity },
                    nested,
                }
            }
        }
    }

    pub fn classify_entry(&self, entry: &Entry) -> Classification {
        self.classify(entry.category, &entry.slot)
    }
}

impl Default for BucketRules {
    fn default() -> Self {
        Self::new(RuleSet::Standard)
    }
}
