//! Save snapshot (schema v2) as the progression kernel sees it.
//!
//! Fields the kernel reads or writes are typed. Everything else (player
//! profile, equipment, meta, migration info) rides along untouched in
//! `extra` so a round trip never drops caller data.

use crate::core::balance::World;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const SAVE_V2_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveProgression {
    pub difficulty_index: u32,
    pub world: World,
    pub major_stage_name: String,
    pub sub_stage_name: String,
    pub rebirth_count: u32,
    #[serde(default)]
    pub unlocked_nodes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveCurrencies {
    pub spirit_coin: u64,
    pub rebirth_essence: u64,
    pub qi: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveInventoryItem {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMaterialItem {
    pub material_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveInventory {
    #[serde(default)]
    pub items: Vec<SaveInventoryItem>,
    #[serde(default)]
    pub materials: Vec<SaveMaterialItem>,
}

impl SaveInventory {
    /// Quantity held of `item_id`, summed over duplicate entries.
    pub fn quantity(&self, item_id: &str) -> u32 {
        self.items
            .iter()
            .filter(|i| i.item_id == item_id)
            .map(|i| i.quantity)
            .fold(0u32, u32::saturating_add)
    }

    /// Remove up to `count` of `item_id`, first entries first. Quantities
    /// never go below zero.
    pub fn consume(&mut self, item_id: &str, count: u32) {
        let mut remaining = count;
        for item in self.items.iter_mut().filter(|i| i.item_id == item_id) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(item.quantity);
            item.quantity -= take;
            remaining -= take;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSettings {
    pub auto_battle: bool,
    pub auto_skill: bool,
    pub auto_breakthrough: bool,
    pub auto_tribulation: bool,
    pub battle_speed: u8,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            auto_battle: true,
            auto_skill: true,
            auto_breakthrough: true,
            auto_tribulation: false,
            battle_speed: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTimestamps {
    pub last_login_epoch_ms: u64,
    pub save_epoch_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePityCounters {
    pub breakthrough_fail_streak: u32,
    pub tribulation_fail_streak: u32,
    #[serde(default)]
    pub equipment_reroll_pity: u32,
}

/// A versioned save snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveV2 {
    pub version: u32,
    pub progression: SaveProgression,
    pub currencies: SaveCurrencies,
    #[serde(default)]
    pub inventory: SaveInventory,
    #[serde(default)]
    pub settings: SaveSettings,
    #[serde(default)]
    pub timestamps: SaveTimestamps,
    #[serde(default)]
    pub pity_counters: SavePityCounters,
    /// Fields the kernel does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SaveV2 {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded.
    ///
    /// Two snapshots with equal fingerprints are byte-identical once
    /// serialized, which is how determinism is checked across runs.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
