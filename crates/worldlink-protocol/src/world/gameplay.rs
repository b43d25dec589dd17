//! Gameplay bodies: items, equipment, trade, quests, groups, abilities.

use crate::codec::{read_list, read_strings, write_list, write_strings, WireBody};
use crate::{PropertyMap, ProtocolError, WireReader, WireWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquireResponse {
    pub object_id: i64,
    pub success: bool,
}

impl WireBody for AcquireResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            object_id: r.read_i64()?,
            success: r.read_bool()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.object_id);
        w.write_bool(self.success);
    }
}

/// Request to put an item into, or take it out of, an equipment slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EquipRequest {
    pub object_id: i64,
    pub slot: String,
}

impl WireBody for EquipRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            object_id: r.read_i64()?,
            slot: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.object_id);
        w.write_string(&self.slot);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EquipResponse {
    pub object_id: i64,
    pub slot: String,
    pub success: bool,
}

impl WireBody for EquipResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            object_id: r.read_i64()?,
            slot: r.read_string()?,
            success: r.read_bool()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.object_id);
        w.write_string(&self.slot);
        w.write_bool(self.success);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivateItem {
    pub item_id: i64,
    pub target_id: i64,
}

impl WireBody for ActivateItem {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            item_id: r.read_i64()?,
            target_id: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.item_id);
        w.write_i64(self.target_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryEntry {
    pub item_id: i64,
    pub container_id: i32,
    pub slot_id: i32,
    pub name: String,
    pub icon: String,
}

/// The full contents of the player's bags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryUpdate {
    pub entries: Vec<InventoryEntry>,
}

impl WireBody for InventoryUpdate {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            entries: read_list(r, |r| {
                Ok(InventoryEntry {
                    item_id: r.read_i64()?,
                    container_id: r.read_i32()?,
                    slot_id: r.read_i32()?,
                    name: r.read_string()?,
                    icon: r.read_string()?,
                })
            })?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_list(w, &self.entries, |w, e| {
            w.write_i64(e.item_id);
            w.write_i32(e.container_id);
            w.write_i32(e.slot_id);
            w.write_string(&e.name);
            w.write_string(&e.icon);
        });
    }
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradePartner {
    pub partner_id: i64,
}

impl WireBody for TradePartner {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            partner_id: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.partner_id);
    }
}

/// The player's side of a trade: offered item ids and accept/cancel flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TradeOfferRequest {
    pub partner_id: i64,
    pub accepted: bool,
    pub cancelled: bool,
    pub offer: Vec<i64>,
}

impl WireBody for TradeOfferRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            partner_id: r.read_i64()?,
            accepted: r.read_bool()?,
            cancelled: r.read_bool()?,
            offer: read_list(r, |r| r.read_i64())?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.partner_id);
        w.write_bool(self.accepted);
        w.write_bool(self.cancelled);
        write_list(w, &self.offer, |w, id| w.write_i64(*id));
    }
}

/// Both sides of a trade as the server sees them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeOfferUpdate {
    pub partner_id: i64,
    pub accepted_me: bool,
    pub accepted_partner: bool,
    pub offer_me: PropertyMap,
    pub offer_partner: PropertyMap,
}

impl WireBody for TradeOfferUpdate {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            partner_id: r.read_i64()?,
            accepted_me: r.read_bool()?,
            accepted_partner: r.read_bool()?,
            offer_me: PropertyMap::decode(r)?,
            offer_partner: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.partner_id);
        w.write_bool(self.accepted_me);
        w.write_bool(self.accepted_partner);
        self.offer_me.encode(w);
        self.offer_partner.encode(w);
    }
}

/// How a trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeComplete {
    pub partner_id: i64,
    pub status: u8,
}

impl TradeComplete {
    pub const SUCCESS: u8 = 1;
    pub const CANCELLED: u8 = 2;
    pub const FAILED: u8 = 3;

    pub fn succeeded(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

impl WireBody for TradeComplete {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            partner_id: r.read_i64()?,
            status: r.read_u8()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.partner_id);
        w.write_u8(self.status);
    }
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuestInfoRequest {
    pub npc_id: i64,
    pub quest_id: i64,
}

impl WireBody for QuestInfoRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            npc_id: r.read_i64()?,
            quest_id: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.npc_id);
        w.write_i64(self.quest_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestInfoResponse {
    pub npc_id: i64,
    pub quest_id: i64,
    pub title: String,
    pub description: String,
    pub objective: String,
    pub rewards: Vec<String>,
}

impl WireBody for QuestInfoResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            npc_id: r.read_i64()?,
            quest_id: r.read_i64()?,
            title: r.read_string()?,
            description: r.read_string()?,
            objective: r.read_string()?,
            rewards: read_strings(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.npc_id);
        w.write_i64(self.quest_id);
        w.write_string(&self.title);
        w.write_string(&self.description);
        w.write_string(&self.objective);
        write_strings(w, &self.rewards);
    }
}

/// The player accepted or declined a quest offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuestResponse {
    pub npc_id: i64,
    pub quest_id: i64,
    pub accepted: bool,
}

impl WireBody for QuestResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            npc_id: r.read_i64()?,
            quest_id: r.read_i64()?,
            accepted: r.read_bool()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.npc_id);
        w.write_i64(self.quest_id);
        w.write_bool(self.accepted);
    }
}

// ---------------------------------------------------------------------------
// Groups and abilities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupMember {
    pub member_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupInfo {
    pub group_id: i64,
    pub leader_id: i64,
    pub members: Vec<GroupMember>,
}

impl WireBody for GroupInfo {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            group_id: r.read_i64()?,
            leader_id: r.read_i64()?,
            members: read_list(r, |r| {
                Ok(GroupMember {
                    member_id: r.read_i64()?,
                    name: r.read_string()?,
                })
            })?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.group_id);
        w.write_i64(self.leader_id);
        write_list(w, &self.members, |w, m| {
            w.write_i64(m.member_id);
            w.write_string(&m.name);
        });
    }
}

/// Tooltip data for one ability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AbilityInfo {
    pub ability_id: i32,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub cooldowns: Vec<String>,
    pub properties: PropertyMap,
}

impl WireBody for AbilityInfo {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            ability_id: r.read_i32()?,
            name: r.read_string()?,
            icon: r.read_string()?,
            description: r.read_string()?,
            cooldowns: read_strings(r)?,
            properties: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.ability_id);
        w.write_string(&self.name);
        w.write_string(&self.icon);
        w.write_string(&self.description);
        write_strings(w, &self.cooldowns);
        self.properties.encode(w);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbilityEntry {
    pub ability_id: i32,
    pub icon: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbilityUpdate {
    pub abilities: Vec<AbilityEntry>,
}

impl WireBody for AbilityUpdate {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            abilities: read_list(r, |r| {
                Ok(AbilityEntry {
                    ability_id: r.read_i32()?,
                    icon: r.read_string()?,
                    category: r.read_string()?,
                })
            })?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_list(w, &self.abilities, |w, a| {
            w.write_i32(a.ability_id);
            w.write_string(&a.icon);
            w.write_string(&a.category);
        });
    }
}
