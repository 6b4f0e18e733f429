//! Reference registry of game packets and typed state used by the demos,
//! integration tests and benches.

use codec::{FieldValue, Message};
use schema::{
    CapPredicate, Direction, FieldCodec, FieldDef, HookPoints, PacketDef, Registry, SchemaResult,
    VariantDef,
};

pub const PACKET_TILE_INFO: u16 = 15;
pub const PACKET_GAME_INFO: u16 = 16;
pub const PACKET_CHAT_MSG: u16 = 25;
pub const PACKET_CITY_REMOVE: u16 = 30;
pub const PACKET_CITY_INFO: u16 = 31;
pub const PACKET_ATTRIBUTE_CHUNK: u16 = 47;
pub const PACKET_RESEARCH_INFO: u16 = 60;
pub const PACKET_RULESET_CONTROL: u16 = 155;

/// Number of technologies tracked by `research_info`.
pub const A_LAST: u16 = 88;
/// Improvement bits carried by `city_info`.
pub const B_LAST: u16 = 64;
pub const MAX_TRADE_ROUTES: u16 = 4;
pub const ATTRIBUTE_CHUNK_BYTES: u16 = 64;
pub const WARMING_FACTOR: u32 = 100;

/// Technology state values inside `research_info.inventions`.
pub const TECH_UNKNOWN: u8 = 0;
pub const TECH_PREREQS_KNOWN: u8 = 1;
pub const TECH_KNOWN: u8 = 2;

/// Builds the demo registry.
pub fn demo_registry() -> SchemaResult<Registry> {
    Registry::builder()
        .packet(tile_info())
        .packet(game_info())
        .packet(chat_msg())
        .packet(
            PacketDef::new(PACKET_CITY_REMOVE, "city_remove")
                .direction(Direction::ServerToClient)
                .no_delta()
                .cancels(PACKET_CITY_INFO)
                .field(FieldDef::new("id", FieldCodec::uint(2)).key()),
        )
        .packet(city_info())
        .packet(attribute_chunk())
        .packet(research_info())
        .packet(ruleset_control())
        .build()
}

fn tile_info() -> PacketDef {
    PacketDef::new(PACKET_TILE_INFO, "tile_info")
        .direction(Direction::ServerToClient)
        .field(FieldDef::new("tile", FieldCodec::uint(4)).key())
        .field(FieldDef::new("terrain", FieldCodec::uint(1)))
        .field(FieldDef::new("known", FieldCodec::bool()).folded())
        .field(FieldDef::new("owner", FieldCodec::uint(1)))
        .field(FieldDef::new("label", FieldCodec::string(32)))
}

fn game_info() -> PacketDef {
    PacketDef::new(PACKET_GAME_INFO, "game_info")
        .direction(Direction::ServerToClient)
        .force_full()
        .field(FieldDef::new("turn", FieldCodec::uint(2)))
        .field(FieldDef::new("year", FieldCodec::sint(2)))
        .field(FieldDef::new(
            "warming_chance",
            FieldCodec::float(2, WARMING_FACTOR),
        ))
        .field(FieldDef::new("spacerace", FieldCodec::bool()).folded())
}

fn chat_msg() -> PacketDef {
    PacketDef::new(PACKET_CHAT_MSG, "chat_msg")
        .no_delta()
        .hooks(HookPoints {
            pre_send: true,
            post_receive: false,
        })
        .field(FieldDef::new("message", FieldCodec::string(512)))
}

fn city_info() -> PacketDef {
    PacketDef::new(PACKET_CITY_INFO, "city_info")
        .direction(Direction::ServerToClient)
        .field(FieldDef::new("id", FieldCodec::uint(2)).key())
        .field(FieldDef::new("owner", FieldCodec::uint(1)))
        .field(FieldDef::new("tile", FieldCodec::uint(4)))
        .field(FieldDef::new("name", FieldCodec::string(48)))
        .field(FieldDef::new("size", FieldCodec::uint(1)))
        .field(FieldDef::new("food_stock", FieldCodec::sint(2)))
        .field(FieldDef::new("walls", FieldCodec::bool()).folded())
        .field(FieldDef::new("improvements", FieldCodec::bitvector(B_LAST)))
        .field(FieldDef::new("num_trade_routes", FieldCodec::uint(1)))
        .field(FieldDef::new(
            "trade_routes",
            FieldCodec::array_sized_by(FieldCodec::uint(2), 8, MAX_TRADE_ROUTES),
        ))
}

fn attribute_chunk() -> PacketDef {
    PacketDef::new(PACKET_ATTRIBUTE_CHUNK, "player_attribute_chunk")
        .no_delta()
        .field(FieldDef::new("offset", FieldCodec::uint(4)).key())
        .field(FieldDef::new("total_length", FieldCodec::uint(4)))
        .field(FieldDef::new("data", FieldCodec::bytes(ATTRIBUTE_CHUNK_BYTES)))
}

fn research_info() -> PacketDef {
    let def = PacketDef::new(PACKET_RESEARCH_INFO, "research_info")
        .direction(Direction::ServerToClient)
        .field(FieldDef::new("researching", FieldCodec::uint(2)))
        .field(FieldDef::new("bulbs", FieldCodec::sint(4)))
        .field(FieldDef::new(
            "inventions",
            FieldCodec::sparse_array(FieldCodec::uint(1), A_LAST),
        ))
        .field(FieldDef::new("tech_upkeep", FieldCodec::uint(2)));
    let with_upkeep = VariantDef::all_fields(1, CapPredicate::has("tech_upkeep"), &def);
    let plain = VariantDef::new(0, CapPredicate::Always).field(0).field(1).field(2);
    def.variant(with_upkeep).variant(plain)
}

fn ruleset_control() -> PacketDef {
    let narrow = |id, condition| VariantDef::new(id, condition).field(0).field(1);
    PacketDef::new(PACKET_RULESET_CONTROL, "ruleset_control")
        .direction(Direction::ServerToClient)
        .field(FieldDef::new("num_unit_types", FieldCodec::uint(1)))
        .field(FieldDef::new("num_impr_types", FieldCodec::uint(1)))
        .variant(
            VariantDef::new(2, CapPredicate::has("big_rulesets"))
                .field_as(0, FieldCodec::uint(2))
                .field_as(1, FieldCodec::uint(2)),
        )
        .variant(narrow(1, CapPredicate::lacks("big_rulesets")))
}

fn uint<T: TryFrom<u64>>(value: &FieldValue) -> Option<T> {
    T::try_from(value.as_uint()?).ok()
}

fn sint<T: TryFrom<i64>>(value: &FieldValue) -> Option<T> {
    T::try_from(value.as_sint()?).ok()
}

/// One map tile as seen by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInfo {
    pub tile: u32,
    pub terrain: u8,
    pub known: bool,
    pub owner: u8,
    pub label: String,
}

impl TileInfo {
    pub fn to_message(&self) -> Message {
        Message::new(vec![
            self.tile.into(),
            self.terrain.into(),
            self.known.into(),
            self.owner.into(),
            self.label.as_str().into(),
        ])
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let [tile, terrain, known, owner, label] = message.values() else {
            return None;
        };
        Some(Self {
            tile: uint(tile)?,
            terrain: uint(terrain)?,
            known: known.as_bool()?,
            owner: uint(owner)?,
            label: label.as_str()?.to_owned(),
        })
    }
}

/// Global game state, sent every turn.
#[derive(Debug, Clone, PartialEq)]
pub struct GameInfo {
    pub turn: u16,
    pub year: i16,
    pub warming_chance: f64,
    pub spacerace: bool,
}

impl GameInfo {
    pub fn to_message(&self) -> Message {
        Message::new(vec![
            self.turn.into(),
            self.year.into(),
            self.warming_chance.into(),
            self.spacerace.into(),
        ])
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let [turn, year, warming_chance, spacerace] = message.values() else {
            return None;
        };
        Some(Self {
            turn: uint(turn)?,
            year: sint(year)?,
            warming_chance: warming_chance.as_float()?,
            spacerace: spacerace.as_bool()?,
        })
    }
}

/// A city as seen by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityInfo {
    pub id: u16,
    pub owner: u8,
    pub tile: u32,
    pub name: String,
    pub size: u8,
    pub food_stock: i16,
    pub walls: bool,
    pub improvements: [u8; B_LAST as usize / 8],
    pub trade_routes: Vec<u16>,
}

impl CityInfo {
    /// A freshly founded city.
    pub fn founded(id: u16, owner: u8, tile: u32, name: &str) -> Self {
        Self {
            id,
            owner,
            tile,
            name: name.to_owned(),
            size: 1,
            food_stock: 0,
            walls: false,
            improvements: [0; B_LAST as usize / 8],
            trade_routes: Vec::new(),
        }
    }

    /// Sets the bit of improvement `index`.
    pub fn build(&mut self, index: usize) {
        if let Some(byte) = self.improvements.get_mut(index / 8) {
            *byte |= 1 << (index % 8);
        }
    }

    #[must_use]
    pub fn has_improvement(&self, index: usize) -> bool {
        self.improvements
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    pub fn to_message(&self) -> Message {
        let routes = u8::try_from(self.trade_routes.len()).unwrap_or(u8::MAX);
        Message::new(vec![
            self.id.into(),
            self.owner.into(),
            self.tile.into(),
            self.name.as_str().into(),
            self.size.into(),
            self.food_stock.into(),
            self.walls.into(),
            FieldValue::BitVector(self.improvements.to_vec()),
            routes.into(),
            FieldValue::Array(self.trade_routes.iter().copied().map(FieldValue::from).collect()),
        ])
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let [id, owner, tile, name, size, food_stock, walls, improvements, _, trade_routes] =
            message.values()
        else {
            return None;
        };
        let FieldValue::BitVector(bits) = improvements else {
            return None;
        };
        Some(Self {
            id: uint(id)?,
            owner: uint(owner)?,
            tile: uint(tile)?,
            name: name.as_str()?.to_owned(),
            size: uint(size)?,
            food_stock: sint(food_stock)?,
            walls: walls.as_bool()?,
            improvements: bits.as_slice().try_into().ok()?,
            trade_routes: trade_routes
                .as_array()?
                .iter()
                .map(uint)
                .collect::<Option<_>>()?,
        })
    }
}

/// Research state of the receiving player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchInfo {
    pub researching: u16,
    pub bulbs: i32,
    pub inventions: Vec<u8>,
    pub tech_upkeep: u16,
}

impl Default for ResearchInfo {
    fn default() -> Self {
        Self {
            researching: 0,
            bulbs: 0,
            inventions: vec![TECH_UNKNOWN; usize::from(A_LAST)],
            tech_upkeep: 0,
        }
    }
}

impl ResearchInfo {
    pub fn to_message(&self) -> Message {
        Message::new(vec![
            self.researching.into(),
            self.bulbs.into(),
            FieldValue::Array(self.inventions.iter().copied().map(FieldValue::from).collect()),
            self.tech_upkeep.into(),
        ])
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let [researching, bulbs, inventions, tech_upkeep] = message.values() else {
            return None;
        };
        Some(Self {
            researching: uint(researching)?,
            bulbs: sint(bulbs)?,
            inventions: inventions
                .as_array()?
                .iter()
                .map(uint)
                .collect::<Option<_>>()?,
            tech_upkeep: uint(tech_upkeep)?,
        })
    }
}

/// A `chat_msg` carrying `text`.
pub fn chat(text: &str) -> Message {
    Message::new(vec![text.into()])
}
