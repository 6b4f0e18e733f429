use std::sync::Arc;

use codec::{
    CacheDirection, CodecError, Connection, ConnectionConfig, FieldValue, Message, MessageKey,
    PacketHooks, ReceivedPacket, Role, SendOutcome,
};
use demo_schema::{
    chat, demo_registry, CityInfo, GameInfo, ResearchInfo, TileInfo, ATTRIBUTE_CHUNK_BYTES,
    PACKET_ATTRIBUTE_CHUNK, PACKET_CHAT_MSG, PACKET_CITY_INFO, PACKET_CITY_REMOVE,
    PACKET_GAME_INFO, PACKET_RESEARCH_INFO, PACKET_RULESET_CONTROL, PACKET_TILE_INFO, TECH_KNOWN,
    TECH_PREREQS_KNOWN,
};
use schema::{Capabilities, PacketType};

fn session(caps: &str) -> (Connection, Connection) {
    let registry = Arc::new(demo_registry().unwrap());
    let config = |role| ConnectionConfig::new(role, Capabilities::parse(caps), Capabilities::parse(caps));
    (
        Connection::new(Arc::clone(&registry), config(Role::Server)),
        Connection::new(registry, config(Role::Client)),
    )
}

fn deliver(server: &mut Connection, client: &mut Connection) -> Vec<ReceivedPacket> {
    client.receive_bytes(&server.take_outbound()).unwrap();
    let mut packets = Vec::new();
    while let Some(packet) = client.poll_packet().unwrap() {
        packets.push(packet);
    }
    packets
}

fn ty(raw: u16) -> PacketType {
    PacketType::new(raw)
}

#[test]
fn tile_updates_send_only_what_changed() {
    let (mut server, mut client) = session("");
    let mut tile = TileInfo {
        tile: 4100,
        terrain: 3,
        known: false,
        owner: 0,
        label: String::new(),
    };
    server.send(ty(PACKET_TILE_INFO), tile.to_message()).unwrap();
    assert_eq!(
        server.take_outbound(),
        vec![0x00, 0x0B, 15, 0x00, 0x00, 0x10, 0x04, 0b0000_1101, 3, 0, 0]
    );

    tile.known = true;
    tile.owner = 2;
    server.send(ty(PACKET_TILE_INFO), tile.to_message()).unwrap();
    assert_eq!(
        server.take_outbound(),
        vec![0x00, 0x09, 15, 0x00, 0x00, 0x10, 0x04, 0b0000_0110, 2]
    );

    server.reset();
    server.send(ty(PACKET_TILE_INFO), tile.to_message()).unwrap();
    let packets = deliver(&mut server, &mut client);
    assert_eq!(TileInfo::from_message(&packets[0].message), Some(tile));
}

#[test]
fn city_lifecycle_with_remove() {
    let (mut server, mut client) = session("");
    let mut city = CityInfo::founded(5, 1, 4100, "Roma");
    server.send(ty(PACKET_CITY_INFO), city.to_message()).unwrap();

    city.size = 2;
    city.food_stock = -3;
    city.walls = true;
    city.build(10);
    city.trade_routes = vec![6, 9];
    server.send(ty(PACKET_CITY_INFO), city.to_message()).unwrap();
    assert_eq!(
        server.send(ty(PACKET_CITY_INFO), city.to_message()).unwrap(),
        SendOutcome::Unchanged
    );

    let packets = deliver(&mut server, &mut client);
    assert_eq!(packets.len(), 2);
    assert_eq!(CityInfo::from_message(&packets[1].message), Some(city.clone()));

    server
        .send(ty(PACKET_CITY_REMOVE), Message::new(vec![5u16.into()]))
        .unwrap();
    deliver(&mut server, &mut client);
    let key = MessageKey::uint(5);
    assert_eq!(
        server.cache(CacheDirection::Sent).lookup(ty(PACKET_CITY_INFO), &key),
        None
    );
    assert_eq!(
        client
            .cache(CacheDirection::Received)
            .lookup(ty(PACKET_CITY_INFO), &key),
        None
    );

    assert!(matches!(
        server.send(ty(PACKET_CITY_INFO), city.to_message()).unwrap(),
        SendOutcome::Sent { .. }
    ));
    let packets = deliver(&mut server, &mut client);
    assert_eq!(CityInfo::from_message(&packets[0].message), Some(city));
}

#[test]
fn city_with_mismatched_route_count_is_rejected() {
    let (mut server, _) = session("");
    let city = CityInfo::founded(5, 1, 4100, "Roma");
    let mut message = city.to_message();
    message.set(8, 2u8);
    let err = server.send(ty(PACKET_CITY_INFO), message).unwrap_err();
    assert!(matches!(err, CodecError::InvalidValue { .. }));
    assert_eq!(server.cache(CacheDirection::Sent).entries(), 0);
}

#[test]
fn research_sends_changed_inventions_only() {
    let (mut server, mut client) = session("");
    let mut research = ResearchInfo {
        researching: 12,
        bulbs: 40,
        ..ResearchInfo::default()
    };
    server.send(ty(PACKET_RESEARCH_INFO), research.to_message()).unwrap();
    assert_eq!(
        server.take_outbound(),
        vec![0x00, 0x0B, 60, 0b0000_0111, 0x00, 12, 0x00, 0x00, 0x00, 40, 0xFF]
    );
    assert_eq!(server.resolved_variant(ty(PACKET_RESEARCH_INFO)), Some(0));

    research.inventions[3] = TECH_KNOWN;
    research.inventions[40] = TECH_PREREQS_KNOWN;
    server.send(ty(PACKET_RESEARCH_INFO), research.to_message()).unwrap();
    assert_eq!(
        server.take_outbound(),
        vec![0x00, 0x09, 60, 0b0000_0100, 3, TECH_KNOWN, 40, TECH_PREREQS_KNOWN, 0xFF]
    );

    server.reset();
    server.send(ty(PACKET_RESEARCH_INFO), research.to_message()).unwrap();
    let packets = deliver(&mut server, &mut client);
    assert_eq!(ResearchInfo::from_message(&packets[0].message), Some(research));
}

#[test]
fn research_variant_follows_capabilities() {
    let (mut server, mut client) = session("tech_upkeep");
    let research = ResearchInfo {
        tech_upkeep: 7,
        ..ResearchInfo::default()
    };
    server.send(ty(PACKET_RESEARCH_INFO), research.to_message()).unwrap();
    assert_eq!(server.resolved_variant(ty(PACKET_RESEARCH_INFO)), Some(1));
    let packets = deliver(&mut server, &mut client);
    assert_eq!(ResearchInfo::from_message(&packets[0].message), Some(research.clone()));

    let (mut server, mut client) = session("");
    server.send(ty(PACKET_RESEARCH_INFO), research.to_message()).unwrap();
    let packets = deliver(&mut server, &mut client);
    let received = ResearchInfo::from_message(&packets[0].message).unwrap();
    assert_eq!(received.tech_upkeep, 0);
}

#[test]
fn game_info_is_forced_and_quantized() {
    let (mut server, mut client) = session("");
    let info = GameInfo {
        turn: 120,
        year: -1500,
        warming_chance: 0.456,
        spacerace: true,
    };
    server.send(ty(PACKET_GAME_INFO), info.to_message()).unwrap();
    assert_eq!(
        server.send(ty(PACKET_GAME_INFO), info.to_message()).unwrap(),
        SendOutcome::Sent { bytes: 10 }
    );

    let packets = deliver(&mut server, &mut client);
    assert_eq!(packets.len(), 2);
    let received = GameInfo::from_message(&packets[1].message).unwrap();
    assert_eq!(received.turn, 120);
    assert_eq!(received.year, -1500);
    assert!((received.warming_chance - 0.46).abs() < 1e-9);
    assert!(received.spacerace);
}

#[test]
fn chat_hook_rewrites_outgoing_text() {
    struct Censor;

    impl PacketHooks for Censor {
        fn pre_send(&mut self, _packet_type: PacketType, message: &mut Message) {
            let Some(text) = message.get(0).and_then(FieldValue::as_str) else {
                return;
            };
            let cleaned = text.replace("darn", "****");
            message.set(0, cleaned);
        }
    }

    let (mut server, mut client) = session("");
    server.set_hooks(Box::new(Censor));
    server.send(ty(PACKET_CHAT_MSG), chat("darn barbarians")).unwrap();
    server.send(ty(PACKET_CHAT_MSG), chat("darn barbarians")).unwrap();
    let packets = deliver(&mut server, &mut client);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].message, chat("**** barbarians"));
}

#[test]
fn attribute_chunks_are_sent_raw() {
    let (mut server, mut client) = session("");
    let data: Vec<u8> = (0..ATTRIBUTE_CHUNK_BYTES).map(|b| b as u8).collect();
    let chunk = Message::new(vec![0u32.into(), 64u32.into(), FieldValue::Bytes(data)]);

    server.send(ty(PACKET_ATTRIBUTE_CHUNK), chunk.clone()).unwrap();
    let packets = deliver(&mut server, &mut client);
    assert_eq!(packets[0].message, chunk);

    let short = Message::new(vec![0u32.into(), 3u32.into(), FieldValue::Bytes(vec![1, 2, 3])]);
    assert!(matches!(
        server.send(ty(PACKET_ATTRIBUTE_CHUNK), short),
        Err(CodecError::InvalidValue { .. })
    ));
}

#[test]
fn ruleset_variant_widens_counts() {
    let counts = Message::new(vec![300u16.into(), 90u16.into()]);

    let (mut server, mut client) = session("big_rulesets");
    server.send(ty(PACKET_RULESET_CONTROL), counts.clone()).unwrap();
    assert_eq!(
        server.take_outbound(),
        vec![0x00, 0x08, 155, 0b0000_0011, 0x01, 0x2C, 0x00, 90]
    );
    server.reset();
    server.send(ty(PACKET_RULESET_CONTROL), counts.clone()).unwrap();
    assert_eq!(deliver(&mut server, &mut client)[0].message, counts);

    let (mut server, _) = session("");
    assert!(server.send(ty(PACKET_RULESET_CONTROL), counts).is_err());
    assert_eq!(server.resolved_variant(ty(PACKET_RULESET_CONTROL)), Some(1));
}
