#![no_main]

use std::sync::Arc;

use codec::{CodecLimits, Connection, ConnectionConfig, Role, WireLimits};
use libfuzzer_sys::fuzz_target;
use schema::{
    CapPredicate, Capabilities, FieldCodec, FieldDef, PacketDef, Registry, VariantDef,
};

fn registry() -> Registry {
    Registry::builder()
        .packet(
            PacketDef::new(10, "unit_info")
                .field(FieldDef::new("id", FieldCodec::uint(2)).key())
                .field(FieldDef::new("hp", FieldCodec::uint(1)))
                .field(FieldDef::new("veteran", FieldCodec::bool()).folded())
                .field(FieldDef::new("name", FieldCodec::string(16)))
                .field(FieldDef::new("x", FieldCodec::float(2, 10))),
        )
        .packet(
            PacketDef::new(20, "research_info")
                .field(FieldDef::new("inventions", FieldCodec::sparse_array(FieldCodec::uint(1), 88)))
                .field(FieldDef::new("count", FieldCodec::uint(1)))
                .field(FieldDef::new(
                    "routes",
                    FieldCodec::array_sized_by(FieldCodec::sint(2), 1, 8),
                )),
        )
        .packet(
            PacketDef::new(30, "ruleset_control")
                .field(FieldDef::new("num_units", FieldCodec::uint(1)))
                .variant(VariantDef::new(1, CapPredicate::has("big")).field_as(0, FieldCodec::uint(4)))
                .variant(VariantDef::new(0, CapPredicate::Always).field(0)),
        )
        .packet(
            PacketDef::new(40, "chat_msg")
                .no_delta()
                .field(FieldDef::new("message", FieldCodec::string(64))),
        )
        .build()
        .unwrap()
}

fuzz_target!(|data: &[u8]| {
    let caps = Capabilities::parse("big");
    let config = ConnectionConfig::new(Role::Client, caps.clone(), caps)
        .with_limits(CodecLimits::for_testing())
        .with_wire_limits(WireLimits::for_testing());
    let mut conn = Connection::new(Arc::new(registry()), config);

    // Feed the input in uneven chunks so frames straddle pushes.
    let mut idx = 0usize;
    while idx < data.len() {
        let len = usize::from(data[idx] % 32).saturating_add(1);
        idx += 1;
        let end = (idx + len).min(data.len());
        if conn.receive_bytes(&data[idx..end]).is_err() {
            conn.reset();
        }
        idx = end;

        loop {
            match conn.poll_packet() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    conn.reset();
                    break;
                }
            }
        }
    }
});
