//! Per-connection choice of packet variants.

use std::collections::HashMap;

use schema::{NegotiatedCaps, PacketDef, PacketType, VariantDef, VariantId};
use tracing::{debug, error};

use crate::error::{CodecError, CodecResult};

/// Memoized variant choice per packet type.
///
/// The first variant whose condition holds wins. Once chosen, a variant stays
/// in use for the lifetime of the connection even if capabilities change.
#[derive(Debug, Clone, Default)]
pub struct VariantResolver {
    chosen: HashMap<PacketType, (usize, VariantId)>,
}

impl VariantResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variant of `def` to use on this connection.
    pub fn resolve<'d>(
        &mut self,
        def: &'d PacketDef,
        caps: &NegotiatedCaps,
    ) -> CodecResult<&'d VariantDef> {
        if let Some(&(position, id)) = self.chosen.get(&def.packet_type) {
            if let Some(variant) = def.variant_at(position).filter(|v| v.id == id) {
                return Ok(variant);
            }
        }

        let Some((position, variant)) = def
            .variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.condition.evaluate(caps))
        else {
            error!(
                packet = %def.packet_type,
                name = %def.name,
                "no variant matches the negotiated capabilities"
            );
            return Err(CodecError::NoMatchingVariant {
                packet_type: def.packet_type,
                name: def.name.clone(),
            });
        };

        debug!(packet = %def.packet_type, name = %def.name, variant = variant.id, "resolved variant");
        self.chosen.insert(def.packet_type, (position, variant.id));
        Ok(variant)
    }

    /// The variant chosen for `packet_type`, if resolved yet.
    #[must_use]
    pub fn resolved(&self, packet_type: PacketType) -> Option<VariantId> {
        self.chosen.get(&packet_type).map(|&(_, id)| id)
    }

    /// Forgets every choice.
    pub fn reset(&mut self) {
        self.chosen.clear();
    }
}
