// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::sync::OnceLock;

use dtfabric_definitions::ByteOrder;

static HOST_BYTE_ORDER: OnceLock<ByteOrder> = OnceLock::new();

/// The host's native byte order, resolved once per process (§9: "resolve
/// once at startup; record the choice on the Map").
///
/// A [`Definition`](dtfabric_definitions::Definition) with `byte_order:
/// native` is resolved against this value the first time any Map built from
/// it decodes, not at schema-read time — see the `SPEC_FULL.md` decision on
/// why integer pins reject `native`.
pub fn host_byte_order() -> ByteOrder {
    *HOST_BYTE_ORDER.get_or_init(|| {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    })
}

/// Resolves `order`, substituting [`host_byte_order`] for [`ByteOrder::Native`].
pub(crate) fn resolve(order: ByteOrder) -> ByteOrder {
    match order {
        ByteOrder::Native => host_byte_order(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_native_to_a_concrete_order() {
        assert!(matches!(
            resolve(ByteOrder::Native),
            ByteOrder::BigEndian | ByteOrder::LittleEndian
        ));
        assert_eq!(resolve(ByteOrder::BigEndian), ByteOrder::BigEndian);
    }
}
