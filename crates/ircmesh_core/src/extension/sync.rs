//! Metadata payloads exchanged with other servers.
//!
//! Only the payload side lives here: which `(name, value)` pairs an entity
//! announces, and how a received pair is applied. Framing and routing belong
//! to the link protocol.

use super::extensible::Extensible;
use super::registry::ExtensionManager;
use log::debug;

/// Network forms of every replicated attachment, sorted by name.
///
/// Attachments whose network form is empty stay local.
pub fn network_metadata(container: &Extensible) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = container
        .entries()
        .filter_map(|(item, value)| {
            let encoded = item.to_network(container, value);
            (!encoded.is_empty()).then(|| (item.meta().name().to_string(), encoded))
        })
        .collect();
    pairs.sort();
    pairs
}

/// Operator-facing forms of every attachment with a non-empty display.
pub fn human_metadata(container: &Extensible) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = container
        .entries()
        .filter_map(|(item, value)| {
            let shown = item.to_human(container, value);
            (!shown.is_empty()).then(|| (item.meta().name().to_string(), shown))
        })
        .collect();
    pairs.sort();
    pairs
}

/// Applies one received metadata pair.
///
/// Returns `false` when no registered descriptor has that name; the peer may
/// simply run a component this server does not.
pub fn apply_metadata(
    manager: &ExtensionManager,
    container: &mut Extensible,
    name: &str,
    value: &str,
) -> bool {
    match manager.get_item(name) {
        Some(item) => {
            item.from_network(container, value);
            true
        }
        None => {
            debug!(
                "event=metadata_unknown module=extension status=ignored item={} kind={}",
                name,
                container.kind().as_str()
            );
            false
        }
    }
}
