//! Pending channel invites kept on connections.
//!
//! # Responsibility
//! - Keep the list of channels a connection has been invited to.
//! - Expire timed invites and release every invite exactly once.
//!
//! # Invariants
//! - At most one invite per channel name (ASCII case-insensitive).
//! - Invites are persisted through the internal form only; they are never
//!   replicated to other servers.

use crate::component::ComponentRef;
use crate::extension::{
    ExtensionError, ExtensionItem, ExtensionKind, ExtensionManager, Extensible, ListExtItem,
    ValueCodec,
};
use log::debug;
use std::cell::Cell;
use std::rc::Rc;

pub const INVITE_ITEM_NAME: &str = "invite";

/// One pending invite. `expires_at == 0` never expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub channel: String,
    pub expires_at: i64,
}

impl Invite {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at != 0 && self.expires_at <= now
    }
}

/// `<channel>,<expires_at>` per invite.
pub struct InviteCodec;

impl ValueCodec<Invite> for InviteCodec {
    fn encode_internal(value: &Invite) -> Option<String> {
        Some(format!("{},{}", value.channel, value.expires_at))
    }

    fn encode_human(value: &Invite) -> Option<String> {
        Some(if value.expires_at == 0 {
            value.channel.clone()
        } else {
            format!("{}(until:{})", value.channel, value.expires_at)
        })
    }

    fn decode_internal(text: &str) -> Option<Invite> {
        let (channel, expires_at) = text.rsplit_once(',')?;
        if channel.is_empty() {
            return None;
        }
        Some(Invite {
            channel: channel.to_string(),
            expires_at: expires_at.parse().ok()?,
        })
    }
}

pub type InviteItem = ListExtItem<Invite, InviteCodec>;

/// Invite bookkeeping for the channel core.
pub struct InviteApi {
    list_ext: Rc<InviteItem>,
    released: Rc<Cell<usize>>,
}

impl InviteApi {
    pub fn new(component: &ComponentRef) -> Result<Self, ExtensionError> {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);
        let list_ext = InviteItem::with_release(
            component,
            INVITE_ITEM_NAME,
            ExtensionKind::Connection,
            move |_, invite: Invite| {
                counter.set(counter.get() + 1);
                debug!(
                    "event=invite_release module=invite status=ok channel={}",
                    invite.channel
                );
            },
        )?;
        Ok(Self { list_ext, released })
    }

    pub fn register(&self, manager: &mut ExtensionManager) -> Result<(), ExtensionError> {
        self.list_ext.register(manager)
    }

    /// Invites the connection to `channel`.
    ///
    /// An existing invite for the same channel gets the new expiry. Returns
    /// whether a new invite was created.
    pub fn create(
        &self,
        connection: &mut Extensible,
        channel: &str,
        expires_at: i64,
    ) -> Result<bool, ExtensionError> {
        if let Some(existing) = self
            .list_ext
            .get_mut(connection)
            .and_then(|list| list.iter_mut().find(|invite| same_channel(invite, channel)))
        {
            existing.expires_at = expires_at;
            return Ok(false);
        }
        self.list_ext.push(
            connection,
            Invite {
                channel: channel.to_string(),
                expires_at,
            },
        )?;
        Ok(true)
    }

    pub fn find<'a>(&self, connection: &'a Extensible, channel: &str) -> Option<&'a Invite> {
        self.list(connection)
            .iter()
            .find(|invite| same_channel(invite, channel))
    }

    /// Removes the invite for `channel`. Returns whether one existed.
    pub fn remove(&self, connection: &mut Extensible, channel: &str) -> bool {
        self.list_ext
            .remove_where(connection, |invite| same_channel(invite, channel))
            > 0
    }

    pub fn list<'a>(&self, connection: &'a Extensible) -> &'a [Invite] {
        self.list_ext.get(connection).unwrap_or_default()
    }

    /// Drops every invite that expired at or before `now`.
    pub fn expire(&self, connection: &mut Extensible, now: i64) -> usize {
        self.list_ext
            .remove_where(connection, |invite| invite.is_expired(now))
    }

    pub fn remove_all(&self, connection: &mut Extensible) -> bool {
        self.list_ext.unset(connection)
    }

    /// Invites released so far, through any path.
    pub fn released_count(&self) -> usize {
        self.released.get()
    }
}

fn same_channel(invite: &Invite, channel: &str) -> bool {
    invite.channel.eq_ignore_ascii_case(channel)
}

#[cfg(test)]
mod tests {
    use super::{Invite, InviteApi, InviteCodec};
    use crate::component::Component;
    use crate::extension::{ExtensionItem, ExtensionKind, Extensible, ValueCodec};

    #[test]
    fn create_refreshes_existing_invite() {
        let component = Component::new("core_channel");
        let invites = InviteApi::new(&component).expect("descriptor");
        let mut connection = Extensible::new(ExtensionKind::Connection);

        assert!(invites.create(&mut connection, "#rust", 100).expect("create"));
        assert!(!invites.create(&mut connection, "#RUST", 0).expect("refresh"));
        assert_eq!(invites.list(&connection).len(), 1);
        assert_eq!(
            invites.find(&connection, "#rust").map(|invite| invite.expires_at),
            Some(0)
        );
        connection.cull();
    }

    #[test]
    fn expire_releases_only_timed_out_invites() {
        let component = Component::new("core_channel");
        let invites = InviteApi::new(&component).expect("descriptor");
        let mut connection = Extensible::new(ExtensionKind::Connection);
        invites.create(&mut connection, "#a", 10).expect("create");
        invites.create(&mut connection, "#b", 0).expect("create");
        invites.create(&mut connection, "#c", 50).expect("create");

        assert_eq!(invites.expire(&mut connection, 10), 1);
        assert_eq!(invites.released_count(), 1);
        assert!(invites.find(&connection, "#a").is_none());

        connection.cull();
        assert_eq!(invites.released_count(), 3);
    }

    #[test]
    fn internal_form_round_trips_but_network_form_is_empty() {
        let component = Component::new("core_channel");
        let invites = InviteApi::new(&component).expect("descriptor");
        let mut source = Extensible::new(ExtensionKind::Connection);
        invites.create(&mut source, "#a", 0).expect("create");
        invites.create(&mut source, "#b", 99).expect("create");

        let item = &invites.list_ext;
        let value = item.get_raw(&source).expect("stored");
        assert_eq!(item.to_network(&source, value), "");
        assert_eq!(item.to_internal(&source, value), "#a,0 #b,99");
        assert_eq!(item.to_human(&source, value), "#a #b(until:99)");

        let internal = item.to_internal(&source, value);
        let mut restored = Extensible::new(ExtensionKind::Connection);
        item.from_internal(&mut restored, &internal);
        assert_eq!(invites.list(&restored), invites.list(&source));

        source.cull();
        restored.cull();
    }

    #[test]
    fn decode_rejects_malformed_entries() {
        assert_eq!(InviteCodec::decode_internal("#a"), None);
        assert_eq!(InviteCodec::decode_internal(",5"), None);
        assert_eq!(InviteCodec::decode_internal("#a,soon"), None);
        assert_eq!(
            InviteCodec::decode_internal("#a,b,7"),
            Some(Invite {
                channel: "#a,b".to_string(),
                expires_at: 7
            })
        );
    }
}
