use ircmesh_core::extension::ListExtItem;
use ircmesh_core::modules::{Certificate, InviteApi, SslInfo};
use ircmesh_core::{
    CoreConfig, CullList, CullResult, Cullable, ExtensionKind, RefCounted, ServerState, Shared,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn quitting_connections_release_shared_certificate_at_event_end() {
    let mut server = ServerState::default();
    let component = server.load_component("m_sslinfo").unwrap();
    let ssl = SslInfo::new(&component).unwrap();
    ssl.register(server.extensions_mut()).unwrap();

    let cert = RefCounted::new(Certificate::verified("bb22", "CN=shared", "CN=ca"));
    let alice = server.add_connection("alice");
    let bob = server.add_connection("bob");
    for user in [alice, bob] {
        ssl.set_certificate(server.ext_mut(user).unwrap(), cert.clone())
            .unwrap();
    }
    assert_eq!(Shared::holders(&cert), 3);

    server.quit_connection(alice);
    assert_eq!(Shared::holders(&cert), 3);
    let stats = server.end_event();
    assert_eq!(stats.culled, 1);
    assert_eq!(Shared::holders(&cert), 2);

    server.shutdown();
    assert_eq!(Shared::holders(&cert), 1);
}

#[test]
fn quit_releases_every_pending_invite() {
    let mut server = ServerState::default();
    let component = server.load_component("core_channel").unwrap();
    let invites = InviteApi::new(&component).unwrap();
    invites.register(server.extensions_mut()).unwrap();

    let user = server.add_connection("carol");
    for channel in ["#one", "#two", "#three"] {
        invites
            .create(server.ext_mut(user).unwrap(), channel, 0)
            .unwrap();
    }

    server.quit_connection(user);
    assert_eq!(invites.released_count(), 0);
    server.end_event();
    assert_eq!(invites.released_count(), 3);
}

#[test]
fn emptied_channel_is_culled_with_its_data() {
    let mut server = ServerState::default();
    let component = server.load_component("m_banlist").unwrap();
    let released = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&released);
    let bans = ListExtItem::<String>::with_release(
        &component,
        "banlist",
        ExtensionKind::Channel,
        move |_, mask| sink.borrow_mut().push(mask),
    )
    .unwrap();

    let user = server.add_connection("dave");
    let channel = server.join(user, "#ops").unwrap();
    for mask in ["*!*@spam", "*!*@flood"] {
        bans.push(server.ext_mut(channel).unwrap(), mask.to_string())
            .unwrap();
    }

    server.quit_connection(user);
    assert!(server.channel(channel).is_none());
    assert_eq!(server.pending_release(), 2);
    assert!(released.borrow().is_empty());

    let stats = server.end_event();
    assert_eq!(stats.culled, 2);
    assert_eq!(
        *released.borrow(),
        vec!["*!*@spam".to_string(), "*!*@flood".to_string()]
    );
}

struct SlowSocket {
    remaining: u32,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Cullable for SlowSocket {
    fn cull(&mut self) -> CullResult {
        if self.remaining == 0 {
            self.log.borrow_mut().push("closed");
            return CullResult::Done;
        }
        self.remaining -= 1;
        self.log.borrow_mut().push("flushing");
        CullResult::Deferred
    }
}

impl Drop for SlowSocket {
    fn drop(&mut self) {
        self.log.borrow_mut().push("freed");
    }
}

#[test]
fn deferred_items_stay_queued_until_done() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut list = CullList::new();
    list.add_item(SlowSocket {
        remaining: 1,
        log: Rc::clone(&log),
    });

    let first = list.apply();
    assert_eq!((first.culled, first.deferred), (0, 1));
    assert_eq!(list.len(), 1);

    let second = list.apply();
    assert_eq!((second.culled, second.deferred), (1, 0));
    assert!(list.is_empty());
    assert_eq!(*log.borrow(), vec!["flushing", "closed", "freed"]);
}

#[test]
fn shutdown_respects_pass_limit_configuration() {
    let config = CoreConfig::from_json_str(r#"{"max_cull_passes":1}"#).unwrap();
    let mut server = ServerState::new(&config);
    for nick in ["a", "b", "c"] {
        let user = server.add_connection(nick);
        server.join(user, "#all").unwrap();
    }

    let stats = server.shutdown();
    assert_eq!(stats.culled, 4);
    assert_eq!(server.pending_release(), 0);
}
