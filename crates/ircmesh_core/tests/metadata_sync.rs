use ircmesh_core::extension::sync::{human_metadata, network_metadata};
use ircmesh_core::extension::{BoolExtItem, StringCodec};
use ircmesh_core::modules::{Certificate, SslInfo};
use ircmesh_core::{
    ExtensionItem, ExtensionKind, RefCounted, ServerError, ServerState, SimpleExtItem,
};
use std::rc::Rc;

struct Node {
    server: ServerState,
    ssl: SslInfo,
    swhois: Rc<SimpleExtItem<String, StringCodec>>,
    bot: Rc<BoolExtItem>,
}

fn node() -> Node {
    let mut server = ServerState::default();
    let component = server.load_component("m_core_ext").unwrap();
    let ssl = SslInfo::new(&component).unwrap();
    let swhois =
        SimpleExtItem::<String, StringCodec>::new(&component, "swhois", ExtensionKind::Connection)
            .unwrap();
    let bot = BoolExtItem::new(&component, "bot", ExtensionKind::Connection).unwrap();
    ssl.register(server.extensions_mut()).unwrap();
    swhois.register(server.extensions_mut()).unwrap();
    bot.register(server.extensions_mut()).unwrap();
    Node {
        server,
        ssl,
        swhois,
        bot,
    }
}

#[test]
fn burst_reproduces_replicated_values_on_peer() {
    let mut local = node();
    let mut remote = node();

    let user = local.server.add_connection("erin");
    {
        let ext = local.server.ext_mut(user).unwrap();
        local
            .ssl
            .set_certificate(
                ext,
                RefCounted::new(Certificate::verified("cc33", "CN=erin", "CN=ca")),
            )
            .unwrap();
        local.swhois.set(ext, "is an operator".to_string()).unwrap();
        local.bot.set(ext).unwrap();
    }

    let burst = network_metadata(local.server.ext(user).unwrap());
    assert_eq!(
        burst,
        vec![
            ("bot".to_string(), "1".to_string()),
            ("ssl_cert".to_string(), "VTrSe cc33 CN=erin CN=ca".to_string()),
            ("swhois".to_string(), "is an operator".to_string()),
        ]
    );

    let mirror = remote.server.add_connection("erin");
    for (name, value) in &burst {
        assert!(remote.server.apply_metadata(mirror, name, value).unwrap());
    }
    let ext = remote.server.ext(mirror).unwrap();
    let cert = remote.ssl.get_certificate(ext).unwrap();
    assert_eq!(cert.fingerprint, "cc33");
    assert_eq!(
        remote.swhois.get(ext).map(String::as_str),
        Some("is an operator")
    );
    assert!(remote.bot.get(ext));
    assert_eq!(network_metadata(ext), burst);

    drop(cert);
    local.server.shutdown();
    remote.server.shutdown();
}

#[test]
fn unknown_names_are_reported_not_stored() {
    let mut remote = node();
    let user = remote.server.add_connection("frank");
    assert!(!remote
        .server
        .apply_metadata(user, "from_missing_module", "value")
        .unwrap());
    assert!(remote.server.ext(user).unwrap().is_empty());
    remote.server.shutdown();
}

#[test]
fn metadata_for_departed_entity_is_an_error() {
    let mut remote = node();
    let user = remote.server.add_connection("gina");
    remote.server.quit_connection(user);
    let err = remote
        .server
        .apply_metadata(user, "swhois", "late")
        .unwrap_err();
    assert!(matches!(err, ServerError::UnknownEntity(id) if id == user));
    remote.server.end_event();
}

#[test]
fn human_forms_use_display_text() {
    let mut local = node();
    let user = local.server.add_connection("hank");
    local
        .bot
        .set(local.server.ext_mut(user).unwrap())
        .unwrap();

    assert_eq!(
        human_metadata(local.server.ext(user).unwrap()),
        vec![("bot".to_string(), "true".to_string())]
    );
    local.server.shutdown();
}
