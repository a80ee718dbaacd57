//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `ircmesh_core` linkage.
//! - Walk one connection through attach, replicate, persist and cull.
//! - Keep output deterministic apart from generated ids.

use ircmesh_core::db::{open_db, open_db_in_memory};
use ircmesh_core::extension::sync::network_metadata;
use ircmesh_core::modules::{Certificate, SslInfo};
use ircmesh_core::{
    CoreConfig, RefCounted, ServerState, SnapshotRepository, SqliteSnapshotRepository,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("ircmesh_core ping={}", ircmesh_core::ping());
    println!("ircmesh_core version={}", ircmesh_core::core_version());

    // Optional first argument: path to a JSON config file.
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoreConfig::default(),
    };
    let file_logging = ircmesh_core::logging::init_from_config(&config)?;
    println!("file_logging={file_logging}");

    let mut server = ServerState::new(&config);
    let component = server.load_component("m_sslinfo")?;
    let ssl = SslInfo::new(&component)?;
    ssl.register(server.extensions_mut())?;

    let user = server.add_connection("smoke");
    let cert = RefCounted::new(Certificate::verified("0f1e", "CN=smoke", "CN=local-ca"));
    if let Some(ext) = server.ext_mut(user) {
        ssl.set_certificate(ext, cert)?;
    }
    if let Some(ext) = server.ext(user) {
        for (name, value) in network_metadata(ext) {
            println!("metadata {name}={value}");
        }
    }

    let conn = match config.snapshot_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteSnapshotRepository::new(&conn);
    let saved = server.save_entity(&repo, user)?;
    println!("snapshot rows={saved}");

    server.quit_connection(user);
    let stats = server.end_event();
    println!("culled={} deferred={}", stats.culled, stats.deferred);
    println!("stored_after_quit={}", repo.stored_items(user)?.len());

    let released = server.unload_component(&component)?;
    println!("unloaded released={released}");
    Ok(())
}
