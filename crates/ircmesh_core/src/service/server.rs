//! Server-wide entity state.
//!
//! # Responsibility
//! - Own the live connections, channels and loaded components.
//! - Own the descriptor registry and the pending-release queue.
//! - Drive entity teardown through the queue at the end of each event.
//!
//! # Invariants
//! - A departing entity leaves the live maps immediately but is freed only
//!   by [`ServerState::end_event`] or [`ServerState::shutdown`].
//! - Unloading a component purges its values from every entity, including
//!   entities still waiting on the queue.
//! - A channel with no members does not stay live.

use crate::component::{Component, ComponentRef};
use crate::config::CoreConfig;
use crate::extension::{sync, ExtensionItem, ExtensionManager, Extensible};
use crate::lifecycle::{CullList, CullStats};
use crate::model::{Channel, Connection, Entity, EntityId};
use crate::repo::{RepoError, SnapshotRepository};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by server state operations.
#[derive(Debug)]
pub enum ServerError {
    DuplicateComponent(String),
    UnknownComponent(String),
    UnknownEntity(EntityId),
    Repo(RepoError),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateComponent(name) => write!(f, "component already loaded: {name}"),
            Self::UnknownComponent(name) => write!(f, "component not loaded: {name}"),
            Self::UnknownEntity(id) => write!(f, "no live entity with id {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Everything one server process keeps alive between events.
#[derive(Debug)]
pub struct ServerState {
    max_cull_passes: u32,
    extensions: ExtensionManager,
    components: BTreeMap<String, ComponentRef>,
    connections: BTreeMap<EntityId, Connection>,
    channels: BTreeMap<EntityId, Channel>,
    cull_list: CullList<Entity>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(&CoreConfig::default())
    }
}

impl ServerState {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            max_cull_passes: config.max_cull_passes.max(1),
            extensions: ExtensionManager::new(),
            components: BTreeMap::new(),
            connections: BTreeMap::new(),
            channels: BTreeMap::new(),
            cull_list: CullList::new(),
        }
    }

    pub fn extensions(&self) -> &ExtensionManager {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionManager {
        &mut self.extensions
    }

    /// Registers a new component under a unique name.
    pub fn load_component(&mut self, name: &str) -> ServerResult<ComponentRef> {
        if self.components.contains_key(name) {
            return Err(ServerError::DuplicateComponent(name.to_string()));
        }
        let component = Component::new(name);
        self.components
            .insert(name.to_string(), Rc::clone(&component));
        info!(
            "event=component_load module=server status=ok component={}",
            name
        );
        Ok(component)
    }

    pub fn component(&self, name: &str) -> Option<ComponentRef> {
        self.components.get(name).cloned()
    }

    /// Unloads `component`: unregisters its descriptors and releases every
    /// value they hold on live and queued entities.
    ///
    /// Returns the number of released values.
    pub fn unload_component(&mut self, component: &ComponentRef) -> ServerResult<usize> {
        let name = component.name();
        match self.components.get(name) {
            Some(loaded) if Rc::ptr_eq(loaded, component) => {}
            _ => return Err(ServerError::UnknownComponent(name.to_string())),
        }

        let mut removed: Vec<Rc<dyn ExtensionItem>> = Vec::new();
        self.extensions.begin_unregister(component, &mut removed);

        let mut released = 0;
        for connection in self.connections.values_mut() {
            released += connection.ext_mut().unhook_extensions(&removed);
        }
        for channel in self.channels.values_mut() {
            released += channel.ext_mut().unhook_extensions(&removed);
        }
        for entity in self.cull_list.iter_mut() {
            released += entity.ext_mut().unhook_extensions(&removed);
        }
        drop(removed);

        self.components.remove(name);
        info!(
            "event=component_unload module=server status=ok component={} released={} remaining_uses={}",
            name,
            released,
            component.use_count()
        );
        Ok(released)
    }

    /// Accepts a new connection and returns its id.
    pub fn add_connection(&mut self, nick: &str) -> EntityId {
        let connection = Connection::new(nick);
        let id = connection.id();
        self.connections.insert(id, connection);
        debug!(
            "event=connection_add module=server status=ok entity={} nick={}",
            id, nick
        );
        id
    }

    pub fn connection(&self, id: EntityId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_mut(&mut self, id: EntityId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn channel(&self, id: EntityId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_mut(&mut self, id: EntityId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Looks a live channel up by name, ignoring ASCII case.
    pub fn find_channel(&self, name: &str) -> Option<EntityId> {
        self.channels
            .values()
            .find(|channel| channel.name().eq_ignore_ascii_case(name))
            .map(Channel::id)
    }

    /// Attachment storage of any live entity.
    pub fn ext(&self, id: EntityId) -> Option<&Extensible> {
        self.connections
            .get(&id)
            .map(Connection::ext)
            .or_else(|| self.channels.get(&id).map(Channel::ext))
    }

    pub fn ext_mut(&mut self, id: EntityId) -> Option<&mut Extensible> {
        if let Some(connection) = self.connections.get_mut(&id) {
            return Some(connection.ext_mut());
        }
        self.channels.get_mut(&id).map(Channel::ext_mut)
    }

    /// Adds `connection` to the named channel, creating it on first join.
    pub fn join(&mut self, connection: EntityId, channel_name: &str) -> ServerResult<EntityId> {
        if !self.connections.contains_key(&connection) {
            return Err(ServerError::UnknownEntity(connection));
        }
        let channel_id = match self.find_channel(channel_name) {
            Some(id) => id,
            None => {
                let channel = Channel::new(channel_name);
                let id = channel.id();
                self.channels.insert(id, channel);
                debug!(
                    "event=channel_create module=server status=ok entity={} name={}",
                    id, channel_name
                );
                id
            }
        };

        if let Some(channel) = self.channels.get_mut(&channel_id) {
            channel.members_mut().insert(connection);
        }
        if let Some(user) = self.connections.get_mut(&connection) {
            user.channels_mut().insert(channel_id);
        }
        Ok(channel_id)
    }

    /// Removes `connection` from `channel`. An emptied channel is destroyed.
    ///
    /// Returns whether the connection was a member.
    pub fn part(&mut self, connection: EntityId, channel: EntityId) -> ServerResult<bool> {
        let user = self
            .connections
            .get_mut(&connection)
            .ok_or(ServerError::UnknownEntity(connection))?;
        let chan = self
            .channels
            .get_mut(&channel)
            .ok_or(ServerError::UnknownEntity(channel))?;

        let was_member = chan.members_mut().remove(&connection);
        user.channels_mut().remove(&channel);
        if chan.is_empty() {
            self.destroy_channel(channel);
        }
        Ok(was_member)
    }

    /// Takes the channel out of the live set and queues it for release.
    pub fn destroy_channel(&mut self, id: EntityId) -> bool {
        let Some(channel) = self.channels.remove(&id) else {
            return false;
        };
        for member in channel.members() {
            if let Some(user) = self.connections.get_mut(member) {
                user.channels_mut().remove(&id);
            }
        }
        debug!(
            "event=channel_destroy module=server status=queued entity={} name={}",
            id,
            channel.name()
        );
        self.cull_list.add_item(Entity::Channel(channel));
        true
    }

    /// Takes the connection out of every channel and the live set, then
    /// queues it for release.
    pub fn quit_connection(&mut self, id: EntityId) -> bool {
        let Some(connection) = self.connections.remove(&id) else {
            return false;
        };
        for channel_id in connection.channels() {
            let emptied = match self.channels.get_mut(channel_id) {
                Some(channel) => {
                    channel.members_mut().remove(&id);
                    channel.is_empty()
                }
                None => false,
            };
            if emptied {
                self.destroy_channel(*channel_id);
            }
        }
        debug!(
            "event=connection_quit module=server status=queued entity={} nick={}",
            id,
            connection.nick()
        );
        self.cull_list.add_item(Entity::Connection(connection));
        true
    }

    /// Entities queued but not yet freed.
    pub fn pending_release(&self) -> usize {
        self.cull_list.len()
    }

    /// Safe point at the end of one event: frees everything queued so far.
    pub fn end_event(&mut self) -> CullStats {
        self.cull_list.apply()
    }

    /// Applies one received metadata pair to a live entity.
    pub fn apply_metadata(&mut self, target: EntityId, name: &str, value: &str) -> ServerResult<bool> {
        let container = match self.connections.get_mut(&target) {
            Some(connection) => connection.ext_mut(),
            None => self
                .channels
                .get_mut(&target)
                .map(Channel::ext_mut)
                .ok_or(ServerError::UnknownEntity(target))?,
        };
        Ok(sync::apply_metadata(&self.extensions, container, name, value))
    }

    /// Persists the internal forms of one live entity.
    pub fn save_entity(
        &self,
        repo: &impl SnapshotRepository,
        id: EntityId,
    ) -> ServerResult<usize> {
        let container = self.ext(id).ok_or(ServerError::UnknownEntity(id))?;
        Ok(repo.save_entity(id, container)?)
    }

    /// Restores persisted internal forms onto one live entity.
    pub fn restore_entity(
        &mut self,
        repo: &impl SnapshotRepository,
        id: EntityId,
    ) -> ServerResult<usize> {
        let container = match self.connections.get_mut(&id) {
            Some(connection) => connection.ext_mut(),
            None => self
                .channels
                .get_mut(&id)
                .map(Channel::ext_mut)
                .ok_or(ServerError::UnknownEntity(id))?,
        };
        Ok(repo.restore_entity(id, &self.extensions, container)?)
    }

    /// Quits every connection, destroys every channel, then drains the
    /// queue until it is empty or the pass limit is reached.
    pub fn shutdown(&mut self) -> CullStats {
        let connections: Vec<EntityId> = self.connections.keys().copied().collect();
        for id in connections {
            self.quit_connection(id);
        }
        let channels: Vec<EntityId> = self.channels.keys().copied().collect();
        for id in channels {
            self.destroy_channel(id);
        }

        let mut total = CullStats::default();
        let mut passes = 0;
        while !self.cull_list.is_empty() && passes < self.max_cull_passes {
            let stats = self.cull_list.apply();
            total.culled += stats.culled;
            total.deferred = stats.deferred;
            passes += 1;
        }

        if self.cull_list.is_empty() {
            info!(
                "event=server_shutdown module=server status=ok culled={} passes={}",
                total.culled, passes
            );
        } else {
            warn!(
                "event=server_shutdown module=server status=partial culled={} pending={} passes={}",
                total.culled,
                self.cull_list.len(),
                passes
            );
        }
        total
    }
}

impl Drop for ServerState {
    fn drop(&mut self) {
        if !self.connections.is_empty() || !self.channels.is_empty() || !self.cull_list.is_empty()
        {
            self.shutdown();
        }
    }
}
