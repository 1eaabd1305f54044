//! Peer presence for a shared page: who is here, what they have selected,
//! and what they are editing.
//!
//! Transport is behind the [`PeerChannel`] trait so the protocol logic can
//! run against an in-process bus in tests and a real broadcast transport in
//! an application. All timing flows in through `now_ms` parameters; the
//! client never reads a clock itself.

use crate::component::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Identifier for one presence participant (one open editor tab).
pub type PeerId = Uuid;

/// Interval between keep-alive rebroadcasts of our own state.
pub const HEARTBEAT_MS: u64 = 4_000;

/// A peer silent for longer than this is evicted.
pub const STALE_AFTER_MS: u64 = 15_000;

/// Minimum spacing between broadcasts of local changes. Changes go out
/// immediately when the window is open; at most one flush per window
/// otherwise.
pub const DEBOUNCE_MS: u64 = 300;

/// Channel name for one page's presence traffic.
pub fn presence_topic(shop: &str, page_id: &str) -> String {
    format!("pb-presence:{shop}:{page_id}")
}

/// What one peer advertises about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerState {
    pub id: PeerId,
    pub label: String,
    #[serde(default)]
    pub selected_ids: Vec<ComponentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_id: Option<ComponentId>,
}

impl PeerState {
    pub fn new(id: PeerId, label: impl Into<String>) -> Self {
        Self { id, label: label.into(), selected_ids: Vec::new(), editing_id: None }
    }
}

/// Wire messages exchanged on the presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceMessage {
    /// A peer has appeared. Receivers reply with their own state so the
    /// newcomer learns the room without a directory service.
    Join { peer: PeerState },
    /// State change or heartbeat.
    Update { peer: PeerState },
    /// Orderly departure; the peer is evicted immediately instead of
    /// waiting out the staleness window.
    Leave { id: PeerId },
}

/// Transport seam for presence traffic. A message sent by one endpoint is
/// delivered to every other endpoint on the same topic, never echoed back
/// to the sender.
pub trait PeerChannel {
    fn send(&self, msg: &PresenceMessage);
    fn try_recv(&self) -> Option<PresenceMessage>;
}

#[derive(Default)]
struct BusInner {
    topics: HashMap<String, Vec<(u64, Sender<PresenceMessage>)>>,
    next_id: u64,
}

/// In-process broadcast bus. Stands in for a cross-tab transport when all
/// participants share one process (tests, previews, single-window apps).
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<Mutex<BusInner>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> LocalChannel {
        let (tx, rx) = channel();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.topics.entry(topic.to_string()).or_default().push((id, tx));
        LocalChannel { bus: Arc::clone(&self.inner), topic: topic.to_string(), id, rx }
    }
}

/// One endpoint on a [`LocalBus`] topic. Unsubscribes on drop.
pub struct LocalChannel {
    bus: Arc<Mutex<BusInner>>,
    topic: String,
    id: u64,
    rx: Receiver<PresenceMessage>,
}

impl PeerChannel for LocalChannel {
    fn send(&self, msg: &PresenceMessage) {
        let inner = self.bus.lock().unwrap();
        if let Some(subs) = inner.topics.get(&self.topic) {
            for (id, tx) in subs {
                if *id != self.id {
                    // A dropped receiver just means that peer is gone.
                    let _ = tx.send(msg.clone());
                }
            }
        }
    }

    fn try_recv(&self) -> Option<PresenceMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        let mut inner = self.bus.lock().unwrap();
        if let Some(subs) = inner.topics.get_mut(&self.topic) {
            subs.retain(|(id, _)| *id != self.id);
        }
    }
}

/// A remote peer as we currently know it.
#[derive(Debug, Clone)]
pub struct PresencePeer {
    pub state: PeerState,
    /// Deterministic accent color, stable across sessions for the same id.
    pub color: String,
    pub last_seen_ms: u64,
}

/// Stable color per peer id via an FNV-1a hash of the id bytes mapped onto
/// the hue wheel.
pub fn peer_color(id: PeerId) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let hue = hash % 360;
    format!("hsl({hue}, 70%, 45%)")
}

/// Presence state machine for one participant.
pub struct PresenceClient<C: PeerChannel> {
    channel: C,
    local: PeerState,
    peers: HashMap<PeerId, PresencePeer>,
    last_broadcast_ms: u64,
    dirty_since_ms: Option<u64>,
}

impl<C: PeerChannel> PresenceClient<C> {
    /// Join the room, announcing ourselves to whoever is already there.
    pub fn join(channel: C, local: PeerState, now_ms: u64) -> Self {
        channel.send(&PresenceMessage::Join { peer: local.clone() });
        Self { channel, local, peers: HashMap::new(), last_broadcast_ms: now_ms, dirty_since_ms: None }
    }

    pub fn local(&self) -> &PeerState {
        &self.local
    }

    pub fn peers(&self) -> impl Iterator<Item = &PresencePeer> {
        self.peers.values()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Record a local selection change. Broadcast immediately when the
    /// throttle window is open; otherwise the change rides the next
    /// [`PresenceClient::tick`], at most one window later.
    pub fn set_selection(&mut self, ids: Vec<ComponentId>, now_ms: u64) {
        if self.local.selected_ids != ids {
            self.local.selected_ids = ids;
            self.local_changed(now_ms);
        }
    }

    pub fn set_editing(&mut self, id: Option<ComponentId>, now_ms: u64) {
        if self.local.editing_id != id {
            self.local.editing_id = id;
            self.local_changed(now_ms);
        }
    }

    fn local_changed(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_broadcast_ms) >= DEBOUNCE_MS {
            self.broadcast(now_ms);
        } else if self.dirty_since_ms.is_none() {
            // Anchor to the first unflushed change; a stream of edits must
            // not postpone the flush indefinitely.
            self.dirty_since_ms = Some(now_ms);
        }
    }

    fn broadcast(&mut self, now_ms: u64) {
        self.channel.send(&PresenceMessage::Update { peer: self.local.clone() });
        self.last_broadcast_ms = now_ms;
        self.dirty_since_ms = None;
    }

    /// Drain inbound messages and update the peer table.
    pub fn poll(&mut self, now_ms: u64) {
        while let Some(msg) = self.channel.try_recv() {
            match msg {
                PresenceMessage::Join { peer } => {
                    log::debug!("peer joined: {} ({})", peer.label, peer.id);
                    self.upsert(peer, now_ms);
                    // Introduce ourselves to the newcomer.
                    self.channel.send(&PresenceMessage::Update { peer: self.local.clone() });
                }
                PresenceMessage::Update { peer } => {
                    self.upsert(peer, now_ms);
                }
                PresenceMessage::Leave { id } => {
                    if self.peers.remove(&id).is_some() {
                        log::debug!("peer left: {id}");
                    }
                }
            }
        }
    }

    /// Periodic driver: flushes throttled updates, heartbeats, and evicts
    /// stale peers. Call at least once per throttle window.
    pub fn tick(&mut self, now_ms: u64) {
        let since_last = now_ms.saturating_sub(self.last_broadcast_ms);
        if (self.dirty_since_ms.is_some() && since_last >= DEBOUNCE_MS)
            || since_last >= HEARTBEAT_MS
        {
            self.broadcast(now_ms);
        }

        self.peers.retain(|id, peer| {
            let alive = now_ms.saturating_sub(peer.last_seen_ms) <= STALE_AFTER_MS;
            if !alive {
                log::debug!("evicting stale peer {id}");
            }
            alive
        });
    }

    /// Orderly shutdown: tell the room we are gone.
    pub fn leave(&mut self) {
        self.channel.send(&PresenceMessage::Leave { id: self.local.id });
        self.peers.clear();
    }

    /// Components some remote peer is currently editing, with every
    /// contending peer listed. Selection alone is not a lock. The UI
    /// renders these as soft locks; nothing is enforced.
    pub fn soft_locks(&self) -> HashMap<ComponentId, Vec<PeerId>> {
        let mut locks: HashMap<ComponentId, Vec<PeerId>> = HashMap::new();
        for peer in self.peers.values() {
            if let Some(editing) = peer.state.editing_id {
                locks.entry(editing).or_default().push(peer.state.id);
            }
        }
        locks
    }

    fn upsert(&mut self, state: PeerState, now_ms: u64) {
        if state.id == self.local.id {
            return;
        }
        let color = peer_color(state.id);
        self.peers
            .entry(state.id)
            .and_modify(|p| {
                p.state = state.clone();
                p.last_seen_ms = now_ms;
            })
            .or_insert(PresencePeer { state, color, last_seen_ms: now_ms });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(label: &str) -> PeerState {
        PeerState::new(PeerId::new_v4(), label)
    }

    #[test]
    fn test_topic_format() {
        assert_eq!(presence_topic("acme", "landing"), "pb-presence:acme:landing");
    }

    #[test]
    fn test_join_handshake_populates_both_sides() {
        let bus = LocalBus::new();
        let topic = presence_topic("acme", "home");

        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let mut bob = PresenceClient::join(bus.subscribe(&topic), peer("bob"), 10);

        // Alice sees bob's Join and replies with an Update; bob sees it.
        alice.poll(10);
        bob.poll(20);

        assert_eq!(alice.peer_count(), 1);
        assert_eq!(bob.peer_count(), 1);
        assert_eq!(bob.peers().next().unwrap().state.label, "alice");
    }

    #[test]
    fn test_own_messages_not_echoed() {
        let bus = LocalBus::new();
        let topic = presence_topic("acme", "home");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        alice.poll(0);
        assert_eq!(alice.peer_count(), 0);
    }

    #[test]
    fn test_idle_change_broadcasts_immediately() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let observer = bus.subscribe(&topic);
        while observer.try_recv().is_some() {}

        let a = ComponentId::new_v4();
        // Well past the throttle window: no tick needed.
        alice.set_selection(vec![a], 1_000);
        match observer.try_recv().expect("flushed without a tick") {
            PresenceMessage::Update { peer } => assert_eq!(peer.selected_ids, vec![a]),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_rapid_changes_collapse_into_one_deferred_update() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let observer = bus.subscribe(&topic);
        while observer.try_recv().is_some() {}

        let a = ComponentId::new_v4();
        let b = ComponentId::new_v4();
        alice.set_selection(vec![a], 1_000);
        assert!(matches!(observer.try_recv(), Some(PresenceMessage::Update { .. })));

        // Inside the window: both changes are held back.
        alice.set_selection(vec![a, b], 1_050);
        alice.set_selection(vec![b], 1_100);
        assert!(observer.try_recv().is_none());

        alice.tick(1_250);
        assert!(observer.try_recv().is_none(), "window since last broadcast still open");

        alice.tick(1_300);
        match observer.try_recv().expect("deferred flush") {
            PresenceMessage::Update { peer } => assert_eq!(peer.selected_ids, vec![b]),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(observer.try_recv().is_none(), "single flush only");
    }

    #[test]
    fn test_sustained_changes_keep_broadcasting() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let observer = bus.subscribe(&topic);
        while observer.try_recv().is_some() {}

        // A drag reselects something every 200 ms. The throttle must keep
        // updates flowing instead of deferring until the drag stops.
        let mut updates = 0;
        for step in 1..=19u64 {
            let now = step * 200;
            alice.set_selection(vec![ComponentId::new_v4()], now);
            alice.tick(now);
            while let Some(msg) = observer.try_recv() {
                if matches!(msg, PresenceMessage::Update { .. }) {
                    updates += 1;
                }
            }
        }
        assert!(updates >= 8, "got {updates} updates in 3.8s of sustained changes");
    }

    #[test]
    fn test_heartbeat_rebroadcasts() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let observer = bus.subscribe(&topic);
        while observer.try_recv().is_some() {}

        alice.tick(HEARTBEAT_MS - 1);
        assert!(observer.try_recv().is_none());

        alice.tick(HEARTBEAT_MS);
        assert!(matches!(observer.try_recv(), Some(PresenceMessage::Update { .. })));
    }

    #[test]
    fn test_stale_peer_evicted() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let _bob = PresenceClient::join(bus.subscribe(&topic), peer("bob"), 0);
        alice.poll(0);
        assert_eq!(alice.peer_count(), 1);

        alice.tick(STALE_AFTER_MS);
        assert_eq!(alice.peer_count(), 1, "exactly at the window is still alive");
        alice.tick(STALE_AFTER_MS + 1);
        assert_eq!(alice.peer_count(), 0);
    }

    #[test]
    fn test_leave_evicts_immediately() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let mut bob = PresenceClient::join(bus.subscribe(&topic), peer("bob"), 0);
        alice.poll(0);
        bob.poll(0);
        assert_eq!(alice.peer_count(), 1);

        bob.leave();
        alice.poll(1);
        assert_eq!(alice.peer_count(), 0);
    }

    #[test]
    fn test_soft_locks_from_editing_only() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let mut bob = PresenceClient::join(bus.subscribe(&topic), peer("bob"), 0);
        alice.poll(0);
        bob.poll(0);

        let selected = ComponentId::new_v4();
        let editing = ComponentId::new_v4();
        bob.set_selection(vec![selected], 100);
        bob.set_editing(Some(editing), 100);
        bob.tick(100 + DEBOUNCE_MS);
        alice.poll(500);

        let locks = alice.soft_locks();
        assert_eq!(locks.get(&editing), Some(&vec![bob.local().id]));
        // Selection alone does not lock.
        assert!(!locks.contains_key(&selected));
    }

    #[test]
    fn test_soft_locks_list_every_contender() {
        let bus = LocalBus::new();
        let topic = presence_topic("s", "p");
        let mut alice = PresenceClient::join(bus.subscribe(&topic), peer("alice"), 0);
        let mut bob = PresenceClient::join(bus.subscribe(&topic), peer("bob"), 0);
        let mut carol = PresenceClient::join(bus.subscribe(&topic), peer("carol"), 0);
        alice.poll(0);
        bob.poll(0);
        carol.poll(0);

        let contested = ComponentId::new_v4();
        bob.set_editing(Some(contested), 1_000);
        carol.set_editing(Some(contested), 1_000);
        alice.poll(1_100);

        let locks = alice.soft_locks();
        let mut holders = locks.get(&contested).cloned().unwrap_or_default();
        holders.sort();
        let mut expected = vec![bob.local().id, carol.local().id];
        expected.sort();
        assert_eq!(holders, expected);
    }

    #[test]
    fn test_peer_color_stable_and_well_formed() {
        let id = PeerId::new_v4();
        let c1 = peer_color(id);
        assert_eq!(c1, peer_color(id));
        assert!(c1.starts_with("hsl(") && c1.ends_with(", 70%, 45%)"));
    }

    #[test]
    fn test_message_wire_format() {
        let state = PeerState::new(PeerId::new_v4(), "alice");
        let json = serde_json::to_string(&PresenceMessage::Join { peer: state }).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("\"label\":\"alice\""));
    }
}
