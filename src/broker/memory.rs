//! In-memory broker
//!
//! A complete in-process implementation of the control traits. Addresses,
//! queues, messages, consumers and deployed bridges live in a single
//! `RwLock`-protected state. Every control call that matters for ordering
//! (I/O scope, mutations) is appended to a journal so callers can verify
//! exactly what reached the broker.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::filter::Filter;
use super::{
    AddressControl, BrokerError, BrokerHandle, ConsumerInfo, CoreMessage, QueueControl,
    QueueRoutingType,
};
use crate::bridge::BridgeSpec;

/// A control call recorded by [`InMemoryBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    IsStarted,
    ClearPendingIo,
    WaitOnPendingIo,
    DeployBridge(String),
    DestroyBridge { name: String, force: bool },
    DestroyQueue { name: String, remove_consumers: bool },
    PauseAddress { address: String, persist: bool },
    ResumeAddress(String),
}

/// Pause state of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseState {
    /// Whether the pause survives a broker restart
    pub persisted: bool,
}

/// Options for creating a queue
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub durable: bool,
    pub routing_type: QueueRoutingType,
    /// Native filter applied when routing into the queue
    pub filter: Option<String>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            durable: true,
            routing_type: QueueRoutingType::Multicast,
            filter: None,
        }
    }
}

impl QueueOptions {
    pub fn non_durable(mut self) -> Self {
        self.durable = false;
        self
    }

    pub fn anycast(mut self) -> Self {
        self.routing_type = QueueRoutingType::Anycast;
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }
}

#[derive(Default)]
struct AddressState {
    /// Bound queues in creation order
    queues: Vec<String>,
    placeholder: Option<String>,
    pause: Option<PauseState>,
}

struct QueueState {
    address: String,
    durable: bool,
    routing_type: QueueRoutingType,
    filter: Option<String>,
    messages: VecDeque<CoreMessage>,
    delivering: Vec<CoreMessage>,
    consumers: Vec<ConsumerInfo>,
}

#[derive(Default)]
struct State {
    addresses: HashMap<String, AddressState>,
    queues: HashMap<String, QueueState>,
    bridges: BTreeMap<String, BridgeSpec>,
    next_message_id: u64,
    next_consumer_id: u64,
}

#[derive(Default)]
struct Faults {
    refuse_bridges: bool,
    pending_io: Option<String>,
    failing_removals: HashSet<String>,
}

struct Inner {
    started: AtomicBool,
    state: RwLock<State>,
    journal: Mutex<Vec<BrokerCall>>,
    faults: Mutex<Faults>,
}

impl Inner {
    fn record(&self, call: BrokerCall) {
        trace!("In-memory broker: {:?}", call);
        self.journal.lock().push(call);
    }
}

/// In-memory broker
///
/// Cloning yields another handle on the same broker.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    /// Create a started broker with no addresses
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                started: AtomicBool::new(true),
                state: RwLock::new(State::default()),
                journal: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    pub fn set_started(&self, started: bool) {
        self.inner.started.store(started, Ordering::SeqCst);
    }

    /// Create an address with no queues
    pub fn create_address(&self, address: &str) -> Result<(), BrokerError> {
        let mut state = self.inner.state.write();
        if state.addresses.contains_key(address) {
            return Err(BrokerError::AlreadyExists(address.to_string()));
        }
        state
            .addresses
            .insert(address.to_string(), AddressState::default());
        Ok(())
    }

    /// Create a topic: a multicast address kept alive by a placeholder
    /// queue that carries the address name.
    pub fn create_topic(&self, address: &str) -> Result<(), BrokerError> {
        self.create_topic_with_placeholder(address, address)
    }

    /// Create a topic whose placeholder queue has its own name
    pub fn create_topic_with_placeholder(
        &self,
        address: &str,
        placeholder: &str,
    ) -> Result<(), BrokerError> {
        self.create_address(address)?;
        self.create_queue(address, placeholder, QueueOptions::default())?;
        if let Some(addr) = self.inner.state.write().addresses.get_mut(address) {
            addr.placeholder = Some(placeholder.to_string());
        }
        Ok(())
    }

    /// Create a queue bound to an address, creating the address if needed
    pub fn create_queue(
        &self,
        address: &str,
        name: &str,
        options: QueueOptions,
    ) -> Result<(), BrokerError> {
        if let Some(filter) = &options.filter {
            Filter::parse(filter)?;
        }

        let mut state = self.inner.state.write();
        if state.queues.contains_key(name) {
            return Err(BrokerError::AlreadyExists(name.to_string()));
        }
        state
            .addresses
            .entry(address.to_string())
            .or_default()
            .queues
            .push(name.to_string());
        state.queues.insert(
            name.to_string(),
            QueueState {
                address: address.to_string(),
                durable: options.durable,
                routing_type: options.routing_type,
                filter: options.filter,
                messages: VecDeque::new(),
                delivering: Vec::new(),
                consumers: Vec::new(),
            },
        );
        debug!("In-memory broker: Created queue '{}' on '{}'", name, address);
        Ok(())
    }

    /// Route a message to the queues of an address.
    ///
    /// Every matching multicast queue receives a copy; among matching
    /// anycast queues only the first does. Returns the number of queues the
    /// message was routed to.
    pub fn send(&self, address: &str, mut message: CoreMessage) -> Result<usize, BrokerError> {
        let mut state = self.inner.state.write();
        let queue_names = state
            .addresses
            .get(address)
            .map(|a| a.queues.clone())
            .ok_or_else(|| BrokerError::NotFound(address.to_string()))?;

        state.next_message_id += 1;
        message.message_id = state.next_message_id;

        let mut routed = 0;
        let mut anycast_taken = false;
        for name in queue_names {
            let Some(queue) = state.queues.get_mut(&name) else {
                continue;
            };
            let accepts = match &queue.filter {
                Some(f) => Filter::parse(f)?.matches(&message),
                None => true,
            };
            if !accepts {
                continue;
            }
            match queue.routing_type {
                QueueRoutingType::Multicast => {}
                QueueRoutingType::Anycast if anycast_taken => continue,
                QueueRoutingType::Anycast => anycast_taken = true,
            }
            queue.messages.push_back(message.clone());
            routed += 1;
        }
        Ok(routed)
    }

    /// Take the next message from a queue for delivery.
    ///
    /// Returns `None` while the queue is empty or its address is paused.
    /// The message counts as delivering until acknowledged.
    pub fn receive(&self, queue: &str) -> Result<Option<CoreMessage>, BrokerError> {
        let mut state = self.inner.state.write();
        let address = state
            .queues
            .get(queue)
            .map(|q| q.address.clone())
            .ok_or_else(|| BrokerError::NotFound(queue.to_string()))?;
        if state
            .addresses
            .get(&address)
            .is_some_and(|a| a.pause.is_some())
        {
            return Ok(None);
        }

        let Some(q) = state.queues.get_mut(queue) else {
            return Err(BrokerError::NotFound(queue.to_string()));
        };
        let message = q.messages.pop_front();
        if let Some(m) = &message {
            q.delivering.push(m.clone());
        }
        Ok(message)
    }

    /// Acknowledge a delivered message
    pub fn acknowledge(&self, queue: &str, message_id: u64) -> Result<(), BrokerError> {
        let mut state = self.inner.state.write();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::NotFound(queue.to_string()))?;
        let before = q.delivering.len();
        q.delivering.retain(|m| m.message_id != message_id);
        if q.delivering.len() == before {
            return Err(BrokerError::NotFound(format!(
                "message {} on {}",
                message_id, queue
            )));
        }
        Ok(())
    }

    /// Attach a consumer to a queue, returning its id
    pub fn add_consumer(
        &self,
        queue: &str,
        connection_id: &str,
        session_id: &str,
    ) -> Result<String, BrokerError> {
        let mut state = self.inner.state.write();
        state.next_consumer_id += 1;
        let consumer_id = state.next_consumer_id.to_string();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::NotFound(queue.to_string()))?;
        q.consumers.push(ConsumerInfo {
            consumer_id: consumer_id.clone(),
            connection_id: connection_id.to_string(),
            session_id: session_id.to_string(),
            browse_only: false,
            creation_time: 0,
        });
        Ok(consumer_id)
    }

    pub fn pause_state(&self, address: &str) -> Option<PauseState> {
        self.inner
            .state
            .read()
            .addresses
            .get(address)
            .and_then(|a| a.pause)
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.inner.state.read().queues.contains_key(name)
    }

    /// Deployed bridge by name
    pub fn bridge(&self, name: &str) -> Option<BridgeSpec> {
        self.inner.state.read().bridges.get(name).cloned()
    }

    pub fn bridge_names(&self) -> Vec<String> {
        self.inner.state.read().bridges.keys().cloned().collect()
    }

    /// Recorded control calls, oldest first
    pub fn journal(&self) -> Vec<BrokerCall> {
        self.inner.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.inner.journal.lock().clear();
    }

    /// Make `deploy_bridge` report refusal
    pub fn refuse_bridge_deployments(&self, refuse: bool) {
        self.inner.faults.lock().refuse_bridges = refuse;
    }

    /// Make `wait_on_pending_io` fail with the given message
    pub fn fail_pending_io(&self, message: Option<&str>) {
        self.inner.faults.lock().pending_io = message.map(str::to_string);
    }

    /// Make `remove_messages` fail on one queue
    pub fn fail_message_removal(&self, queue: &str) {
        self.inner
            .faults
            .lock()
            .failing_removals
            .insert(queue.to_string());
    }

    fn control_for(&self, name: &str) -> Option<MemoryQueueControl> {
        let state = self.inner.state.read();
        state.queues.get(name).map(|q| MemoryQueueControl {
            inner: self.inner.clone(),
            name: name.to_string(),
            durable: q.durable,
            routing_type: q.routing_type,
            filter: q.filter.clone(),
        })
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerHandle for InMemoryBroker {
    fn is_started(&self) -> bool {
        self.inner.record(BrokerCall::IsStarted);
        self.inner.started.load(Ordering::SeqCst)
    }

    fn clear_pending_io(&self) {
        self.inner.record(BrokerCall::ClearPendingIo);
    }

    fn wait_on_pending_io(&self) -> Result<(), BrokerError> {
        self.inner.record(BrokerCall::WaitOnPendingIo);
        match &self.inner.faults.lock().pending_io {
            Some(msg) => Err(BrokerError::Io(msg.clone())),
            None => Ok(()),
        }
    }

    async fn deploy_bridge(&self, spec: &BridgeSpec) -> Result<bool, BrokerError> {
        self.inner.record(BrokerCall::DeployBridge(spec.name.clone()));
        if self.inner.faults.lock().refuse_bridges {
            return Ok(false);
        }

        let mut state = self.inner.state.write();
        if state.bridges.contains_key(&spec.name) {
            debug!("In-memory broker: Bridge '{}' already deployed", spec.name);
            return Ok(false);
        }
        if !state.queues.contains_key(&spec.queue_name) {
            debug!(
                "In-memory broker: Bridge '{}' source queue '{}' not found",
                spec.name, spec.queue_name
            );
            return Ok(false);
        }
        state.bridges.insert(spec.name.clone(), spec.clone());
        Ok(true)
    }

    async fn destroy_bridge(&self, name: &str, force: bool) -> Result<(), BrokerError> {
        self.inner.record(BrokerCall::DestroyBridge {
            name: name.to_string(),
            force,
        });
        match self.inner.state.write().bridges.remove(name) {
            Some(_) => Ok(()),
            None => Err(BrokerError::NotFound(name.to_string())),
        }
    }

    async fn destroy_queue(&self, name: &str, remove_consumers: bool) -> Result<(), BrokerError> {
        self.inner.record(BrokerCall::DestroyQueue {
            name: name.to_string(),
            remove_consumers,
        });

        let mut state = self.inner.state.write();
        let queue = state
            .queues
            .get(name)
            .ok_or_else(|| BrokerError::NotFound(name.to_string()))?;
        if !remove_consumers && !queue.consumers.is_empty() {
            return Err(BrokerError::InUse(name.to_string()));
        }

        let address = queue.address.clone();
        state.queues.remove(name);
        if let Some(addr) = state.addresses.get_mut(&address) {
            addr.queues.retain(|q| q != name);
            if addr.placeholder.as_deref() == Some(name) {
                addr.placeholder = None;
            }
        }
        Ok(())
    }

    fn list_queue_names_under_address(&self, address: &str) -> Result<Vec<String>, BrokerError> {
        self.inner
            .state
            .read()
            .addresses
            .get(address)
            .map(|a| a.queues.clone())
            .ok_or_else(|| BrokerError::NotFound(address.to_string()))
    }

    fn queue_control(&self, queue_name: &str) -> Option<Arc<dyn QueueControl>> {
        self.control_for(queue_name)
            .map(|c| Arc::new(c) as Arc<dyn QueueControl>)
    }

    fn address_control(&self, address: &str) -> Option<Arc<dyn AddressControl>> {
        let state = self.inner.state.read();
        state.addresses.get(address).map(|a| {
            Arc::new(MemoryAddressControl {
                address: address.to_string(),
                queues: a.queues.clone(),
                placeholder: a.placeholder.clone(),
            }) as Arc<dyn AddressControl>
        })
    }

    async fn pause_address(&self, address: &str, persist: bool) -> Result<(), BrokerError> {
        self.inner.record(BrokerCall::PauseAddress {
            address: address.to_string(),
            persist,
        });
        let mut state = self.inner.state.write();
        let addr = state
            .addresses
            .get_mut(address)
            .ok_or_else(|| BrokerError::NotFound(address.to_string()))?;
        // A persisted pause record is only cleared by resume
        let persisted = persist || addr.pause.is_some_and(|p| p.persisted);
        addr.pause = Some(PauseState { persisted });
        Ok(())
    }

    async fn resume_address(&self, address: &str) -> Result<(), BrokerError> {
        self.inner
            .record(BrokerCall::ResumeAddress(address.to_string()));
        let mut state = self.inner.state.write();
        let addr = state
            .addresses
            .get_mut(address)
            .ok_or_else(|| BrokerError::NotFound(address.to_string()))?;
        addr.pause = None;
        Ok(())
    }
}

struct MemoryAddressControl {
    address: String,
    queues: Vec<String>,
    placeholder: Option<String>,
}

impl AddressControl for MemoryAddressControl {
    fn address(&self) -> &str {
        &self.address
    }

    fn queue_names(&self) -> Vec<String> {
        self.queues.clone()
    }

    fn placeholder_queue(&self) -> Option<String> {
        self.placeholder.clone()
    }
}

struct MemoryQueueControl {
    inner: Arc<Inner>,
    name: String,
    durable: bool,
    routing_type: QueueRoutingType,
    filter: Option<String>,
}

impl MemoryQueueControl {
    fn with_queue<T>(&self, f: impl FnOnce(&QueueState) -> T) -> Result<T, BrokerError> {
        let state = self.inner.state.read();
        state
            .queues
            .get(&self.name)
            .map(f)
            .ok_or_else(|| BrokerError::NotFound(self.name.clone()))
    }
}

#[async_trait]
impl QueueControl for MemoryQueueControl {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn routing_type(&self) -> QueueRoutingType {
        self.routing_type
    }

    fn filter(&self) -> Option<String> {
        self.filter.clone()
    }

    fn message_count(&self) -> Result<u64, BrokerError> {
        self.with_queue(|q| (q.messages.len() + q.delivering.len()) as u64)
    }

    fn delivering_count(&self) -> Result<u64, BrokerError> {
        self.with_queue(|q| q.delivering.len() as u64)
    }

    fn consumers_as_json(&self) -> Result<String, BrokerError> {
        let consumers = self.with_queue(|q| q.consumers.clone())?;
        serde_json::to_string(&consumers).map_err(|e| BrokerError::Other(e.to_string()))
    }

    /// Counts queued and delivering messages, the same total as `message_count`
    async fn count_messages(&self, filter: Option<&str>) -> Result<u64, BrokerError> {
        let Some(filter) = Filter::parse_optional(filter)? else {
            return self.message_count();
        };
        self.with_queue(|q| {
            q.messages
                .iter()
                .chain(q.delivering.iter())
                .filter(|m| filter.matches(m))
                .count() as u64
        })
    }

    async fn remove_messages(&self, filter: Option<&str>) -> Result<u64, BrokerError> {
        if self.inner.faults.lock().failing_removals.contains(&self.name) {
            return Err(BrokerError::Other(format!(
                "removal failed on queue {}",
                self.name
            )));
        }

        let filter = Filter::parse_optional(filter)?;
        let mut state = self.inner.state.write();
        let q = state
            .queues
            .get_mut(&self.name)
            .ok_or_else(|| BrokerError::NotFound(self.name.clone()))?;
        let before = q.messages.len();
        q.messages
            .retain(|m| !filter.as_ref().map_or(true, |f| f.matches(m)));
        Ok((before - q.messages.len()) as u64)
    }

    async fn list_messages(&self, filter: Option<&str>) -> Result<Vec<CoreMessage>, BrokerError> {
        let filter = Filter::parse_optional(filter)?;
        self.with_queue(|q| {
            q.messages
                .iter()
                .filter(|m| filter.as_ref().map_or(true, |f| f.matches(m)))
                .cloned()
                .collect()
        })
    }
}
