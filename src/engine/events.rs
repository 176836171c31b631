//! # Lifecycle Events
//!
//! Synchronous observer dispatch for the five structural lifecycle stages:
//! component added, component removed, component changed, entity created,
//! entity destroyed.
//!
//! ## Purpose
//! Handlers let extensions react to structural changes without polling.
//! Dispatch is fully synchronous: the mutating call does not return until
//! every handler has run (or one has failed).
//!
//! ## Ordering
//! Handlers run newest-subscription-first. A handler subscribed later sees
//! the event before one subscribed earlier.
//!
//! ## Failure
//! A handler returning `Err` stops the remaining handlers for that event
//! and surfaces as [`DispatchError`] from the mutating call. The storage
//! mutation itself is already committed by then and is not rolled back.
//!
//! ## Re-entrancy
//! Handlers receive the entity and event payload, never the dispatcher or
//! the world. Mutations from inside a handler go through a command buffer
//! the handler captured; a handler removes itself by returning
//! [`HandlerFlow::Unsubscribe`], and other code removes it by token via
//! [`EventDispatcher::unsubscribe`].

use std::any::Any;
use std::collections::HashMap;

use crate::engine::entity::Entity;
use crate::engine::error::DispatchError;
use crate::engine::types::ComponentID;

/// The five structural moments handlers can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventStage {
    /// A component value landed on an entity (spawn or add).
    ComponentAdded,
    /// A component left an entity (remove or destroy teardown).
    ComponentRemoved,
    /// A component value was replaced in place.
    ComponentChanged,
    /// An entity finished spawning with its full initial set.
    EntityCreated,
    /// An entity was destroyed.
    EntityDestroyed,
}

/// What a handler wants done with its own subscription after running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerFlow {
    /// Stay subscribed.
    Keep,
    /// Drop this subscription; the handler will not run again.
    Unsubscribe,
}

/// Error type handlers are allowed to fail with.
pub type HandlerFault = Box<dyn std::error::Error + Send + Sync>;

/// Every handler returns this: flow control on success, a fault to abort
/// the dispatch on failure.
pub type HandlerResult = Result<HandlerFlow, HandlerFault>;

pub(crate) type AddedHandler = Box<dyn FnMut(Entity, &dyn Any) -> HandlerResult>;
pub(crate) type RemovedHandler = Box<dyn FnMut(Entity) -> HandlerResult>;
pub(crate) type ChangedHandler = Box<dyn FnMut(Entity, &dyn Any, &dyn Any) -> HandlerResult>;
pub(crate) type CreatedHandler = Box<dyn FnMut(Entity, Option<&str>) -> HandlerResult>;
pub(crate) type DestroyedHandler = Box<dyn FnMut(Entity) -> HandlerResult>;

/// Token identifying one live subscription. Copyable; stale tokens are
/// ignored by [`EventDispatcher::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSubscription {
    stage: EventStage,
    component: Option<ComponentID>,
    token: u64,
}

impl EventSubscription {
    /// Stage this subscription listens on.
    #[inline]
    pub fn stage(&self) -> EventStage {
        self.stage
    }
}

struct HandlerSlot<H> {
    token: u64,
    handler: Option<H>,
}

/// Insertion-ordered handler list with tombstones, so unsubscription during
/// dispatch never shifts the indices a dispatch loop is walking.
struct HandlerList<H> {
    slots: Vec<HandlerSlot<H>>,
    dead: usize,
}

impl<H> Default for HandlerList<H> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            dead: 0,
        }
    }
}

impl<H> HandlerList<H> {
    fn push(&mut self, token: u64, handler: H) {
        self.slots.push(HandlerSlot {
            token,
            handler: Some(handler),
        });
    }

    fn remove(&mut self, token: u64) -> bool {
        for slot in &mut self.slots {
            if slot.token == token && slot.handler.is_some() {
                slot.handler = None;
                self.dead += 1;
                return true;
            }
        }
        false
    }

    fn compact(&mut self) {
        if self.dead * 2 > self.slots.len() {
            self.slots.retain(|slot| slot.handler.is_some());
            self.dead = 0;
        }
    }
}

/// Dispatches one stage over one list, newest subscription first.
///
/// `invoke` adapts the per-stage handler signature. Tombstoning on
/// `Unsubscribe` keeps the reverse walk stable.
fn dispatch<H>(
    list: &mut HandlerList<H>,
    stage: EventStage,
    mut invoke: impl FnMut(&mut H) -> HandlerResult,
) -> Result<(), DispatchError> {
    let mut index = list.slots.len();
    while index > 0 {
        index -= 1;
        let slot = &mut list.slots[index];
        let Some(handler) = slot.handler.as_mut() else {
            continue;
        };
        match invoke(handler) {
            Ok(HandlerFlow::Keep) => {}
            Ok(HandlerFlow::Unsubscribe) => {
                slot.handler = None;
                list.dead += 1;
            }
            Err(source) => {
                log::warn!("{stage:?} handler failed; later handlers skipped");
                return Err(DispatchError { stage, source });
            }
        }
    }
    list.compact();
    Ok(())
}

/// Handler tables for all five stages.
///
/// Component stages key their lists by [`ComponentID`]; lifecycle stages
/// hold a single list each.
#[derive(Default)]
pub struct EventDispatcher {
    added: HashMap<ComponentID, HandlerList<AddedHandler>>,
    removed: HashMap<ComponentID, HandlerList<RemovedHandler>>,
    changed: HashMap<ComponentID, HandlerList<ChangedHandler>>,
    created: HandlerList<CreatedHandler>,
    destroyed: HandlerList<DestroyedHandler>,
    next_token: u64,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub(crate) fn subscribe_added(
        &mut self,
        component_id: ComponentID,
        handler: AddedHandler,
    ) -> EventSubscription {
        let token = self.issue_token();
        self.added.entry(component_id).or_default().push(token, handler);
        EventSubscription {
            stage: EventStage::ComponentAdded,
            component: Some(component_id),
            token,
        }
    }

    pub(crate) fn subscribe_removed(
        &mut self,
        component_id: ComponentID,
        handler: RemovedHandler,
    ) -> EventSubscription {
        let token = self.issue_token();
        self.removed.entry(component_id).or_default().push(token, handler);
        EventSubscription {
            stage: EventStage::ComponentRemoved,
            component: Some(component_id),
            token,
        }
    }

    pub(crate) fn subscribe_changed(
        &mut self,
        component_id: ComponentID,
        handler: ChangedHandler,
    ) -> EventSubscription {
        let token = self.issue_token();
        self.changed.entry(component_id).or_default().push(token, handler);
        EventSubscription {
            stage: EventStage::ComponentChanged,
            component: Some(component_id),
            token,
        }
    }

    pub(crate) fn subscribe_created(&mut self, handler: CreatedHandler) -> EventSubscription {
        let token = self.issue_token();
        self.created.push(token, handler);
        EventSubscription {
            stage: EventStage::EntityCreated,
            component: None,
            token,
        }
    }

    pub(crate) fn subscribe_destroyed(&mut self, handler: DestroyedHandler) -> EventSubscription {
        let token = self.issue_token();
        self.destroyed.push(token, handler);
        EventSubscription {
            stage: EventStage::EntityDestroyed,
            component: None,
            token,
        }
    }

    /// Drops a subscription by token. Returns `false` if it was already
    /// gone (self-unsubscribed, or the token was never valid here).
    pub fn unsubscribe(&mut self, subscription: EventSubscription) -> bool {
        let EventSubscription {
            stage,
            component,
            token,
        } = subscription;
        match (stage, component) {
            (EventStage::ComponentAdded, Some(id)) => self
                .added
                .get_mut(&id)
                .is_some_and(|list| list.remove(token)),
            (EventStage::ComponentRemoved, Some(id)) => self
                .removed
                .get_mut(&id)
                .is_some_and(|list| list.remove(token)),
            (EventStage::ComponentChanged, Some(id)) => self
                .changed
                .get_mut(&id)
                .is_some_and(|list| list.remove(token)),
            (EventStage::EntityCreated, None) => self.created.remove(token),
            (EventStage::EntityDestroyed, None) => self.destroyed.remove(token),
            _ => false,
        }
    }

    pub(crate) fn emit_added(
        &mut self,
        component_id: ComponentID,
        entity: Entity,
        value: &dyn Any,
    ) -> Result<(), DispatchError> {
        match self.added.get_mut(&component_id) {
            Some(list) => dispatch(list, EventStage::ComponentAdded, |handler| {
                handler(entity, value)
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn emit_removed(
        &mut self,
        component_id: ComponentID,
        entity: Entity,
    ) -> Result<(), DispatchError> {
        match self.removed.get_mut(&component_id) {
            Some(list) => dispatch(list, EventStage::ComponentRemoved, |handler| handler(entity)),
            None => Ok(()),
        }
    }

    pub(crate) fn emit_changed(
        &mut self,
        component_id: ComponentID,
        entity: Entity,
        old: &dyn Any,
        new: &dyn Any,
    ) -> Result<(), DispatchError> {
        match self.changed.get_mut(&component_id) {
            Some(list) => dispatch(list, EventStage::ComponentChanged, |handler| {
                handler(entity, old, new)
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn emit_created(
        &mut self,
        entity: Entity,
        name: Option<&str>,
    ) -> Result<(), DispatchError> {
        dispatch(&mut self.created, EventStage::EntityCreated, |handler| {
            handler(entity, name)
        })
    }

    pub(crate) fn emit_destroyed(&mut self, entity: Entity) -> Result<(), DispatchError> {
        dispatch(&mut self.destroyed, EventStage::EntityDestroyed, |handler| {
            handler(entity)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispatch_runs_newest_first() {
        let mut dispatcher = EventDispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            dispatcher.subscribe_destroyed(Box::new(move |_| {
                order.borrow_mut().push(tag);
                Ok(HandlerFlow::Keep)
            }));
        }
        dispatcher.emit_destroyed(Entity(0)).unwrap();
        assert_eq!(*order.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn unsubscribe_by_flow_stops_future_dispatch() {
        let mut dispatcher = EventDispatcher::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        dispatcher.subscribe_destroyed(Box::new(move |_| {
            *counter.borrow_mut() += 1;
            Ok(HandlerFlow::Unsubscribe)
        }));
        dispatcher.emit_destroyed(Entity(0)).unwrap();
        dispatcher.emit_destroyed(Entity(0)).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn failing_handler_skips_earlier_subscriptions() {
        let mut dispatcher = EventDispatcher::new();
        let reached = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&reached);
        dispatcher.subscribe_created(Box::new(move |_, _| {
            *flag.borrow_mut() = true;
            Ok(HandlerFlow::Keep)
        }));
        dispatcher.subscribe_created(Box::new(|_, _| Err("boom".into())));
        let err = dispatcher.emit_created(Entity(0), None).unwrap_err();
        assert_eq!(err.stage, EventStage::EntityCreated);
        assert!(!*reached.borrow(), "earlier handler ran after a failure");
    }

    #[test]
    fn stale_token_unsubscribe_is_a_no_op() {
        let mut dispatcher = EventDispatcher::new();
        let subscription = dispatcher.subscribe_destroyed(Box::new(|_| Ok(HandlerFlow::Keep)));
        assert!(dispatcher.unsubscribe(subscription));
        assert!(!dispatcher.unsubscribe(subscription));
    }
}
