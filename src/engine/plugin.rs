//! # Plugins
//!
//! Packaged extensions: a [`Plugin`] bundles systems, event subscriptions,
//! and extension values, installed and uninstalled as a unit.
//!
//! ## Reversal contract
//! Installation happens through a [`PluginContext`] that records every
//! system id, subscription token, and extension type registered through
//! it. [`uninstall`] replays that record backwards, so a plugin that only
//! uses the context needs no `uninstall` body of its own; the optional
//! [`Plugin::uninstall`] hook exists for side effects the context cannot
//! see.
//!
//! A failed [`Plugin::install`] is rolled back the same way before the
//! error propagates, leaving the world and schedule as they were.

use std::any::TypeId;

use crate::engine::error::EcsResult;
use crate::engine::events::EventSubscription;
use crate::engine::systems::{Phase, Schedule, System};
use crate::engine::types::SystemID;
use crate::engine::world::World;

/// A named, installable extension package.
pub trait Plugin {
    /// Stable display name, used in logs.
    fn name(&self) -> &str;

    /// Registers the plugin's pieces through the context.
    fn install(&mut self, context: &mut PluginContext<'_>) -> EcsResult<()>;

    /// Cleanup beyond the automatic reversal. Runs before the recorded
    /// registrations are reversed.
    fn uninstall(&mut self, _world: &mut World, _schedule: &mut Schedule) -> EcsResult<()> {
        Ok(())
    }
}

/// Everything registered through a [`PluginContext`], in order.
#[derive(Debug, Default)]
pub struct InstallRecord {
    systems: Vec<SystemID>,
    subscriptions: Vec<EventSubscription>,
    extensions: Vec<TypeId>,
}

impl InstallRecord {
    /// Returns `true` if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty() && self.subscriptions.is_empty() && self.extensions.is_empty()
    }

    fn reverse(&mut self, world: &mut World, schedule: &mut Schedule) {
        for subscription in self.subscriptions.drain(..).rev() {
            world.unsubscribe(subscription);
        }
        for id in self.systems.drain(..).rev() {
            schedule.remove_system(id);
        }
        for type_id in self.extensions.drain(..).rev() {
            world.remove_extension_erased(type_id);
        }
    }
}

/// Recording facade over the world and schedule during installation.
pub struct PluginContext<'a> {
    world: &'a mut World,
    schedule: &'a mut Schedule,
    record: InstallRecord,
}

impl PluginContext<'_> {
    /// Direct world access, for registration calls that need no tracking
    /// (component registration is permanent by design).
    pub fn world(&mut self) -> &mut World {
        self.world
    }

    /// Adds a tracked system; uninstall removes it.
    pub fn add_system<S: System + 'static>(&mut self, phase: Phase, system: S) -> SystemID {
        let id = self.schedule.add_system(phase, system);
        self.record.systems.push(id);
        id
    }

    /// Stores a tracked extension value; uninstall removes it.
    pub fn set_extension<T: 'static>(&mut self, value: T) -> Option<T> {
        let previous = self.world.set_extension(value);
        self.record.extensions.push(TypeId::of::<T>());
        previous
    }

    /// Reads an extension, own or another plugin's.
    pub fn get_extension<T: 'static>(&self) -> Option<&T> {
        self.world.get_extension::<T>()
    }

    /// Tracks a subscription made through [`PluginContext::world`];
    /// uninstall drops it.
    pub fn track(&mut self, subscription: EventSubscription) -> EventSubscription {
        self.record.subscriptions.push(subscription);
        subscription
    }
}

/// Installs a plugin, returning the record [`uninstall`] needs.
///
/// On error every registration the context recorded is reversed before
/// the error propagates.
pub fn install<P: Plugin>(
    plugin: &mut P,
    world: &mut World,
    schedule: &mut Schedule,
) -> EcsResult<InstallRecord> {
    let mut context = PluginContext {
        world,
        schedule,
        record: InstallRecord::default(),
    };
    match plugin.install(&mut context) {
        Ok(()) => {
            log::debug!("installed plugin {}", plugin.name());
            Ok(context.record)
        }
        Err(error) => {
            let PluginContext {
                world,
                schedule,
                mut record,
            } = context;
            record.reverse(world, schedule);
            log::debug!("rolled back failed install of plugin {}", plugin.name());
            Err(error)
        }
    }
}

/// Uninstalls a plugin: runs its hook, then reverses the install record.
///
/// The record is consumed even if the hook fails; the automatic reversal
/// always runs.
pub fn uninstall<P: Plugin>(
    plugin: &mut P,
    world: &mut World,
    schedule: &mut Schedule,
    mut record: InstallRecord,
) -> EcsResult<()> {
    let hook_result = plugin.uninstall(world, schedule);
    record.reverse(world, schedule);
    log::debug!("uninstalled plugin {}", plugin.name());
    hook_result
}
