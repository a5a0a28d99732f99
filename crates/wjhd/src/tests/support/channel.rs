//! Scriptable channel doubles.
//!
//! A [`FakeChannel`] holds a queue of events standing in for the engine's
//! buffer; a pull moves the queue into the cache.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::channel::{ChannelError, ChannelFactory, DropChannel, GroupStep, RawEvent};
use crate::engine::{DropGroup, EngineError, EngineOperation, EngineStatus};
use crate::resolve::InterfaceNames;

/// Engine-side buffer shared between a test and its fake channel.
pub type PendingEvents = Rc<RefCell<Vec<RawEvent>>>;

#[derive(Debug)]
pub struct FakeChannel {
    name: String,
    bound: BTreeSet<DropGroup>,
    pending: PendingEvents,
    cache: Vec<RawEvent>,
    fail_bind: Option<DropGroup>,
    fail_pull: bool,
    fail_destroy: bool,
    destroyed: Rc<Cell<bool>>,
    pulls: Rc<Cell<usize>>,
}

impl FakeChannel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            bound: BTreeSet::new(),
            pending: PendingEvents::default(),
            cache: Vec::new(),
            fail_bind: None,
            fail_pull: false,
            fail_destroy: false,
            destroyed: Rc::new(Cell::new(false)),
            pulls: Rc::new(Cell::new(0)),
        }
    }

    #[must_use]
    pub fn with_pending(self, events: Vec<RawEvent>) -> Self {
        self.pending.borrow_mut().extend(events);
        self
    }

    #[must_use]
    pub fn failing_bind(mut self, group: DropGroup) -> Self {
        self.fail_bind = Some(group);
        self
    }

    /// Pulls deliver the pending events and then report an engine failure.
    #[must_use]
    pub fn failing_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    #[must_use]
    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    #[must_use]
    pub fn pending(&self) -> PendingEvents {
        Rc::clone(&self.pending)
    }

    #[must_use]
    pub fn destroyed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.destroyed)
    }

    #[must_use]
    pub fn pull_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.pulls)
    }

    fn engine_error(&self, operation: EngineOperation) -> EngineError {
        EngineError::new(operation, EngineStatus::Error)
    }
}

impl DropChannel for FakeChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_group(&mut self, group: DropGroup) -> Result<(), ChannelError> {
        if self.fail_bind == Some(group) {
            return Err(ChannelError::Group {
                channel: self.name.clone(),
                group,
                step: GroupStep::Bind,
                source: self.engine_error(EngineOperation::BindGroup),
            });
        }
        self.bound.insert(group);
        Ok(())
    }

    fn unbind_group(&mut self, group: DropGroup) -> Result<(), ChannelError> {
        self.bound.remove(&group);
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ChannelError> {
        self.bound.clear();
        self.cache.clear();
        if self.fail_destroy {
            return Err(ChannelError::Destroy {
                channel: self.name.clone(),
                failures: 1,
            });
        }
        self.destroyed.set(true);
        Ok(())
    }

    fn pull(&mut self, _interfaces: &dyn InterfaceNames) -> Result<(), ChannelError> {
        self.pulls.set(self.pulls.get() + 1);
        self.cache.append(&mut self.pending.borrow_mut());
        if self.fail_pull {
            return Err(ChannelError::Pull {
                channel: self.name.clone(),
                source: self.engine_error(EngineOperation::Pull),
            });
        }
        Ok(())
    }

    fn cache(&self) -> &[RawEvent] {
        &self.cache
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn bound_groups(&self) -> &BTreeSet<DropGroup> {
        &self.bound
    }
}

/// Creates [`FakeChannel`]s, optionally failing one bind.
#[derive(Debug, Default)]
pub struct FakeChannelFactory {
    failing_bind: Option<(String, DropGroup)>,
}

impl FakeChannelFactory {
    #[must_use]
    pub fn failing_bind(mut self, channel: &str, group: DropGroup) -> Self {
        self.failing_bind = Some((channel.to_owned(), group));
        self
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn create(&self, name: &str) -> Result<Box<dyn DropChannel>, ChannelError> {
        let mut channel = FakeChannel::new(name);
        if let Some((failing, group)) = &self.failing_bind
            && failing == name
        {
            channel = channel.failing_bind(*group);
        }
        Ok(Box::new(channel))
    }
}
