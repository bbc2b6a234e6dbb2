use std::collections::VecDeque;
use std::sync::Arc;
use crate::base::behavior::*;
use crate::base::module::{module_inner, ModuleBase, IsModule};

#[derive(Debug)]
pub struct QueueState<T> {
    pub storage: VecDeque<T>,
    max_size: usize,
}

impl<T> Default for QueueState<T> {
    fn default() -> Self {
        Self {
            storage: VecDeque::new(),
            max_size: 1,
        }
    }
}

/// Bounded FIFO used for the ingress and pop-request collaborators.  A full queue refuses new
/// entries instead of growing.
#[derive(Debug, Default)]
pub struct Queue<T> {
    base: ModuleBase<QueueState<T>, ()>,
}

impl<T> ModuleBehaviors for Queue<T> {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.state_mut().storage.clear();
    }
}

impl<T> IsModule for Queue<T> {
    module_inner!(QueueState<T>, ());
}

impl<T: Clone> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        let mut me = Queue {
            base: ModuleBase::with_state(QueueState {
                storage: VecDeque::with_capacity(capacity),
                max_size: capacity,
            }),
        };
        me.init_conf(Arc::new(()));
        me
    }

    pub fn try_enq(&mut self, data: &T) -> bool {
        if self.is_full() {
            return false;
        }
        self.state_mut().storage.push_back(data.clone());
        true
    }

    pub fn try_deq(&mut self) -> Option<T> {
        self.state_mut().storage.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.state().storage.front()
    }

    pub fn len(&self) -> usize {
        self.state().storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().storage.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state().storage.len() >= self.state().max_size
    }

    pub fn capacity(&self) -> usize {
        self.state().max_size
    }

    pub fn resize(&mut self, size: usize) {
        assert!(size > 0, "queue capacity must be > 0");
        self.state_mut().max_size = size;
    }
}
