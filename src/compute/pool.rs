//! Bounded pool of physics engine instances.

use log::warn;

use super::engine::Engine;

/// Pool allocation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("All {capacity} engine instances are in use")]
    Exhausted { capacity: usize },
}

/// Hands out at most `capacity` engines at a time.
///
/// Released engines are kept and handed out again. Every acquired engine
/// must come back through [`InstancePool::release`]; an engine that is
/// dropped instead stays counted against the capacity.
pub struct InstancePool<E: Engine> {
    capacity: usize,
    outstanding: usize,
    idle: Vec<E>,
    factory: Box<dyn Fn() -> E>,
}

impl<E: Engine> InstancePool<E> {
    /// Create a pool that builds fresh engines with `factory`.
    pub fn new(capacity: usize, factory: impl Fn() -> E + 'static) -> Self {
        Self {
            capacity,
            outstanding: 0,
            idle: Vec::new(),
            factory: Box::new(factory),
        }
    }

    /// Take an engine from the pool.
    pub fn acquire(&mut self) -> Result<E, PoolError> {
        if self.outstanding >= self.capacity {
            return Err(PoolError::Exhausted {
                capacity: self.capacity,
            });
        }
        self.outstanding += 1;
        Ok(self.idle.pop().unwrap_or_else(|| (self.factory)()))
    }

    /// Return an engine to the pool. An engine released while none are
    /// outstanding is dropped.
    pub fn release(&mut self, engine: E) {
        if self.outstanding == 0 {
            warn!("engine released to a pool with none outstanding");
            return;
        }
        self.outstanding -= 1;
        self.idle.push(engine);
    }

    /// Engines that can still be acquired.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.outstanding)
    }

    /// Engines currently handed out.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<E: Engine> std::fmt::Debug for InstancePool<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancePool")
            .field("capacity", &self.capacity)
            .field("outstanding", &self.outstanding)
            .field("idle", &self.idle.len())
            .finish()
    }
}
