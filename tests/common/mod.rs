#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use abm_observers::Entity;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Collects every entity a callback is invoked with.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Entity>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl Fn(Entity) + 'static {
        let inner = Rc::clone(&self.0);
        move |entity| inner.borrow_mut().push(entity)
    }

    pub fn events(&self) -> Vec<Entity> {
        self.0.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn take(&self) -> Vec<Entity> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
