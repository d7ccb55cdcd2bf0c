use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::models::Comment;

/// Lifecycle notification kinds emitted by the comments service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentEventKind {
    Add,
    /// Carries the stored state of a comment right before an update lands.
    PreUpdate,
    Update,
    Delete,
}

#[derive(Clone, Debug)]
pub struct CommentEvent {
    pub kind: CommentEventKind,
    pub comment: Comment,
}

impl CommentEvent {
    pub fn new(kind: CommentEventKind, comment: Comment) -> Self {
        Self { kind, comment }
    }
}

/// Consumer of lifecycle events. Handlers run synchronously, once per
/// event, in registration order.
pub trait CommentEventHandler: Send + Sync {
    fn handle(&self, event: &CommentEvent);
}

type HandlerFactory = Box<dyn Fn() -> Arc<dyn CommentEventHandler> + Send + Sync>;

/// Registry of handler factories. A factory is only resolved into a handler
/// the first time an event fires after its registration; the resolved set is
/// then reused until another registration invalidates it.
#[derive(Default)]
pub struct EventHandlerRegistry {
    factories: RwLock<Vec<HandlerFactory>>,
    resolved: RwLock<Option<Vec<Arc<dyn CommentEventHandler>>>>,
}

impl EventHandlerRegistry {
    pub fn register(&self, factory: HandlerFactory) {
        self.factories
            .write()
            .expect("event handler registry poisoned")
            .push(factory);
        *self
            .resolved
            .write()
            .expect("event handler registry poisoned") = None;
    }

    pub fn dispatch(&self, event: &CommentEvent) {
        let handlers = {
            let mut resolved = self
                .resolved
                .write()
                .expect("event handler registry poisoned");
            match resolved.as_ref() {
                Some(handlers) => handlers.clone(),
                None => {
                    let factories = self
                        .factories
                        .read()
                        .expect("event handler registry poisoned");
                    let handlers: Vec<_> = factories.iter().map(|factory| factory()).collect();
                    *resolved = Some(handlers.clone());
                    handlers
                }
            }
        };

        for handler in &handlers {
            handler.handle(event);
        }
    }
}
