use crate::error::RequestError;
use serde_json::Value;
use std::collections::HashMap;

pub type HandlerResult = Result<Value, RequestError>;

/// Handles one request method. Receives the request's inner payload and
/// returns the value to report for it.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, payload: &Value) -> HandlerResult;
}

impl<F> RequestHandler for F
where
    F: Fn(&Value) -> HandlerResult + Send + Sync,
{
    fn handle(&self, payload: &Value) -> HandlerResult {
        self(payload)
    }
}

#[derive(Debug)]
pub enum Dispatch {
    Handled(HandlerResult),
    Unregistered,
}

/// Method name to handler table. Built before the session goes active and
/// only read while it runs.
#[derive(Default)]
pub struct RequestRouter {
    handlers: HashMap<String, Box<dyn RequestHandler>>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing any earlier one.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: impl RequestHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(method.into(), Box::new(handler));
        self
    }

    pub fn is_registered(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn dispatch(&self, method: &str, payload: &Value) -> Dispatch {
        match self.handlers.get(method) {
            Some(handler) => Dispatch::Handled(handler.handle(payload)),
            None => Dispatch::Unregistered,
        }
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("methods", &self.methods())
            .finish()
    }
}
