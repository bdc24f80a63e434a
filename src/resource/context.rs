//! # Execution context for [`Resource::on_context`](crate::Resource::on_context).

use tokio::runtime::Handle;
use tracing::Span;

use crate::scope::Scope;

/// Extra execution context a resource's nested use runs under.
///
/// - `handle`: runtime the resource's tasks are spawned on;
/// - `span`: `tracing` span the nested use is instrumented with;
/// - `scope`: accepted here only to be **rejected** by `on_context`, since a
///   foreign scope would replace the isolation boundary between the resource's
///   task tree and the caller's.
#[derive(Clone, Debug, Default)]
pub struct Context {
    handle: Option<Handle>,
    span: Option<Span>,
    scope: Option<Scope>,
}

impl Context {
    /// Empty context: nested use runs exactly like a plain one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the resource's tasks on `handle`.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Instruments the nested use with `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Requests a foreign parent scope (always rejected by `on_context`).
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub(crate) fn carries_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub(crate) fn apply(&self, scope: &Scope) -> Scope {
        match &self.handle {
            Some(handle) => scope.with_handle(handle.clone()),
            None => scope.clone(),
        }
    }

    pub(crate) fn span(&self) -> Span {
        self.span.clone().unwrap_or_else(Span::none)
    }
}
