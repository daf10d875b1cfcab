//! Prototype definitions: a setup function, a render function and any extra
//! modules the component needs beyond the built-ins.

use std::fmt;
use std::sync::Arc;

use kiln_core::KilnResult;
use kiln_modules::ModuleDefinition;

use crate::ctx::ComponentCtx;
use crate::host::View;

/// Setup function. Runs once, in the setup domain, and returns the state the
/// render function closes over.
pub type SetupFn<S> = Arc<dyn Fn(&ComponentCtx) -> KilnResult<S> + Send + Sync>;

/// Render function. Runs with `exec=render` for every commit.
pub type RenderFn<S> = Arc<dyn Fn(&ComponentCtx, &S) -> KilnResult<View> + Send + Sync>;

/// Render function with the setup result already bound.
pub(crate) type RenderThunk = Box<dyn Fn(&ComponentCtx) -> KilnResult<View> + Send + Sync>;

/// A component definition, mountable any number of times.
pub struct Prototype<S> {
    name: String,
    setup: SetupFn<S>,
    render: RenderFn<S>,
    modules: Vec<ModuleDefinition>,
}

impl<S: Send + Sync + 'static> Prototype<S> {
    /// Define a prototype named `name`.
    pub fn new<F, R>(name: impl Into<String>, setup: F, render: R) -> Self
    where
        F: Fn(&ComponentCtx) -> KilnResult<S> + Send + Sync + 'static,
        R: Fn(&ComponentCtx, &S) -> KilnResult<View> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            setup: Arc::new(setup),
            render: Arc::new(render),
            modules: Vec::new(),
        }
    }

    /// Assemble an extra module alongside the built-ins.
    #[must_use]
    pub fn with_module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    /// Prototype name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra module definitions, in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleDefinition] {
        &self.modules
    }

    pub(crate) fn run_setup(&self, ctx: &ComponentCtx) -> KilnResult<S> {
        (self.setup)(ctx)
    }

    pub(crate) fn bind(&self, state: S) -> RenderThunk {
        let render = Arc::clone(&self.render);
        Box::new(move |ctx| render(ctx, &state))
    }
}

impl<S> Clone for Prototype<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            setup: Arc::clone(&self.setup),
            render: Arc::clone(&self.render),
            modules: self.modules.clone(),
        }
    }
}

impl<S> fmt::Debug for Prototype<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field(
                "modules",
                &self.modules.iter().map(ModuleDefinition::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
