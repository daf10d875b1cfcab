//! Dependency-ordered module assembly.

use std::collections::HashMap;

use kiln_capabilities::VaultView;
use kiln_core::{KilnError, KilnResult};
use tracing::{debug, trace};

use crate::module::{ModuleCtx, ModuleDefinition, ModuleInstance};
use crate::registry::ModuleRegistry;
use crate::resolver::DependencyResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Computes a dependency-safe build order for a set of module definitions
/// and builds them into a [`ModuleRegistry`].
#[derive(Debug)]
pub struct ModuleOrchestrator {
    definitions: Vec<ModuleDefinition>,
    index: HashMap<String, usize>,
}

impl ModuleOrchestrator {
    /// Accept an unordered list of definitions.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::DuplicateModule`] if two definitions share a name.
    pub fn new(definitions: Vec<ModuleDefinition>) -> KilnResult<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.name().to_owned(), i).is_some() {
                return Err(KilnError::DuplicateModule {
                    name: def.name().to_owned(),
                });
            }
        }
        Ok(Self { definitions, index })
    }

    /// Dependencies of definition `i` that contribute graph edges: every hard
    /// dependency, then every optional dependency that is present.
    fn edges(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let def = &self.definitions[i];
        def.deps()
            .iter()
            .chain(def.optional_deps())
            .filter_map(|name| self.index.get(name).copied())
    }

    fn check_missing(&self) -> KilnResult<()> {
        for def in &self.definitions {
            if let Some(dep) = def.deps().iter().find(|d| !self.index.contains_key(*d)) {
                return Err(KilnError::MissingModuleDependency {
                    module: def.name().to_owned(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        i: usize,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> KilnResult<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::OnStack => {
                let start = stack.iter().position(|&s| s == i).unwrap_or(0);
                let modules = stack[start..]
                    .iter()
                    .chain(std::iter::once(&i))
                    .map(|&s| self.definitions[s].name().to_owned())
                    .collect();
                return Err(KilnError::DependencyCycle { modules });
            },
            Mark::Unvisited => {},
        }

        marks[i] = Mark::OnStack;
        stack.push(i);
        for dep in self.edges(i) {
            self.visit(dep, marks, stack, order)?;
        }
        stack.pop();
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    fn sorted_indices(&self) -> KilnResult<Vec<usize>> {
        self.check_missing()?;
        let mut marks = vec![Mark::Unvisited; self.definitions.len()];
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.definitions.len());
        for i in 0..self.definitions.len() {
            self.visit(i, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    /// Module names in the order they would be built.
    ///
    /// # Errors
    ///
    /// [`KilnError::MissingModuleDependency`] or [`KilnError::DependencyCycle`].
    pub fn build_order(&self) -> KilnResult<Vec<String>> {
        Ok(self
            .sorted_indices()?
            .into_iter()
            .map(|i| self.definitions[i].name().to_owned())
            .collect())
    }

    /// Build every module in dependency order.
    ///
    /// Graph errors are reported before any factory runs. If a factory fails,
    /// the modules already built are disposed in reverse order and the error
    /// is returned.
    ///
    /// # Errors
    ///
    /// Any graph error, or the first factory error.
    pub fn assemble(self, vault: &VaultView) -> KilnResult<ModuleRegistry> {
        let order = self.sorted_indices()?;
        debug!(
            order = ?order.iter().map(|&i| self.definitions[i].name()).collect::<Vec<_>>(),
            "Assembling modules"
        );

        let mut built: HashMap<String, ModuleInstance> = HashMap::with_capacity(order.len());
        let mut names = Vec::with_capacity(order.len());
        for &i in &order {
            let def = &self.definitions[i];
            let ctx = ModuleCtx {
                name: def.name(),
                vault,
                deps: DependencyResolver::new(def.name(), def.deps(), def.optional_deps(), &built),
            };
            match def.create(&ctx) {
                Ok(mut instance) => {
                    instance.name = def.name().to_owned();
                    trace!(module = %def.name(), scope = ?instance.scope(), "Module built");
                    built.insert(def.name().to_owned(), instance);
                    names.push(def.name().to_owned());
                },
                Err(err) => {
                    debug!(module = %def.name(), error = %err, "Module build failed, disposing partial assembly");
                    ModuleRegistry::new(names, built).dispose_all();
                    return Err(err);
                },
            }
        }

        Ok(ModuleRegistry::new(names, built))
    }
}
