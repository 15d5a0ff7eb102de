//! Child command registries for dispatch nodes
//!
//! A dispatch node resolves its children through a [`CommandSource`]. Three
//! variants ship with the crate: a static map, a lazy registry that builds
//! each child on first use, and a collection merging several sources.

use crate::error::Result;
use crate::model::Command;
use crate::runner::Context;
use log::debug;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Enumerates and resolves child commands by name
pub trait CommandSource {
    /// Names of all children, in listing order
    fn list_commands(&self, ctx: &Context) -> Vec<String>;

    /// Resolve one child; `Ok(None)` when the name is unknown
    fn get_command(&self, ctx: &Context, name: &str) -> Result<Option<Rc<Command>>>;
}

/// Children known up front, listed alphabetically
#[derive(Default)]
pub struct StaticCommands {
    commands: BTreeMap<String, Rc<Command>>,
}

impl StaticCommands {
    pub fn new() -> Self {
        StaticCommands::default()
    }

    /// Register under the command's own name
    pub fn add(&mut self, command: Rc<Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Register under an explicit name (aliases)
    pub fn add_as(&mut self, name: impl Into<String>, command: Rc<Command>) {
        self.commands.insert(name.into(), command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl CommandSource for StaticCommands {
    fn list_commands(&self, _ctx: &Context) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    fn get_command(&self, _ctx: &Context, name: &str) -> Result<Option<Rc<Command>>> {
        Ok(self.commands.get(name).cloned())
    }
}

type Loader = Box<dyn Fn() -> Result<Rc<Command>>>;

struct LazyEntry {
    path: String,
    loader: Loader,
    loaded: OnceCell<Rc<Command>>,
}

/// Children built on first resolution and memoized afterwards.
///
/// Each entry is registered with a descriptive load path (for diagnostics)
/// and a loader; listing never runs a loader.
#[derive(Default)]
pub struct LazyCommands {
    entries: BTreeMap<String, LazyEntry>,
}

impl LazyCommands {
    pub fn new() -> Self {
        LazyCommands::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        loader: impl Fn() -> Result<Rc<Command>> + 'static,
    ) -> Self {
        self.entries.insert(
            name.into(),
            LazyEntry {
                path: path.into(),
                loader: Box::new(loader),
                loaded: OnceCell::new(),
            },
        );
        self
    }

    /// Whether `name` was already loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map_or(false, |e| e.loaded.get().is_some())
    }
}

impl CommandSource for LazyCommands {
    fn list_commands(&self, _ctx: &Context) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn get_command(&self, _ctx: &Context, name: &str) -> Result<Option<Rc<Command>>> {
        let entry = match self.entries.get(name) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if let Some(command) = entry.loaded.get() {
            return Ok(Some(command.clone()));
        }
        debug!("loading command '{}' from {}", name, entry.path);
        let command = (entry.loader)()?;
        Ok(Some(entry.loaded.get_or_init(|| command).clone()))
    }
}

/// Several sources merged; the first source knowing a name wins
#[derive(Default)]
pub struct CommandCollection {
    sources: Vec<Box<dyn CommandSource>>,
}

impl CommandCollection {
    pub fn new() -> Self {
        CommandCollection::default()
    }

    pub fn with_source(mut self, source: impl CommandSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: Box<dyn CommandSource>) {
        self.sources.push(source);
    }
}

impl CommandSource for CommandCollection {
    fn list_commands(&self, ctx: &Context) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .flat_map(|s| s.list_commands(ctx))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn get_command(&self, ctx: &Context, name: &str) -> Result<Option<Rc<Command>>> {
        for source in &self.sources {
            if let Some(command) = source.get_command(ctx, name)? {
                return Ok(Some(command));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn leaf(name: &str) -> Rc<Command> {
        Command::builder(name).build().unwrap()
    }

    fn root_ctx() -> Rc<Context> {
        Context::new(leaf("root"), "root", None, Default::default())
    }

    #[test]
    fn test_static_listing_is_sorted() {
        let ctx = root_ctx();
        let mut source = StaticCommands::new();
        source.add(leaf("zeta"));
        source.add(leaf("alpha"));
        assert_eq!(source.list_commands(&ctx), vec!["alpha", "zeta"]);
        assert!(source.get_command(&ctx, "alpha").unwrap().is_some());
        assert!(source.get_command(&ctx, "beta").unwrap().is_none());
    }

    #[test]
    fn test_lazy_loads_once() {
        let ctx = root_ctx();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let source = LazyCommands::new().register("sync", "plugins::sync", move || {
            counter.set(counter.get() + 1);
            Command::builder("sync").build().map_err(Into::into)
        });

        assert_eq!(source.list_commands(&ctx), vec!["sync"]);
        assert_eq!(calls.get(), 0);
        assert!(!source.is_loaded("sync"));

        let first = source.get_command(&ctx, "sync").unwrap().unwrap();
        let second = source.get_command(&ctx, "sync").unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        assert!(source.is_loaded("sync"));
    }

    #[test]
    fn test_collection_first_match_wins() {
        let ctx = root_ctx();
        let first = leaf("shared");
        let mut a = StaticCommands::new();
        a.add(first.clone());
        a.add(leaf("only-a"));
        let mut b = StaticCommands::new();
        b.add(leaf("shared"));
        b.add(leaf("only-b"));

        let merged = CommandCollection::new().with_source(a).with_source(b);
        assert_eq!(
            merged.list_commands(&ctx),
            vec!["only-a", "only-b", "shared"]
        );
        let found = merged.get_command(&ctx, "shared").unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &first));
        assert!(merged.get_command(&ctx, "only-b").unwrap().is_some());
    }
}
