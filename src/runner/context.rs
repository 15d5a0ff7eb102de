//! Invocation context for one command level
//!
//! Every level of a dispatch gets its own [`Context`], linked to the level
//! above it. The context holds the resolved parameter values, the
//! application object, a meta map shared by the whole chain, and the
//! cleanup actions registered while the level runs.

use crate::config::DefaultMap;
use crate::error::{Error, Result, UsageError, UsageErrorKind};
use crate::help;
use crate::model::{envvar_name, Command, Value};
use crate::parser::{NegativeNumbers, TokenNormalizer};
use crate::runner::prompt::{Prompter, TerminalPrompter};
use log::trace;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

/// Where a parameter's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSource {
    CommandLine,
    Environment,
    DefaultMap,
    Default,
    Prompt,
}

/// Settings applied to a context when it is created.
///
/// Unset fields fall back to the parent context (or to the command's own
/// parser defaults), so a setting given at the root reaches every level.
#[derive(Clone, Default)]
pub struct ContextSettings {
    pub auto_envvar_prefix: Option<String>,
    pub default_map: Option<DefaultMap>,
    pub help_option_names: Option<Vec<String>>,
    pub token_normalize: Option<TokenNormalizer>,
    pub resilient_parsing: bool,
    pub allow_extra_args: Option<bool>,
    pub allow_interspersed_args: Option<bool>,
    pub ignore_unknown_options: Option<bool>,
    pub negative_numbers: Option<NegativeNumbers>,
    pub obj: Option<Rc<dyn Any>>,
    pub prompter: Option<Rc<dyn Prompter>>,
}

impl ContextSettings {
    pub fn new() -> Self {
        ContextSettings::default()
    }

    /// Derive `PREFIX_PARAM` env var names for options without explicit ones
    pub fn with_auto_envvar_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.auto_envvar_prefix = Some(prefix.into());
        self
    }

    pub fn with_default_map(mut self, map: DefaultMap) -> Self {
        self.default_map = Some(map);
        self
    }

    pub fn with_help_option_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.help_option_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_token_normalize(mut self, normalize: impl Fn(&str) -> String + 'static) -> Self {
        self.token_normalize = Some(Rc::new(normalize));
        self
    }

    pub fn with_resilient_parsing(mut self, resilient: bool) -> Self {
        self.resilient_parsing = resilient;
        self
    }

    pub fn with_allow_extra_args(mut self, value: bool) -> Self {
        self.allow_extra_args = Some(value);
        self
    }

    pub fn with_allow_interspersed_args(mut self, value: bool) -> Self {
        self.allow_interspersed_args = Some(value);
        self
    }

    pub fn with_ignore_unknown_options(mut self, value: bool) -> Self {
        self.ignore_unknown_options = Some(value);
        self
    }

    pub fn with_negative_numbers(mut self, policy: NegativeNumbers) -> Self {
        self.negative_numbers = Some(policy);
        self
    }

    pub fn with_obj<T: 'static>(mut self, obj: T) -> Self {
        self.obj = Some(Rc::new(obj));
        self
    }

    pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Some(Rc::new(prompter));
        self
    }

    /// `self` overlaid with every field `over` sets
    pub fn merged(&self, over: &ContextSettings) -> ContextSettings {
        ContextSettings {
            auto_envvar_prefix: over
                .auto_envvar_prefix
                .clone()
                .or_else(|| self.auto_envvar_prefix.clone()),
            default_map: over.default_map.clone().or_else(|| self.default_map.clone()),
            help_option_names: over
                .help_option_names
                .clone()
                .or_else(|| self.help_option_names.clone()),
            token_normalize: over
                .token_normalize
                .clone()
                .or_else(|| self.token_normalize.clone()),
            resilient_parsing: over.resilient_parsing || self.resilient_parsing,
            allow_extra_args: over.allow_extra_args.or(self.allow_extra_args),
            allow_interspersed_args: over
                .allow_interspersed_args
                .or(self.allow_interspersed_args),
            ignore_unknown_options: over.ignore_unknown_options.or(self.ignore_unknown_options),
            negative_numbers: over.negative_numbers.or(self.negative_numbers),
            obj: over.obj.clone().or_else(|| self.obj.clone()),
            prompter: over.prompter.clone().or_else(|| self.prompter.clone()),
        }
    }
}

type MetaMap = HashMap<String, Rc<dyn Any>>;
type CloseCallback = Box<dyn FnOnce()>;

/// State of one command level during an invocation
pub struct Context {
    command: Rc<Command>,
    info_name: String,
    parent: Option<Weak<Context>>,
    self_ref: Weak<Context>,
    params: RefCell<HashMap<String, Value>>,
    sources: RefCell<HashMap<String, ParameterSource>>,
    obj: RefCell<Option<Rc<dyn Any>>>,
    meta: Rc<RefCell<MetaMap>>,
    args: RefCell<Vec<String>>,
    protected_args: RefCell<Vec<String>>,
    invoked_subcommand: RefCell<Option<String>>,
    opt_prefixes: RefCell<BTreeSet<String>>,
    resilient_parsing: bool,
    auto_envvar_prefix: Option<String>,
    default_map: Option<DefaultMap>,
    help_option_names: Vec<String>,
    token_normalize: Option<TokenNormalizer>,
    allow_extra_args: bool,
    allow_interspersed_args: bool,
    ignore_unknown_options: bool,
    negative_numbers: NegativeNumbers,
    prompter: Rc<dyn Prompter>,
    close_callbacks: RefCell<Vec<CloseCallback>>,
    depth: Cell<usize>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("command", &self.command.name())
            .field("info_name", &self.info_name)
            .field("params", &self.params.borrow())
            .field("args", &self.args.borrow())
            .field("invoked_subcommand", &self.invoked_subcommand.borrow())
            .field("resilient_parsing", &self.resilient_parsing)
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Rc<Context>>> = const { RefCell::new(Vec::new()) };
}

/// The innermost context entered on this thread
pub fn current_context() -> Option<Rc<Context>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

impl Context {
    /// Create the context for `command` invoked as `info_name`.
    ///
    /// `settings` wins over anything inherited from `parent`.
    pub fn new(
        command: Rc<Command>,
        info_name: &str,
        parent: Option<&Rc<Context>>,
        settings: ContextSettings,
    ) -> Rc<Context> {
        let obj = settings
            .obj
            .clone()
            .or_else(|| parent.and_then(|p| p.obj.borrow().clone()));
        let meta = parent
            .map(|p| p.meta.clone())
            .unwrap_or_else(|| Rc::new(RefCell::new(HashMap::new())));
        let default_map = settings.default_map.clone().or_else(|| {
            parent
                .and_then(|p| p.default_map.as_ref())
                .and_then(|m| m.child(info_name))
        });
        let auto_envvar_prefix = settings
            .auto_envvar_prefix
            .clone()
            .or_else(|| {
                parent
                    .and_then(|p| p.auto_envvar_prefix.as_ref())
                    .filter(|_| !info_name.is_empty())
                    .map(|prefix| format!("{}_{}", prefix, info_name))
            })
            .map(|prefix| envvar_name(&prefix));
        let help_option_names = settings
            .help_option_names
            .clone()
            .or_else(|| parent.map(|p| p.help_option_names.clone()))
            .unwrap_or_else(|| vec!["--help".to_string()]);
        let token_normalize = settings
            .token_normalize
            .clone()
            .or_else(|| parent.and_then(|p| p.token_normalize.clone()));
        let resilient_parsing =
            settings.resilient_parsing || parent.map_or(false, |p| p.resilient_parsing);
        let negative_numbers = settings
            .negative_numbers
            .or_else(|| parent.map(|p| p.negative_numbers))
            .unwrap_or_default();
        let prompter = settings
            .prompter
            .clone()
            .or_else(|| parent.map(|p| p.prompter.clone()))
            .unwrap_or_else(|| Rc::new(TerminalPrompter));

        trace!("creating context '{}'", info_name);
        Rc::new_cyclic(|self_ref| Context {
            allow_extra_args: settings.allow_extra_args.unwrap_or(command.allow_extra_args),
            allow_interspersed_args: settings
                .allow_interspersed_args
                .unwrap_or(command.allow_interspersed_args),
            ignore_unknown_options: settings
                .ignore_unknown_options
                .unwrap_or(command.ignore_unknown_options),
            command,
            info_name: info_name.to_string(),
            parent: parent.map(Rc::downgrade),
            self_ref: self_ref.clone(),
            params: RefCell::new(HashMap::new()),
            sources: RefCell::new(HashMap::new()),
            obj: RefCell::new(obj),
            meta,
            args: RefCell::new(Vec::new()),
            protected_args: RefCell::new(Vec::new()),
            invoked_subcommand: RefCell::new(None),
            opt_prefixes: RefCell::new(BTreeSet::new()),
            resilient_parsing,
            auto_envvar_prefix,
            default_map,
            help_option_names,
            token_normalize,
            negative_numbers,
            prompter,
            close_callbacks: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        })
    }

    pub fn command(&self) -> &Rc<Command> {
        &self.command
    }

    /// Name the command was invoked as at this level
    pub fn info_name(&self) -> &str {
        &self.info_name
    }

    pub fn parent(&self) -> Option<Rc<Context>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Space separated invocation names from the root to this level
    pub fn command_path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{} {}", parent.command_path(), self.info_name),
            None => self.info_name.clone(),
        }
    }

    pub fn find_root(&self) -> Rc<Context> {
        let mut node = self.rc();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// Closest context (this one included) satisfying `predicate`
    pub fn lookup_ancestor(&self, predicate: impl Fn(&Context) -> bool) -> Option<Rc<Context>> {
        let mut node = Some(self.rc());
        while let Some(ctx) = node {
            if predicate(&ctx) {
                return Some(ctx);
            }
            node = ctx.parent();
        }
        None
    }

    fn rc(&self) -> Rc<Context> {
        match self.self_ref.upgrade() {
            Some(rc) => rc,
            None => unreachable!("contexts are only created behind an Rc"),
        }
    }

    // Parameter values

    /// Snapshot of all resolved values
    pub fn params(&self) -> HashMap<String, Value> {
        self.params.borrow().clone()
    }

    pub fn param(&self, name: &str) -> Option<Value> {
        self.params.borrow().get(name).cloned()
    }

    /// Resolved value, `Value::None` when absent
    pub fn value(&self, name: &str) -> Value {
        self.param(name).unwrap_or_default()
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.borrow().contains_key(name)
    }

    pub fn set_param(&self, name: &str, value: Value) {
        self.params.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get_parameter_source(&self, name: &str) -> Option<ParameterSource> {
        self.sources.borrow().get(name).copied()
    }

    pub fn set_parameter_source(&self, name: &str, source: ParameterSource) {
        self.sources.borrow_mut().insert(name.to_string(), source);
    }

    // Application object and meta map

    /// This level's object if it is a `T`
    pub fn obj<T: 'static>(&self) -> Option<Rc<T>> {
        self.obj.borrow().clone().and_then(|o| o.downcast::<T>().ok())
    }

    pub fn set_obj<T: 'static>(&self, obj: T) {
        *self.obj.borrow_mut() = Some(Rc::new(obj));
    }

    /// Closest object of type `T`, walking outward from this level
    pub fn find_object<T: 'static>(&self) -> Option<Rc<T>> {
        let mut node = Some(self.rc());
        while let Some(ctx) = node {
            if let Some(obj) = ctx.obj::<T>() {
                return Some(obj);
            }
            node = ctx.parent();
        }
        None
    }

    /// [`Context::find_object`], or store `T::default()` at this level
    pub fn ensure_object<T: Default + 'static>(&self) -> Rc<T> {
        if let Some(obj) = self.find_object::<T>() {
            return obj;
        }
        let obj = Rc::new(T::default());
        *self.obj.borrow_mut() = Some(obj.clone());
        obj
    }

    pub fn meta_get<T: 'static>(&self, key: &str) -> Option<Rc<T>> {
        self.meta
            .borrow()
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Store `value` under `key`, visible from every level of the chain
    pub fn meta_set<T: 'static>(&self, key: impl Into<String>, value: T) {
        self.meta.borrow_mut().insert(key.into(), Rc::new(value));
    }

    // Dispatch state

    /// Leftover arguments not bound at this level
    pub fn args(&self) -> Vec<String> {
        self.args.borrow().clone()
    }

    pub(crate) fn set_args(&self, args: Vec<String>) {
        *self.args.borrow_mut() = args;
    }

    /// The child name token taken off the leftovers
    pub fn protected_args(&self) -> Vec<String> {
        self.protected_args.borrow().clone()
    }

    pub(crate) fn set_protected_args(&self, args: Vec<String>) {
        *self.protected_args.borrow_mut() = args;
    }

    /// Name of the child chosen at this level, if any
    pub fn invoked_subcommand(&self) -> Option<String> {
        self.invoked_subcommand.borrow().clone()
    }

    pub(crate) fn set_invoked_subcommand(&self, name: Option<String>) {
        *self.invoked_subcommand.borrow_mut() = name;
    }

    /// Option prefixes seen while parsing this level
    pub fn opt_prefixes(&self) -> BTreeSet<String> {
        self.opt_prefixes.borrow().clone()
    }

    pub(crate) fn add_opt_prefixes(&self, prefixes: &BTreeSet<String>) {
        self.opt_prefixes
            .borrow_mut()
            .extend(prefixes.iter().cloned());
    }

    // Settings

    pub fn resilient_parsing(&self) -> bool {
        self.resilient_parsing
    }

    pub fn auto_envvar_prefix(&self) -> Option<&str> {
        self.auto_envvar_prefix.as_deref()
    }

    pub fn default_map(&self) -> Option<&DefaultMap> {
        self.default_map.as_ref()
    }

    /// Default for `name` from the default map
    pub fn lookup_default(&self, name: &str) -> Option<Value> {
        self.default_map.as_ref().and_then(|m| m.get(name))
    }

    pub fn help_option_names(&self) -> Vec<String> {
        self.help_option_names.clone()
    }

    pub fn token_normalize(&self) -> Option<&TokenNormalizer> {
        self.token_normalize.as_ref()
    }

    /// Apply the normalizer, if any
    pub fn normalize_token(&self, token: &str) -> String {
        match &self.token_normalize {
            Some(normalize) => normalize(token),
            None => token.to_string(),
        }
    }

    pub fn allow_extra_args(&self) -> bool {
        self.allow_extra_args
    }

    pub fn allow_interspersed_args(&self) -> bool {
        self.allow_interspersed_args
    }

    pub fn ignore_unknown_options(&self) -> bool {
        self.ignore_unknown_options
    }

    pub fn negative_numbers(&self) -> NegativeNumbers {
        self.negative_numbers
    }

    pub fn prompter(&self) -> Rc<dyn Prompter> {
        self.prompter.clone()
    }

    // Errors and early exits

    /// Usage error raised at this level
    pub fn fail(&self, message: impl Into<String>) -> Error {
        self.attach_level(Error::usage(message))
    }

    pub fn exit(&self, code: i32) -> Error {
        Error::Exit(code)
    }

    pub fn abort(&self) -> Error {
        Error::Abort
    }

    /// Record this level on a usage error that doesn't name one yet
    pub fn attach_level(&self, err: Error) -> Error {
        match err {
            Error::Usage(usage) if usage.command_path.is_none() => {
                let help_option = self
                    .command
                    .get_help_option(self)
                    .and_then(|p| p.opts().first().cloned());
                Error::Usage(usage.with_level(self.command_path(), help::usage_line(self), help_option))
            }
            other => other,
        }
    }

    /// Usage error of `kind` raised at this level
    pub(crate) fn usage_error(&self, kind: UsageErrorKind) -> Error {
        self.attach_level(Error::Usage(UsageError::new(kind)))
    }

    // Scoped lifetime

    /// Register an action run when the outermost entry of this context
    /// exits. Actions run in reverse registration order.
    pub fn call_on_close(&self, callback: impl FnOnce() + 'static) {
        self.close_callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Run registered close actions now, last registered first
    pub fn close(&self) {
        let callbacks: Vec<CloseCallback> = self.close_callbacks.borrow_mut().drain(..).collect();
        if !callbacks.is_empty() {
            trace!("closing context '{}'", self.info_name);
        }
        for callback in callbacks.into_iter().rev() {
            callback();
        }
    }

    /// Make this the current context until the guard drops. When the last
    /// guard drops, close actions run.
    pub fn scope(&self) -> ContextGuard {
        self.scope_with(true)
    }

    /// Like [`Context::scope`]; with `cleanup == false` this entry never
    /// triggers the close actions by itself.
    pub fn scope_with(&self, cleanup: bool) -> ContextGuard {
        let ctx = self.rc();
        if !cleanup {
            ctx.depth.set(ctx.depth.get() + 1);
        }
        ctx.depth.set(ctx.depth.get() + 1);
        CURRENT.with(|stack| stack.borrow_mut().push(ctx.clone()));
        ContextGuard { ctx, cleanup }
    }

    /// Number of active entries
    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

/// Active entry of a context; see [`Context::scope`]
#[must_use = "the context is only current while the guard is alive"]
pub struct ContextGuard {
    ctx: Rc<Context>,
    cleanup: bool,
}

impl ContextGuard {
    pub fn context(&self) -> &Rc<Context> {
        &self.ctx
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|c| Rc::ptr_eq(c, &self.ctx)) {
                stack.remove(pos);
            }
        });
        let depth = &self.ctx.depth;
        depth.set(depth.get().saturating_sub(1));
        if depth.get() == 0 {
            self.ctx.close();
        }
        if !self.cleanup {
            depth.set(depth.get().saturating_sub(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    fn leaf(name: &str) -> Rc<Command> {
        Command::builder(name).build().unwrap()
    }

    fn root() -> Rc<Context> {
        Context::new(leaf("prog"), "prog", None, ContextSettings::default())
    }

    #[test]
    fn test_command_path() {
        let root = root();
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        let grandchild = Context::new(leaf("leaf"), "leaf", Some(&child), ContextSettings::default());
        assert_eq!(grandchild.command_path(), "prog sub leaf");
        assert!(Rc::ptr_eq(&grandchild.find_root(), &root));
    }

    #[test]
    fn test_object_inheritance() {
        let root = Context::new(
            leaf("prog"),
            "prog",
            None,
            ContextSettings::new().with_obj(String::from("config")),
        );
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        assert_eq!(child.obj::<String>().unwrap().as_str(), "config");

        child.set_obj(42i32);
        assert_eq!(*child.find_object::<i32>().unwrap(), 42);
        assert_eq!(child.find_object::<String>().unwrap().as_str(), "config");
        assert!(root.find_object::<i32>().is_none());
    }

    #[test]
    fn test_ensure_object() {
        let root = root();
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        let state = child.ensure_object::<StdRefCell<Vec<String>>>();
        state.borrow_mut().push("x".into());
        let again = child.ensure_object::<StdRefCell<Vec<String>>>();
        assert_eq!(again.borrow().len(), 1);
    }

    #[test]
    fn test_meta_is_shared() {
        let root = root();
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        child.meta_set("token", 7u32);
        assert_eq!(*root.meta_get::<u32>("token").unwrap(), 7);
        assert!(root.meta_get::<String>("token").is_none());
    }

    #[test]
    fn test_auto_envvar_prefix_extends() {
        let root = Context::new(
            leaf("prog"),
            "prog",
            None,
            ContextSettings::new().with_auto_envvar_prefix("my-app"),
        );
        let child = Context::new(leaf("sub"), "deploy-now", Some(&root), ContextSettings::default());
        assert_eq!(root.auto_envvar_prefix(), Some("MY_APP"));
        assert_eq!(child.auto_envvar_prefix(), Some("MY_APP_DEPLOY_NOW"));
    }

    #[test]
    fn test_default_map_child_lookup() {
        let map = DefaultMap::from_yaml("level: 1\nsub:\n  name: bob\n").unwrap();
        let root = Context::new(
            leaf("prog"),
            "prog",
            None,
            ContextSettings::new().with_default_map(map),
        );
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        assert_eq!(root.lookup_default("level"), Some(Value::Int(1)));
        assert_eq!(child.lookup_default("name"), Some(Value::from("bob")));
        assert_eq!(child.lookup_default("level"), None);
    }

    #[test]
    fn test_cleanup_runs_lifo_once() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let ctx = root();
        for n in 1..=3 {
            let log = log.clone();
            ctx.call_on_close(move || log.borrow_mut().push(n));
        }

        {
            let _outer = ctx.scope();
            {
                let _inner = ctx.scope();
                assert_eq!(ctx.depth(), 2);
            }
            assert!(log.borrow().is_empty());
        }
        assert_eq!(*log.borrow(), vec![3, 2, 1]);

        drop(ctx.scope());
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_scope_without_cleanup() {
        let closed = Rc::new(Cell::new(false));
        let ctx = root();
        let flag = closed.clone();
        ctx.call_on_close(move || flag.set(true));
        drop(ctx.scope_with(false));
        assert!(!closed.get());
        assert_eq!(ctx.depth(), 0);
        drop(ctx.scope());
        assert!(closed.get());
    }

    #[test]
    fn test_current_context_stack() {
        assert!(current_context().is_none());
        let root = root();
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        {
            let _a = root.scope();
            assert!(Rc::ptr_eq(&current_context().unwrap(), &root));
            {
                let _b = child.scope();
                assert!(Rc::ptr_eq(&current_context().unwrap(), &child));
            }
            assert!(Rc::ptr_eq(&current_context().unwrap(), &root));
        }
        assert!(current_context().is_none());
    }

    #[test]
    fn test_cleanup_runs_on_panic() {
        let closed = Rc::new(Cell::new(false));
        let ctx = root();
        let flag = closed.clone();
        ctx.call_on_close(move || flag.set(true));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.scope();
            panic!("callback failed");
        }));
        assert!(result.is_err());
        assert!(closed.get());
    }

    #[test]
    fn test_lookup_ancestor() {
        let root = root();
        let child = Context::new(leaf("sub"), "sub", Some(&root), ContextSettings::default());
        let found = child.lookup_ancestor(|c| c.info_name() == "prog").unwrap();
        assert!(Rc::ptr_eq(&found, &root));
        assert!(child.lookup_ancestor(|c| c.info_name() == "nope").is_none());
    }
}
