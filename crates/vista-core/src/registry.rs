//! # Dispatch Registry
//!
//! Maps a value's structural type name to the decoder for its layout.
//!
//! Rules are anchored regular expressions tried in order; the first match
//! wins. Order matters: an iterator's name is its container's name plus a
//! suffix (`std::vector<int, A>::_iterator<false>` vs `std::vector<int, A>`),
//! and a greedy container pattern would also match the iterator. The default
//! table therefore lists iterators before containers.
//!
//! The registry is a plain value built once by the host and borrowed by every
//! [`Session`](crate::Session); there is no global registration.
//!
//! ```rust
//! use vista_core::registry::{DecoderKind, Registry};
//!
//! let registry = Registry::new();
//! assert_eq!(
//!     registry.match_name("std::vector<int, std::allocator<int>>::_iterator<false>"),
//!     Some(DecoderKind::VectorIterator)
//! );
//! assert_eq!(registry.match_name("std::vector<int, std::allocator<int>>"), Some(DecoderKind::Vector));
//! assert_eq!(registry.match_name("my::Thing"), None);
//! ```

use std::fmt;

use regex::Regex;
use tracing::trace;

use crate::decode::{Decoder, Session};
use crate::error::{VistaError, VistaResult};
use crate::types::{TypeId, TypeTable, Value};

/// Which ordered container a tree decoder presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeFlavor
{
    Map,
    Set,
}

impl TreeFlavor
{
    #[must_use]
    pub const fn container_name(self) -> &'static str
    {
        match self {
            TreeFlavor::Map => "std::map",
            TreeFlavor::Set => "std::set",
        }
    }
}

/// Every layout the engine knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind
{
    Pair,
    Tuple,
    Function,
    ReferenceWrapper,
    ListIterator,
    VectorIterator,
    List,
    Vector,
    Tree(TreeFlavor),
    TreeIterator,
    String,
    StringView,
    SharedPtr,
    UniquePtr,
    ThreadLocal,
    Lock,
    Page,
    Dentry,
    /// Pass-through to the named inner field.
    Unwrap(&'static str),
    NonNull,
    Arc,
}

impl fmt::Display for DecoderKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            DecoderKind::Pair => f.write_str("pair"),
            DecoderKind::Tuple => f.write_str("tuple"),
            DecoderKind::Function => f.write_str("function"),
            DecoderKind::ReferenceWrapper => f.write_str("reference-wrapper"),
            DecoderKind::ListIterator => f.write_str("list-iterator"),
            DecoderKind::VectorIterator => f.write_str("vector-iterator"),
            DecoderKind::List => f.write_str("list"),
            DecoderKind::Vector => f.write_str("vector"),
            DecoderKind::Tree(TreeFlavor::Map) => f.write_str("tree(map)"),
            DecoderKind::Tree(TreeFlavor::Set) => f.write_str("tree(set)"),
            DecoderKind::TreeIterator => f.write_str("tree-iterator"),
            DecoderKind::String => f.write_str("string"),
            DecoderKind::StringView => f.write_str("string-view"),
            DecoderKind::SharedPtr => f.write_str("shared-ptr"),
            DecoderKind::UniquePtr => f.write_str("unique-ptr"),
            DecoderKind::ThreadLocal => f.write_str("thread-local"),
            DecoderKind::Lock => f.write_str("lock"),
            DecoderKind::Page => f.write_str("page"),
            DecoderKind::Dentry => f.write_str("dentry"),
            DecoderKind::Unwrap(field) => write!(f, "unwrap({field})"),
            DecoderKind::NonNull => f.write_str("non-null"),
            DecoderKind::Arc => f.write_str("arc"),
        }
    }
}

/// Host-specific names the default rules depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig
{
    /// Crate prefix of the kernel's own types (`Lock`, `Page`, `Dentry`).
    pub kernel_crate: String,
    /// Register holding the per-CPU segment base.
    pub tls_base_register: String,
}

impl Default for RegistryConfig
{
    fn default() -> Self
    {
        Self {
            kernel_crate: "gbos_rust_part".to_string(),
            tls_base_register: "gs_base".to_string(),
        }
    }
}

/// One dispatch rule.
#[derive(Debug, Clone)]
pub struct Rule
{
    source: String,
    pattern: Regex,
    kind: DecoderKind,
}

impl Rule
{
    /// Compile `pattern`, anchored at both ends.
    ///
    /// ## Errors
    ///
    /// - `InvalidPattern`: the pattern is not a valid regular expression
    pub fn new(pattern: &str, kind: DecoderKind) -> VistaResult<Self>
    {
        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| VistaError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
            kind,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str
    {
        &self.source
    }

    #[must_use]
    pub const fn kind(&self) -> DecoderKind
    {
        self.kind
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool
    {
        self.pattern.is_match(name)
    }
}

/// Ordered rule list.
#[derive(Debug, Clone)]
pub struct Registry
{
    rules: Vec<Rule>,
    config: RegistryConfig,
}

impl Default for Registry
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Registry
{
    /// The default rule table with the default configuration.
    #[must_use]
    pub fn new() -> Self
    {
        Self::with_config(RegistryConfig::default())
    }

    /// The default rule table for a given configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self
    {
        let rules = default_patterns(&config.kernel_crate)
            .into_iter()
            .filter_map(|(pattern, kind)| match Rule::new(&pattern, kind) {
                Ok(rule) => Some(rule),
                Err(err) => {
                    tracing::error!(%err, "skipping default rule");
                    None
                }
            })
            .collect();
        Self { rules, config }
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder
    {
        RegistryBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig
    {
        &self.config
    }

    /// Rules in priority order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule>
    {
        self.rules.iter()
    }

    /// First rule matching a structural type name.
    #[must_use]
    pub fn match_name(&self, name: &str) -> Option<DecoderKind>
    {
        let kind = self.rules.iter().find(|rule| rule.matches(name)).map(Rule::kind);
        trace!(type_name = name, decoder = ?kind, "dispatch");
        kind
    }

    /// Decoder kind for a type: strips qualifiers and typedefs, looks through
    /// one pointer or reference, and matches the resulting name. Anonymous
    /// types have no decoder.
    #[must_use]
    pub fn classify(&self, types: &TypeTable, ty: TypeId) -> Option<DecoderKind>
    {
        match types.structural_name(ty) {
            Some(name) => self.match_name(name),
            None => {
                trace!(type_name = %types.display_name(ty), "anonymous type, no decoder");
                None
            }
        }
    }

    /// Decoder for a value inspected through `session`.
    #[must_use]
    pub fn select<'a>(&self, session: Session<'a>, value: Value) -> Option<Decoder<'a>>
    {
        self.classify(session.inferior().types(), value.type_id())
            .map(|kind| session.decoder(value, kind))
    }
}

/// Builds a registry from custom rules, optionally followed by the defaults.
#[derive(Debug, Default)]
pub struct RegistryBuilder
{
    config: RegistryConfig,
    rules: Vec<(String, DecoderKind)>,
    defaults: bool,
}

impl RegistryBuilder
{
    #[must_use]
    pub fn config(mut self, config: RegistryConfig) -> Self
    {
        self.config = config;
        self
    }

    /// Append a rule. Rules added here take priority over the defaults.
    #[must_use]
    pub fn rule(mut self, pattern: &str, kind: DecoderKind) -> Self
    {
        self.rules.push((pattern.to_string(), kind));
        self
    }

    /// Append the default rule table after the custom rules.
    #[must_use]
    pub fn with_defaults(mut self) -> Self
    {
        self.defaults = true;
        self
    }

    /// Compile all rules.
    ///
    /// ## Errors
    ///
    /// - `InvalidPattern`: a custom pattern does not compile
    pub fn build(self) -> VistaResult<Registry>
    {
        let mut patterns = self.rules;
        if self.defaults {
            patterns.extend(default_patterns(&self.config.kernel_crate));
        }
        let rules = patterns
            .iter()
            .map(|(pattern, kind)| Rule::new(pattern, *kind))
            .collect::<VistaResult<Vec<_>>>()?;
        Ok(Registry {
            rules,
            config: self.config,
        })
    }
}

fn default_patterns(kernel_crate: &str) -> Vec<(String, DecoderKind)>
{
    let krate = regex::escape(kernel_crate);
    vec![
        (r"std::pair<.*, .*>".to_string(), DecoderKind::Pair),
        (r"std::tuple<.*>".to_string(), DecoderKind::Tuple),
        (r"std::function<.*>".to_string(), DecoderKind::Function),
        (r"std::reference_wrapper<.*>".to_string(), DecoderKind::ReferenceWrapper),
        (r"std::list<.*, .*>::_iterator<.*?>".to_string(), DecoderKind::ListIterator),
        (r"std::vector<.*, .*>::_iterator<.*?>".to_string(), DecoderKind::VectorIterator),
        (r"std::list<.*, .*>".to_string(), DecoderKind::List),
        (r"std::vector<.*, .*>".to_string(), DecoderKind::Vector),
        (r"std::map<.*, .*, .*, .*>".to_string(), DecoderKind::Tree(TreeFlavor::Map)),
        (r"std::set<.*, .*, .*>".to_string(), DecoderKind::Tree(TreeFlavor::Set)),
        (r"std::impl::rbtree<.*, .*, .*>::_iterator<.*?>".to_string(), DecoderKind::TreeIterator),
        (r"std::basic_string<.*>".to_string(), DecoderKind::String),
        (r"types::string_view".to_string(), DecoderKind::StringView),
        (r"std::shared_ptr<.*>".to_string(), DecoderKind::SharedPtr),
        (r"std::unique_ptr<.*>".to_string(), DecoderKind::UniquePtr),
        (r".*::_access_[a-zA-Z0-9_]*".to_string(), DecoderKind::ThreadLocal),
        (format!(r"{krate}::sync::lock::Lock<.*>"), DecoderKind::Lock),
        (format!(r"{krate}::kernel::mem::paging::Page"), DecoderKind::Page),
        (format!(r"{krate}::kernel::([a-zA-Z_]+::)*Dentry"), DecoderKind::Dentry),
        (r"(core::([a-z_]+::)+)UnsafeCell<.+>".to_string(), DecoderKind::Unwrap("value")),
        (r"(core::([a-z_]+::)+)NonNull<.+>".to_string(), DecoderKind::NonNull),
        (r"(alloc::([a-z_]+::)+)Arc<.+>".to_string(), DecoderKind::Arc),
    ]
}
