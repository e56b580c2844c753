//! AF-004: Resource discovery: static, no execution.
//!
//! Walks `*.rs` files under a source root, parses each into a `syn` tree and
//! classifies every file-level `const`/`static` against the [`TypeCatalog`].
//! A malformed file aborts the whole run; no partial results are returned.

use super::catalog::{normalize_path, ResourceKind, TypeCatalog};
use super::error::{Error, Result};
use super::extract;
use super::types::{Binding, DiscoveredResource, Discovery, SourceLocation};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use syn::{Expr, Item, Stmt, Type, UseTree};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Directories that hold test fixtures or build output.
const SKIPPED_DIRS: &[&str] = &["tests", "benches", "fixtures", "testdata", "target"];

/// Wrapper types peeled off declared types and values.
const WRAPPERS: &[&str] = &["LazyLock", "Lazy", "OnceLock", "Box"];

/// Discovery knobs that come from project config.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Paths (relative to the root) matching any pattern are skipped
    pub exclude: Vec<glob::Pattern>,
}

impl DiscoverOptions {
    /// Compile exclude globs.
    pub fn from_globs(globs: &[String]) -> Result<Self> {
        let exclude = globs
            .iter()
            .map(|g| {
                glob::Pattern::new(g)
                    .map_err(|e| Error::Config(format!("invalid exclude glob '{}': {}", g, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { exclude })
    }
}

/// Discover every resource under `root`.
pub fn discover(root: &Path, catalog: &TypeCatalog) -> Result<Vec<DiscoveredResource>> {
    discover_project(root, catalog, &DiscoverOptions::default()).map(|d| d.resources)
}

/// Discover resources and non-resource bindings under `root`.
pub fn discover_project(
    root: &Path,
    catalog: &TypeCatalog,
    options: &DiscoverOptions,
) -> Result<Discovery> {
    let files = source_files(root, options)?;

    // Parse everything first: one broken file must fail the run before any
    // resource is reported.
    let mut modules = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let content = decode_source(path, bytes)?;
        modules.push(parse_source(path, &content)?);
    }

    let mut discovery = Discovery {
        files: modules.len(),
        ..Discovery::default()
    };
    for module in &modules {
        let before = discovery.resources.len();
        module.extract(catalog, &mut discovery);
        debug!(
            file = %module.file.display(),
            resources = discovery.resources.len() - before,
            "scanned source file"
        );
    }
    follow_bindings(&mut discovery);

    info!(
        root = %root.display(),
        files = discovery.files,
        resources = discovery.resources.len(),
        bindings = discovery.bindings.len(),
        "discovery complete"
    );
    Ok(discovery)
}

/// Source text must be UTF-8; anything else is a malformed file.
fn decode_source(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        let line_start = valid.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let column = String::from_utf8_lossy(&valid[line_start..]).chars().count() + 1;
        Error::Parse {
            file: path.to_path_buf(),
            line: valid.iter().filter(|&&b| b == b'\n').count() + 1,
            column,
            message: format!("source is not valid UTF-8: {}", e.utf8_error()),
        }
    })
}

/// Synthesis inlines non-resource bindings, so a resource named inside a
/// binding is a dependency of every resource that uses the binding.
/// Bindings are followed transitively; each one is visited once per resource.
pub fn follow_bindings(discovery: &mut Discovery) {
    let resource_names: HashSet<&str> =
        discovery.resources.iter().map(|r| r.name.as_str()).collect();
    let mut binding_refs: HashMap<String, IndexSet<String>> = HashMap::new();
    for binding in &discovery.bindings {
        // a resource of the same name shadows the binding during lowering
        if resource_names.contains(binding.name.as_str()) {
            continue;
        }
        binding_refs
            .entry(binding.name.clone())
            .or_default()
            .extend(extract::references(&binding.value));
    }
    if binding_refs.is_empty() {
        return;
    }

    for resource in &mut discovery.resources {
        let mut pending: VecDeque<String> = resource
            .dependencies
            .iter()
            .filter(|name| binding_refs.contains_key(name.as_str()))
            .cloned()
            .collect();
        let mut visited = HashSet::new();
        let before = resource.dependencies.len();
        while let Some(name) = pending.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(refs) = binding_refs.get(&name) else {
                continue;
            };
            for reference in refs {
                if binding_refs.contains_key(reference) {
                    pending.push_back(reference.clone());
                }
                resource.dependencies.insert(reference.clone());
            }
        }
        if resource.dependencies.len() > before {
            debug!(
                name = %resource.name,
                added = resource.dependencies.len() - before,
                "references reached through bindings"
            );
        }
    }
}

/// List source files under `root`, sorted, minus fixtures and excludes.
pub fn source_files(root: &Path, options: &DiscoverOptions) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source root does not exist"),
        ));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            Error::io(path, source)
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_source_file(path) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if options.exclude.iter().any(|p| p.matches_path(relative)) {
            debug!(file = %path.display(), "excluded by glob");
            continue;
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn is_source_file(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("rs") {
        return false;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    !(stem == "tests" || stem.ends_with("_test") || stem.ends_with("_tests"))
}

// ============================================================================
// Per-file parsing
// ============================================================================

/// Import aliases of one file: local name → full path, plus glob prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    globs: Vec<String>,
}

impl AliasTable {
    /// Build the table from a file's top-level `use` items.
    pub fn from_items(items: &[Item]) -> Self {
        let mut table = Self::default();
        for item in items {
            if let Item::Use(u) = item {
                table.collect(&u.tree, Vec::new());
            }
        }
        table
    }

    fn collect(&mut self, tree: &UseTree, prefix: Vec<String>) {
        match tree {
            UseTree::Path(p) => {
                let mut next = prefix;
                next.push(p.ident.to_string());
                self.collect(&p.tree, next);
            }
            UseTree::Name(n) => {
                let ident = n.ident.to_string();
                if ident == "self" {
                    if let Some(last) = prefix.last() {
                        self.insert(last.clone(), &prefix);
                    }
                } else {
                    let mut full = prefix;
                    full.push(ident.clone());
                    self.insert(ident, &full);
                }
            }
            UseTree::Rename(r) => {
                let rename = r.rename.to_string();
                if rename == "_" {
                    return;
                }
                let mut full = prefix;
                if r.ident != "self" {
                    full.push(r.ident.to_string());
                }
                self.insert(rename, &full);
            }
            UseTree::Glob(_) => self.globs.push(normalize_path(&prefix.join("::"))),
            UseTree::Group(g) => {
                for item in &g.items {
                    self.collect(item, prefix.clone());
                }
            }
        }
    }

    fn insert(&mut self, alias: String, full: &[String]) {
        self.aliases.insert(alias, normalize_path(&full.join("::")));
    }

    /// Full path an alias stands for.
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Candidate fully qualified paths for a path as written in source.
    pub fn resolve(&self, path: &syn::Path) -> Vec<String> {
        let mut segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        if path.leading_colon.is_none() {
            while matches!(segments.first().map(String::as_str), Some("crate" | "self" | "super")) {
                segments.remove(0);
            }
        }
        let Some(first) = segments.first() else {
            return Vec::new();
        };

        if path.leading_colon.is_none() {
            if let Some(full) = self.get(first) {
                let mut resolved = vec![full.to_string()];
                resolved.extend(segments[1..].iter().cloned());
                return vec![resolved.join("::")];
            }
        }
        if segments.len() > 1 {
            return vec![segments.join("::")];
        }
        self.globs
            .iter()
            .map(|g| format!("{}::{}", g, first))
            .collect()
    }
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceModule {
    pub file: PathBuf,
    pub aliases: AliasTable,
    pub items: Vec<Item>,
}

/// Parse a file's text. Parse failures carry the file and position.
pub fn parse_source(path: &Path, content: &str) -> Result<SourceModule> {
    let file = syn::parse_file(content).map_err(|e| {
        let start = e.span().start();
        Error::Parse {
            file: path.to_path_buf(),
            line: start.line,
            column: start.column + 1,
            message: e.to_string(),
        }
    })?;
    Ok(SourceModule {
        file: path.to_path_buf(),
        aliases: AliasTable::from_items(&file.items),
        items: file.items,
    })
}

impl SourceModule {
    /// Classify every top-level `const`/`static` into resources or bindings.
    pub fn extract(&self, catalog: &TypeCatalog, out: &mut Discovery) {
        for item in &self.items {
            let (ident, ty, expr) = match item {
                Item::Const(c) => (&c.ident, c.ty.as_ref(), c.expr.as_ref()),
                Item::Static(s) => (&s.ident, s.ty.as_ref(), s.expr.as_ref()),
                _ => continue,
            };
            let name = ident.to_string();
            if name == "_" {
                continue;
            }
            let name = name.strip_prefix("r#").map(str::to_string).unwrap_or(name);
            let location = SourceLocation::new(&self.file, ident.span().start().line);
            let value = peel_value(expr).clone();

            match self.classify(catalog, ty, &value) {
                Some(kind) => {
                    let dependencies = extract::references(&value);
                    debug!(name = %name, kind = %kind, deps = dependencies.len(), "resource");
                    out.resources.push(DiscoveredResource {
                        name,
                        kind,
                        location,
                        value,
                        dependencies,
                    });
                }
                None => out.bindings.push(Binding {
                    name,
                    location,
                    value,
                }),
            }
        }
    }

    /// Declared type first; the literal's type tag only when the declared
    /// type is inferred or not a plain path.
    fn classify(&self, catalog: &TypeCatalog, ty: &Type, value: &Expr) -> Option<ResourceKind> {
        let path = match peel_type(ty) {
            Some(path) => path.clone(),
            None => literal_type_path(value)?,
        };
        self.aliases
            .resolve(&path)
            .iter()
            .find_map(|full| catalog.lookup_path(full))
    }
}

/// Strip references and wrapper types down to the resource type path.
fn peel_type(ty: &Type) -> Option<&syn::Path> {
    match ty {
        Type::Reference(r) => peel_type(&r.elem),
        Type::Paren(p) => peel_type(&p.elem),
        Type::Group(g) => peel_type(&g.elem),
        Type::Path(p) if p.qself.is_none() => {
            let last = p.path.segments.last()?;
            if WRAPPERS.contains(&last.ident.to_string().as_str()) {
                if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
                    for arg in &args.args {
                        if let syn::GenericArgument::Type(inner) = arg {
                            return peel_type(inner);
                        }
                    }
                }
            }
            Some(&p.path)
        }
        _ => None,
    }
}

/// Strip lazy initializers, closures, blocks and borrows down to the literal.
pub fn peel_value(expr: &Expr) -> &Expr {
    match expr {
        Expr::Call(call) if call.args.len() == 1 && is_wrapper_ctor(&call.func) => {
            peel_value(&call.args[0])
        }
        Expr::Closure(c) => peel_value(&c.body),
        Expr::Block(b) => match b.block.stmts.last() {
            Some(Stmt::Expr(inner, None)) => peel_value(inner),
            _ => expr,
        },
        Expr::Paren(p) => peel_value(&p.expr),
        Expr::Group(g) => peel_value(&g.expr),
        Expr::Reference(r) => peel_value(&r.expr),
        _ => expr,
    }
}

fn is_wrapper_ctor(func: &Expr) -> bool {
    let Expr::Path(p) = func else {
        return false;
    };
    let segments: Vec<String> = p.path.segments.iter().map(|s| s.ident.to_string()).collect();
    match segments.as_slice() {
        [.., ty, ctor] => ctor == "new" && WRAPPERS.contains(&ty.as_str()),
        _ => false,
    }
}

/// Type tag of a literal: struct-literal path, or the type part of a
/// `Type::constructor(..)` call, possibly followed by builder calls.
fn literal_type_path(expr: &Expr) -> Option<syn::Path> {
    match expr {
        Expr::Struct(s) => Some(s.path.clone()),
        Expr::Call(c) => {
            let Expr::Path(p) = c.func.as_ref() else {
                return None;
            };
            let len = p.path.segments.len();
            if len < 2 {
                return None;
            }
            Some(syn::Path {
                leading_colon: p.path.leading_colon,
                segments: p.path.segments.iter().take(len - 1).cloned().collect(),
            })
        }
        Expr::MethodCall(m) => literal_type_path(&m.receiver),
        _ => None,
    }
}
