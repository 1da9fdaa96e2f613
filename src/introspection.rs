//! Controller and type introspection.
//!
//! The generator never reflects on live objects. Everything it needs to know about a
//! controller, a request validator or a middleware type goes through
//! [`ControllerMetadataProvider`], and the "obtain an instance without running its
//! constructor, then call a zero-argument accessor" capability is the explicit
//! [`TypeIntrospection`] trait.
//!
//! [`SourceTreeProvider`] implements both over an indexed source directory: invoking an
//! accessor there means reading the literal array the method returns.

use crate::error::{Error, Result};
use crate::parser::{
    extract_returned_array, parse_parameters, short_name, ClassDecl, LiteralValue,
    MethodDecl, ParsedFile, SourceParser,
};
use crate::scanner::FileScanner;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Name of the accessor returning a validator's rules.
pub const RULES_ACCESSOR: &str = "rules";

/// Parent chains longer than this are treated as cyclic.
const MAX_INHERITANCE_DEPTH: usize = 32;

const BUILTIN_TYPES: &[&str] = &[
    "int", "integer", "float", "double", "string", "bool", "boolean", "array", "mixed",
    "callable", "iterable", "object", "self", "static", "void", "null", "false", "true",
    "never",
];

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    /// Declared type; class types are fully qualified when they could be resolved
    pub declared_type: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

/// A rule as returned by a rules accessor: a pipe-delimited string or a list of tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Text(String),
    List(Vec<String>),
}

/// Field to rule mapping as returned by a rules accessor, before normalization.
pub type RawRuleMap = IndexMap<String, RuleValue>;

/// Narrow introspection capability over a single type.
pub trait TypeIntrospection {
    /// Names of the methods callable on the type, inherited ones included.
    fn list_methods(&self) -> Vec<String>;

    /// Invokes a zero-argument accessor, statically when it is static and on an instance
    /// built without running the constructor otherwise.
    fn try_invoke_static_or_bypassed(&self, method_name: &str) -> Result<RawRuleMap>;
}

/// Everything the analysis stages may ask about the application's types.
pub trait ControllerMetadataProvider: Sync {
    /// Parameters of `type_name::method`.
    fn parameters(&self, type_name: &str, method: &str) -> Result<Vec<ParameterInfo>>;

    /// Literal source text of `type_name::method`, empty when unavailable.
    fn source_text(&self, type_name: &str, method: &str) -> String;

    /// Canonical name of a loadable type, `None` when it cannot be loaded.
    fn resolve_type(&self, identifier: &str) -> Option<String>;

    /// Immediate parent of a type.
    fn parent_type(&self, type_name: &str) -> Option<String>;

    fn type_introspection<'a>(&'a self, type_name: &str) -> Option<Box<dyn TypeIntrospection + 'a>>;

    fn has_rules_accessor(&self, type_name: &str) -> bool {
        self.type_introspection(type_name)
            .map(|t| {
                t.list_methods()
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(RULES_ACCESSOR))
            })
            .unwrap_or(false)
    }

    fn invoke_rules_accessor(&self, type_name: &str) -> Result<RawRuleMap> {
        let introspection = self
            .type_introspection(type_name)
            .ok_or_else(|| Error::analysis(type_name, "type cannot be loaded"))?;
        introspection.try_invoke_static_or_bypassed(RULES_ACCESSOR)
    }
}

/// What the introspector learned about one controller action.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerInfo {
    pub controller_type: String,
    pub action_method: String,
    pub parameters: Vec<ParameterInfo>,
    /// First parameter type exposing a rules accessor
    pub request_validator: Option<String>,
    pub source: String,
}

/// Reads controller actions through a metadata provider.
pub struct ControllerIntrospector<'a> {
    provider: &'a dyn ControllerMetadataProvider,
}

impl<'a> ControllerIntrospector<'a> {
    pub fn new(provider: &'a dyn ControllerMetadataProvider) -> Self {
        Self { provider }
    }

    pub fn analyze(&self, controller_type: &str, action_method: &str) -> Result<ControllerInfo> {
        let resolved = self
            .provider
            .resolve_type(controller_type)
            .ok_or_else(|| Error::analysis(controller_type, "controller type cannot be loaded"))?;
        let parameters = self.provider.parameters(&resolved, action_method)?;
        let request_validator = self.find_request_validator(&parameters);
        let source = self.provider.source_text(&resolved, action_method);

        Ok(ControllerInfo {
            controller_type: resolved,
            action_method: action_method.to_string(),
            parameters,
            request_validator,
            source,
        })
    }

    fn find_request_validator(&self, parameters: &[ParameterInfo]) -> Option<String> {
        parameters.iter().find_map(|param| {
            let declared = param.declared_type.as_deref()?.trim_start_matches('?');
            let resolved = self.provider.resolve_type(declared)?;
            self.provider
                .has_rules_accessor(&resolved)
                .then_some(resolved)
        })
    }
}

struct IndexedClass {
    file: Arc<ParsedFile>,
    index: usize,
}

impl IndexedClass {
    fn decl(&self) -> &ClassDecl {
        &self.file.classes[self.index]
    }
}

/// Metadata provider backed by an indexed source tree.
pub struct SourceTreeProvider {
    classes: HashMap<String, IndexedClass>,
}

impl SourceTreeProvider {
    /// Scans and indexes every source file under `root`.
    pub fn from_directory(root: &Path) -> Result<Self> {
        info!("Indexing sources under {}", root.display());
        let scan = FileScanner::new(root.to_path_buf()).scan()?;
        let parsed: Vec<ParsedFile> = SourceParser::parse_files(&scan.source_files)
            .into_iter()
            .filter_map(|r| r.ok())
            .collect();
        Ok(Self::from_parsed_files(parsed))
    }

    pub fn from_parsed_files(files: Vec<ParsedFile>) -> Self {
        let mut classes = HashMap::new();
        for file in files.into_iter().map(Arc::new) {
            for (index, class) in file.classes.iter().enumerate() {
                if classes.contains_key(&class.fqcn) {
                    warn!("Duplicate declaration of {} in {}", class.fqcn, file.path.display());
                    continue;
                }
                classes.insert(
                    class.fqcn.clone(),
                    IndexedClass {
                        file: Arc::clone(&file),
                        index,
                    },
                );
            }
        }
        debug!("Indexed {} classes", classes.len());
        Self { classes }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Looks a class up by fully-qualified name, falling back to a case-insensitive
    /// match and then to an unambiguous short name.
    fn find_class(&self, name: &str) -> Option<&IndexedClass> {
        let name = name.trim().trim_start_matches('\\');
        if name.is_empty() {
            return None;
        }
        if let Some(class) = self.classes.get(name) {
            return Some(class);
        }
        if let Some((_, class)) = self.classes.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            return Some(class);
        }
        if name.contains('\\') {
            return None;
        }
        let mut candidates = self
            .classes
            .values()
            .filter(|c| c.decl().name.eq_ignore_ascii_case(name));
        match (candidates.next(), candidates.next()) {
            (Some(class), None) => Some(class),
            _ => None,
        }
    }

    /// The class chain starting at `name`, nearest first.
    fn lineage(&self, name: &str) -> Vec<&IndexedClass> {
        let mut chain = Vec::new();
        let mut current = self.find_class(name);
        while let Some(class) = current {
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                warn!("Inheritance chain of {} is too deep or cyclic", name);
                break;
            }
            chain.push(class);
            current = class.decl().parent.as_deref().and_then(|p| self.find_class(p));
        }
        chain
    }

    /// Finds the nearest declaration of `method`, walking up the parent chain.
    fn find_method(&self, type_name: &str, method: &str) -> Option<(&IndexedClass, &MethodDecl)> {
        self.lineage(type_name)
            .into_iter()
            .find_map(|class| class.decl().method(method).map(|m| (class, m)))
    }

    fn resolve_declared_type(file: &ParsedFile, declared: &str) -> String {
        let nullable = declared.starts_with('?');
        let bare = declared.trim_start_matches('?');
        if bare.contains('|') || bare.contains('&') || BUILTIN_TYPES.contains(&bare.to_lowercase().as_str()) {
            return declared.to_string();
        }
        let resolved = file.resolve_name(bare);
        if nullable {
            format!("?{}", resolved)
        } else {
            resolved
        }
    }
}

impl ControllerMetadataProvider for SourceTreeProvider {
    fn parameters(&self, type_name: &str, method: &str) -> Result<Vec<ParameterInfo>> {
        let (class, decl) = self
            .find_method(type_name, method)
            .ok_or_else(|| Error::analysis(format!("{}::{}", type_name, method), "method not found"))?;

        Ok(parse_parameters(&decl.parameters_text)
            .into_iter()
            .map(|raw| ParameterInfo {
                declared_type: raw
                    .declared_type
                    .as_deref()
                    .map(|t| Self::resolve_declared_type(&class.file, t)),
                name: raw.name,
                optional: raw.optional,
                default: raw.default,
            })
            .collect())
    }

    fn source_text(&self, type_name: &str, method: &str) -> String {
        self.find_method(type_name, method)
            .map(|(_, decl)| decl.source.clone())
            .unwrap_or_default()
    }

    fn resolve_type(&self, identifier: &str) -> Option<String> {
        self.find_class(identifier).map(|c| c.decl().fqcn.clone())
    }

    fn parent_type(&self, type_name: &str) -> Option<String> {
        self.find_class(type_name).and_then(|c| c.decl().parent.clone())
    }

    fn type_introspection<'a>(&'a self, type_name: &str) -> Option<Box<dyn TypeIntrospection + 'a>> {
        let class = self.find_class(type_name)?;
        Some(Box::new(SourceTypeIntrospection {
            provider: self,
            type_name: class.decl().fqcn.clone(),
        }))
    }
}

/// [`TypeIntrospection`] over indexed source. Static and instance accessors are handled
/// alike: no code runs, the literal returned array is read instead.
struct SourceTypeIntrospection<'a> {
    provider: &'a SourceTreeProvider,
    type_name: String,
}

impl TypeIntrospection for SourceTypeIntrospection<'_> {
    fn list_methods(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for class in self.provider.lineage(&self.type_name) {
            for method in &class.decl().methods {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&method.name)) {
                    names.push(method.name.clone());
                }
            }
        }
        names
    }

    fn try_invoke_static_or_bypassed(&self, method_name: &str) -> Result<RawRuleMap> {
        let subject = format!("{}::{}", short_name(&self.type_name), method_name);
        let (_, decl) = self
            .provider
            .find_method(&self.type_name, method_name)
            .ok_or_else(|| Error::analysis(&subject, "method not found"))?;
        let entries = extract_returned_array(&decl.source)
            .ok_or_else(|| Error::analysis(&subject, "does not return a literal array"))?;

        let mut rules = RawRuleMap::new();
        for entry in entries {
            let Some(field) = entry.key else {
                continue;
            };
            match entry.value {
                LiteralValue::Str(rule) => {
                    rules.insert(field, RuleValue::Text(rule));
                }
                LiteralValue::Array(items) => {
                    let tokens: Vec<String> = items
                        .into_iter()
                        .filter_map(|item| match item.value {
                            LiteralValue::Str(token) => Some(token),
                            _ => None,
                        })
                        .collect();
                    rules.insert(field, RuleValue::List(tokens));
                }
                LiteralValue::Expr(expr) => {
                    debug!("{}: skipping non-literal rule for {}: {}", subject, field, expr);
                }
            }
        }
        Ok(rules)
    }
}
