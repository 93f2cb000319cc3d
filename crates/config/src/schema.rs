//! Hierarchical bit-width schema: merge, dependency ordering, resolution

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{ConfigError, Result};
use crate::expr::Expr;
use crate::value::Value;
use crate::variant::{base_table, variant_table, SizeVariant};

/// Merge `overrides` into `base`.
///
/// Nested tables merge recursively; any other value present in both is replaced by the
/// override. Keys that exist only in `overrides` are dropped, since the schema is closed.
pub fn merge_tables(base: &serde_json::Value, overrides: &serde_json::Value) -> serde_json::Value {
    match (base, overrides) {
        (serde_json::Value::Object(b), serde_json::Value::Object(o)) => {
            let merged = b
                .iter()
                .map(|(key, bv)| {
                    let value = match o.get(key) {
                        Some(ov) if bv.is_object() => merge_tables(bv, ov),
                        Some(ov) => ov.clone(),
                        None => bv.clone(),
                    };
                    (key.clone(), value)
                })
                .collect();
            serde_json::Value::Object(merged)
        }
        (b, _) => b.clone(),
    }
}

/// Fully qualified entry name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub section: String,
    pub name: String,
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.name)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Literal(Value),
    Formula { source: String, expr: Expr },
}

/// Unresolved configuration: literal entries plus parsed formulas, grouped by section
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    sections: BTreeMap<String, BTreeMap<String, Entry>>,
}

impl ConfigSchema {
    /// Build from a merged JSON table of `{ section: { name: value } }`
    pub fn from_json(table: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(root) = table else {
            return Err(ConfigError::InvalidEntry {
                key: "<root>".to_string(),
                reason: "configuration must be a table of sections".to_string(),
            });
        };

        let mut sections = BTreeMap::new();
        for (section, body) in root {
            let serde_json::Value::Object(entries) = body else {
                return Err(ConfigError::InvalidEntry {
                    key: section.clone(),
                    reason: "section must be a table".to_string(),
                });
            };
            let mut parsed = BTreeMap::new();
            for (name, raw) in entries {
                let key = format!("{section}.{name}");
                let entry = match raw {
                    serde_json::Value::String(source) => Entry::Formula {
                        expr: Expr::parse(source)?,
                        source: source.clone(),
                    },
                    other => Entry::Literal(Value::from_json(&key, other)?),
                };
                parsed.insert(name.clone(), entry);
            }
            sections.insert(section.clone(), parsed);
        }
        Ok(Self { sections })
    }

    /// Merge `overrides` into `base`, then parse
    pub fn from_tables(base: &serde_json::Value, overrides: &serde_json::Value) -> Result<Self> {
        Self::from_json(&merge_tables(base, overrides))
    }

    /// Built-in base table with one size variant applied
    pub fn for_variant(variant: SizeVariant) -> Result<Self> {
        Self::from_tables(&base_table()?, &variant_table(variant)?)
    }

    /// Base and override tables read from JSON files
    pub fn from_json_files(base: impl AsRef<Path>, overrides: Option<&Path>) -> Result<Self> {
        let base: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(base)?)?;
        let overrides = match overrides {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => serde_json::Value::Object(Default::default()),
        };
        Self::from_tables(&base, &overrides)
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Formula source of an entry, if it is formula-valued
    pub fn formula(&self, section: &str, name: &str) -> Option<&str> {
        match self.sections.get(section)?.get(name)? {
            Entry::Formula { source, .. } => Some(source.as_str()),
            Entry::Literal(_) => None,
        }
    }

    /// Map a reference made from `section` to the entry it names.
    ///
    /// The referencing section is searched first; otherwise exactly one other section
    /// must define the name.
    fn lookup_key(&self, section: &str, name: &str) -> Result<Key> {
        if self
            .sections
            .get(section)
            .is_some_and(|entries| entries.contains_key(name))
        {
            return Ok(Key {
                section: section.to_string(),
                name: name.to_string(),
            });
        }

        let owners: Vec<&String> = self
            .sections
            .iter()
            .filter(|(s, entries)| s.as_str() != section && entries.contains_key(name))
            .map(|(s, _)| s)
            .collect();
        match owners.as_slice() {
            [owner] => Ok(Key {
                section: (*owner).clone(),
                name: name.to_string(),
            }),
            [] => Err(ConfigError::UnknownKey {
                name: name.to_string(),
                section: section.to_string(),
            }),
            many => Err(ConfigError::AmbiguousReference {
                name: name.to_string(),
                sections: many
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Evaluate every entry exactly once in dependency order
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut resolver = Resolver {
            schema: self,
            resolved: BTreeMap::new(),
            stack: Vec::new(),
        };
        for (section, entries) in &self.sections {
            for name in entries.keys() {
                resolver.resolve_key(&Key {
                    section: section.clone(),
                    name: name.clone(),
                })?;
            }
        }

        let mut sections: BTreeMap<String, BTreeMap<String, Value>> = self
            .sections
            .keys()
            .map(|s| (s.clone(), BTreeMap::new()))
            .collect();
        for (key, value) in resolver.resolved {
            sections.entry(key.section).or_default().insert(key.name, value);
        }

        let resolved = ResolvedConfig { sections };
        tracing::debug!(entries = self.len(), "Configuration resolved");
        Ok(resolved)
    }
}

struct Resolver<'a> {
    schema: &'a ConfigSchema,
    resolved: BTreeMap<Key, Value>,
    stack: Vec<Key>,
}

impl Resolver<'_> {
    fn resolve_key(&mut self, key: &Key) -> Result<Value> {
        let schema = self.schema;
        if let Some(value) = self.resolved.get(key) {
            return Ok(value.clone());
        }
        if let Some(start) = self.stack.iter().position(|k| k == key) {
            let path = self.stack[start..]
                .iter()
                .chain(std::iter::once(key))
                .map(Key::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ConfigError::CyclicDependency { path });
        }

        let entry = schema
            .sections
            .get(&key.section)
            .and_then(|entries| entries.get(&key.name))
            .ok_or_else(|| ConfigError::Missing(key.to_string()))?;

        let value = match entry {
            Entry::Literal(value) => value.clone(),
            Entry::Formula { source, expr } => {
                self.stack.push(key.clone());
                let mut env = BTreeMap::new();
                for name in expr.references() {
                    let target = schema.lookup_key(&key.section, name)?;
                    env.insert(name.to_string(), self.resolve_key(&target)?);
                }
                self.stack.pop();

                let value = expr
                    .eval(&|name: &str| {
                        env.get(name)
                            .cloned()
                            .ok_or_else(|| ConfigError::Missing(name.to_string()))
                    })
                    .map_err(|e| ConfigError::Formula {
                        key: key.to_string(),
                        source: Box::new(e),
                    })?;
                tracing::trace!(key = %key, formula = %source, value = %value, "Resolved formula");
                value
            }
        };

        self.resolved.insert(key.clone(), value.clone());
        Ok(value)
    }
}

/// Fully numeric configuration for one size variant; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    sections: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ResolvedConfig {
    pub fn get(&self, section: &str, name: &str) -> Option<&Value> {
        self.sections.get(section)?.get(name)
    }

    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, Value>> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Value>)> {
        self.sections.iter().map(|(s, e)| (s.as_str(), e))
    }

    /// Look a name up across all sections; it must be defined in exactly one
    pub fn lookup(&self, name: &str) -> Result<&Value> {
        let mut found = self
            .sections
            .iter()
            .filter_map(|(section, entries)| entries.get(name).map(|v| (section, v)));
        match (found.next(), found.next()) {
            (Some((_, value)), None) => Ok(value),
            (None, _) => Err(ConfigError::Missing(name.to_string())),
            (Some((first, _)), Some((second, _))) => Err(ConfigError::AmbiguousReference {
                name: name.to_string(),
                sections: format!("{first}, {second}"),
            }),
        }
    }

    fn require(&self, section: &str, name: &str) -> Result<&Value> {
        self.get(section, name)
            .ok_or_else(|| ConfigError::Missing(format!("{section}.{name}")))
    }

    pub fn int(&self, section: &str, name: &str) -> Result<i64> {
        self.require(section, name)?.as_int(&format!("{section}.{name}"))
    }

    pub fn real(&self, section: &str, name: &str) -> Result<f64> {
        self.require(section, name)?.as_real(&format!("{section}.{name}"))
    }

    pub fn flag(&self, section: &str, name: &str) -> Result<bool> {
        self.require(section, name)?.as_bool(&format!("{section}.{name}"))
    }

    pub fn array(&self, section: &str, name: &str) -> Result<&[i64]> {
        self.require(section, name)?.as_array(&format!("{section}.{name}"))
    }

    /// Non-negative bit count, looked up in `nbit` first and then across all sections
    pub fn nbit(&self, name: &str) -> Result<u32> {
        let value = match self.get("nbit", name) {
            Some(v) => v,
            None => self.lookup(name)?,
        };
        let raw = value.as_int(name)?;
        u32::try_from(raw)
            .map_err(|_| ConfigError::Domain(format!("{name} = {raw} is not a valid bit count")))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
