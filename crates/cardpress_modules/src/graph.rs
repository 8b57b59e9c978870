//! Module graph: an arena of transformed modules keyed by resolved path.
//!
//! Loading is depth-first with dependencies appended before their
//! dependents, so arena order is always a valid evaluation order. Each path
//! is loaded once per graph no matter how many modules import it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ModuleError;
use crate::specifier::{normalize, resolve, Resolution};
use crate::transform::{ImportStatement, SourceTransformer};

/// Index of a module inside its [`ModuleGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One loaded module: its transformed body and resolved bindings.
#[derive(Debug, Clone)]
pub struct SourceModule {
    pub path: PathBuf,
    /// Imported names, in source order. `params[i]` is bound to `deps[i]`.
    pub params: Vec<String>,
    pub deps: Vec<ModuleId>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    transformer: SourceTransformer,
    modules: Vec<SourceModule>,
    index: HashMap<PathBuf, ModuleId>,
    /// Paths currently being loaded, outermost first.
    loading: Vec<PathBuf>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transformer(transformer: SourceTransformer) -> Self {
        Self {
            transformer,
            ..Self::default()
        }
    }

    /// Load the module at `path` and everything it imports.
    pub fn load(&mut self, path: &Path) -> Result<ModuleId, ModuleError> {
        let path = std::path::absolute(path)
            .map(|p| normalize(&p))
            .map_err(|source| ModuleError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(&id) = self.index.get(&path) {
            trace!(path = %path.display(), "module cache hit");
            return Ok(id);
        }
        if let Some(start) = self.loading.iter().position(|p| p == &path) {
            let mut chain = self.loading[start..].to_vec();
            chain.push(path);
            return Err(ModuleError::ImportCycle { chain });
        }

        let source = std::fs::read_to_string(&path).map_err(|source| ModuleError::Read {
            path: path.clone(),
            source,
        })?;
        let transformed = self.transformer.transform(&path, &source)?;

        self.loading.push(path.clone());
        let bindings = self.load_dependencies(&path, &transformed.imports);
        self.loading.pop();
        let (params, deps) = bindings?;

        let id = ModuleId(self.modules.len());
        debug!(path = %path.display(), deps = deps.len(), "loaded module");
        self.modules.push(SourceModule {
            path: path.clone(),
            params,
            deps,
            body: transformed.body,
        });
        self.index.insert(path, id);
        Ok(id)
    }

    fn load_dependencies(
        &mut self,
        importer: &Path,
        imports: &[ImportStatement],
    ) -> Result<(Vec<String>, Vec<ModuleId>), ModuleError> {
        let mut params = Vec::new();
        let mut deps = Vec::new();
        for import in imports {
            let Some(name) = import.binding() else {
                continue;
            };
            match resolve(importer, &import.specifier) {
                Resolution::Resolved(dep_path) => {
                    deps.push(self.load(&dep_path)?);
                    params.push(name.to_string());
                }
                Resolution::NoBinding => {}
                Resolution::Unresolved => {
                    debug!(
                        importer = %importer.display(),
                        specifier = %import.specifier,
                        "dropping unresolved import"
                    );
                }
            }
        }
        Ok((params, deps))
    }

    pub fn get(&self, id: ModuleId) -> &SourceModule {
        &self.modules[id.0]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All module ids in evaluation order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }
}
