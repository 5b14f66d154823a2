//! Runtime registry for tool descriptors.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use capcall_primitives::Tag;
use capcall_schema::{ParameterSchema, Strictness, ValidatedInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::context::InvocationContext;
use crate::envelope::ToolOutput;
use crate::error::{ExecutorResult, RegistryError, RegistryResult};

const MAX_NAME_LEN: usize = 64;

/// Unit of work behind a tool.
///
/// Executors that do more than trivial work must check the token at every
/// step boundary and return [`crate::ExecutorError::Cancelled`] once it flips.
/// Anything an executor opens must be released on every exit path.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs the tool with validated input.
    async fn execute(
        &self,
        input: ValidatedInput,
        ctx: InvocationContext,
        token: CancellationToken,
    ) -> ExecutorResult<ToolOutput>;
}

#[async_trait]
impl<F, Fut> ToolExecutor for F
where
    F: Send + Sync + Fn(ValidatedInput, InvocationContext, CancellationToken) -> Fut,
    Fut: Future<Output = ExecutorResult<ToolOutput>> + Send,
{
    async fn execute(
        &self,
        input: ValidatedInput,
        ctx: InvocationContext,
        token: CancellationToken,
    ) -> ExecutorResult<ToolOutput> {
        (self)(input, ctx, token).await
    }
}

/// Static registration unit pairing a name, schema, and executor.
pub struct ToolDescriptor {
    name: String,
    description: String,
    schema: ParameterSchema,
    tags: BTreeSet<Tag>,
    timeout: Option<Duration>,
    strictness: Option<Strictness>,
    executor: Arc<dyn ToolExecutor>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("fields", &self.schema.fields().len())
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .field("strictness", &self.strictness)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Starts building a descriptor for the supplied name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolDescriptorBuilder {
        ToolDescriptorBuilder {
            name: name.into(),
            description: None,
            schema: ParameterSchema::empty(),
            tags: BTreeSet::new(),
            timeout: None,
            strictness: None,
        }
    }

    /// Returns the machine-addressable tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to the caller.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// Returns the category labels.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    /// Returns `true` if the descriptor carries the tag.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Returns the per-tool time limit, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the per-tool strictness override, if any.
    #[must_use]
    pub const fn strictness(&self) -> Option<Strictness> {
        self.strictness
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn ToolExecutor> {
        &self.executor
    }

    /// Returns the serialisable advertisement for this tool.
    #[must_use]
    pub fn manifest(&self) -> ToolManifest {
        ToolManifest {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.iter().cloned().collect(),
            parameters: self.schema.to_json_schema(),
        }
    }
}

/// Builder for [`ToolDescriptor`].
#[derive(Debug)]
pub struct ToolDescriptorBuilder {
    name: String,
    description: Option<String>,
    schema: ParameterSchema,
    tags: BTreeSet<Tag>,
    timeout: Option<Duration>,
    strictness: Option<Strictness>,
}

impl ToolDescriptorBuilder {
    /// Sets the natural-language description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a category label.
    #[must_use]
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// Adds several category labels.
    #[must_use]
    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Limits how long the executor may run before its token is cancelled.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the dispatcher's unknown-field policy for this tool.
    #[must_use]
    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = Some(strictness);
        self
    }

    /// Finalises the descriptor with its executor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidDescriptor`] if the name is empty, too
    /// long, or malformed, or if the description is missing.
    pub fn build<E>(self, executor: E) -> RegistryResult<ToolDescriptor>
    where
        E: ToolExecutor + 'static,
    {
        validate_name(&self.name)?;

        let description = self
            .description
            .filter(|description| !description.trim().is_empty())
            .ok_or_else(|| RegistryError::InvalidDescriptor {
                reason: format!("tool `{}` must have a description", self.name),
            })?;

        Ok(ToolDescriptor {
            name: self.name,
            description,
            schema: self.schema,
            tags: self.tags,
            timeout: self.timeout,
            strictness: self.strictness,
            executor: Arc::new(executor),
        })
    }
}

fn validate_name(name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(RegistryError::InvalidDescriptor {
            reason: "tool name cannot be empty".into(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(RegistryError::InvalidDescriptor {
            reason: format!("tool name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(RegistryError::InvalidDescriptor {
            reason: format!(
                "tool name `{name}` must contain lowercase alphanumeric, dash, underscore, or dot"
            ),
        });
    }

    Ok(())
}

/// Serialisable description of a tool for orchestrators and models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Tool name.
    pub name: String,
    /// Natural-language description.
    pub description: String,
    /// Category labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// JSON Schema of the accepted input.
    pub parameters: Value,
}

/// Registry that stores tool descriptors keyed by name.
///
/// Registration happens during warm-up; lookups may run concurrently from any
/// number of tasks afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<HashMap<String, Arc<ToolDescriptor>>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is already present;
    /// the existing registration is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(&self, descriptor: ToolDescriptor) -> RegistryResult<()> {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let name = descriptor.name().to_owned();
        if inner.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }

        debug!(tool = %name, tags = descriptor.tags.len(), "tool registered");
        inner.insert(name, Arc::new(descriptor));
        Ok(())
    }

    /// Resolves a descriptor by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no tool has that name.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn resolve(&self, name: &str) -> RegistryResult<Arc<ToolDescriptor>> {
        self.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_owned(),
        })
    }

    /// Returns the descriptor matching the supplied name, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner.get(name).cloned()
    }

    /// Returns every descriptor, sorted by name.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ToolDescriptor>> {
        let inner = self.inner.read().expect("tool registry poisoned");
        let mut descriptors: Vec<_> = inner.values().cloned().collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.list().iter().map(|d| d.name.clone()).collect()
    }

    /// Returns descriptors carrying the given tag, sorted by name.
    #[must_use]
    pub fn with_tag(&self, tag: &Tag) -> Vec<Arc<ToolDescriptor>> {
        self.list().into_iter().filter(|d| d.has_tag(tag)).collect()
    }

    /// Returns manifests for every registered tool, sorted by name.
    #[must_use]
    pub fn manifests(&self) -> Vec<ToolManifest> {
        self.list().iter().map(|d| d.manifest()).collect()
    }

    /// Returns the number of registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("tool registry poisoned").len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
