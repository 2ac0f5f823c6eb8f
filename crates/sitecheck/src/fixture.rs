//! Fixture dependency graph.
//!
//! A fixture is a named async factory that may depend on other fixtures.
//! The graph is validated when it is built: duplicate names, dependencies
//! on undefined fixtures and cycles are all definition errors. At run time
//! the fixtures a test asks for (and everything they depend on) are
//! acquired in dependency order, handed to the test body, then released in
//! reverse order. Every acquired fixture is released exactly once, whether
//! the body returns `Ok`, returns `Err` or panics.
//!
//! ```ignore
//! let graph = FixtureGraph::builder(&log)
//!     .define("page", &[], |_| async { Ok(Acquired::new(open_page().await?)) })
//!     .define("dashboard", &["page"], |deps| async move {
//!         let page = deps.get::<Page>("page")?;
//!         Ok(Acquired::new(Dashboard::new(page)))
//!     })
//!     .build()?;
//!
//! graph.run(&["dashboard"], |fx| async move {
//!     let dashboard = fx.get::<Dashboard>("dashboard")?;
//!     dashboard.assert_page_loaded().await
//! }).await?;
//! ```

use crate::logging::RunLog;
use crate::messages;
use crate::result::{SiteError, SiteResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Type-erased fixture value
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, SiteResult<()>> + Send>;
type FactoryFn = Arc<dyn Fn(FixtureDeps) -> BoxFuture<'static, SiteResult<Acquired>> + Send + Sync>;

/// A resource produced by a factory, with its optional release step
pub struct Acquired {
    value: FixtureValue,
    release: Option<ReleaseFn>,
}

impl std::fmt::Debug for Acquired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquired")
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl Acquired {
    /// Wrap a value that needs no release
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Wrap a value the factory keeps a handle to
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value: value as FixtureValue,
            release: None,
        }
    }

    /// Run `release` when the test is done with this fixture
    #[must_use]
    pub fn with_release<F, Fut>(mut self, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = SiteResult<()>> + Send + 'static,
    {
        self.release = Some(Box::new(move || release().boxed()));
        self
    }
}

/// Resolved fixtures visible to a factory or test body
#[derive(Clone, Default)]
pub struct FixtureDeps {
    values: HashMap<String, FixtureValue>,
}

impl std::fmt::Debug for FixtureDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("FixtureDeps").field("names", &names).finish()
    }
}

impl FixtureDeps {
    fn subset(all: &HashMap<String, FixtureValue>, names: &[String]) -> Self {
        let values = names
            .iter()
            .filter_map(|n| all.get(n).map(|v| (n.clone(), Arc::clone(v))))
            .collect();
        Self { values }
    }

    /// Typed access to a resolved fixture
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> SiteResult<Arc<T>> {
        let value = self.values.get(name).ok_or_else(|| SiteError::Fixture {
            name: name.to_string(),
            message: "not resolved for this scope; declare it as a dependency".to_string(),
        })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| SiteError::Fixture {
                name: name.to_string(),
                message: format!("value is not a {}", std::any::type_name::<T>()),
            })
    }

    /// Whether `name` was resolved
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of resolved fixtures
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Nothing resolved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

struct FixtureDef {
    dependencies: Vec<String>,
    factory: FactoryFn,
}

/// Collects fixture definitions
pub struct FixtureRegistryBuilder {
    log: RunLog,
    defs: Vec<(String, FixtureDef)>,
}

impl std::fmt::Debug for FixtureRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureRegistryBuilder")
            .field("defined", &self.defs.len())
            .finish()
    }
}

impl FixtureRegistryBuilder {
    /// Define `name` with its dependencies and factory
    #[must_use]
    pub fn define<F, Fut>(mut self, name: &str, dependencies: &[&str], factory: F) -> Self
    where
        F: Fn(FixtureDeps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SiteResult<Acquired>> + Send + 'static,
    {
        let factory: FactoryFn = Arc::new(move |deps| factory(deps).boxed());
        self.defs.push((
            name.to_string(),
            FixtureDef {
                dependencies: dependencies.iter().map(ToString::to_string).collect(),
                factory,
            },
        ));
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> SiteResult<FixtureGraph> {
        let mut defs = BTreeMap::new();
        for (name, def) in self.defs {
            if defs.contains_key(&name) {
                return Err(SiteError::DuplicateFixture { name });
            }
            defs.insert(name, def);
        }
        for (name, def) in &defs {
            if let Some(missing) = def.dependencies.iter().find(|d| !defs.contains_key(*d)) {
                return Err(SiteError::UnknownFixture {
                    name: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        let graph = FixtureGraph {
            log: self.log,
            defs,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Validated fixture definitions
pub struct FixtureGraph {
    log: RunLog,
    defs: BTreeMap<String, FixtureDef>,
}

impl std::fmt::Debug for FixtureGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureGraph")
            .field("fixtures", &self.defs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FixtureGraph {
    /// Start defining a graph; lifecycle events go to `log`
    #[must_use]
    pub fn builder(log: &RunLog) -> FixtureRegistryBuilder {
        FixtureRegistryBuilder {
            log: log.scoped("fixture"),
            defs: Vec::new(),
        }
    }

    /// Defined fixture names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.defs.keys().map(String::as_str).collect()
    }

    /// Whether `name` is defined
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Declared dependencies of `name`
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.defs.get(name).map(|d| d.dependencies.as_slice())
    }

    fn check_acyclic(&self) -> SiteResult<()> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for name in self.defs.keys() {
            self.visit(name, &mut marks, &mut stack, &mut Vec::new())?;
        }
        Ok(())
    }

    // Depth-first post-order; `stack` holds the current path for cycle reports.
    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> SiteResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<&str> = stack[start..].to_vec();
                path.push(name);
                return Err(SiteError::FixtureCycle {
                    path: path.join(" -> "),
                });
            }
            None => {}
        }
        let def = self.defs.get(name).ok_or_else(|| SiteError::UnknownFixture {
            name: stack.last().map_or_else(|| "<request>".to_string(), ToString::to_string),
            dependency: name.to_string(),
        })?;
        marks.insert(name, Mark::Visiting);
        stack.push(name);
        for dep in &def.dependencies {
            self.visit(dep, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    /// Acquisition order for `names`: every dependency precedes its dependents
    pub fn resolution_order(&self, names: &[&str]) -> SiteResult<Vec<String>> {
        let mut marks = HashMap::new();
        let mut order = Vec::new();
        for name in names {
            self.visit(name, &mut marks, &mut Vec::new(), &mut order)?;
        }
        Ok(order)
    }

    /// Acquire `names`, run `body`, release everything.
    ///
    /// A factory failure stops acquisition, releases what was already
    /// acquired and is returned as [`SiteError::Fixture`]. Release errors
    /// are logged and do not change the outcome. A panic in a factory or
    /// the body is resumed after release.
    pub async fn run<T, F, Fut>(&self, names: &[&str], body: F) -> SiteResult<T>
    where
        F: FnOnce(FixtureDeps) -> Fut,
        Fut: Future<Output = SiteResult<T>>,
    {
        let order = self.resolution_order(names)?;
        let mut resolved: HashMap<String, FixtureValue> = HashMap::new();
        let mut releases: Vec<(String, ReleaseFn)> = Vec::new();
        let mut early: Option<std::thread::Result<SiteResult<T>>> = None;

        for name in &order {
            let Some(def) = self.defs.get(name) else {
                continue;
            };
            let deps = FixtureDeps::subset(&resolved, &def.dependencies);
            self.log.debug(messages::fixture_event(name, "acquire"));
            match AssertUnwindSafe((def.factory)(deps)).catch_unwind().await {
                Ok(Ok(acquired)) => {
                    resolved.insert(name.clone(), acquired.value);
                    if let Some(release) = acquired.release {
                        releases.push((name.clone(), release));
                    }
                }
                Ok(Err(e)) => {
                    self.log
                        .error(messages::fixture_event(name, &format!("acquire failed: {e}")));
                    early = Some(Ok(Err(SiteError::Fixture {
                        name: name.clone(),
                        message: e.to_string(),
                    })));
                    break;
                }
                Err(panic) => {
                    self.log.error(messages::fixture_event(name, "acquire panicked"));
                    early = Some(Err(panic));
                    break;
                }
            }
        }

        let outcome = match early {
            Some(outcome) => outcome,
            None => {
                let scope = FixtureDeps { values: resolved };
                AssertUnwindSafe(body(scope)).catch_unwind().await
            }
        };

        self.release_all(releases).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn release_all(&self, mut releases: Vec<(String, ReleaseFn)>) {
        while let Some((name, release)) = releases.pop() {
            self.log.debug(messages::fixture_event(&name, "release"));
            match AssertUnwindSafe(release()).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self
                    .log
                    .warn(messages::fixture_event(&name, &format!("release failed: {e}"))),
                Err(_) => self
                    .log
                    .warn(messages::fixture_event(&name, "release panicked")),
            }
        }
    }
}
