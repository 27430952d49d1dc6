//! Path-keyed resource cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::{DisposalError, PoolError};
use crate::resource::{LogContent, ResourceError};

/// A resource the pool can close once nobody uses it.
pub trait Disposable: Send + Sync {
    /// The path the resource is cached under.
    fn resource_path(&self) -> &Path;

    /// Whether anyone still listens to the resource.
    fn has_change_listeners(&self) -> bool;

    /// Release the underlying OS resources.
    fn close(&self);
}

impl Disposable for LogContent {
    fn resource_path(&self) -> &Path {
        self.path()
    }

    fn has_change_listeners(&self) -> bool {
        LogContent::has_change_listeners(self)
    }

    fn close(&self) {
        LogContent::close(self);
    }
}

type Factory<R> = Box<dyn Fn(&Path) -> Result<Arc<R>, ResourceError> + Send + Sync>;

/// Shares one resource instance per path between all its users.
///
/// A resource is created on first request and stays cached until
/// [`dispose_if_unused`](Self::dispose_if_unused) finds it without
/// listeners. The listener check and the close happen under the pool lock,
/// as does the callback of [`with_resource`](Self::with_resource), so a
/// listener registered there can never be closed away.
pub struct ResourcePool<R> {
    factory: Factory<R>,
    resources: Mutex<HashMap<PathBuf, Arc<R>>>,
}

impl<R: Disposable> ResourcePool<R> {
    /// Create a pool building resources with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<R>, ResourceError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// The cached resource for `path`, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Create`] if the factory fails.
    pub fn get_or_create(&self, path: &Path) -> Result<Arc<R>, PoolError> {
        let mut resources = self.lock();
        self.lookup(&mut resources, path)
    }

    /// Run `f` on the resource for `path` while holding the pool lock.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Create`] if the factory fails.
    pub fn with_resource<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&Arc<R>) -> T,
    ) -> Result<T, PoolError> {
        let mut resources = self.lock();
        let resource = self.lookup(&mut resources, path)?;
        Ok(f(&resource))
    }

    /// Close and evict `resource` if it has no listeners.
    ///
    /// Returns `Ok(true)` if it was disposed and `Ok(false)` if it is still in
    /// use.
    ///
    /// # Errors
    ///
    /// Returns a [`DisposalError`] wrapping [`PoolError::ResourceNotOwned`]
    /// if `resource` is not the instance cached for its path.
    pub fn dispose_if_unused(&self, resource: &Arc<R>) -> Result<bool, DisposalError> {
        let path = resource.resource_path();
        let mut resources = self.lock();

        let owned = resources
            .get(path)
            .is_some_and(|cached| Arc::ptr_eq(cached, resource));
        if !owned {
            return Err(DisposalError {
                path: path.to_path_buf(),
                source: PoolError::ResourceNotOwned(path.to_path_buf()),
            });
        }

        if resource.has_change_listeners() {
            tracing::debug!(path = %path.display(), "Resource still in use");
            return Ok(false);
        }

        resources.remove(path);
        resource.close();
        tracing::info!(path = %path.display(), remaining = resources.len(), "Resource disposed");
        Ok(true)
    }

    /// Try to dispose each of `resources`, independently of the others.
    pub fn dispose_all_if_unused<'a, I>(&self, resources: I) -> Vec<Result<bool, DisposalError>>
    where
        I: IntoIterator<Item = &'a Arc<R>>,
        R: 'a,
    {
        resources
            .into_iter()
            .map(|resource| self.dispose_if_unused(resource))
            .collect()
    }

    /// Whether a resource is cached for `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(
        &self,
        resources: &mut HashMap<PathBuf, Arc<R>>,
        path: &Path,
    ) -> Result<Arc<R>, PoolError> {
        if let Some(resource) = resources.get(path) {
            return Ok(Arc::clone(resource));
        }

        tracing::debug!(path = %path.display(), "Pool miss, creating resource");
        let resource = (self.factory)(path).map_err(|source| PoolError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        resources.insert(path.to_path_buf(), Arc::clone(&resource));
        Ok(resource)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<R>>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> std::fmt::Debug for ResourcePool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ResourcePool")
            .field("cached", &cached)
            .finish_non_exhaustive()
    }
}
