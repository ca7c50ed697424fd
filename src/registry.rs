//! Backend registry and dispatcher
//!
//! Openers are registered explicitly, once, when the registry is built.
//! [`Registry::open`] walks the allowed backends in order and returns the
//! first one whose opener succeeds.

use std::collections::BTreeMap;
use std::fmt;

use crate::backend::file::FileBackend;
use crate::backend::{Backend, BackendType};
use crate::config::Config;
use crate::error::{Error, Result};

/// Builds a live backend from the shared configuration.
pub type Opener = Box<dyn Fn(&Config) -> Result<Box<dyn Backend>> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    // BTreeMap keeps openers in priority order.
    openers: BTreeMap<BackendType, Opener>,
}

impl Registry {
    /// An empty registry; nothing can be opened until backends are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend compiled in for this platform.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(all(feature = "secret-service-backend", unix, not(target_os = "macos")))]
        registry.register(BackendType::SecretService, |cfg| {
            Ok(Box::new(crate::backend::secret_service::SecretServiceBackend::open(cfg)?))
        });

        registry.register(BackendType::File, |cfg| Ok(Box::new(FileBackend::open(cfg)?)));
        registry
    }

    /// Registers `opener` for `backend`, replacing any previous opener.
    pub fn register<F>(&mut self, backend: BackendType, opener: F)
    where
        F: Fn(&Config) -> Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        self.openers.insert(backend, Box::new(opener));
    }

    /// Registered backends, in priority order.
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.openers.keys().copied().collect()
    }

    /// Opens the first allowed backend that can be opened.
    ///
    /// Per-backend failures are only logged; if none succeeds the result is
    /// [`Error::NoAvailableImplementation`].
    pub fn open(&self, cfg: &Config) -> Result<Box<dyn Backend>> {
        let candidates = match &cfg.allowed_backends {
            Some(allowed) if !allowed.is_empty() => allowed.clone(),
            _ => self.available_backends(),
        };
        tracing::debug!(backends = ?candidates, "considering backends");

        for backend in candidates {
            let Some(opener) = self.openers.get(&backend) else {
                tracing::debug!(%backend, "backend not registered");
                continue;
            };
            match opener(cfg) {
                Ok(opened) => {
                    tracing::debug!(%backend, "opened backend");
                    return Ok(opened);
                }
                Err(e) => tracing::debug!(%backend, error = %e, "failed backend"),
            }
        }
        Err(Error::NoAvailableImplementation)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("openers", &self.available_backends())
            .finish()
    }
}

/// Opens a backend from the default registry.
pub fn open(cfg: &Config) -> Result<Box<dyn Backend>> {
    Registry::with_defaults().open(cfg)
}

/// Backends compiled in for this platform, in priority order.
pub fn available_backends() -> Vec<BackendType> {
    Registry::with_defaults().available_backends()
}
