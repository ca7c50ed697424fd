use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::BackendType;
use crate::error::{Error, Result};

/// Callback used to ask the user for a passphrase. Receives the prompt text.
pub type PromptFn = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Returns a prompt that always answers with `passphrase`.
pub fn fixed_string_prompt(passphrase: impl Into<String>) -> PromptFn {
    let passphrase = passphrase.into();
    Arc::new(move |_prompt: &str| -> Result<String> { Ok(passphrase.clone()) })
}

/// Returns a prompt that reads a passphrase from the terminal without echo.
pub fn terminal_prompt() -> PromptFn {
    Arc::new(|prompt: &str| -> Result<String> {
        rpassword::prompt_password(format!("{prompt}: "))
            .map_err(|e| Error::io("failed to read passphrase", e))
    })
}

/// Options consumed by [`crate::Registry::open`] and the backend openers.
#[derive(Clone, Default)]
pub struct Config {
    /// Ordered list of backends to try. `None` or empty means all available.
    pub allowed_backends: Option<Vec<BackendType>>,

    pub service_name: String,

    /// Collection used by the Secret Service backend.
    pub libsecret_collection_name: String,

    /// Directory that the file backend stores items in; `~` is the home dir.
    pub file_dir: PathBuf,

    /// Required by the file backend to obtain its passphrase.
    pub file_password_func: Option<PromptFn>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.libsecret_collection_name = name.clone();
        self.service_name = name;
        self
    }

    pub fn with_backends(mut self, backends: impl IntoIterator<Item = BackendType>) -> Self {
        self.allowed_backends = Some(backends.into_iter().collect());
        self
    }

    /// Like [`Config::with_backends`], but parses backend identifiers and
    /// rejects the first unknown one.
    pub fn with_backend_names<I, S>(self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let backends = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<BackendType>>>()?;
        Ok(self.with_backends(backends))
    }

    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = dir.into();
        self
    }

    pub fn with_file_password_func(mut self, prompt: PromptFn) -> Self {
        self.file_password_func = Some(prompt);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("allowed_backends", &self.allowed_backends)
            .field("service_name", &self.service_name)
            .field("libsecret_collection_name", &self.libsecret_collection_name)
            .field("file_dir", &self.file_dir)
            .field(
                "file_password_func",
                &self.file_password_func.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}
