//! Captioner Core - Embeddable image captioning orchestration.
//!
//! Captioner sends images to vision-language model services and collects the
//! captions they return. The core owns three things: a registry of named
//! backends, a generation manager that runs single or batched requests and
//! can cancel them, and the configuration both are built from.
//!
//! # Architecture
//!
//! ```text
//! Caller → GenerationManager → Registry → Backend (OpenAI / Anthropic / Mistral / Ollama)
//!        ← CaptionResult (one per image, over a task handle or batch channel)
//! ```
//!
//! The core never persists captions itself; callers hand results to a
//! [`CaptionStore`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use captioner_core::{Captioner, Config, FileDiscovery};
//!
//! #[tokio::main]
//! async fn main() -> captioner_core::Result<()> {
//!     let config = Config::load()?;
//!     let captioner = Captioner::new(config)?;
//!
//!     let caption = captioner
//!         .manager()
//!         .generate("gpt-4.1", "./cat.jpg".as_ref(), "Describe this image.")
//!         .await?;
//!     println!("{caption}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod backend;
pub mod config;
pub mod discovery;
pub mod error;
pub mod generation;
pub mod prompt;
pub mod registry;
pub mod store;

// Re-exports for convenient access
pub use backend::{Backend, BackendFactory, RequestOptions};
pub use config::Config;
pub use discovery::{FileDiscovery, ImageSource};
pub use error::{BackendError, CaptionError, CaptionerError, ConfigError, ErrorKind, Result};
pub use generation::{CaptionBatch, CaptionResult, CaptionTask, GenerateOptions, GenerationManager};
pub use prompt::{build_prompt, DEFAULT_PROMPT};
pub use registry::Registry;
pub use store::{CaptionStore, SidecarStore};

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Captioner - the main entry point, wiring configuration to a manager.
pub struct Captioner {
    config: Config,
    registry: Arc<Registry>,
    manager: GenerationManager,
}

impl Captioner {
    /// Build the registry from `config.backends` and a manager on top of it.
    ///
    /// Backends whose credential is missing are still registered; they are
    /// reported unavailable when used.
    pub fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing Captioner v{}", VERSION);
        let registry = Arc::new(Registry::from_config(&config)?);
        let manager = GenerationManager::new(
            Arc::clone(&registry),
            GenerateOptions {
                parallel: config.generation.parallel,
            },
        );
        Ok(Self {
            config,
            registry,
            manager,
        })
    }

    /// Create a Captioner from the config file at its default location.
    pub fn with_defaults() -> Result<Self> {
        let config = Config::load()?;
        Self::new(config)
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn manager(&self) -> &GenerationManager {
        &self.manager
    }

    /// Discovery configured with this instance's supported formats.
    pub fn discovery(&self) -> FileDiscovery {
        FileDiscovery::new(self.config.processing.clone())
    }
}
