//! Pipeline controller: the request lifecycle and the single result slot.
//!
//! ```text
//!            submit (source present, not busy)
//!   Idle ───────────────────────────────▶ Running
//!   Succeeded                             │    │
//!   Failed  ◀──────── error ──────────────┘    │ artifact
//!                                              ▼
//!                                          Succeeded
//! ```
//!
//! A request without a source fails with [`ConvertError::NoInputSelected`]
//! and never enters Running. A request made while another is Running fails
//! with [`ConvertError::PipelineBusy`] and leaves the in-flight run alone.
//! Entering Running releases the previous artifact, and a failure leaves the
//! slot empty, so a download can never offer a stale result.

use crate::config::ConversionConfig;
use crate::dispatch::Dispatcher;
use crate::error::ConvertError;
use crate::format::{ConversionRequest, FormatKey};
use crate::output::ConversionArtifact;
use crate::progress::{NoopObserver, ProgressObserver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Message recorded when a run's future is dropped before it finishes.
pub const ABANDONED_MESSAGE: &str = "Conversion was abandoned before it finished";

/// Where the pipeline is in its lifecycle.
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    /// A conversion is in flight for the raw key `format`.
    Running { format: String },
    /// The most recent run succeeded; `artifact` is the current result.
    Succeeded {
        format: FormatKey,
        artifact: Arc<ConversionArtifact>,
    },
    /// The most recent run failed with a user-facing `message`.
    Failed { message: String },
}

impl PipelineState {
    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running { .. })
    }

    /// Short lowercase name, for logs and JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running { .. } => "running",
            PipelineState::Succeeded { .. } => "succeeded",
            PipelineState::Failed { .. } => "failed",
        }
    }
}

/// Owns the pipeline state and drives conversions through the dispatcher.
pub struct PipelineController {
    dispatcher: Dispatcher,
    observer: ProgressObserver,
    state: Mutex<PipelineState>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("dispatcher", &self.dispatcher)
            .field("state", &self.state().label())
            .finish()
    }
}

impl PipelineController {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            observer: Arc::new(NoopObserver),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Controller over the production adapters, using the config's observer.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let controller = Self::new(Dispatcher::with_defaults(config)?);
        Ok(match &config.observer {
            Some(observer) => controller.with_observer(Arc::clone(observer)),
            None => controller,
        })
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// The artifact of the most recent run, if it succeeded.
    pub fn current_artifact(&self) -> Option<Arc<ConversionArtifact>> {
        self.current_result().map(|(_, artifact)| artifact)
    }

    /// Format and artifact of the most recent run, if it succeeded.
    pub fn current_result(&self) -> Option<(FormatKey, Arc<ConversionArtifact>)> {
        match &*self.lock() {
            PipelineState::Succeeded { format, artifact } => Some((*format, Arc::clone(artifact))),
            _ => None,
        }
    }

    /// Load every engine ahead of the first request.
    pub async fn prepare(&self) -> Result<(), ConvertError> {
        self.dispatcher.prepare_all().await
    }

    /// Return to Idle, releasing any held artifact.
    pub fn reset(&self) -> Result<(), ConvertError> {
        let mut state = self.lock();
        if state.is_running() {
            return Err(ConvertError::PipelineBusy);
        }
        *state = PipelineState::Idle;
        Ok(())
    }

    /// Run one conversion request to completion.
    ///
    /// # Errors
    /// - [`ConvertError::NoInputSelected`]: no source; state unchanged.
    /// - [`ConvertError::PipelineBusy`]: a run is in flight; state unchanged.
    /// - [`ConvertError::UnsupportedFormat`] / [`ConvertError::ConversionFailed`]:
    ///   state becomes Failed.
    pub async fn submit(
        &self,
        request: ConversionRequest,
    ) -> Result<Arc<ConversionArtifact>, ConvertError> {
        let ConversionRequest { source, format: key } = request;
        let source = match source {
            Some(source) => source,
            None => {
                warn!("Conversion requested with no file selected");
                return Err(ConvertError::NoInputSelected);
            }
        };

        {
            let mut state = self.lock();
            if state.is_running() {
                warn!("Rejected '{}' request: pipeline busy", key);
                return Err(ConvertError::PipelineBusy);
            }
            *state = PipelineState::Running { format: key.clone() };
        }

        info!(
            "Converting '{}' ({} bytes) with {}",
            source.name,
            source.len(),
            key
        );
        self.observer.on_conversion_start(&key, &source.name);
        let guard = RunGuard {
            controller: self,
            armed: true,
        };

        let started = Instant::now();
        let result = self.run(&key, &source.bytes).await;
        guard.disarm();

        match result {
            Ok((format, artifact)) => {
                let artifact = Arc::new(artifact);
                *self.lock() = PipelineState::Succeeded {
                    format,
                    artifact: Arc::clone(&artifact),
                };
                info!(
                    "{} succeeded: {} bytes {} in {}ms",
                    format,
                    artifact.len(),
                    artifact.mime(),
                    started.elapsed().as_millis()
                );
                self.observer.on_conversion_complete(format, artifact.len());
                Ok(artifact)
            }
            Err(e) => {
                let message = e.to_string();
                *self.lock() = PipelineState::Failed {
                    message: message.clone(),
                };
                warn!("Conversion failed: {}", message);
                self.observer.on_conversion_error(&message);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        key: &str,
        input: &[u8],
    ) -> Result<(FormatKey, ConversionArtifact), ConvertError> {
        let format: FormatKey = key.parse()?;
        debug!("Waiting for {} engine", format);
        self.dispatcher.ensure_ready(format).await?;
        let artifact = self.dispatcher.dispatch_format(format, input).await?;
        Ok((format, artifact))
    }
}

/// Moves the pipeline to Failed if a run's future is dropped mid-flight.
struct RunGuard<'a> {
    controller: &'a PipelineController,
    armed: bool,
}

impl RunGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("{}", ABANDONED_MESSAGE);
        *self.controller.lock() = PipelineState::Failed {
            message: ABANDONED_MESSAGE.to_string(),
        };
        self.controller.observer.on_conversion_error(ABANDONED_MESSAGE);
    }
}
