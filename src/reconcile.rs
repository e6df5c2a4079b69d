//! Bring the backend's loaded checkpoint and VAE in line with a request
//!
//! Failures here never abort generation: each step reports its own result
//! and the pipeline logs it and carries on with whatever is loaded.

use webui::{OptionsUpdate, WebUiApi, WebUiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    NotRequested,
    AlreadyActive,
    Switched,
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub vae: Result<SwitchOutcome, WebUiError>,
    pub model: Result<SwitchOutcome, WebUiError>,
}

impl ReconcileReport {
    /// Emit one log line per step that did not succeed
    pub fn log(&self, model: &str, vae: Option<&str>) {
        match &self.vae {
            Ok(SwitchOutcome::Switched) => {
                tracing::info!("Switched VAE to {}", vae.unwrap_or_default())
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("VAE switch failed, continuing: {}", e),
        }
        match &self.model {
            Ok(SwitchOutcome::Switched) => tracing::info!("Switched model to {}", model),
            Ok(SwitchOutcome::AlreadyActive) => tracing::debug!("Model {} already loaded", model),
            Ok(SwitchOutcome::NotRequested) => {}
            Err(e) => tracing::warn!("Model switch failed, continuing: {}", e),
        }
    }
}

/// The loaded checkpoint title carries a hash suffix (`name [abc123]`), so
/// a substring match counts as already loaded
pub fn model_is_loaded(current: &str, desired: &str) -> bool {
    current.contains(desired)
}

pub struct Reconciler<'a> {
    backend: &'a dyn WebUiApi,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn WebUiApi) -> Self {
        Self { backend }
    }

    /// Apply the VAE (if any), then the model. A blank model is left alone.
    pub async fn reconcile(&self, model: &str, vae: Option<&str>) -> ReconcileReport {
        let observed = self.backend.get_options().await;

        let vae_result = match vae.filter(|v| !v.trim().is_empty()) {
            None => Ok(SwitchOutcome::NotRequested),
            Some(vae) => {
                let current = observed.as_ref().ok().and_then(|o| o.sd_vae.as_deref());
                if current == Some(vae) {
                    Ok(SwitchOutcome::AlreadyActive)
                } else {
                    self.backend
                        .set_options(&OptionsUpdate::vae(vae))
                        .await
                        .map(|_| SwitchOutcome::Switched)
                }
            }
        };

        let model_result = if model.trim().is_empty() {
            Ok(SwitchOutcome::NotRequested)
        } else {
            match observed {
                Err(e) => Err(e),
                Ok(options) => {
                    let current = options.sd_model_checkpoint.unwrap_or_default();
                    if model_is_loaded(&current, model) {
                        Ok(SwitchOutcome::AlreadyActive)
                    } else {
                        tracing::info!("Switching model from '{}' to '{}'", current, model);
                        self.backend
                            .set_options(&OptionsUpdate::model(model))
                            .await
                            .map(|_| SwitchOutcome::Switched)
                    }
                }
            }
        };

        ReconcileReport {
            vae: vae_result,
            model: model_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;

    #[tokio::test]
    async fn test_loaded_model_not_switched() {
        let backend = FakeBackend::with_model("foo-v1 [abc123]");
        let report = Reconciler::new(&backend).reconcile("foo-v1", None).await;
        assert_eq!(report.model.unwrap(), SwitchOutcome::AlreadyActive);
        assert_eq!(report.vae.unwrap(), SwitchOutcome::NotRequested);
        assert!(backend.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_different_model_switched_once() {
        let backend = FakeBackend::with_model("foo-v1 [abc123]");
        let report = Reconciler::new(&backend).reconcile("bar-v2", None).await;
        assert_eq!(report.model.unwrap(), SwitchOutcome::Switched);
        let updates = backend.updates.lock().unwrap();
        assert_eq!(updates.as_slice(), &[OptionsUpdate::model("bar-v2")]);
    }

    #[tokio::test]
    async fn test_vae_applied_before_model() {
        let backend = FakeBackend::with_model("foo-v1");
        let report = Reconciler::new(&backend)
            .reconcile("bar-v2", Some("kl-f8-anime2"))
            .await;
        assert_eq!(report.vae.unwrap(), SwitchOutcome::Switched);
        assert_eq!(report.model.unwrap(), SwitchOutcome::Switched);
        let updates = backend.updates.lock().unwrap();
        assert_eq!(
            updates.as_slice(),
            &[OptionsUpdate::vae("kl-f8-anime2"), OptionsUpdate::model("bar-v2")]
        );
    }

    #[tokio::test]
    async fn test_active_vae_not_posted() {
        let backend = FakeBackend::with_model("foo-v1 [abc123]");
        backend.options.lock().unwrap().sd_vae = Some("kl-f8-anime2".into());

        let report = Reconciler::new(&backend)
            .reconcile("foo-v1", Some("kl-f8-anime2"))
            .await;
        assert_eq!(report.vae.unwrap(), SwitchOutcome::AlreadyActive);
        assert_eq!(report.model.unwrap(), SwitchOutcome::AlreadyActive);
        assert_eq!(backend.calls(), vec!["get_options"]);
        assert!(backend.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let mut backend = FakeBackend::with_model("foo-v1");
        backend.options_fail = true;
        let report = Reconciler::new(&backend).reconcile("bar-v2", None).await;
        assert!(report.model.is_err());
        assert!(backend.updates.lock().unwrap().is_empty());

        let mut backend = FakeBackend::with_model("foo-v1");
        backend.set_fail = true;
        let report = Reconciler::new(&backend).reconcile("bar-v2", Some("vae")).await;
        assert!(report.vae.is_err());
        assert!(report.model.is_err());
        assert_eq!(backend.updates.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_model_left_alone() {
        let backend = FakeBackend::with_model("foo-v1");
        let report = Reconciler::new(&backend).reconcile("", None).await;
        assert_eq!(report.model.unwrap(), SwitchOutcome::NotRequested);
        assert_eq!(backend.calls(), vec!["get_options"]);
    }
}
