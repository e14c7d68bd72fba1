//! Coqui XTTS backend using PyO3 to embed Python.
//!
//! The model is loaded once per acquisition and kept alive by the engine
//! handle; dropping the handle releases it and clears the CUDA cache.

use super::{EngineProvider, SynthesisEngine, SynthesisRequest, check_language};
use crate::error::SynthesisError;
use async_trait::async_trait;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;
use std::sync::Arc;

fn py_err(context: &str, e: PyErr) -> SynthesisError {
    SynthesisError::Backend(format!("{}: {}", context, e))
}

pub struct XttsProvider {
    model_name: String,
    device: String,
}

impl XttsProvider {
    pub fn new(model_name: String, device: Option<String>) -> Self {
        Self {
            model_name,
            device: device.unwrap_or_else(|| "cpu".to_string()),
        }
    }
}

#[async_trait]
impl EngineProvider for XttsProvider {
    async fn acquire(&self) -> Result<Box<dyn SynthesisEngine>, SynthesisError> {
        let model_name = self.model_name.clone();
        let device = self.device.clone();

        log::info!("Loading {} on {}", model_name, device);
        let model = tokio::task::spawn_blocking(move || {
            Python::with_gil(|py| -> PyResult<Py<PyAny>> {
                let api = py.import("TTS.api")?;
                let tts = api.getattr("TTS")?.call1((model_name.as_str(),))?;
                let tts = tts.call_method1("to", (device.as_str(),))?;
                Ok(tts.unbind())
            })
            .map_err(|e| py_err("failed to load XTTS model", e))
        })
        .await
        .map_err(|e| SynthesisError::Backend(format!("model loader panicked: {}", e)))??;

        Ok(Box::new(XttsEngine {
            model: Some(Arc::new(model)),
            device: self.device.clone(),
        }))
    }
}

pub struct XttsEngine {
    /// Taken on drop so the model is released before memory is reclaimed
    model: Option<Arc<Py<PyAny>>>,
    device: String,
}

#[async_trait]
impl SynthesisEngine for XttsEngine {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<(), SynthesisError> {
        check_language(request.language)?;

        let model = self
            .model
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| SynthesisError::Backend("XTTS model already released".into()))?;
        let text = request.text.to_string();
        let speaker = request.voice.path().to_string_lossy().into_owned();
        let language = request.language.to_string();
        let output_path = output_path.to_string_lossy().into_owned();

        // Run in a blocking task to not block the tokio runtime
        tokio::task::spawn_blocking(move || {
            Python::with_gil(|py| -> PyResult<()> {
                let kwargs = PyDict::new(py);
                kwargs.set_item("text", text)?;
                kwargs.set_item("speaker_wav", speaker)?;
                kwargs.set_item("language", language)?;
                kwargs.set_item("file_path", output_path)?;
                model.bind(py).call_method("tts_to_file", (), Some(&kwargs))?;
                Ok(())
            })
            .map_err(|e| py_err("tts_to_file failed", e))
        })
        .await
        .map_err(|e| SynthesisError::Backend(format!("synthesis task panicked: {}", e)))?
    }

    fn name(&self) -> &str {
        "xtts"
    }
}

impl XttsEngine {
    /// Drop the model reference, then reclaim Python and CUDA memory.
    fn release(&mut self, py: Python<'_>) -> PyResult<()> {
        // Decref under the GIL so the collector sees the model unreferenced
        drop(self.model.take());
        py.import("gc")?.call_method0("collect")?;
        if self.device.starts_with("cuda") {
            let cuda = py.import("torch")?.getattr("cuda")?;
            cuda.call_method0("empty_cache")?;
        }
        Ok(())
    }
}

impl Drop for XttsEngine {
    fn drop(&mut self) {
        if let Err(e) = Python::with_gil(|py| self.release(py)) {
            log::warn!("Failed to release XTTS memory: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_frees_model_while_gil_held() {
        Python::with_gil(|py| {
            let model = py
                .import("argparse")
                .unwrap()
                .getattr("Namespace")
                .unwrap()
                .call0()
                .unwrap();
            let weak = py
                .import("weakref")
                .unwrap()
                .getattr("ref")
                .unwrap()
                .call1((&model,))
                .unwrap();

            let mut engine = XttsEngine {
                model: Some(Arc::new(model.unbind())),
                device: "cpu".into(),
            };
            engine.release(py).unwrap();

            assert!(engine.model.is_none());
            assert!(weak.call0().unwrap().is_none());
        });
    }
}
