use super::*;
use crate::core::errors::SimpleError;
use ndarray::{Array2, ArrayView2};
use ort::value::TensorRef;

impl OrtInfer {
    /// Returns the configured or discovered output tensor name.
    fn get_output_name(&self) -> Result<String, MrgError> {
        if let Some(ref name) = self.output_name {
            return Ok(name.clone());
        }
        let session = self.sessions[0].lock().map_err(|_| {
            MrgError::model_inference(
                &self.model_name,
                "failed to acquire session lock",
                SimpleError::new("session lock poisoned"),
            )
        })?;
        session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| {
                MrgError::model_inference(
                    &self.model_name,
                    "no outputs available in session",
                    SimpleError::new("model may be invalid or corrupted"),
                )
            })
    }

    /// Runs the model and hands the raw int64 output (shape, data) to `processor`.
    fn run_inference_with_processor_i64<T>(
        &self,
        x: &Tensor4D,
        processor: impl FnOnce(&[i64], &[i64]) -> Result<T, MrgError>,
    ) -> Result<T, MrgError> {
        let input_shape = x.shape().to_vec();
        let output_name = self.get_output_name()?;

        let dims: Vec<i64> = input_shape.iter().map(|&d| d as i64).collect();
        let data = x.as_slice().ok_or_else(|| {
            MrgError::invalid_input(format!(
                "model '{}': input tensor is not contiguous in memory",
                self.model_name
            ))
        })?;
        let input_tensor = TensorRef::from_array_view((dims, data)).map_err(|e| {
            MrgError::model_inference(
                &self.model_name,
                format!("failed to convert input tensor with shape {:?}", input_shape),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self
            .next_idx
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.sessions.len();
        let mut session_guard = self.sessions[idx].lock().map_err(|_| {
            MrgError::model_inference(
                &self.model_name,
                format!(
                    "failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                SimpleError::new("session lock acquisition failed"),
            )
        })?;

        let outputs = session_guard.run(inputs).map_err(|e| {
            MrgError::model_inference(
                &self.model_name,
                format!(
                    "ONNX Runtime inference failed with input '{}' -> output '{}'",
                    self.input_name, output_name
                ),
                e,
            )
        })?;

        let output = outputs[output_name.as_str()]
            .try_extract_tensor::<i64>()
            .map_err(|e| {
                MrgError::model_inference(
                    &self.model_name,
                    format!("failed to extract output tensor '{}' as i64", output_name),
                    e,
                )
            })?;
        let (output_shape, output_data) = output;
        let output_shape: Vec<i64> = output_shape.iter().copied().collect();

        processor(&output_shape, output_data)
    }

    /// Runs inference on a model that emits token ids, returning them as
    /// `[sequences, seq_len]`.
    ///
    /// Accepted output layouts are `[seq_len]`, `[sequences, seq_len]` and
    /// `[1, sequences, seq_len]`.
    pub fn infer_token_ids(&self, x: &Tensor4D) -> Result<Array2<i64>, MrgError> {
        self.run_inference_with_processor_i64(x, |output_shape, output_data| {
            let (rows, cols) = match output_shape {
                [len] => (1, *len as usize),
                [rows, cols] => (*rows as usize, *cols as usize),
                [1, rows, cols] => (*rows as usize, *cols as usize),
                other => {
                    return Err(MrgError::model_inference(
                        &self.model_name,
                        format!("unexpected token id output shape {:?}", other),
                        SimpleError::new("invalid output tensor dimensions"),
                    ));
                }
            };
            let view = ArrayView2::from_shape((rows, cols), output_data)?;
            Ok(view.to_owned())
        })
    }
}
