//! Tensor I/O helpers shared by the model wrappers

use anyhow::Result;
use ndarray::Array4;
use openvino::{ElementType, InferRequest, Shape, Tensor};

use super::pool::SafeCompiledModel;

/// Copy an NCHW array into a new f32 tensor
pub fn to_tensor(array: &Array4<f32>) -> Result<Tensor> {
    let dims: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let shape = Shape::new(&dims)?;
    let mut tensor = Tensor::new(ElementType::F32, &shape)?;

    let raw = tensor.get_raw_data_mut()?;
    for (dst, value) in raw.chunks_exact_mut(4).zip(array.iter()) {
        dst.copy_from_slice(&value.to_ne_bytes());
    }
    Ok(tensor)
}

/// Read a whole f32 tensor
pub fn read_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let dims = tensor.get_shape()?.get_dimensions().to_vec();
    let total = dims.iter().product::<i64>().max(0) as usize;

    let data: Vec<f32> = tensor
        .get_raw_data()?
        .chunks_exact(4)
        .take(total)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(data)
}

/// Run a model on a single input and hand back the finished request
pub fn infer(model: &SafeCompiledModel, input: &Array4<f32>) -> Result<InferRequest> {
    let mut request = model.create_infer_request()?;
    let tensor = to_tensor(input)?;
    request.set_input_tensor(&tensor)?;
    request.infer()?;
    Ok(request)
}

/// Count the outputs of a finished request
pub fn output_count(request: &InferRequest) -> usize {
    (0..32)
        .take_while(|&i| request.get_output_tensor_by_index(i).is_ok())
        .count()
}
