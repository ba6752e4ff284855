use std::collections::HashMap;

use half::f16;
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::graph::{ElementType, Node, NodeKind};

/// Evaluate a lowered subgraph to a concrete f32 array.
///
/// Parameters are fed by name; only the node kinds the catalog produces are
/// understood. Used for compile-time folding and for checking lowered
/// semantics in tests.
pub fn evaluate_f32(node: &Node, feeds: &HashMap<String, ArrayD<f32>>) -> Result<ArrayD<f32>> {
    match &node.kind {
        NodeKind::Parameter { name } => feeds
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidGraph(format!("no feed for parameter {}", name))),
        NodeKind::Constant { data } => constant_to_f32(node.element_type, &node.shape, data),
        NodeKind::Pad { before, after, value } => {
            let input = evaluate_f32(&node.inputs[0], feeds)?;
            pad_constant(&input, before, after, *value)
        }
        NodeKind::Relu => {
            let input = evaluate_f32(&node.inputs[0], feeds)?;
            Ok(input.mapv(|v| v.max(0.0)))
        }
    }
}

/// Pad `input` by (before, after) per axis with a constant fill value
pub fn pad_constant<T: Clone + Zero>(
    input: &ArrayD<T>,
    before: &[usize],
    after: &[usize],
    value: Option<T>,
) -> Result<ArrayD<T>> {
    if before.len() != input.ndim() || after.len() != input.ndim() {
        return Err(Error::InvalidGraph(format!(
            "pad vectors of length {}/{} do not match rank {}",
            before.len(),
            after.len(),
            input.ndim()
        )));
    }
    let fill = value.unwrap_or_else(T::zero);
    let shape: Vec<usize> = input
        .shape()
        .iter()
        .zip(before.iter().zip(after.iter()))
        .map(|(&dim, (&b, &a))| dim + b + a)
        .collect();

    let mut output = ArrayD::from_elem(IxDyn(&shape), fill);
    let mut interior = output.view_mut();
    for (axis, (&b, &dim)) in before.iter().zip(input.shape().iter()).enumerate() {
        interior.slice_axis_inplace(Axis(axis), Slice::from(b as isize..(b + dim) as isize));
    }
    interior.assign(input);
    Ok(output)
}

fn constant_to_f32(element_type: ElementType, shape: &[usize], data: &[u8]) -> Result<ArrayD<f32>> {
    let values: Vec<f32> = match element_type {
        ElementType::F32 => data
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect(),
        ElementType::F16 => data
            .chunks_exact(2)
            .map(|raw| f16::from_le_bytes([raw[0], raw[1]]).to_f32())
            .collect(),
        other => {
            return Err(Error::InvalidGraph(format!(
                "cannot evaluate {:?} constant as f32",
                other
            )))
        }
    };
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| Error::InvalidGraph(format!("constant shape mismatch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn pad_places_fill_around_interior() {
        let input = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let output = pad_constant(&input, &[1, 0], &[0, 1], Some(9.0)).unwrap();
        assert_eq!(output.shape(), &[3, 3]);
        assert_eq!(output[[0, 0]], 9.0);
        assert_eq!(output[[1, 0]], 1.0);
        assert_eq!(output[[2, 1]], 4.0);
        assert_eq!(output[[2, 2]], 9.0);
    }

    #[test]
    fn pad_defaults_to_zero_fill() {
        let input = arr2(&[[5.0f32]]).into_dyn();
        let output = pad_constant(&input, &[1, 1], &[1, 1], None).unwrap();
        assert_eq!(output.shape(), &[3, 3]);
        assert_eq!(output[[0, 0]], 0.0);
        assert_eq!(output[[1, 1]], 5.0);
    }

    #[test]
    fn f16_constant_evaluates_as_f32() {
        let half_values = [f16::from_f32(1.5), f16::from_f32(-2.0)];
        let mut raw = Vec::new();
        for value in half_values {
            raw.extend_from_slice(&value.to_le_bytes());
        }
        let array = constant_to_f32(ElementType::F16, &[2], &raw).unwrap();
        assert_eq!(array[[0]], 1.5);
        assert_eq!(array[[1]], -2.0);
    }
}
