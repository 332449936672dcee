//! Sum-product message rules.
//!
//! Variables multiply what they have heard from every neighbor except the
//! recipient. Factors weight their potential by the same "everything but the
//! recipient" messages and sum out every axis except the recipient's.

use ndarray::{Axis, IxDyn};

use crate::graph::models::{Edge, Message, NORMALIZATION_FLOOR, Potential, VariableId};

/// Elementwise product of the messages stored in `edges`, skipping slot
/// `exclude`. With nothing to multiply the result is all ones.
pub fn product_excluding<N>(edges: &[Edge<N>], domain_size: usize, exclude: Option<usize>) -> Message
where
    N: Copy,
{
    let mut product = Message::ones(domain_size);
    for (slot, edge) in edges.iter().enumerate() {
        if Some(slot) == exclude {
            continue;
        }
        product *= edge.message();
    }
    product
}

/// Multiplies `tensor` along `axis` by `message` and sums that axis out.
pub fn contract_axis(tensor: &Potential, axis: usize, message: &Message) -> Potential {
    let mut shape = tensor.shape().to_vec();
    shape.remove(axis);
    let mut reduced = Potential::zeros(IxDyn(&shape));
    for (state, slice) in tensor.axis_iter(Axis(axis)).enumerate() {
        reduced.scaled_add(message[state], &slice);
    }
    reduced
}

/// Factor-to-variable message toward slot `keep`.
///
/// Axes are contracted from the highest index down, so every axis still to
/// be contracted sits at its original position in the shrinking tensor.
pub fn contract_excluding(potential: &Potential, edges: &[Edge<VariableId>], keep: usize) -> Message {
    let mut reduced = potential.clone();
    for axis in (0..edges.len()).rev() {
        if axis == keep {
            continue;
        }
        reduced = contract_axis(&reduced, axis, edges[axis].message());
    }
    reduced.iter().copied().collect()
}

/// Scales `belief` to sum to one, dividing by at least `NORMALIZATION_FLOOR`.
pub fn normalize(belief: &Message) -> Message {
    let total = belief.sum().max(NORMALIZATION_FLOOR);
    belief / total
}

/// Scales `message` to sum to one. Zero or non-finite totals are left alone.
pub fn rescale(message: Message) -> Message {
    let total = message.sum();
    if total > 0.0 && total.is_finite() {
        message / total
    } else {
        message
    }
}

/// Largest absolute componentwise difference. Vectors of different length
/// are infinitely far apart.
pub fn max_abs_delta(previous: &Message, next: &Message) -> f64 {
    if previous.len() != next.len() {
        return f64::INFINITY;
    }
    previous
        .iter()
        .zip(next.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// Largest componentwise difference after scaling both vectors to sum to
/// one, so a message with tiny entries moves as much as its shape does.
pub fn relative_delta(previous: &Message, next: &Message) -> f64 {
    max_abs_delta(&rescale(previous.clone()), &rescale(next.clone()))
}
