//! Class reduction over planar logits.

use std::str::FromStr;

use anyhow::ensure;

use crate::shape::ShapeDescriptor;

/// Where the per-pixel argmax runs.
///
/// `Device` keeps the reduction next to the logits and only transfers the
/// single-byte class map back; `Host` transfers the full logit tensor and
/// reduces here. Both produce identical masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReductionStrategy {
    #[default]
    Device,
    Host,
}

impl FromStr for ReductionStrategy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "host" => Ok(Self::Host),
            other => Err(format!(
                "unknown reduction strategy {other:?}, expected \"device\" or \"host\""
            )),
        }
    }
}

/// Index of the maximum value. Ties resolve to the lowest index; an empty
/// slice has no winner.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let (mut winner, mut best) = (0, *values.first()?);
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > best {
            winner = index;
            best = value;
        }
    }
    Some(winner)
}

/// Per-pixel channel argmax of a planar `shape`-sized logit tensor into a
/// one-byte-per-pixel class map.
pub fn argmax_channels_into(
    planar: &[f32],
    shape: &ShapeDescriptor,
    mask: &mut [u8],
) -> anyhow::Result<()> {
    let plane = shape.height() * shape.width();
    ensure!(
        planar.len() >= shape.count(),
        "logit buffer shorter than {shape}"
    );
    ensure!(mask.len() >= plane, "mask buffer shorter than one plane");

    for pixel in 0..plane {
        let mut winner = 0usize;
        let mut best = planar[pixel];
        for channel in 1..shape.channels() {
            let value = planar[channel * plane + pixel];
            if value > best {
                winner = channel;
                best = value;
            }
        }
        mask[pixel] = winner as u8;
    }
    Ok(())
}

/// In-place softmax. Shifts by the maximum first so large logits do not
/// overflow the exponential.
pub fn softmax(values: &mut [f32]) {
    let Some(&max) = values
        .iter()
        .max_by(|a, b| a.total_cmp(b))
    else {
        return;
    };
    let mut sum = 0.0;
    for value in values.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    for value in values.iter_mut() {
        *value /= sum;
    }
}
