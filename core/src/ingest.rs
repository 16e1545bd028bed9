//! Channel reduction from interleaved PCM to the mono series the decoder consumes.

use crate::config::Channel;
use crate::error::{Result, TapeError};

/// Reduce interleaved PCM frames to a single real-valued series.
///
/// Mono input passes through. Stereo is reduced per the channel policy.
/// `max_samples` caps the output, so a long tape can be probed without
/// reading all of it.
pub fn reduce_channels(
    interleaved: &[f32],
    channels: u16,
    select: Channel,
    max_samples: Option<usize>,
) -> Result<Vec<f32>> {
    let cap = |n: usize| max_samples.map_or(n, |m| m.min(n));
    match channels {
        1 => Ok(interleaved[..cap(interleaved.len())].to_vec()),
        2 => {
            let frames = cap(interleaved.len() / 2);
            let mut series = Vec::with_capacity(frames);
            for frame in interleaved.chunks_exact(2).take(frames) {
                series.push(match select {
                    Channel::Left => frame[0],
                    Channel::Right => frame[1],
                    Channel::Sum => frame[0] + frame[1],
                });
            }
            Ok(series)
        }
        other => Err(TapeError::UnsupportedChannels(other)),
    }
}
