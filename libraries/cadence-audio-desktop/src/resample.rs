//! Streaming stereo resampler

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Converts interleaved stereo between sample rates, packet by packet
///
/// Input is buffered until a full resampler chunk (0.1 s) is available, so
/// packets smaller than a chunk produce no output until enough arrive.
pub(crate) struct StereoResampler {
    inner: SincFixedIn<f32>,
    pending: [Vec<f32>; 2],
}

impl StereoResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let chunk_frames = (source_rate as usize / 10).max(1);

        let inner = SincFixedIn::<f32>::new(
            target_rate as f64 / source_rate as f64,
            2.0,
            params,
            chunk_frames,
            2,
        )
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

        Ok(Self {
            inner,
            pending: [
                Vec::with_capacity(chunk_frames * 2),
                Vec::with_capacity(chunk_frames * 2),
            ],
        })
    }

    /// Feed interleaved stereo, receive whatever full chunks are ready
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        for frame in interleaved.chunks_exact(2) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let chunk = [&self.pending[0][..needed], &self.pending[1][..needed]];
            let resampled = self
                .inner
                .process(&chunk[..], None)
                .map_err(|e| AudioError::ResampleError(e.to_string()))?;
            interleave_into(&resampled, &mut output);

            for channel in &mut self.pending {
                channel.drain(..needed);
            }
        }
        Ok(output)
    }

    /// Resample whatever is still buffered (end of stream)
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }

        let chunk = [&self.pending[0][..], &self.pending[1][..]];
        let resampled = self
            .inner
            .process_partial(Some(&chunk[..]), None)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;

        let mut output = Vec::new();
        interleave_into(&resampled, &mut output);
        for channel in &mut self.pending {
            channel.clear();
        }
        Ok(output)
    }
}

fn interleave_into(planar: &[Vec<f32>], output: &mut Vec<f32>) {
    let [left, right] = planar else {
        return;
    };
    output.reserve(left.len() * 2);
    for (l, r) in left.iter().zip(right) {
        output.push(*l);
        output.push(*r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_packets_are_buffered() {
        let mut resampler = StereoResampler::new(44_100, 48_000).unwrap();
        let out = resampler.push(&[0.0; 200]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn upsampling_grows_output() {
        let mut resampler = StereoResampler::new(44_100, 48_000).unwrap();
        let second = vec![0.25_f32; 44_100 * 2];

        let mut out = resampler.push(&second).unwrap();
        out.extend(resampler.flush().unwrap());

        assert_eq!(out.len() % 2, 0);
        assert!(out.len() > second.len());
    }
}
