//! Reconstruction of stacked observations from un-stacked frames.

/// Rebuilds the `n_steps + 1` stacked observations of one environment.
///
/// `frames` holds `n_steps + n_stack` frames of `frame_len` values: the frames in the
/// stack before the first step, followed by the observation after each step.
/// `dones[t]` flags the end of an episode at step `t`.
///
/// The observation of window `w` stacks frames `w..=w + n_stack - 1`, oldest first.
/// A frame is zeroed if an episode ended between it and the newest frame of the window,
/// so no stack reaches back across a reset.
pub fn decode(
    frames: &[f32],
    dones: &[i8],
    frame_len: usize,
    n_steps: usize,
    n_stack: usize,
) -> Vec<f32> {
    debug_assert_eq!(frames.len(), (n_steps + n_stack) * frame_len);
    debug_assert_eq!(dones.len(), n_steps);

    // keep[m] == 0 if frame m is followed by a reset
    let keep: Vec<f32> = (0..n_steps + n_stack - 1)
        .map(|m| match m.checked_sub(n_stack - 1) {
            None => 1.0,
            Some(t) => 1.0 - dones[t] as f32,
        })
        .collect();

    let mut out = vec![0f32; (n_steps + 1) * n_stack * frame_len];

    for w in 0..=n_steps {
        let j = w + n_stack - 1;
        let mut scale = 1f32;

        for lag in 0..n_stack {
            if lag > 0 {
                scale *= keep[j - lag];
            }
            if scale == 0.0 {
                break;
            }
            let src = &frames[(j - lag) * frame_len..(j - lag + 1) * frame_len];
            let slot = w * n_stack + n_stack - 1 - lag;
            let dst = &mut out[slot * frame_len..(slot + 1) * frame_len];
            dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d = s * scale);
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn numbered(n: usize) -> Vec<f32> {
        (1..=n).map(|i| i as f32).collect()
    }

    fn windows(out: &[f32], n_stack: usize) -> Vec<Vec<f32>> {
        out.chunks(n_stack).map(|c| c.to_vec()).collect()
    }

    #[test]
    fn test_decode_single_frame() {
        let out = decode(&numbered(6), &[0, 1, 0, 0, 0], 1, 5, 1);
        assert_eq!(out, vec![1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn test_decode_two_frames() {
        let out = decode(&numbered(7), &[0, 1, 0, 0, 0], 1, 5, 2);
        assert_eq!(
            windows(&out, 2),
            vec![
                vec![1., 2.],
                vec![2., 3.],
                vec![0., 4.],
                vec![4., 5.],
                vec![5., 6.],
                vec![6., 7.],
            ]
        );
    }

    #[test]
    fn test_decode_four_frames() {
        let out = decode(&numbered(9), &[0, 1, 0, 0, 0], 1, 5, 4);
        assert_eq!(
            windows(&out, 4),
            vec![
                vec![1., 2., 3., 4.],
                vec![2., 3., 4., 5.],
                vec![0., 0., 0., 6.],
                vec![0., 0., 6., 7.],
                vec![0., 6., 7., 8.],
                vec![6., 7., 8., 9.],
            ]
        );
    }

    #[test]
    fn test_decode_consecutive_resets() {
        let out = decode(&numbered(7), &[1, 1, 0], 1, 3, 4);
        assert_eq!(
            windows(&out, 4),
            vec![
                vec![1., 2., 3., 4.],
                vec![0., 0., 0., 5.],
                vec![0., 0., 0., 6.],
                vec![0., 0., 6., 7.],
            ]
        );
    }

    #[test]
    fn test_decode_multi_value_frames() {
        // frames of 2 values: [1, 10], [2, 20], [3, 30]
        let frames = vec![1., 10., 2., 20., 3., 30.];
        let out = decode(&frames, &[1], 2, 1, 2);
        assert_eq!(out, vec![1., 10., 2., 20., 0., 0., 3., 30.]);
    }
}
