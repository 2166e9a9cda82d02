#![allow(dead_code)]

use tenconv_core::{output_geometry, ConvConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic pseudo-random fill in [-1, 1)
pub fn pattern(len: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        })
        .collect()
}

pub fn pattern_f32(len: usize, seed: u64) -> Vec<f32> {
    pattern(len, seed).into_iter().map(|v| v as f32).collect()
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn next_index(index: &mut [usize], shape: &[usize]) -> bool {
    for axis in (0..index.len()).rev() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return true;
        }
        index[axis] = 0;
    }
    false
}

/// Direct transcription of the per-element definition, accumulating in f64.
///
/// `input` and `kernel` are contiguous row-major buffers.
pub fn reference_conv(
    input: &[f64],
    input_shape: &[usize],
    kernel: &[f64],
    kernel_shape: &[usize],
    config: &ConvConfig,
) -> (Vec<usize>, Vec<f64>) {
    let geometry = output_geometry(input_shape, kernel_shape, config).expect("valid geometry");
    let out_shape = geometry.output_shape();
    let k = geometry.spatial_dims();
    let lead = config.leading_axes();
    let batch = geometry.batch_count();
    let c_in = geometry.in_channels;
    let c_out = geometry.out_channels;

    let in_strides = row_major_strides(input_shape);
    let k_strides = row_major_strides(kernel_shape);
    let out_spatial = geometry.output_spatial_shape();
    let k_spatial: Vec<usize> = kernel_shape[2..].to_vec();

    let mut out = Vec::with_capacity(out_shape.iter().product());
    for n in 0..batch {
        for co in 0..c_out {
            let mut o = vec![0usize; k];
            loop {
                let mut acc = 0.0;
                for ci in 0..c_in {
                    let mut kk = vec![0usize; k];
                    loop {
                        let mut in_bounds = true;
                        let mut in_off = ci * in_strides[lead - 1];
                        if config.has_batch {
                            in_off += n * in_strides[0];
                        }
                        for i in 0..k {
                            let d = &geometry.dims[i];
                            let pos = (o[i] * d.stride + kk[i] * d.dilation) as isize
                                - d.pad_before as isize;
                            if pos < 0 || pos >= d.input as isize {
                                in_bounds = false;
                                break;
                            }
                            in_off += pos as usize * in_strides[lead + i];
                        }
                        if in_bounds {
                            let mut k_off = co * k_strides[0] + ci * k_strides[1];
                            for i in 0..k {
                                k_off += kk[i] * k_strides[2 + i];
                            }
                            acc += input[in_off] * kernel[k_off];
                        }
                        if !next_index(&mut kk, &k_spatial) {
                            break;
                        }
                    }
                }
                out.push(acc);
                if !next_index(&mut o, &out_spatial) {
                    break;
                }
            }
        }
    }
    (out_shape, out)
}

pub fn assert_close_f64(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "Mismatch at position {}: expected {}, got {}",
            i,
            e,
            a
        );
    }
}
