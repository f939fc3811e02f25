use ndarray::{Array2, ArrayView2, Zip};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositeError {
    #[error("dimensions differ: frame {frame:?}, background {background:?}, mask {mask:?}")]
    DimensionMismatch {
        frame: (usize, usize),
        background: (usize, usize),
        mask: (usize, usize),
    },
}

// Takes the background pixel wherever the mask is set and the current pixel
// everywhere else. Hard edges, no blending.
pub fn combine(
    current: ArrayView2<[u8; 3]>,
    background: ArrayView2<[u8; 3]>,
    mask: ArrayView2<bool>,
) -> Result<Array2<[u8; 3]>, CompositeError> {
    if current.dim() != background.dim() || current.dim() != mask.dim() {
        return Err(CompositeError::DimensionMismatch {
            frame: current.dim(),
            background: background.dim(),
            mask: mask.dim(),
        });
    }

    Ok(Zip::from(&current)
        .and(&background)
        .and(&mask)
        .map_collect(|&fg, &bg, &hit| if hit { bg } else { fg }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(height: usize, width: usize, seed: u8) -> Array2<[u8; 3]> {
        Array2::from_shape_fn((height, width), |(y, x)| {
            [seed, (y * 7) as u8, (x * 13) as u8]
        })
    }

    #[test]
    fn all_true_mask_with_same_frame_is_identity() {
        let frame = gradient(4, 5, 9);
        let mask = Array2::from_elem((4, 5), true);
        let out = combine(frame.view(), frame.view(), mask.view()).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn all_false_mask_keeps_current() {
        let current = gradient(3, 3, 1);
        let background = gradient(3, 3, 200);
        let mask = Array2::from_elem((3, 3), false);
        let out = combine(current.view(), background.view(), mask.view()).unwrap();
        assert_eq!(out, current);
    }

    #[test]
    fn selects_per_pixel() {
        let current = Array2::from_elem((1, 3), [1, 1, 1]);
        let background = Array2::from_elem((1, 3), [9, 9, 9]);
        let mask = Array2::from_shape_vec((1, 3), vec![false, true, false]).unwrap();
        let out = combine(current.view(), background.view(), mask.view()).unwrap();
        let pixels: Vec<_> = out.iter().copied().collect();
        assert_eq!(pixels, vec![[1, 1, 1], [9, 9, 9], [1, 1, 1]]);
    }

    #[test]
    fn background_size_mismatch_is_an_error() {
        let current = gradient(4, 4, 0);
        let background = gradient(2, 4, 0);
        let mask = Array2::from_elem((4, 4), true);
        let err = combine(current.view(), background.view(), mask.view()).unwrap_err();
        assert_eq!(
            err,
            CompositeError::DimensionMismatch {
                frame: (4, 4),
                background: (2, 4),
                mask: (4, 4),
            }
        );
    }

    #[test]
    fn mask_size_mismatch_is_an_error() {
        let current = gradient(4, 4, 0);
        let mask = Array2::from_elem((4, 3), true);
        assert!(combine(current.view(), current.view(), mask.view()).is_err());
    }
}
