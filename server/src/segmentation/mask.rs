use ndarray::{Array3, Zip, s};

use crate::points::Label;

/// Foreground candidates for one seed, covering either the whole volume or
/// a box starting at `origin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMask {
    origin: [usize; 3],
    mask: Array3<bool>,
}

impl CandidateMask {
    /// Mask spanning the whole volume
    pub fn full(mask: Array3<bool>) -> Self {
        Self {
            origin: [0, 0, 0],
            mask,
        }
    }

    /// Mask of a sub-box whose first voxel is at `origin`
    pub fn region(origin: [usize; 3], mask: Array3<bool>) -> Self {
        Self { origin, mask }
    }

    /// Number of candidate voxels
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Write `label` into every candidate voxel that is still background.
    /// Returns the number of voxels claimed.
    pub fn claim(&self, labels: &mut Array3<Label>, label: Label) -> usize {
        let [z, y, x] = self.origin;
        let (dz, dy, dx) = self.mask.dim();
        let mut region = labels.slice_mut(s![z..z + dz, y..y + dy, x..x + dx]);

        let mut claimed = 0;
        Zip::from(&mut region)
            .and(&self.mask)
            .for_each(|voxel, &candidate| {
                if candidate && *voxel == 0 {
                    *voxel = label;
                    claimed += 1;
                }
            });
        claimed
    }
}
