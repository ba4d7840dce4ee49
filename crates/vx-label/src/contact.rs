use std::collections::HashMap;

use vx_core::Volume;

/// Marks voxels on the boundary between two different non-zero labels.
///
/// A discrete Laplacian-like face kernel (center weight −6, face neighbors
/// +1, out-of-volume neighbors clamped to the center value) is evaluated
/// over the integer label volume; a negative response means at least one
/// face neighbor carries a smaller label, which at object interfaces marks
/// the seam voxels of the higher-valued side as well as label-to-background
/// transitions. Only voxels adjacent to a *different non-zero* label are
/// kept as contact voxels.
pub fn detect_contact_voxels(labels: &Volume<u64>) -> Volume<u8> {
    let shape = labels.shape();
    let mut out = Volume::new_fill(shape, 0u8);

    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                let center = labels.at(x, y, z);
                if center == 0 {
                    continue;
                }
                let mut response: i128 = -6 * center as i128;
                let mut touches_other = false;
                for (dx, dy, dz) in FACE_DIRS {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    let nz = z as i64 + dz;
                    let v = if nx < 0
                        || ny < 0
                        || nz < 0
                        || nx >= shape[0] as i64
                        || ny >= shape[1] as i64
                        || nz >= shape[2] as i64
                    {
                        center
                    } else {
                        let v = labels.at(nx as usize, ny as usize, nz as usize);
                        if v != 0 && v != center {
                            touches_other = true;
                        }
                        v
                    };
                    response += v as i128;
                }
                if response < 0 && touches_other {
                    out.set(x, y, z, 1);
                }
            }
        }
    }

    out
}

const FACE_DIRS: [(i64, i64, i64); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Packs an unordered partner-label pair into one contact-site label.
/// Partner labels must fit 32 bits each; the original pipeline casts its
/// segmentations to u32 before contact detection.
fn pack_pair(a: u64, b: u64) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    debug_assert!(lo <= u32::MAX as u64 && hi <= u32::MAX as u64);
    (hi << 32) | lo
}

/// Recovers the unordered partner pair `(lo, hi)` of a contact-site label.
pub fn contact_partners(cs_label: u64) -> (u64, u64) {
    (cs_label & 0xffff_ffff, cs_label >> 32)
}

/// Groups contact voxels into contact-site objects.
///
/// Each contact voxel is assigned the label pair that dominates the counts
/// of non-zero labels within the fixed neighborhood `window` around it (the
/// two most frequent distinct labels, ties broken toward the smaller
/// label). Nearby contact voxels between the same two objects therefore
/// coalesce into a single contact-site ID.
pub fn group_contact_sites(
    contact: &Volume<u8>,
    labels: &Volume<u64>,
    window: [usize; 3],
) -> Volume<u64> {
    let shape = labels.shape();
    let mut out = Volume::new_fill(shape, 0u64);
    let half = [
        (window[0] / 2) as i64,
        (window[1] / 2) as i64,
        (window[2] / 2) as i64,
    ];

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                if contact.at(x, y, z) == 0 {
                    continue;
                }

                counts.clear();
                for dz in -half[2]..=half[2] {
                    let nz = z as i64 + dz;
                    if nz < 0 || nz >= shape[2] as i64 {
                        continue;
                    }
                    for dy in -half[1]..=half[1] {
                        let ny = y as i64 + dy;
                        if ny < 0 || ny >= shape[1] as i64 {
                            continue;
                        }
                        for dx in -half[0]..=half[0] {
                            let nx = x as i64 + dx;
                            if nx < 0 || nx >= shape[0] as i64 {
                                continue;
                            }
                            let v = labels.at(nx as usize, ny as usize, nz as usize);
                            if v != 0 {
                                *counts.entry(v).or_insert(0) += 1;
                            }
                        }
                    }
                }

                if counts.len() < 2 {
                    continue;
                }
                let mut ranked: Vec<(u64, usize)> =
                    counts.iter().map(|(&id, &c)| (id, c)).collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
                out.set(x, y, z, pack_pair(ranked[0].0, ranked[1].0));
            }
        }
    }

    out
}

/// Full contact-site detection over an integer label block.
pub fn detect_contact_sites(labels: &Volume<u64>, window: [usize; 3]) -> Volume<u64> {
    let contact = detect_contact_voxels(labels);
    group_contact_sites(&contact, labels, window)
}

#[cfg(test)]
mod tests {
    use super::{contact_partners, detect_contact_sites, detect_contact_voxels};
    use vx_core::Volume;

    /// Two slabs along x meeting at x = 4.
    fn two_slabs() -> Volume<u64> {
        let mut labels = Volume::new_fill([8, 5, 5], 0u64);
        for z in 0..5 {
            for y in 0..5 {
                for x in 0..4 {
                    labels.set(x, y, z, 3);
                }
                for x in 4..8 {
                    labels.set(x, y, z, 9);
                }
            }
        }
        labels
    }

    #[test]
    fn contact_voxels_lie_on_the_seam() {
        let labels = two_slabs();
        let contact = detect_contact_voxels(&labels);

        // Negative response with a distinct non-zero neighbor: only the
        // higher-valued side of the seam fires.
        assert_eq!(contact.at(4, 2, 2), 1);
        assert_eq!(contact.at(3, 2, 2), 0);
        assert_eq!(contact.at(6, 2, 2), 0);
        assert_eq!(contact.at(0, 2, 2), 0);
    }

    #[test]
    fn seam_voxels_share_one_contact_site_id() {
        let labels = two_slabs();
        let cs = detect_contact_sites(&labels, [13, 13, 7]);

        let id = cs.at(4, 2, 2);
        assert_ne!(id, 0);
        assert_eq!(contact_partners(id), (3, 9));
        for z in 0..5 {
            for y in 0..5 {
                assert_eq!(cs.at(4, y, z), id);
            }
        }
    }

    #[test]
    fn isolated_object_produces_no_contact_sites() {
        let mut labels = Volume::new_fill([6, 6, 6], 0u64);
        for z in 2..4 {
            for y in 2..4 {
                for x in 2..4 {
                    labels.set(x, y, z, 7);
                }
            }
        }

        let cs = detect_contact_sites(&labels, [13, 13, 7]);
        assert!(cs.data().iter().all(|&v| v == 0));
    }
}
