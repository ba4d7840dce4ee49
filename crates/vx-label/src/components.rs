use vx_core::Volume;

const FACE_DIRS: [(i64, i64, i64); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Labels the connected components of a binary mask under 6-connectivity.
///
/// Background voxels (`0`) keep label `0`; foreground components receive
/// consecutive labels starting at `1` in scan order, so labeling is
/// deterministic. Returns the label volume and the component count.
pub fn label_components_6(mask: &Volume<u8>) -> (Volume<u64>, u64) {
    let shape = mask.shape();
    let mut labels = Volume::new_fill(shape, 0u64);
    let mut next_label = 0u64;
    let mut stack: Vec<(usize, usize, usize)> = Vec::new();

    for z in 0..shape[2] {
        for y in 0..shape[1] {
            for x in 0..shape[0] {
                if mask.at(x, y, z) == 0 || labels.at(x, y, z) != 0 {
                    continue;
                }

                next_label += 1;
                labels.set(x, y, z, next_label);
                stack.push((x, y, z));

                while let Some((cx, cy, cz)) = stack.pop() {
                    for (dx, dy, dz) in FACE_DIRS {
                        let nx = cx as i64 + dx;
                        let ny = cy as i64 + dy;
                        let nz = cz as i64 + dz;
                        if nx < 0
                            || ny < 0
                            || nz < 0
                            || nx >= shape[0] as i64
                            || ny >= shape[1] as i64
                            || nz >= shape[2] as i64
                        {
                            continue;
                        }
                        let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
                        if mask.at(nx, ny, nz) != 0 && labels.at(nx, ny, nz) == 0 {
                            labels.set(nx, ny, nz, next_label);
                            stack.push((nx, ny, nz));
                        }
                    }
                }
            }
        }
    }

    (labels, next_label)
}
