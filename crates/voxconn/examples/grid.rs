//! Builds a small chunk grid and prints the neighbor table.

use std::path::Path;

use voxconn::{BoundingBox, ChunkDataset, Vec3i};

fn main() {
    let dataset = ChunkDataset::build(
        Path::new("/tmp/voxconn-demo"),
        BoundingBox::new(Vec3i::default(), Vec3i::new(256, 256, 128)),
        Vec3i::new(128, 128, 128),
        Vec3i::splat(8),
    )
    .expect("valid grid");

    println!("{} chunks", dataset.len());
    for chunk in dataset.chunks() {
        let neighbors = dataset.neighbors(chunk);
        println!(
            "chunk {} @ ({}, {}, {}) size ({}, {}, {}) neighbors {:?}",
            chunk.number,
            chunk.coordinates.x,
            chunk.coordinates.y,
            chunk.coordinates.z,
            chunk.size.x,
            chunk.size.y,
            chunk.size.z,
            neighbors
        );
    }
}
