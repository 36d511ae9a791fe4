use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use e3fs::e3::*;

criterion_group!(benches, cluster_table_bench, volume_write_bench);
criterion_main!(benches);

fn layout(clusters: u32) -> Geometry {
    // Geometry only; nothing is written.
    let mut empty = [0u8; 0];
    let mut io = MemIO::new(&mut empty);
    let formatter = E3Formatter::new(&mut io, FormatParams::default().with_clusters(clusters));
    formatter.geometry()
}

pub fn cluster_table_bench(c: &mut Criterion) {
    let geo = layout(4096);

    c.bench_function("cluster_alloc_extend_free", |b| {
        b.iter(|| {
            let mut table = ClusterTable::new(&geo);
            let head = table.allocate_chain_head().expect("alloc failed");
            table.extend_chain(head, 512).expect("extend failed");
            black_box(table.free_chain(head).expect("free failed"));
        });
    });

    let mut table = ClusterTable::new(&geo);
    let head = table.allocate_chain_head().expect("alloc failed");
    table.extend_chain(head, 1024).expect("extend failed");
    let last = 1024 * geo.blocks_per_cluster as u64 - 1;

    c.bench_function("cluster_translate_tail", |b| {
        b.iter(|| black_box(table.translate(&geo, head, black_box(last)).expect("translate failed")));
    });
}

pub fn volume_write_bench(c: &mut Criterion) {
    let params = FormatParams::default().with_clusters(64);
    let mut buf = vec![0u8; params.total_blocks() as usize * E3_BLOCK_SIZE];
    {
        let mut io = MemIO::new(&mut buf);
        E3Formatter::new(&mut io, params).format(false).expect("format failed");
    }
    let vol = E3Volume::mount(MemIO::new(&mut buf)).expect("mount failed");
    let dir = vol.mkdir(vol.root_ino(), "BENCH").expect("mkdir failed");
    let sample = vec![0x5Au8; 256 * 1024];

    c.bench_function("volume_create_write_unlink", |b| {
        b.iter(|| {
            let ino = vol.create(dir, "TAKE.WAV").expect("create failed");
            vol.write_bytes(ino, 0, &sample).expect("write failed");
            vol.unlink(dir, "TAKE.WAV").expect("unlink failed");
        });
    });
}
