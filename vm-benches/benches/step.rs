//! Interpreter throughput microbenchmark.
//!
//! Mirrors the teacher's `kernel-benches` crate shape (a dev-only crate with
//! a single `criterion`-harnessed binary) but measures the software
//! fetch-decode-execute loop instead of a hardware vCPU exit.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kernel::env::{HostEnvironment, Permissions};
use rvcage::vm::Vm;

const MEMORY_SIZE: usize = 64 * 1024;

/// `addi x1, x1, 1` repeated, then a backward branch to the top — a tight
/// loop with no ecalls or traps, so the bench measures pure decode+execute
/// cost rather than syscall dispatch.
fn build_loop_program() -> Vec<u8> {
    let mut program = Vec::new();
    // addi x1, x1, 1
    program.extend_from_slice(&0x00108093u32.to_le_bytes());
    // jal x0, -4 (branch back to the addi)
    program.extend_from_slice(&0xffdff06fu32.to_le_bytes());
    program
}

fn bench_step(c: &mut Criterion) {
    let mut vm = Vm::new(MEMORY_SIZE);
    vm.map_pages(0, MEMORY_SIZE as u64, Permissions::READ | Permissions::WRITE | Permissions::EXECUTE)
        .unwrap();
    let program = build_loop_program();
    HostEnvironment::write_guest(&mut vm, 0, &program);
    vm.set_entry(0);

    c.bench_function("vm_step_addi_loop", |b| {
        b.iter(|| {
            black_box(vm.step());
        })
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
