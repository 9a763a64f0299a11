use asmint::{Vm, VmConfig, VmError};
use criterion::{criterion_group, criterion_main, Criterion};

fn program_benchmark(c: &mut Criterion, name: &str, file_name: &str) {
    let config = VmConfig::from_file(file_name).unwrap();
    let mut vm = Vm::new(config).unwrap();
    c.bench_function(name, |b| {
        b.iter(|| -> Result<(), VmError> {
            vm.run()?;
            vm.reset();

            Ok(())
        })
    });
}

pub fn reset_vm_benchmark(c: &mut Criterion) {
    let config = VmConfig::from_file("resources/first.asm").unwrap();
    let mut vm = Vm::new(config).unwrap();
    c.bench_function("reset vm", |b| {
        b.iter(|| {
            vm.reset();
        })
    });
}

pub fn factorial_benchmark(c: &mut Criterion) {
    program_benchmark(c, "factorial", "resources/factorial.asm");
}

pub fn fibonacci_benchmark(c: &mut Criterion) {
    program_benchmark(c, "fibonacci", "resources/fibonacci.asm");
}

pub fn gcd_benchmark(c: &mut Criterion) {
    program_benchmark(c, "gcd", "resources/gcd.asm");
}

pub fn power_benchmark(c: &mut Criterion) {
    program_benchmark(c, "recursive power", "resources/power.asm");
}

criterion_group!(
    vm,
    reset_vm_benchmark,
    factorial_benchmark,
    fibonacci_benchmark,
    gcd_benchmark,
    power_benchmark,
);
criterion_main!(vm);
