use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minfit::{
    grid::{grid_search, GridSpec},
    nalgebra as na,
    testing::*,
    MinimiserOptions,
};

const TOLERANCE: f64 = 1e-10;

const METHODS: &[(&str, &str, &[&str])] = &[
    ("newton gmw", "newton", &["gmw"]),
    ("newton eigen", "newton", &["eigen"]),
    ("newton cholesky", "newton", &["chol", "backtrack"]),
    ("bfgs", "bfgs", &[]),
    ("bfgs nocedal-wright wolfe", "bfgs", &["nocedal wright wolfe"]),
    ("polak ribiere+", "pr+", &[]),
];

fn solve<F: TestProblem>(f: &F, x0: &na::DVector<f64>, options: &MinimiserOptions<f64>) -> bool {
    minimise_test(f, x0, options, TOLERANCE).is_ok()
}

fn bench_problem<F: TestProblem>(c: &mut Criterion, name: &str, f: &F, x0: &na::DVector<f64>) {
    for (label, algorithm, extra) in METHODS {
        let mut options = MinimiserOptions::from_names(algorithm, extra).unwrap();
        options.set_max_iter(100_000);

        c.bench_function(&format!("{} {}", label, name), |b| {
            b.iter(|| black_box(solve(f, x0, &options)))
        });
    }
}

fn rosenbrock1(c: &mut Criterion) {
    let f = ExtendedRosenbrock::new(2);
    bench_problem(c, "rosenbrock 1", &f, &f.initials()[0]);
}

fn rosenbrock2(c: &mut Criterion) {
    let f = ExtendedRosenbrock::new(2);
    bench_problem(c, "rosenbrock 2", &f, &f.initials()[1]);
}

fn rosenbrock_scaled(c: &mut Criterion) {
    let f = ExtendedRosenbrock::with_scaling(2, 100.0);
    bench_problem(c, "rosenbrock scaled", &f, &f.initials()[0]);
}

fn rosenbrock_large(c: &mut Criterion) {
    let f = ExtendedRosenbrock::new(100);
    bench_problem(c, "rosenbrock large", &f, &f.initials()[0]);
}

fn himmelblau(c: &mut Criterion) {
    let f = Himmelblau;
    bench_problem(c, "himmelblau", &f, &f.initials()[0]);
}

fn grid(c: &mut Criterion) {
    let f = Himmelblau;
    let spec = GridSpec::uniform(2, 200, -5.0, 5.0).unwrap();

    c.bench_function("grid search himmelblau", |b| {
        b.iter(|| assert!(grid_search(&f, &spec, None).unwrap().fx < 1e-2))
    });
}

criterion_group!(
    minimisers,
    rosenbrock1,
    rosenbrock2,
    rosenbrock_scaled,
    rosenbrock_large,
    himmelblau,
    grid
);
criterion_main!(minimisers);
