use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lilt::Interp;

const FIB: &str = "\
func fib {n} {\
    if {$n < 2} { return $n } {\
        return [expr [fib [expr $n - 1]] + [fib [expr $n - 2]]]\
    }\
};\
fib 12";

fn make_list_script(entries: usize) -> String {
    let mut src = String::from("set l {");
    for i in 0..entries {
        src.push_str(&format!("entry-{i} "));
    }
    src.push_str("}; count $l");
    src
}

fn bench_eval(c: &mut Criterion) {
    let list_script = make_list_script(200);

    let mut g = c.benchmark_group("eval");

    g.bench_function("fib_12", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            interp.run(black_box(FIB)).unwrap()
        })
    });

    g.bench_function("list_200", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            interp.run(black_box(&list_script)).unwrap()
        })
    });

    g.bench_function("expr_precedence", |b| {
        b.iter(|| {
            let mut interp = Interp::new();
            interp
                .run(black_box("expr 1 + 2 * 3 - (4 / 2) << 1"))
                .unwrap()
        })
    });

    g.finish();
}

criterion_group!(benches, bench_eval);
criterion_main!(benches);
