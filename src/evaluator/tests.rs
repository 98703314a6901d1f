use super::*;
use crate::{Differentiator, jacobian};

fn xy() -> (Context, NodeId, NodeId) {
    let mut ctx = Context::new();
    let x = ctx.make_variable("x");
    let y = ctx.make_variable("y");
    (ctx, x, y)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * b.abs().max(1.0)
}

#[test]
fn test_round_trip() {
    let (mut ctx, x, y) = xy();
    let x2 = ctx.square(x).unwrap();
    let y2 = ctx.square(y).unwrap();
    let f = ctx.mul(x2, y2).unwrap();
    let p = ctx.mul(x, y).unwrap();
    let g = ctx.sqrt(p).unwrap();

    let eval = compile::<[f64], Vec<f64>>(&ctx, &[f, g], &[x, y], &CompileOptions::new()).unwrap();
    assert_eq!(eval.evaluate(&[1.0, 2.0]).unwrap(), vec![4.0, 1.414_213_562_373_095_1]);
}

#[test]
fn test_compiled_jacobian() {
    let (mut ctx, x, y) = xy();
    let cx = ctx.cos(x).unwrap();
    let f = ctx.mul(cx, y).unwrap();
    let sy = ctx.sin(y).unwrap();
    let g = ctx.mul(sy, x).unwrap();

    let j = jacobian(&mut ctx, &[f, g], &[x, y], None).unwrap();
    let eval = compile::<[f64; 2], [[f64; 2]; 2]>(&ctx, &j, &[x, y], &CompileOptions::new())
        .unwrap();
    let [[a, b], [c, d]] = eval.evaluate(&[1.0, 2.0]).unwrap();

    assert!(close(a, -2.0 * 1.0_f64.sin()));
    assert!(close(b, 1.0_f64.cos()));
    assert!(close(c, 2.0_f64.sin()));
    assert!(close(d, 2.0_f64.cos()));
    assert!((a + 1.682_94).abs() < 1e-5);
    assert!((d + 0.416_147).abs() < 1e-6);
}

#[test]
fn test_in_place_matches_allocating() {
    let (mut ctx, x, y) = xy();
    let e = ctx.exp(x).unwrap();
    let f = ctx.atan2(y, e).unwrap();
    let g = ctx.max(x, y).unwrap();
    let h = ctx.pow(e, y).unwrap();
    let outputs = Matrix::from_vec(1, 3, vec![f, g, h]).unwrap();
    let options = CompileOptions::new();

    let alloc = compile::<[f64], Matrix<f64>>(&ctx, &outputs, &[x, y], &options).unwrap();
    let in_place = compile_in_place::<[f64], Matrix<f64>>(&ctx, &outputs, &[x, y], &options).unwrap();

    let mut out = Matrix::filled(1, 3, 0.0);
    for point in [[0.5, -1.0], [2.0, 3.0], [-0.25, 0.0]] {
        let expected = alloc.evaluate(&point).unwrap();
        in_place.evaluate_into(&point, &mut out).unwrap();
        assert_eq!(out, expected);
    }
}

#[test]
fn test_matrix_output_from_vector_is_a_column() {
    let (mut ctx, x, y) = xy();
    let s = ctx.add(x, y).unwrap();
    let eval = compile::<[f64], Matrix<f64>>(&ctx, &[s, x], &[x, y], &CompileOptions::new()).unwrap();
    let m = eval.evaluate(&[1.0, 2.0]).unwrap();
    assert_eq!((m.rows(), m.cols()), (2, 1));
    assert_eq!(m[(0, 0)], 3.0);
    assert_eq!(m[(1, 0)], 1.0);
}

#[test]
fn test_runtime_shape_errors() {
    let (mut ctx, x, y) = xy();
    let f = ctx.mul(x, y).unwrap();
    let g = ctx.sub(x, y).unwrap();
    let options = CompileOptions::new();

    let eval = compile::<[f64], Vec<f64>>(&ctx, &[f, g], &[x, y], &options).unwrap();
    assert_eq!(
        eval.evaluate(&[1.0]).unwrap_err(),
        DiffError::ShapeMismatch {
            expected: Shape::Vector(2),
            got: Shape::Vector(1),
        }
    );

    let in_place = compile_in_place::<[f64], [f64]>(&ctx, &[f, g], &[x, y], &options).unwrap();
    let mut short = [7.0];
    assert!(matches!(
        in_place.evaluate_into(&[1.0, 2.0], &mut short),
        Err(DiffError::ShapeMismatch { .. })
    ));
    assert_eq!(short, [7.0]);

    let matrix = compile_in_place::<[f64], Matrix<f64>>(&ctx, &[f, g], &[x, y], &options).unwrap();
    let mut wrong = Matrix::filled(1, 2, 0.0);
    assert!(matrix.evaluate_into(&[1.0, 2.0], &mut wrong).is_err());
    let mut right = Matrix::filled(2, 1, 0.0);
    matrix.evaluate_into(&[1.0, 2.0], &mut right).unwrap();
    assert_eq!(right.as_slice(), &[2.0, -1.0]);
}

#[test]
fn test_fixed_sizes_are_checked_when_compiling() {
    let (mut ctx, x, y) = xy();
    let f = ctx.mul(x, y).unwrap();
    let g = ctx.sub(x, y).unwrap();
    let options = CompileOptions::new();

    assert_eq!(
        compile::<[f64], [f64; 3]>(&ctx, &[f, g], &[x, y], &options).unwrap_err(),
        DiffError::ShapeMismatch {
            expected: Shape::Vector(2),
            got: Shape::Vector(3),
        }
    );
    assert!(matches!(
        compile::<[f64; 3], Vec<f64>>(&ctx, &[f, g], &[x, y], &options),
        Err(DiffError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        compile_in_place::<[f64], [[f64; 1]; 2]>(&ctx, &[f, g], &[x, y], &options),
        Err(DiffError::ShapeMismatch { .. })
    ));

    let j = Differentiator::new().jacobian(&mut ctx, &[f, g], &[x, y], None).unwrap();
    assert!(compile::<[f64; 2], [[f64; 2]; 2]>(&ctx, &j, &[x, y], &options).is_ok());
    assert!(compile::<[f64; 2], [f64; 4]>(&ctx, &j, &[x, y], &options).is_ok());
}

#[test]
fn test_f32_evaluation() {
    let (mut ctx, x, _) = xy();
    let half = ctx.scale(0.5, x).unwrap();
    let one = ctx.make_constant(1.0);
    let f = ctx.add(half, one).unwrap();
    let eval = compile::<[f32], Vec<f32>>(&ctx, f, &[x], &CompileOptions::new()).unwrap();
    assert_eq!(eval.evaluate(&[3.0_f32]).unwrap(), vec![2.5_f32]);
}

#[test]
fn test_outputs_may_repeat_and_be_inputs() {
    let (mut ctx, x, y) = xy();
    let f = ctx.add(x, y).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, &[f, x, f, y], &[x, y], &CompileOptions::new())
        .unwrap();
    assert_eq!(eval.evaluate(&[1.5, 2.0]).unwrap(), vec![3.5, 1.5, 3.5, 2.0]);
}

#[test]
fn test_constant_output_needs_no_inputs() {
    let mut ctx = Context::new();
    let c = ctx.make_constant(2.5);
    let eval = compile::<[f64], [f64; 1]>(&ctx, c, &[], &CompileOptions::new()).unwrap();
    assert_eq!(eval.evaluate(&[]).unwrap(), [2.5]);
}

#[test]
fn test_unused_inputs_are_accepted() {
    let (mut ctx, x, y) = xy();
    let z = ctx.make_variable("z");
    let f = ctx.mul(x, z).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &[x, y, z], &CompileOptions::new()).unwrap();
    assert_eq!(eval.program().input_count(), 3);
    assert_eq!(eval.evaluate(&[2.0, 100.0, 4.0]).unwrap(), vec![8.0]);
}

#[test]
fn test_select_and_comparisons() {
    let (mut ctx, x, y) = xy();
    let lt = ctx.less(x, y).unwrap();
    let diff = ctx.sub(y, x).unwrap();
    let f = ctx.if_else(lt, diff, x).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, &[f, lt], &[x, y], &CompileOptions::new()).unwrap();
    assert_eq!(eval.evaluate(&[1.0, 3.0]).unwrap(), vec![2.0, 1.0]);
    assert_eq!(eval.evaluate(&[4.0, 3.0]).unwrap(), vec![4.0, 0.0]);
}

#[test]
fn test_evaluator_outlives_cleared_context() {
    let (mut ctx, x, y) = xy();
    let x2 = ctx.square(x).unwrap();
    let y2 = ctx.square(y).unwrap();
    let s = ctx.add(x2, y2).unwrap();
    let f = ctx.sqrt(s).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &[x, y], &CompileOptions::new()).unwrap();
    ctx.clear_cache();

    assert_eq!(eval.evaluate(&[3.0, 4.0]).unwrap(), vec![5.0]);
    assert!(matches!(
        compile::<[f64], Vec<f64>>(&ctx, f, &[x, y], &CompileOptions::new()),
        Err(DiffError::StaleNode { .. })
    ));
}

#[test]
fn test_batch_matches_scalar() {
    let (mut ctx, x, y) = xy();
    let e = ctx.exp(x).unwrap();
    let l = ctx.ln(x).unwrap();
    let t = ctx.tan(y).unwrap();
    let p = ctx.pow(x, y).unwrap();
    let m = ctx.min(e, p).unwrap();
    let s = ctx.sum(&[l, t, m]).unwrap();
    let c = ctx.cosh(y).unwrap();
    let f = ctx.div(s, c).unwrap();
    let g = ctx.sqrt(e).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, &[f, g], &[x, y], &CompileOptions::new()).unwrap();

    // 7 points: one full SIMD chunk and a scalar tail of three
    let xs = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];
    let ys = [-1.0, -0.5, 0.0, 0.25, 0.5, 0.75, 1.0];
    let mut fs = vec![0.0; 7];
    let mut gs = vec![0.0; 9];
    eval.evaluate_batch(&[&xs[..], &ys[..]], &mut [&mut fs[..], &mut gs[..]])
        .unwrap();

    for p in 0..7 {
        let scalar = eval.evaluate(&[xs[p], ys[p]]).unwrap();
        assert!(close(fs[p], scalar[0]), "f at point {p}: {} vs {}", fs[p], scalar[0]);
        assert!(close(gs[p], scalar[1]), "g at point {p}: {} vs {}", gs[p], scalar[1]);
    }
    assert_eq!(&gs[7..], &[0.0, 0.0]);
}

#[test]
fn test_batch_keeps_overflow_and_large_arguments() {
    let (mut ctx, x, _) = xy();
    let outputs = [
        ctx.exp(x).unwrap(),
        ctx.ln(x).unwrap(),
        ctx.sin(x).unwrap(),
        ctx.cos(x).unwrap(),
        ctx.tan(x).unwrap(),
    ];
    let eval = compile::<[f64], Vec<f64>>(&ctx, &outputs, &[x], &CompileOptions::new()).unwrap();

    let xs = [0.0, 800.0, 1e6, 1e15];
    let mut columns = vec![vec![0.0; 4]; outputs.len()];
    let mut views: Vec<&mut [f64]> = columns.iter_mut().map(Vec::as_mut_slice).collect();
    eval.evaluate_batch(&[&xs[..]], &mut views).unwrap();

    for (p, &value) in xs.iter().enumerate() {
        let scalar = eval.evaluate(&[value]).unwrap();
        for (k, column) in columns.iter().enumerate() {
            assert_eq!(
                column[p].to_bits(),
                scalar[k].to_bits(),
                "output {k} at x = {value}: {} vs {}",
                column[p],
                scalar[k]
            );
        }
    }
    assert_eq!(columns[0][1], f64::INFINITY);
    assert_eq!(columns[1][0], f64::NEG_INFINITY);
}

#[test]
fn test_batch_dimension_errors() {
    let (mut ctx, x, y) = xy();
    let f = ctx.mul(x, y).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &[x, y], &CompileOptions::new()).unwrap();

    let xs = [1.0, 2.0, 3.0];
    let ys = [1.0, 2.0];
    let mut out = vec![0.0; 3];
    assert_eq!(
        eval.evaluate_batch(&[&xs[..]], &mut [&mut out[..]]).unwrap_err(),
        DiffError::DimensionMismatch {
            expected: 2,
            got: 1
        }
    );
    assert_eq!(
        eval.evaluate_batch(&[&xs[..], &ys[..]], &mut [&mut out[..]]).unwrap_err(),
        DiffError::DimensionMismatch {
            expected: 3,
            got: 2
        }
    );
    let mut short = vec![0.0; 2];
    assert!(eval.evaluate_batch(&[&xs[..], &xs[..]], &mut [&mut short[..]]).is_err());
}

#[test]
fn test_program_listing() {
    let (mut ctx, x, _) = xy();
    let f = ctx.sin(x).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &[x], &CompileOptions::new()).unwrap();
    let listing = eval.program().to_string();
    assert!(listing.starts_with("r0 = in[0]\n"));
    assert!(listing.ends_with("out [1] = [r0]"));
    assert_eq!(eval.program().output_shape(), Shape::Vector(1));
}

#[test]
fn test_evaluator_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Evaluator<[f64], Vec<f64>>>();
    assert_send_sync::<InPlaceEvaluator<[f32], [f32]>>();

    let (mut ctx, x, _) = xy();
    let f = ctx.cos(x).unwrap();
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &[x], &CompileOptions::new()).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = [0.0, 1.0, 2.0, 3.0]
            .into_iter()
            .map(|v: f64| {
                let eval = &eval;
                s.spawn(move || (eval.evaluate(&[v]).unwrap()[0], v.cos()))
            })
            .collect();
        for h in handles {
            let (got, expected) = h.join().unwrap();
            assert_eq!(got, expected);
        }
    });
}
