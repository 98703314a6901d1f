//! Newton's method on the Rosenbrock function
//!
//! Builds the gradient and Hessian symbolically, compiles both into
//! fixed-size in-place evaluators and iterates
//! `x <- x - H(x)^-1 g(x)` from the classic starting point `(-1.2, 1)`.
//!
//! Run with: cargo run --example rosenbrock
//! Compiler diagnostics: RUST_LOG=debug cargo run --example rosenbrock

use symb_graph::{CompileOptions, Context, DiffError, Differentiator, compile_in_place};

fn main() -> Result<(), DiffError> {
    env_logger::init();

    let mut ctx = Context::new();
    let x = ctx.make_variable("x");
    let y = ctx.make_variable("y");

    // f = (1 - x)² + 100 (y - x²)²
    let one = ctx.make_constant(1.0);
    let a = ctx.sub(one, x)?;
    let a2 = ctx.square(a)?;
    let x2 = ctx.square(x)?;
    let b = ctx.sub(y, x2)?;
    let b2 = ctx.square(b)?;
    let b2 = ctx.scale(100.0, b2)?;
    let f = ctx.add(a2, b2)?;

    let mut diff = Differentiator::new();
    let grad = diff.gradient(&mut ctx, f, &[x, y])?;
    let hess = diff.hessian(&mut ctx, f, &[x, y])?;
    println!("graph: {} nodes", ctx.len());

    let options = CompileOptions::new();
    let value = compile_in_place::<[f64; 2], [f64; 1]>(&ctx, f, &[x, y], &options)?;
    let gradient = compile_in_place::<[f64; 2], [f64; 2]>(&ctx, &grad, &[x, y], &options)?;
    let hessian = compile_in_place::<[f64; 2], [[f64; 2]; 2]>(&ctx, &hess, &[x, y], &options)?;
    println!("hessian program:\n{}\n", hessian.program());

    let mut point = [-1.2, 1.0];
    let mut f_val = [0.0];
    let mut g = [0.0; 2];
    let mut h = [[0.0; 2]; 2];
    for step in 0..50 {
        value.evaluate_into(&point, &mut f_val)?;
        gradient.evaluate_into(&point, &mut g)?;
        println!(
            "step {:2}: x = ({:+.6}, {:+.6})  f = {:.3e}  |g| = {:.3e}",
            step,
            point[0],
            point[1],
            f_val[0],
            g[0].hypot(g[1])
        );
        if g[0].hypot(g[1]) < 1e-10 {
            break;
        }

        hessian.evaluate_into(&point, &mut h)?;
        let det = h[0][0] * h[1][1] - h[0][1] * h[1][0];
        point[0] -= (h[1][1] * g[0] - h[0][1] * g[1]) / det;
        point[1] -= (h[0][0] * g[1] - h[1][0] * g[0]) / det;
    }

    println!("\nminimum near ({:.6}, {:.6})", point[0], point[1]);
    Ok(())
}
