// Implied volatility root-finding against the Black-Scholes-Merton price

use serde::{Deserialize, Serialize};

use super::bs_mod;
use super::OptionType;

/// Solver bracket. Volatilities outside this range are not searched.
pub const SIGMA_MIN: f64 = 0.001;
pub const SIGMA_MAX: f64 = 5.0;

/// Floor returned when the market price carries no extractable time value.
pub const MIN_VOL: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvMethod {
    Brent,
    Bisection,
    NewtonRaphson,
}

#[derive(Debug, Clone)]
pub struct IvRequest {
    pub market_price: f64,
    pub spot: f64,
    pub strike: f64,
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    pub option_type: OptionType,
    pub method: IvMethod,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub initial_guess: Option<f64>,
}

impl IvRequest {
    pub fn new(market_price: f64, spot: f64, strike: f64, time_to_expiry: f64,
               risk_free_rate: f64, dividend_yield: f64, option_type: OptionType) -> Self {
        Self {
            market_price,
            spot,
            strike,
            time_to_expiry,
            risk_free_rate,
            dividend_yield,
            option_type,
            method: IvMethod::Brent,
            tolerance: 1e-6,
            max_iterations: 100,
            initial_guess: None,
        }
    }
}

/// Solver outcome. Failure is data, not a panic: `converged = false` with
/// the closest sigma reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvSolution {
    pub sigma: f64,
    pub iterations: usize,
    pub converged: bool,
    pub final_price: f64,
    pub price_error: f64,
}

fn model_price(req: &IvRequest, sigma: f64) -> f64 {
    bs_mod::price(req.spot, req.strike, req.time_to_expiry, req.risk_free_rate,
                  sigma, req.dividend_yield, req.option_type)
}

fn solution(req: &IvRequest, sigma: f64, iterations: usize, converged: bool) -> IvSolution {
    let final_price = model_price(req, sigma);
    IvSolution {
        sigma,
        iterations,
        converged,
        final_price,
        price_error: (final_price - req.market_price).abs(),
    }
}

/// Recover implied volatility from a market price.
///
/// Fail-fast paths: a price at or below intrinsic returns the minimum vol
/// floor; a price above the upper-bracket value is unattainable and
/// reports `converged = false`.
pub fn solve(req: &IvRequest) -> IvSolution {
    let intrinsic = match req.option_type {
        OptionType::Call => (req.spot - req.strike).max(0.0),
        OptionType::Put => (req.strike - req.spot).max(0.0),
    };

    if req.market_price <= intrinsic + req.tolerance || req.time_to_expiry <= 0.0 {
        return solution(req, MIN_VOL, 0, true);
    }

    let upper_price = model_price(req, SIGMA_MAX);
    if req.market_price > upper_price {
        return solution(req, SIGMA_MAX, 0, false);
    }

    match req.method {
        IvMethod::Brent => brent(req),
        IvMethod::Bisection => bisect(req, SIGMA_MIN, SIGMA_MAX, 0),
        IvMethod::NewtonRaphson => newton(req),
    }
}

/// ATM approximation used to seed Newton: σ ≈ √(2π/T) · price / S.
fn initial_vol(req: &IvRequest) -> f64 {
    match req.initial_guess {
        Some(guess) => guess.clamp(SIGMA_MIN, SIGMA_MAX),
        None => {
            let approx = (2.0 * std::f64::consts::PI / req.time_to_expiry).sqrt()
                * req.market_price / req.spot;
            approx.clamp(MIN_VOL, SIGMA_MAX)
        }
    }
}

/// Brent's method: inverse-quadratic interpolation guarded by bisection.
fn brent(req: &IvRequest) -> IvSolution {
    let f = |sigma: f64| model_price(req, sigma) - req.market_price;

    let mut a = SIGMA_MIN;
    let mut b = SIGMA_MAX;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa * fb > 0.0 {
        // Root not bracketed; the fail-fast checks make this unreachable
        // for sane inputs, but report failure rather than looping.
        return solution(req, initial_vol(req), 0, false);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for iter in 1..=req.max_iterations {
        if fb.abs() > fc.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * req.tolerance;
        let xm = 0.5 * (c - b);

        if xm.abs() <= tol1 || fb == 0.0 {
            return solution(req, b, iter, true);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // Attempt inverse quadratic interpolation
            let s = fb / fa;
            let (mut p, mut qq);
            if a == c {
                p = 2.0 * xm * s;
                qq = 1.0 - s;
            } else {
                let q = fa / fc;
                let r = fb / fc;
                p = s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0));
                qq = (q - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                qq = -qq;
            }
            p = p.abs();

            let min1 = 3.0 * xm * qq.abs() - (tol1 * qq).abs();
            let min2 = (e * qq).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / qq;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
        fb = f(b);

        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
    }

    solution(req, b, req.max_iterations, false)
}

/// Plain bisection over [lo, hi]. Slow but guaranteed on a bracketed
/// root; the tolerance applies to sigma, matching the other solvers.
fn bisect(req: &IvRequest, mut lo: f64, mut hi: f64, iterations_used: usize) -> IvSolution {
    let f = |sigma: f64| model_price(req, sigma) - req.market_price;

    let mut flo = f(lo);
    if flo * f(hi) > 0.0 {
        return solution(req, initial_vol(req), iterations_used, false);
    }

    let budget = req.max_iterations.saturating_sub(iterations_used);
    for iter in 1..=budget {
        let mid = 0.5 * (lo + hi);
        let fmid = f(mid);

        if fmid == 0.0 || (hi - lo) * 0.5 < req.tolerance {
            return solution(req, mid, iterations_used + iter, true);
        }

        if flo * fmid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            flo = fmid;
        }
    }

    solution(req, 0.5 * (lo + hi), req.max_iterations, false)
}

/// Newton-Raphson with vega as the derivative. Falls back to bisection
/// when the step leaves the bracket or vega degenerates.
fn newton(req: &IvRequest) -> IvSolution {
    let mut sigma = initial_vol(req);

    for iter in 1..=req.max_iterations {
        let diff = model_price(req, sigma) - req.market_price;
        if diff == 0.0 {
            return solution(req, sigma, iter, true);
        }

        let vega = bs_mod::vega_raw(req.spot, req.strike, req.time_to_expiry,
                                    req.risk_free_rate, sigma, req.dividend_yield);
        if vega < 1e-12 {
            return bisect(req, SIGMA_MIN, SIGMA_MAX, iter);
        }

        let next = sigma - diff / vega;
        if !next.is_finite() || !(SIGMA_MIN..=SIGMA_MAX).contains(&next) {
            return bisect(req, SIGMA_MIN, SIGMA_MAX, iter);
        }

        // Converged when the step stops moving sigma
        if (next - sigma).abs() < req.tolerance {
            return solution(req, next, iter, true);
        }
        sigma = next;
    }

    solution(req, sigma, req.max_iterations, false)
}
