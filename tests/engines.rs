use cordic_act::utils::{gelu_ref, tanh_ref};
use cordic_act::{
    compute_exp, decode_fixed, divide, encode_fixed, gelu, tanh, Config, DivByZeroPolicy, Engine,
    EnginePool, Error, FixedPoint, Format, GeluEngine, TanhEngine,
};
use proptest::prelude::*;

const ONE: FixedPoint = 33_554_432;

fn q25() -> Format {
    Format::new(32, 25)
}

#[test]
fn test_reference_scenarios() {
    let config = Config::default();

    assert_eq!(compute_exp(0, &config), Ok(ONE));
    assert_eq!(tanh(0, &config), Ok(0));
    assert_eq!(gelu(0, &config), Ok(0));

    let tanh_one = tanh(ONE, &config).unwrap();
    println!("tanh(1.0) = {} ({:.9})", tanh_one, decode_fixed(tanh_one, &q25()));
    assert!((tanh_one - 25_554_859).abs() <= 2);

    let tanh_six = tanh(6 * ONE, &config).unwrap();
    assert!((decode_fixed(tanh_six, &q25()) - 1.0).abs() < 1e-4);

    let gelu_one = gelu(ONE, &config).unwrap();
    println!("gelu(1.0) = {} ({:.9})", gelu_one, decode_fixed(gelu_one, &q25()));
    assert!((gelu_one - 28_225_719).abs() <= 2);
}

#[test]
fn test_division_by_zero_policies() {
    let strict = Config::default();
    assert_eq!(
        divide(5 * ONE, 0, &strict),
        Err(Error::DivisionByZero { numerator: 5 * ONE })
    );

    let lenient = Config {
        div_by_zero: DivByZeroPolicy::Passthrough,
        ..Config::default()
    };
    // 5 << 25 still fits in the 32-bit word
    assert_eq!(divide(5, 0, &lenient), Ok(5 << 25));
}

#[test]
fn test_exp_domain_overflow_is_reported() {
    let config = Config::default();
    let err = compute_exp(30 * ONE, &config).unwrap_err();
    assert!(matches!(err, Error::DomainOverflow { .. }));
    println!("{}", err);

    // tanh clamps instead of failing
    assert_eq!(tanh(30 * ONE, &config), Ok(ONE));
}

#[test]
fn test_wider_counter_extends_exp_domain() {
    let config = Config {
        range_counter_bits: 7,
        ..Config::default()
    };
    // 24 needs 34 ln2 reductions, more than a 6-bit counter holds
    assert!(compute_exp(24 * ONE, &Config::default()).is_err());

    let exp_big = compute_exp(24 * ONE, &config).unwrap();
    // e^24 * 2^25 does not fit in Q6.25, but exponentials are double width
    let expected = 24f64.exp() * ONE as f64;
    assert!(((exp_big as f64 - expected) / expected).abs() < 1e-5);
}

#[test]
fn test_tanh_accuracy_across_formats_and_iterations() {
    let formats = [(8, 6), (12, 8), (16, 10), (16, 12), (24, 16), (32, 20), (32, 25)];

    for &(total_width, frac_width) in &formats {
        let base = Config {
            total_width,
            frac_width,
            cordic_iterations: frac_width,
            ..Config::default()
        };
        let mut reference = TanhEngine::new(&base).unwrap();
        let format = reference.constants().format;
        let ulp = 1.0 / format.one() as f64;

        for iterations in [frac_width, frac_width + 1, frac_width + 4, frac_width + 12, 62] {
            let config = Config {
                cordic_iterations: iterations,
                ..base.clone()
            };
            let mut engine = TanhEngine::new(&config).unwrap();
            let mut worst = 0.0f64;

            for i in -300..=300 {
                let x = encode_fixed(i as f64 * 0.02, &format);
                let y = engine.run(x).unwrap();
                // extra iterations must not move the result
                assert_eq!(Ok(y), reference.run(x), "W={} F={} N={}", total_width, frac_width, iterations);

                let error = (decode_fixed(y, &format) - tanh_ref(decode_fixed(x, &format))).abs();
                worst = worst.max(error);
            }

            println!(
                "W={} F={} N={}: worst tanh error {:.1} ulp",
                total_width,
                frac_width,
                iterations,
                worst / ulp
            );
            assert!(worst < 12.0 * ulp);
        }
    }
}

#[test]
fn test_engines_are_independent_instances() {
    let config = Config::default();
    let mut a = TanhEngine::new(&config).unwrap();
    let mut b = TanhEngine::new(&config).unwrap();

    a.start(ONE).unwrap();
    b.start(-ONE).unwrap();
    while a.is_busy() || b.is_busy() {
        a.tick().unwrap();
        b.tick().unwrap();
    }
    assert_eq!(a.take_result(), Some(25_554_859));
    assert_eq!(b.take_result(), Some(-25_554_859));
}

#[test]
fn test_invalid_config_is_rejected_everywhere() {
    let config = Config {
        frac_width: 31,
        ..Config::default()
    };
    assert!(matches!(tanh(0, &config), Err(Error::InvalidConfig(_))));
    assert!(matches!(GeluEngine::new(&config), Err(Error::InvalidConfig(_))));
    assert!(matches!(EnginePool::new(&config), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_pool_over_a_sweep() {
    let pool = EnginePool::new(&Config::default()).unwrap();
    let format = pool.constants().format;
    let xs: Vec<FixedPoint> = (0..400)
        .map(|i| encode_fixed(-5.0 + i as f64 * 0.025, &format))
        .collect();

    let tanhs = pool.tanh_batch(&xs).unwrap();
    let gelus = pool.gelu_batch(&xs).unwrap();

    for ((&x, &t), &g) in xs.iter().zip(tanhs.iter()).zip(gelus.iter()) {
        let real = decode_fixed(x, &format);
        assert!((decode_fixed(t, &format) - tanh_ref(real)).abs() < 1e-4);
        assert!((decode_fixed(g, &format) - gelu_ref(real)).abs() < 1e-4);
    }
}

proptest! {
    #[test]
    fn prop_tanh_bounded(x in i32::MIN..=i32::MAX) {
        let mut engine = TanhEngine::new(&Config::default()).unwrap();
        let y = engine.run(x as FixedPoint).unwrap();
        prop_assert!((-ONE..=ONE).contains(&y));
    }

    #[test]
    fn prop_tanh_odd(x in -(i32::MAX as i64)..=(i32::MAX as i64)) {
        let mut engine = TanhEngine::new(&Config::default()).unwrap();
        let pos = engine.run(x).unwrap();
        let neg = engine.run(-x).unwrap();
        prop_assert!((pos + neg).abs() <= 1);
    }

    #[test]
    fn prop_tanh_accurate(x in -10.0f64..10.0) {
        let format = q25();
        let x_fixed = encode_fixed(x, &format);
        let y = tanh(x_fixed, &Config::default()).unwrap();
        let error = (decode_fixed(y, &format) - tanh_ref(decode_fixed(x_fixed, &format))).abs();
        prop_assert!(error < 1e-4, "tanh({}) off by {}", x, error);
    }

    #[test]
    fn prop_divide_within_one_ulp(
        n in i32::MIN as i64..=i32::MAX as i64,
        d in i32::MIN as i64..=i32::MAX as i64,
    ) {
        prop_assume!(d != 0);
        let exact = (n as i128) << 25;
        // only quotients the format can hold
        prop_assume!((exact / d as i128).abs() < (1i128 << 31));

        let q = divide(n, d, &Config::default()).unwrap();
        // |q - n 2^F / d| < 1  <=>  |q d - n 2^F| < |d|
        let residual = (q as i128 * d as i128 - exact).abs();
        prop_assert!(residual < (d as i128).abs());
    }

    #[test]
    fn prop_gelu_deterministic(x in -64.0f64..64.0) {
        let config = Config::default();
        let x_fixed = encode_fixed(x, &q25());
        let mut engine = GeluEngine::new(&config).unwrap();
        let first = engine.run(x_fixed).unwrap();
        prop_assert_eq!(engine.run(x_fixed).unwrap(), first);
        prop_assert_eq!(gelu(x_fixed, &config).unwrap(), first);
    }
}
