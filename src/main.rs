use clap::{Arg, ArgAction, Command};
use tracing::info;

use cordic_act::utils::{div_ref, exp_ref, gelu_ref, tanh_ref};
use cordic_act::{
    decode_fixed, encode_fixed, Config, DivByZeroPolicy, Engine, EnginePool, FixedDivider,
    FixedPoint, Format,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let defaults = Config::default();
    let matches = Command::new("cordic-act")
        .version("0.1.0")
        .about("Evaluates the fixed-point engines and compares them with f64")
        .override_usage("cordic-act <exp|tanh|gelu|div> <values>... [options]")
        .after_help("Example: cordic-act tanh -- -2 -0.5 0 1 6\n         cordic-act div 1 3 -7 2")
        .arg(Arg::new("function")
            .help("engine to run")
            .required(true)
            .index(1)
            .value_parser(["exp", "tanh", "gelu", "div"]))
        .arg(Arg::new("values")
            .help("inputs as real numbers (pairs of numerator, denominator for div)")
            .required(true)
            .index(2)
            .num_args(1..)
            .allow_hyphen_values(true)
            .value_parser(clap::value_parser!(f64)))
        .arg(Arg::new("width")
            .short('w')
            .long("width")
            .value_name("bits")
            .help("total width W including sign, default 32")
            .value_parser(clap::value_parser!(u32)))
        .arg(Arg::new("frac")
            .short('f')
            .long("frac")
            .value_name("bits")
            .help("fractional bits F, default 25")
            .value_parser(clap::value_parser!(u32)))
        .arg(Arg::new("iterations")
            .short('n')
            .long("iterations")
            .value_name("int")
            .help("CORDIC iterations N, default 24")
            .value_parser(clap::value_parser!(u32)))
        .arg(Arg::new("counter_bits")
            .short('k')
            .long("counter-bits")
            .value_name("bits")
            .help("signed width of the range-reduction counter, default 6")
            .value_parser(clap::value_parser!(u32)))
        .arg(Arg::new("div_by_zero")
            .long("div-by-zero")
            .value_name("policy")
            .help("error|passthrough, default error")
            .value_parser(clap::value_parser!(String)))
        .arg(Arg::new("raw")
            .long("raw")
            .help("treat values as raw fixed-point integers")
            .action(ArgAction::SetTrue))
        .get_matches();

    let div_by_zero = match matches.get_one::<String>("div_by_zero") {
        Some(policy) => policy.parse::<DivByZeroPolicy>()?,
        None => defaults.div_by_zero,
    };
    let config = Config {
        total_width: matches.get_one::<u32>("width").copied().unwrap_or(defaults.total_width),
        frac_width: matches.get_one::<u32>("frac").copied().unwrap_or(defaults.frac_width),
        cordic_iterations: matches
            .get_one::<u32>("iterations")
            .copied()
            .unwrap_or(defaults.cordic_iterations),
        range_counter_bits: matches
            .get_one::<u32>("counter_bits")
            .copied()
            .unwrap_or(defaults.range_counter_bits),
        div_by_zero,
    };

    let pool = EnginePool::new(&config)?;
    let format = pool.constants().format;
    info!(?config, "engines configured");

    let raw = matches.get_flag("raw");
    let xs: Vec<FixedPoint> = matches
        .get_many::<f64>("values")
        .ok_or("no input values")?
        .map(|&v| if raw { v as FixedPoint } else { encode_fixed(v, &format) })
        .collect();

    let function = matches
        .get_one::<String>("function")
        .map(|s| s.as_str())
        .ok_or("no function given")?;

    match function {
        "exp" => {
            let mut engine = pool.exp_engine();
            for &x in &xs {
                let y = engine.run(x)?;
                // results are double-width, same fraction
                let got = decode_fixed(y, &pool.constants().wide);
                let expected = exp_ref(decode_fixed(x, &format));
                report("exp", x, y, got, expected, &format);
                info!(ticks = engine.ticks(), "exp latency");
            }
        }
        "tanh" => {
            for (&x, &y) in xs.iter().zip(pool.tanh_batch(&xs)?.iter()) {
                let expected = tanh_ref(decode_fixed(x, &format));
                report("tanh", x, y, decode_fixed(y, &format), expected, &format);
            }
        }
        "gelu" => {
            for (&x, &y) in xs.iter().zip(pool.gelu_batch(&xs)?.iter()) {
                let expected = gelu_ref(decode_fixed(x, &format));
                report("gelu", x, y, decode_fixed(y, &format), expected, &format);
            }
        }
        _ => {
            if xs.len() % 2 != 0 {
                return Err("div expects numerator/denominator pairs".into());
            }
            let mut divider = FixedDivider::new(&config)?;
            for pair in xs.chunks(2) {
                let y = divider.run((pair[0], pair[1]))?;
                let expected = div_ref(decode_fixed(pair[0], &format), decode_fixed(pair[1], &format));
                println!(
                    "div({:.9}, {:.9}) = {} ({:.9}), reference {:.9}",
                    decode_fixed(pair[0], &format),
                    decode_fixed(pair[1], &format),
                    y,
                    decode_fixed(y, &format),
                    expected
                );
            }
        }
    }

    Ok(())
}

fn report(name: &str, x: FixedPoint, y: FixedPoint, got: f64, expected: f64, format: &Format) {
    println!(
        "{}({:.9}) = {} ({:.9}), reference {:.9}, error {:.3e}",
        name,
        decode_fixed(x, format),
        y,
        got,
        expected,
        (got - expected).abs()
    );
}
