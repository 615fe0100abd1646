use clap::ArgMatches;

use super::CliError;

pub fn run_bench(_args: &ArgMatches) -> Result<i32, CliError> {
    #[cfg(not(feature = "bench"))]
    {
        eprintln!("Benchmarking requires the `bench` feature.");
        return Ok(1);
    }
    #[cfg(feature = "bench")]
    {
        use slowverb_lib::diagnostics::bench::{
            bench_convolver_sweep, bench_offline_render, BenchConfig,
        };
        use slowverb_lib::EffectSettings;

        use super::parse_arg;

        let args = _args;
        let input_seconds = parse_arg::<f32>(args, "input-seconds")?.unwrap_or(10.0);
        let iterations = parse_arg::<usize>(args, "iterations")?.unwrap_or(3);
        let config = BenchConfig {
            input_seconds,
            iterations,
            ..BenchConfig::default()
        };

        let settings = EffectSettings::default();
        let result = bench_offline_render(config, &settings).map_err(|err| {
            CliError::InvalidArgument(format!("benchmark failed: {}", err))
        })?;
        println!(
            "Render bench (speed={} input={}s ch={} iters={}): avg {:.2}ms (min {:.2}ms max {:.2}ms), audio {:.2}ms, rt {:.3}x",
            settings.speed,
            input_seconds,
            config.channels,
            iterations,
            result.avg_ms,
            result.min_ms,
            result.max_ms,
            result.audio_time_ms,
            result.rt_factor
        );

        if args.get_flag("sweep") {
            let fft_sizes = [256, 512, 1024, 2048, 4096, 8192];
            println!("fft_size | avg_ms | min_ms | max_ms | rt_x");
            for (fft_size, result) in bench_convolver_sweep(config, &fft_sizes) {
                println!(
                    "{:>8} | {:>6.2} | {:>6.2} | {:>6.2} | {:>4.3}",
                    fft_size, result.avg_ms, result.min_ms, result.max_ms, result.rt_factor
                );
            }
        }

        return Ok(0);
    }
}
