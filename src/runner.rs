use std::path::Path;

use clap::{Args, Command, FromArgMatches as _};
use log::{info, LevelFilter};

use crate::context::{Context, ExecutionPhase};
use crate::error::TransmissionError;
use crate::parameters::{ContextParametersExt, Parameters};
use crate::random::ContextRandomExt;

/// Default cli arguments for a contact model run
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Random seed. Overrides the seed in the config file
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a JSON parameters file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,
}

#[derive(Args)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("ixa-transmission");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to a `Context`, a `BaseArgs` struct
///   and an `Option<A>` where A is the custom cli arguments struct
///
/// # Errors
/// Returns an error if argument parsing, parameter loading or the setup function fails
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), TransmissionError>,
{
    let mut cli = create_cli();
    cli = A::augment_args(cli);
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    let custom_matches = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, Some(custom_matches), setup_fn)
}

/// Runs a simulation with the default cli arguments.
///
/// The context is prepared in this order: logging, parameters (from `--config`, or the
/// defaults), random streams, then `setup_fn`. The run stops at the parameters' `max_time`.
///
/// # Errors
/// Returns an error if argument parsing, parameter loading or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<PlaceholderCustom>) -> Result<(), TransmissionError>,
{
    let cli = create_cli();
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, None, setup_fn)
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), TransmissionError>,
{
    if let Some(level) = args.log_level {
        crate::log::set_log_level(level);
    }

    let mut context = Context::new();

    if args.config.is_empty() {
        context.set_parameters(Parameters::default())?;
    } else {
        context.load_parameters_from_json(Path::new(&args.config))?;
    }

    let seed = args
        .random_seed
        .unwrap_or_else(|| context.get_parameters().seed);
    context.init_random(seed);

    setup_fn(&mut context, args, custom_args)?;

    // Read after setup, which may have replaced the parameters.
    let max_time = context.get_parameters().max_time;
    context.add_plan_with_phase(max_time, Context::shutdown, ExecutionPhase::Last);
    info!("running until t={max_time} with seed {seed}");

    context.execute();
    Ok(context)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::define_rng;

    #[derive(Args, Debug)]
    struct CustomArgs {
        #[arg(short, long, default_value = "0")]
        field: u32,
    }

    fn args(random_seed: Option<u64>, config: &str) -> BaseArgs {
        BaseArgs {
            random_seed,
            config: config.to_string(),
            log_level: None,
        }
    }

    #[test]
    fn test_run_with_random_seed() {
        let mut compare_ctx = Context::new();
        compare_ctx.init_random(42);
        define_rng!(TestRng);
        let result = run_with_args_internal(args(Some(42), ""), None, |ctx, _, _: Option<()>| {
            assert_eq!(
                ctx.sample_range(TestRng, 0..100),
                compare_ctx.sample_range(TestRng, 0..100)
            );
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_run_with_config_path() {
        let result = run_with_args_internal(
            args(None, "tests/data/parameters.json"),
            None,
            |ctx, _, _: Option<()>| {
                assert_eq!(ctx.get_parameters().seed, 123);
                assert_eq!(ctx.get_parameters().age_groups.len(), 3);
                Ok(())
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let result = run_with_args_internal(
            args(None, "tests/data/does_not_exist.json"),
            None,
            |_, _, _: Option<()>| Ok(()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_setup_error_is_returned() {
        let result = run_with_args_internal(args(None, ""), None, |_, _, _: Option<()>| {
            Err(TransmissionError::IllegalParameter("rejected".to_string()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_run_stops_at_max_time() {
        let result = run_with_args_internal(args(Some(1), ""), None, |ctx, _, _: Option<()>| {
            let max_time = ctx.get_parameters().max_time;
            ctx.add_plan(max_time + 1.0, |_| panic!("ran past max_time"));
            Ok(())
        });
        let context = result.unwrap();
        assert_eq!(context.get_current_time(), Parameters::default().max_time);
        assert_eq!(context.remaining_plan_count(), 1);
    }

    #[test]
    fn test_run_with_custom() {
        let custom = CustomArgs { field: 42 };
        let result = run_with_args_internal(args(Some(42), ""), Some(custom), |_, _, c| {
            assert_eq!(c.unwrap().field, 42);
            Ok(())
        });
        assert!(result.is_ok());
    }
}
