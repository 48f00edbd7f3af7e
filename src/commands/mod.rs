pub type CmdResult<T> = stackup::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod config;
pub mod stack;
pub mod up;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (stackup::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Up(args) => dispatch!(args, global, up),
        crate::Commands::Stack(args) => dispatch!(args, global, stack),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
