use clap::Parser;
use log::LevelFilter;

use steg_hide::{
    cli::{Cli, Commands},
    handler::{handle_dig, handle_hide},
};

/// 根据 `-q` / `-v` 选择日志级别，设置了 `RUST_LOG` 时以环境变量为准。
fn init_logger(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Off,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();
}

/// 程序的主入口点
///
/// 负责解析命令行参数，并根据指定的子命令（`hide` 或 `dig`）
/// 将执行分派到相应的处理函数
fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();
    init_logger(&cli);
    log::debug!("steg_hide v{}", env!("CARGO_PKG_VERSION"));

    // 根据子命令调用相应的处理函数
    match cli.command {
        Commands::Hide(args) => handle_hide(args),
        Commands::Dig(args) => handle_dig(args),
    }
}
