use log::{info, warn};
use tinysh::config::Args;
use tinysh::{Interpreter, logging, signals};

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if let Err(e) = logging::init(args.log_level, args.log_file.as_deref()) {
        eprintln!("tinysh: {:#}", e);
    }
    if let Err(e) = signals::install_interrupt_handler() {
        warn!("can't install SIGINT handler: {}", e);
    }
    info!("starting with {:?}", args);

    let mut sh = Interpreter::new(args.settings());
    sh.repl()
}
