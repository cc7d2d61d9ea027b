mod core;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let chk = core::Checker::parse();
    let _log_handle = log4rs::init_config(core::build_log_config(&chk)?)?;

    core::run(&chk)?;

    log::debug!("{:?}", chk);
    Ok(())
}
