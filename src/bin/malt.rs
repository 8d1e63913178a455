use malt::{cmdline, environment};

fn main() -> Result<(), cmdline::Error> {
    pretty_env_logger::init();
    let env = environment::root();
    environment::read_prelude(&env).map_err(cmdline::Error::Script)?;
    let args = std::env::args().collect();
    cmdline::launch(args, &env)
}
