use clap::Parser;
use dotenvy::dotenv;
use log::info;
use settlement_server::{
    cli::{display_envs, Arguments, Command},
    config::ServerConfig,
    server::run_command,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let command = Arguments::parse().command();
    if command == Command::ShowEnv {
        display_envs();
        return;
    }
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting settlement server ({command:?})");
    match run_command(command, config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        },
    }
}
