use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::{middleware, App, HttpServer};
use anyhow::{Context, Result};
use log::*;
use serde::Deserialize;
use structopt::StructOpt;

use foodcart::config::EnvLogger;
use foodcart::FoodCart;
use infra::persistence::DatabaseConnectionManager;

#[derive(Debug, StructOpt)]
#[structopt(name = "serve", about = "Serve the food-cart API.")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    foodcart: foodcart::config::Config,
    listener: Listener,
    #[serde(default)]
    env_logger: EnvLogger,
}

#[derive(Deserialize, Debug)]
struct Listener {
    addr: SocketAddr,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut config: Config = foodcart::config::load(&opt.config)?;
    config.env_logger.builder().init();
    config.foodcart.apply_env()?;
    debug!("Options: {:?}", opt);

    let app = FoodCart::new(&config.foodcart)?;
    app.setup()?;

    actix_web::rt::System::new().block_on(serve(app, config.listener.addr))
}

async fn serve(app: FoodCart<DatabaseConnectionManager>, addr: SocketAddr) -> Result<()> {
    info!("Booting foodcart");
    let srv = HttpServer::new(move || {
        let app = app.clone();
        App::new()
            .wrap(middleware::Logger::default())
            .configure(move |cfg| app.configure(cfg))
    })
    .bind(addr)
    .context("bind")?;
    info!("Listening on: {:?}", srv.addrs());
    srv.run().await.context("run server")?;
    Ok(())
}
