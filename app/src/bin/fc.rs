use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use structopt::StructOpt;

use foodcart::catalog::{CheckReadiness, ListAvailableProducts};
use foodcart::config::EnvLogger;
use foodcart::locations::ResolveAddresses;
use foodcart::orders::{Order, ShowOrder};
use foodcart::services::{Commandable, Queryable};
use infra::ids::Id;

#[derive(Debug, StructOpt)]
#[structopt(name = "fc", about = "Food-cart CLI")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "setup", about = "Create missing tables")]
    Setup,
    #[structopt(name = "show-products", about = "List products open for ordering")]
    ShowProducts,
    #[structopt(name = "readiness", about = "Check whether orders can be taken")]
    Readiness,
    #[structopt(name = "show-order", about = "Show an order and its items")]
    ShowOrder { id: Id<Order> },
    #[structopt(name = "geocode", about = "Resolve addresses through the location cache")]
    Geocode { addresses: Vec<String> },
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    foodcart: foodcart::config::Config,
    #[serde(default)]
    env_logger: EnvLogger,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut config: Config = foodcart::config::load(&opt.config)?;
    config.env_logger.builder().init();
    config.foodcart.apply_env()?;

    let fc = foodcart::FoodCart::new(&config.foodcart)?;

    match opt.command {
        Commands::Setup => {
            fc.setup()?;
        }
        Commands::ShowProducts => {
            for product in fc.catalog().query(ListAvailableProducts)? {
                let category = product.category.map(|c| c.name).unwrap_or_default();
                println!(
                    "{}: {} [{}] {}",
                    product.id, product.name, category, product.price
                );
            }
        }
        Commands::Readiness => {
            let readiness = fc.catalog().query(CheckReadiness)?;
            println!("{:#?}", readiness.counts);
            for error in readiness.errors.iter() {
                println!("not ready: {}", error);
            }
            if !readiness.ready {
                std::process::exit(1);
            }
        }
        Commands::ShowOrder { id } => match fc.orders().query(ShowOrder(id))? {
            Some((order, items)) => {
                println!(
                    "{} {} {} <{}> {} [{}]",
                    order.id,
                    order.firstname,
                    order.lastname,
                    order.phonenumber,
                    order.address,
                    order.status
                );
                for item in items {
                    println!("  {} x{} @ {}", item.product, item.quantity, item.price);
                }
            }
            None => {
                eprintln!("No such order: {}", id);
                std::process::exit(1);
            }
        },
        Commands::Geocode { addresses } => {
            for location in fc.locations().execute(ResolveAddresses(addresses))? {
                match location.coordinates() {
                    Some(c) => println!("{}: {}, {}", location.address, c.lat, c.lon),
                    None => println!("{}: unknown", location.address),
                }
            }
        }
    }

    Ok(())
}
